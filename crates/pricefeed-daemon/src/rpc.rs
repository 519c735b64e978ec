//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC 2.0 method calls to the command handlers.
//! A connection that calls `subscribe_events` switches to receiving event
//! notifications until the client disconnects.

use std::path::PathBuf;
use std::sync::Arc;

use pricefeed_db::DbError;
use pricefeed_oracle::OracleError;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::events::EventFilter;
use crate::DaemonState;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Server-initiated notification carrying an event.
#[derive(Debug, Serialize)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcError {
    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self {
            code: -32700,
            message: "PARSE_ERROR".to_string(),
            data: None,
        }
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self {
            code: -32600,
            message: "INVALID_REQUEST".to_string(),
            data: None,
        }
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "METHOD_NOT_FOUND".to_string(),
            data: Some(serde_json::json!({"method": method})),
        }
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self {
            code: -32602,
            message: "INVALID_PARAMS".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self {
            code: -32603,
            message: "INTERNAL_ERROR".to_string(),
            data: Some(serde_json::json!({"detail": detail})),
        }
    }

    fn oracle(code: i32, message: &str, err: &OracleError) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: Some(serde_json::json!({"detail": err.to_string()})),
        }
    }
}

impl From<OracleError> for RpcError {
    fn from(err: OracleError) -> Self {
        let (code, message) = match &err {
            OracleError::UnknownAsset(_) => (-32100, "UNKNOWN_ASSET"),
            OracleError::NoPrice(_) => (-32101, "NO_PRICE"),
            OracleError::InsufficientStake { .. } => (-32102, "INSUFFICIENT_STAKE"),
            OracleError::NotOperator(_) => (-32103, "NOT_OPERATOR"),
            OracleError::OutsideUpdateWindow { .. } => (-32104, "OUTSIDE_UPDATE_WINDOW"),
            OracleError::UpdatesHalted => (-32105, "UPDATES_HALTED"),
            OracleError::Unauthorized(_) => (-32106, "UNAUTHORIZED"),
            OracleError::NoOpTransition(_) => (-32107, "NO_OP_TRANSITION"),
            OracleError::EmptyBatch => (-32108, "EMPTY_BATCH"),
            OracleError::InvalidPrice(_) => (-32109, "INVALID_PRICE"),
            OracleError::InvalidDecimals { .. } => (-32110, "INVALID_DECIMALS"),
            OracleError::WithdrawExceedsStake { .. } => (-32111, "WITHDRAW_EXCEEDS_STAKE"),
            OracleError::InvalidConfig(_) => (-32112, "INVALID_CONFIG"),
        };
        Self::oracle(code, message, &err)
    }
}

impl From<DbError> for RpcError {
    fn from(err: DbError) -> Self {
        error!("storage error: {err}");
        Self::internal_error(&format!("db error: {err}"))
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }

        let request = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => request,
            Err(_) => {
                let response = RpcResponse::error(serde_json::Value::Null, RpcError::parse_error());
                write_line(&mut writer, &response).await?;
                continue;
            }
        };

        if request.method == "subscribe_events" {
            let parsed = if request.params.is_null() {
                Ok(EventFilter::default())
            } else {
                serde_json::from_value::<EventFilter>(request.params.clone())
            };
            let filter = match parsed {
                Ok(filter) => filter,
                Err(e) => {
                    let response = RpcResponse::error(
                        request.id,
                        RpcError::invalid_params(&e.to_string()),
                    );
                    write_line(&mut writer, &response).await?;
                    continue;
                }
            };
            return stream_events(state, filter, request.id, reader, writer).await;
        }

        let response = dispatch_request(state.clone(), request).await;
        write_line(&mut writer, &response).await?;
    }

    Ok(())
}

/// Forward matching events to the client until it disconnects.
async fn stream_events(
    state: Arc<DaemonState>,
    filter: EventFilter,
    id: serde_json::Value,
    mut reader: BufReader<OwnedReadHalf>,
    mut writer: OwnedWriteHalf,
) -> anyhow::Result<()> {
    let mut rx = state.event_bus.subscribe();
    let ack = RpcResponse::success(id, serde_json::json!({"subscribed": true}));
    write_line(&mut writer, &ack).await?;
    debug!(?filter, "event subscription started");

    let mut discard = String::new();
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(event) if filter.matches(&event) => {
                    let notification = RpcNotification {
                        jsonrpc: "2.0".to_string(),
                        method: "event".to_string(),
                        params: serde_json::to_value(&event)?,
                    };
                    write_line(&mut writer, &notification).await?;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagging");
                }
                Err(RecvError::Closed) => break,
            },
            read = reader.read_line(&mut discard) => {
                if read? == 0 {
                    break;
                }
                discard.clear();
            }
        }
    }

    debug!("event subscription ended");
    Ok(())
}

async fn write_line<T: Serialize>(writer: &mut OwnedWriteHalf, message: &T) -> anyhow::Result<()> {
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub(crate) async fn dispatch_request(state: Arc<DaemonState>, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    if request.jsonrpc != "2.0" {
        return RpcResponse::error(id, RpcError::invalid_request());
    }
    let method = request.method.as_str();

    debug!("Dispatching RPC method: {}", method);

    let result = match method {
        // Reporter and authority commands
        "submit_prices" => commands::feed::submit_prices(&state, &request.params).await,
        "interrupt_updating" => {
            commands::feed::interrupt_updating(&state, &request.params).await
        }
        "resume_updating" => commands::feed::resume_updating(&state, &request.params).await,

        // Price queries
        "get_price" => commands::prices::get_price(&state, &request.params).await,
        "get_price_info" => commands::prices::get_price_info(&state, &request.params).await,
        "get_reference_price_info" => {
            commands::prices::get_reference_price_info(&state, &request.params).await
        }
        "get_price_history" => {
            commands::prices::get_price_history(&state, &request.params).await
        }

        // Feed status
        "get_epoch_times" => commands::prices::get_epoch_times(&state).await,
        "get_intervention_state" => commands::prices::get_intervention_state(&state).await,
        "get_feed_stats" => commands::prices::get_feed_stats(&state).await,
        "get_operators" => commands::prices::get_operators(&state).await,

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricefeed_types::{AccountId, AssetId, InterventionState};

    #[test]
    fn test_rpc_error_codes() {
        let err = RpcError::method_not_found("unknown");
        assert_eq!(err.code, -32601);

        let err = RpcError::from(OracleError::UnknownAsset(AssetId::from("XYZ")));
        assert_eq!(err.code, -32100);
        assert_eq!(err.message, "UNKNOWN_ASSET");

        let err = RpcError::from(OracleError::OutsideUpdateWindow {
            now: 1,
            window_start: 10,
            window_end: 15,
        });
        assert_eq!(err.code, -32104);

        let err = RpcError::from(OracleError::Unauthorized(AccountId::from("mallory")));
        assert_eq!(err.message, "UNAUTHORIZED");

        let err = RpcError::from(OracleError::NoOpTransition(InterventionState::Halted));
        assert_eq!(err.code, -32107);
    }

    #[test]
    fn test_rpc_response_success() {
        let resp = RpcResponse::success(serde_json::json!(1), serde_json::json!({"price": "1"}));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_rpc_response_error() {
        let resp = RpcResponse::error(serde_json::json!(1), RpcError::internal_error("test"));
        assert!(resp.result.is_none());
        assert!(resp.error.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let (state, _clock) = crate::tests::test_state(1_000);
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: serde_json::json!(7),
            method: "mint_tokens".to_string(),
            params: serde_json::Value::Null,
        };
        let resp = dispatch_request(state, request).await;
        let error = resp.error.expect("error");
        assert_eq!(error.code, -32601);
        assert_eq!(resp.id, serde_json::json!(7));
    }

    #[tokio::test]
    async fn test_dispatch_wrong_version() {
        let (state, _clock) = crate::tests::test_state(1_000);
        let request = RpcRequest {
            jsonrpc: "1.0".to_string(),
            id: serde_json::json!(1),
            method: "get_epoch_times".to_string(),
            params: serde_json::Value::Null,
        };
        let resp = dispatch_request(state, request).await;
        assert_eq!(resp.error.expect("error").code, -32600);
    }

    #[tokio::test]
    async fn test_dispatch_get_epoch_times() {
        let (state, _clock) = crate::tests::test_state(1_000);
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: serde_json::json!(1),
            method: "get_epoch_times".to_string(),
            params: serde_json::Value::Null,
        };
        let resp = dispatch_request(state, request).await;
        let result = resp.result.expect("result");
        assert_eq!(result["last_epoch_time"], 1_000);
        assert_eq!(result["next_epoch_time"], 1_015);
    }
}
