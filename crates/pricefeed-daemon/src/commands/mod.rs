//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category.

pub mod feed;
pub mod prices;

use pricefeed_types::{AssetId, Price};
use serde_json::Value;

use crate::rpc::RpcError;

/// Required string parameter.
pub(crate) fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str, RpcError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(&format!("{name} required")))
}

/// Required asset id parameter.
pub(crate) fn asset_param(params: &Value, name: &str) -> Result<AssetId, RpcError> {
    str_param(params, name).map(AssetId::from)
}

/// A price given as a decimal string or a non-negative JSON integer.
pub(crate) fn parse_price(value: &Value) -> Result<Price, RpcError> {
    match value {
        Value::String(s) => s
            .parse()
            .map_err(|_| RpcError::invalid_params(&format!("invalid price '{s}'"))),
        Value::Number(n) => n
            .as_u64()
            .map(Price::from)
            .ok_or_else(|| RpcError::invalid_params(&format!("invalid price {n}"))),
        _ => Err(RpcError::invalid_params("price must be a string or integer")),
    }
}
