//! Authority intervention.
//!
//! The authority can halt publication, freezing every canonical price at its
//! last value, and later resume it. Only the configured authority identity
//! may toggle the switch, and toggling into the current state is refused so
//! that a mistaken call is never mistaken for success.

use pricefeed_types::{AccountId, AuthorityId, InterventionState};

use crate::{OracleError, Result};

/// Two-state switch gating finalization: `Active` or `Halted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterventionControl {
    /// The only caller allowed to toggle the state.
    authority: AuthorityId,
    state: InterventionState,
}

impl InterventionControl {
    /// Create an active switch controlled by `authority`.
    pub fn new(authority: AuthorityId) -> Self {
        Self {
            authority,
            state: InterventionState::Active,
        }
    }

    /// Create a switch in a previously persisted state.
    pub fn with_state(authority: AuthorityId, state: InterventionState) -> Self {
        Self { authority, state }
    }

    /// Halt publication.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`] if `caller` is not the authority
    /// - [`OracleError::NoOpTransition`] if already halted
    pub fn interrupt_updating(&mut self, caller: &AccountId) -> Result<()> {
        self.transition(caller, InterventionState::Halted)?;
        tracing::warn!(%caller, "intervention: updating interrupted");
        Ok(())
    }

    /// Resume publication.
    ///
    /// # Errors
    ///
    /// - [`OracleError::Unauthorized`] if `caller` is not the authority
    /// - [`OracleError::NoOpTransition`] if already active
    pub fn resume_updating(&mut self, caller: &AccountId) -> Result<()> {
        self.transition(caller, InterventionState::Active)?;
        tracing::info!(%caller, "intervention: updating resumed");
        Ok(())
    }

    fn transition(&mut self, caller: &AccountId, target: InterventionState) -> Result<()> {
        if *caller != self.authority {
            tracing::warn!(%caller, %target, "intervention: unauthorized caller");
            return Err(OracleError::Unauthorized(caller.clone()));
        }
        if self.state == target {
            return Err(OracleError::NoOpTransition(target));
        }
        self.state = target;
        Ok(())
    }

    /// # Errors
    ///
    /// - [`OracleError::UpdatesHalted`] while halted
    pub fn check_active(&self) -> Result<()> {
        if self.is_halted() {
            return Err(OracleError::UpdatesHalted);
        }
        Ok(())
    }

    pub fn state(&self) -> InterventionState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state.is_halted()
    }

    pub fn authority(&self) -> &AuthorityId {
        &self.authority
    }
}
