//! Typed failures reported by an execution venue.

use thiserror::Error;

use crate::models::PositionId;

/// Outcome of a rejected gateway request.
///
/// Gateway calls never panic or unwind the event loop; every failure comes
/// back as one of these variants and the controller decides what it means.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Not enough free margin to open the order. Fatal for the session.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// The venue refused the request (invalid stop level, volume, ...).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The position is no longer open on the venue.
    #[error("unknown position {0}")]
    UnknownPosition(PositionId),

    /// Any other venue-side failure.
    #[error("venue error: {0}")]
    Venue(String),
}

impl GatewayError {
    /// Whether this error must stop all further trading.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GatewayError::InsufficientFunds)
    }
}
