//! Fidelity domain errors.

use thiserror::Error;
use uuid::Uuid;

/// Failure reported by a `LoyaltyStore` backend.
#[derive(Debug, Error)]
#[error("Store error: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors raised by fidelity operations.
#[derive(Debug, Error)]
pub enum LoyaltyError {
    #[error("Client has no courtesies available")]
    InsufficientCourtesies,

    #[error("Unit {0} is not configured")]
    UnitNotConfigured(Uuid),

    #[error("Client {0} not found")]
    ClientNotFound(Uuid),

    #[error("Loyalty counters for client {0} changed concurrently")]
    ConcurrentModification(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),
}
