//! Domain models for the fidelity program.

pub mod appointment;
pub mod fidelity;
pub mod loyalty;

pub use appointment::{PaymentMethod, QualifyingEvent, RecordVisitRequest};
pub use fidelity::{FidelityConfigResponse, UnitFidelityConfig, UpdateFidelityConfigRequest};
pub use loyalty::{ClientLoyaltyState, LoyaltyClient, LoyaltyPhase, LoyaltyStateResponse};
