//! Repository implementations for database operations.

pub mod api_key;
pub mod appointment;
pub mod client;
pub mod ledger;
pub mod unit;

pub use api_key::ApiKeyRepository;
pub use appointment::AppointmentRepository;
pub use client::ClientRepository;
pub use ledger::LedgerRepository;
pub use unit::UnitRepository;
