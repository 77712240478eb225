//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod api_key;
pub mod appointment;
pub mod client;
pub mod unit;

pub use api_key::ApiKeyEntity;
pub use appointment::CompletedAppointmentEntity;
pub use client::ClientEntity;
pub use unit::UnitEntity;
