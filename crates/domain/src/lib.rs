//! Domain layer for the fidelity backend.
//!
//! This crate contains:
//! - Domain models (unit fidelity settings, client loyalty counters, completed visits)
//! - The loyalty rule: qualification, accrual, redemption and reconciliation
//! - The storage abstraction and the service that coordinates it
//! - Domain error types

pub mod models;
pub mod services;
