//! HTTP route handlers.

pub mod admin;
pub mod fidelity;
pub mod health;
pub mod loyalty;
