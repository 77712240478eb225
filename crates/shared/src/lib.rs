//! Shared utilities and common types for the fidelity backend.
//!
//! This crate provides common functionality used across all other crates:
//! - API key hashing and prefix extraction
//! - Client identity normalization (phone numbers, names)
//! - Common validation logic

pub mod crypto;
pub mod validation;
