//! Startup services.

pub mod admin_bootstrap;
