//! Admin API key bootstrap.
//!
//! Stores the key from `admin.bootstrap_api_key` as an admin key on startup so a
//! fresh deployment can reach the admin routes. Only the SHA-256 hash is stored.

use persistence::repositories::ApiKeyRepository;
use shared::crypto::{extract_key_prefix, sha256_hex};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::AdminBootstrapConfig;

/// Error types for admin bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Outcome of a bootstrap attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    NotConfigured,
    AlreadyPresent,
    Created,
}

/// Stores the configured admin key if it is not stored yet. Idempotent.
pub async fn bootstrap_admin_key(
    pool: &PgPool,
    config: &AdminBootstrapConfig,
) -> Result<BootstrapOutcome, BootstrapError> {
    let api_key = config.bootstrap_api_key.trim();
    if api_key.is_empty() {
        return Ok(BootstrapOutcome::NotConfigured);
    }

    let key_prefix = extract_key_prefix(api_key).ok_or_else(|| {
        BootstrapError::Config(format!(
            "bootstrap key must start with '{}'",
            shared::crypto::API_KEY_PREFIX
        ))
    })?;
    let key_hash = sha256_hex(api_key);

    let repo = ApiKeyRepository::new(pool.clone());
    if repo.exists(&key_hash).await? {
        info!(api_key_prefix = %key_prefix, "Bootstrap admin key already stored");
        return Ok(BootstrapOutcome::AlreadyPresent);
    }

    let key_id = repo
        .create(&key_hash, key_prefix, "Bootstrap admin key", None, true)
        .await?;

    info!(api_key_id = key_id, api_key_prefix = %key_prefix, "Bootstrap admin key created");
    warn!("SECURITY: Remove FID__ADMIN__BOOTSTRAP_API_KEY from the environment after first start");

    Ok(BootstrapOutcome::Created)
}
