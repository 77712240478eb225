//! API key authentication.
//!
//! Keys are looked up by SHA-256 hash. A key is either scoped to one unit or an
//! admin key that reaches every unit.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use persistence::repositories::ApiKeyRepository;
use shared::crypto::{is_well_formed_key, sha256_hex};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Authenticated API key information, stored in request extensions by `require_auth`.
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    pub api_key_id: i64,
    /// Display prefix (8 characters after `fl_`).
    pub key_prefix: String,
    /// Unit the key is scoped to.
    pub unit_id: Option<Uuid>,
    pub is_admin: bool,
}

impl ApiKeyAuth {
    /// Validates an API key and returns authentication info.
    pub async fn validate(pool: &PgPool, api_key: &str) -> Result<Self, ApiError> {
        if !is_well_formed_key(api_key) {
            return Err(ApiError::Unauthorized(
                "Invalid or missing API key".to_string(),
            ));
        }

        let key_hash = sha256_hex(api_key);

        let repo = ApiKeyRepository::new(pool.clone());
        let key = repo
            .find_by_key_hash(&key_hash)
            .await
            .map_err(|e| {
                tracing::error!("Database error during API key lookup: {}", e);
                ApiError::Internal("Authentication service unavailable".to_string())
            })?
            .ok_or_else(|| ApiError::Unauthorized("Invalid or missing API key".to_string()))?;

        if !ApiKeyRepository::is_key_valid(&key) {
            return Err(if key.is_active {
                ApiError::Unauthorized("API key has expired".to_string())
            } else {
                ApiError::Unauthorized("Invalid or missing API key".to_string())
            });
        }

        // last_used_at is bookkeeping; the request does not wait for it.
        let pool_clone = pool.clone();
        let key_id = key.id;
        tokio::spawn(async move {
            let repo = ApiKeyRepository::new(pool_clone);
            if let Err(e) = repo.update_last_used(key_id).await {
                tracing::warn!("Failed to update API key last_used_at: {}", e);
            }
        });

        Ok(ApiKeyAuth {
            api_key_id: key.id,
            key_prefix: key.key_prefix,
            unit_id: key.unit_id,
            is_admin: key.is_admin,
        })
    }

    /// Admin keys reach every unit; other keys only their own.
    pub fn can_access_unit(&self, unit_id: Uuid) -> bool {
        self.is_admin || self.unit_id == Some(unit_id)
    }

    pub fn ensure_unit_access(&self, unit_id: Uuid) -> Result<(), ApiError> {
        if self.can_access_unit(unit_id) {
            Ok(())
        } else {
            tracing::warn!(
                key_prefix = %self.key_prefix,
                unit_id = %unit_id,
                "API key used outside its unit"
            );
            Err(ApiError::Forbidden(
                "API key does not grant access to this unit".to_string(),
            ))
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ApiKeyAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ApiKeyAuth>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Invalid or missing API key".to_string()))
    }
}
