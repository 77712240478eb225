//! Unit fidelity program settings.
//!
//! Each unit (barbershop location) owns one configuration. It is written by the
//! settings surface and only read by the accrual engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Default number of qualifying cuts per courtesy for new units.
pub const DEFAULT_CUTS_THRESHOLD: u32 = 10;

/// Upper bound accepted by the settings endpoint.
pub const MAX_CUTS_THRESHOLD: u32 = 100;

/// Per-unit fidelity program configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UnitFidelityConfig {
    pub enabled: bool,
    /// Qualifying cuts required to earn one courtesy (always >= 1).
    pub cuts_threshold: u32,
    /// Minimum service price for a visit to count as a cut.
    pub min_qualifying_value: Decimal,
}

impl UnitFidelityConfig {
    pub fn new(enabled: bool, cuts_threshold: u32, min_qualifying_value: Decimal) -> Self {
        Self {
            enabled,
            cuts_threshold: cuts_threshold.max(1),
            min_qualifying_value: min_qualifying_value.max(Decimal::ZERO),
        }
    }

    /// Threshold guarded against a zero read from a corrupted row.
    pub fn effective_threshold(&self) -> u32 {
        self.cuts_threshold.max(1)
    }
}

impl Default for UnitFidelityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cuts_threshold: DEFAULT_CUTS_THRESHOLD,
            min_qualifying_value: Decimal::ZERO,
        }
    }
}

/// GET/PUT response for a unit's fidelity settings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FidelityConfigResponse {
    pub unit_id: Uuid,
    pub enabled: bool,
    pub cuts_threshold: u32,
    pub min_qualifying_value: Decimal,
}

impl FidelityConfigResponse {
    pub fn new(unit_id: Uuid, config: UnitFidelityConfig) -> Self {
        Self {
            unit_id,
            enabled: config.enabled,
            cuts_threshold: config.cuts_threshold,
            min_qualifying_value: config.min_qualifying_value,
        }
    }
}

/// PUT request to replace a unit's fidelity settings.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct UpdateFidelityConfigRequest {
    pub enabled: bool,

    #[validate(range(
        min = 1,
        max = 100,
        message = "Cuts threshold must be between 1 and 100"
    ))]
    pub cuts_threshold: u32,

    #[validate(custom(function = "validate_min_qualifying_value"))]
    pub min_qualifying_value: Decimal,
}

impl From<UpdateFidelityConfigRequest> for UnitFidelityConfig {
    fn from(request: UpdateFidelityConfigRequest) -> Self {
        UnitFidelityConfig::new(
            request.enabled,
            request.cuts_threshold,
            request.min_qualifying_value,
        )
    }
}

fn validate_min_qualifying_value(value: &Decimal) -> Result<(), validator::ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = validator::ValidationError::new("min_qualifying_value_range");
        err.message = Some("Minimum qualifying value cannot be negative".into());
        Err(err)
    } else {
        Ok(())
    }
}
