//! Unit entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::UnitFidelityConfig;
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// Database row mapping for the units table.
#[derive(Debug, Clone, FromRow)]
pub struct UnitEntity {
    pub id: Uuid,
    pub name: String,
    pub fidelity_enabled: bool,
    pub fidelity_cuts_threshold: i32,
    pub fidelity_min_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UnitEntity> for UnitFidelityConfig {
    fn from(entity: UnitEntity) -> Self {
        UnitFidelityConfig::new(
            entity.fidelity_enabled,
            u32::try_from(entity.fidelity_cuts_threshold).unwrap_or(1),
            entity.fidelity_min_value,
        )
    }
}
