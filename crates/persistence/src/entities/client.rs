//! Client entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::{ClientLoyaltyState, LoyaltyClient};
use sqlx::FromRow;
use uuid::Uuid;

/// Client row with the loyalty counter columns.
#[derive(Debug, Clone, FromRow)]
pub struct ClientEntity {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub loyalty_cuts: i32,
    pub available_courtesies: i32,
    pub total_courtesies_earned: i32,
    pub total_visits: i32,
    pub last_visit_at: Option<DateTime<Utc>>,
    pub loyalty_version: i64,
}

/// Converts a counter column to the domain type. Columns carry `>= 0` checks.
pub(crate) fn counter(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Converts a domain counter to its column value.
pub(crate) fn column(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl From<ClientEntity> for LoyaltyClient {
    fn from(entity: ClientEntity) -> Self {
        LoyaltyClient {
            id: entity.id,
            unit_id: entity.unit_id,
            name: entity.name,
            phone: entity.phone,
            state: ClientLoyaltyState {
                loyalty_cuts: counter(entity.loyalty_cuts),
                available_courtesies: counter(entity.available_courtesies),
                total_courtesies_earned: counter(entity.total_courtesies_earned),
                total_visits: counter(entity.total_visits),
                last_visit_at: entity.last_visit_at,
            },
            version: entity.loyalty_version,
        }
    }
}
