//! PostgreSQL implementation of the `LoyaltyStore` trait.

use domain::models::{ClientLoyaltyState, LoyaltyClient, QualifyingEvent, UnitFidelityConfig};
use domain::services::{CommitOutcome, LedgerEntry, LoyaltyStore, StoreError};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::repositories::{
    AppointmentRepository, ClientRepository, LedgerRepository, UnitRepository,
};

fn store_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        error!(operation, error = %e, "Loyalty store query failed");
        StoreError::new(format!("{}: {}", operation, e))
    }
}

/// `LoyaltyStore` over the units, clients, appointments and loyalty_ledger tables.
#[derive(Clone)]
pub struct PgLoyaltyStore {
    units: UnitRepository,
    clients: ClientRepository,
    appointments: AppointmentRepository,
    ledger: LedgerRepository,
}

impl PgLoyaltyStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            units: UnitRepository::new(pool.clone()),
            clients: ClientRepository::new(pool.clone()),
            appointments: AppointmentRepository::new(pool.clone()),
            ledger: LedgerRepository::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl LoyaltyStore for PgLoyaltyStore {
    async fn get_unit_fidelity_config(
        &self,
        unit_id: Uuid,
    ) -> Result<Option<UnitFidelityConfig>, StoreError> {
        let unit = self
            .units
            .find_by_id(unit_id)
            .await
            .map_err(store_error("get_unit_fidelity_config"))?;
        Ok(unit.map(UnitFidelityConfig::from))
    }

    async fn update_unit_fidelity_config(
        &self,
        unit_id: Uuid,
        config: &UnitFidelityConfig,
    ) -> Result<bool, StoreError> {
        self.units
            .update_fidelity_config(unit_id, config)
            .await
            .map_err(store_error("update_unit_fidelity_config"))
    }

    async fn get_client(&self, client_id: Uuid) -> Result<Option<LoyaltyClient>, StoreError> {
        let client = self
            .clients
            .find_by_id(client_id)
            .await
            .map_err(store_error("get_client"))?;
        Ok(client.map(LoyaltyClient::from))
    }

    async fn commit(
        &self,
        client_id: Uuid,
        expected_version: i64,
        state: &ClientLoyaltyState,
        entry: Option<&LedgerEntry>,
    ) -> Result<CommitOutcome, StoreError> {
        self.clients
            .commit_loyalty_state(client_id, expected_version, state, entry)
            .await
            .map_err(store_error("commit"))
    }

    async fn list_completed_appointments(
        &self,
        client: &LoyaltyClient,
    ) -> Result<Vec<QualifyingEvent>, StoreError> {
        let rows = self
            .appointments
            .find_completed_for_client(client)
            .await
            .map_err(store_error("list_completed_appointments"))?;
        Ok(rows.into_iter().map(QualifyingEvent::from).collect())
    }

    async fn count_redemptions(&self, client_id: Uuid) -> Result<u32, StoreError> {
        let count = self
            .ledger
            .count_redemptions(client_id)
            .await
            .map_err(store_error("count_redemptions"))?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn list_unit_client_ids(&self, unit_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        self.clients
            .list_ids_by_unit(unit_id)
            .await
            .map_err(store_error("list_unit_client_ids"))
    }
}
