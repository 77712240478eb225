//! Storage abstraction for the fidelity program.
//!
//! The PostgreSQL implementation lives in the persistence crate. The in-memory
//! store here backs service tests and local tooling.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;
use uuid::Uuid;

use super::error::StoreError;
use crate::models::{ClientLoyaltyState, LoyaltyClient, QualifyingEvent, UnitFidelityConfig};

/// Ledger row written in the same transaction as a counter update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerEntry {
    /// An appointment was applied to the counters.
    Accrual { appointment_id: Uuid },
    /// A courtesy was redeemed, optionally against a specific appointment.
    Redemption { appointment_id: Option<Uuid> },
}

impl LedgerEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Accrual { .. } => "accrual",
            Self::Redemption { .. } => "redemption",
        }
    }

    pub fn appointment_id(&self) -> Option<Uuid> {
        match self {
            Self::Accrual { appointment_id } => Some(*appointment_id),
            Self::Redemption { appointment_id } => *appointment_id,
        }
    }
}

/// Result of a conditional counter update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { version: i64 },
    /// The row version moved since it was read; nothing was written.
    VersionConflict,
    /// The ledger already holds this entry for the appointment; nothing was written.
    DuplicateEntry,
}

/// Persistent store consumed by `LoyaltyService`.
#[async_trait::async_trait]
pub trait LoyaltyStore: Send + Sync {
    /// Returns `None` when the unit does not exist.
    async fn get_unit_fidelity_config(
        &self,
        unit_id: Uuid,
    ) -> Result<Option<UnitFidelityConfig>, StoreError>;

    /// Returns `false` when the unit does not exist.
    async fn update_unit_fidelity_config(
        &self,
        unit_id: Uuid,
        config: &UnitFidelityConfig,
    ) -> Result<bool, StoreError>;

    async fn get_client(&self, client_id: Uuid) -> Result<Option<LoyaltyClient>, StoreError>;

    /// Writes `state` only if the client's row version still equals `expected_version`.
    ///
    /// The optional ledger entry is inserted atomically with the update.
    async fn commit(
        &self,
        client_id: Uuid,
        expected_version: i64,
        state: &ClientLoyaltyState,
        entry: Option<&LedgerEntry>,
    ) -> Result<CommitOutcome, StoreError>;

    /// Completed appointments in the client's unit attributable to the client.
    async fn list_completed_appointments(
        &self,
        client: &LoyaltyClient,
    ) -> Result<Vec<QualifyingEvent>, StoreError>;

    async fn count_redemptions(&self, client_id: Uuid) -> Result<u32, StoreError>;

    async fn list_unit_client_ids(&self, unit_id: Uuid) -> Result<Vec<Uuid>, StoreError>;
}

/// Decides whether an appointment belongs to a client.
///
/// Appointments are linked by client id when checkout knew the client, otherwise by
/// phone number or name typed at booking time.
pub fn is_attributable(
    client: &LoyaltyClient,
    client_id: Option<Uuid>,
    client_name: Option<&str>,
    client_phone: Option<&str>,
) -> bool {
    use shared::validation::{normalize_name, normalize_phone};

    if client_id == Some(client.id) {
        return true;
    }

    let phone_match = match (
        client.phone.as_deref().and_then(normalize_phone),
        client_phone.and_then(normalize_phone),
    ) {
        (Some(known), Some(booked)) => known == booked,
        _ => false,
    };

    let name_match = match (normalize_name(&client.name), client_name.and_then(normalize_name)) {
        (Some(known), Some(booked)) => known == booked,
        _ => false,
    };

    phone_match || name_match
}

#[derive(Debug, Clone)]
struct StoredAppointment {
    unit_id: Uuid,
    client_id: Option<Uuid>,
    client_name: Option<String>,
    client_phone: Option<String>,
    completed: bool,
    event: QualifyingEvent,
}

#[derive(Debug, Default)]
struct InMemoryState {
    units: HashMap<Uuid, UnitFidelityConfig>,
    clients: HashMap<Uuid, LoyaltyClient>,
    appointments: Vec<StoredAppointment>,
    ledger: HashSet<(&'static str, Uuid)>,
    redemptions: HashMap<Uuid, u32>,
    failing_clients: HashSet<Uuid>,
    pending_conflicts: u32,
}

/// In-memory `LoyaltyStore` with the same conditional-update semantics as PostgreSQL.
#[derive(Debug, Default)]
pub struct InMemoryLoyaltyStore {
    inner: Mutex<InMemoryState>,
}

impl InMemoryLoyaltyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a unit and returns its id.
    pub async fn insert_unit(&self, config: UnitFidelityConfig) -> Uuid {
        let unit_id = Uuid::new_v4();
        self.inner.lock().await.units.insert(unit_id, config);
        unit_id
    }

    /// Creates a client with zeroed counters and returns its id.
    pub async fn insert_client(&self, unit_id: Uuid, name: &str, phone: Option<&str>) -> Uuid {
        let client = LoyaltyClient {
            id: Uuid::new_v4(),
            unit_id,
            name: name.to_string(),
            phone: phone.map(str::to_string),
            state: ClientLoyaltyState::default(),
            version: 0,
        };
        let client_id = client.id;
        self.inner.lock().await.clients.insert(client_id, client);
        client_id
    }

    /// Adds a completed appointment to the history used by reconciliation.
    pub async fn add_completed_appointment(
        &self,
        unit_id: Uuid,
        client_id: Option<Uuid>,
        client_name: Option<&str>,
        client_phone: Option<&str>,
        event: QualifyingEvent,
    ) {
        self.inner.lock().await.appointments.push(StoredAppointment {
            unit_id,
            client_id,
            client_name: client_name.map(str::to_string),
            client_phone: client_phone.map(str::to_string),
            completed: true,
            event,
        });
    }

    /// Adds an appointment that was booked but never completed.
    pub async fn add_open_appointment(&self, unit_id: Uuid, client_id: Uuid, event: QualifyingEvent) {
        self.inner.lock().await.appointments.push(StoredAppointment {
            unit_id,
            client_id: Some(client_id),
            client_name: None,
            client_phone: None,
            completed: false,
            event,
        });
    }

    /// Makes every history read for the client fail, as a malformed row would.
    pub async fn fail_history_for(&self, client_id: Uuid) {
        self.inner.lock().await.failing_clients.insert(client_id);
    }

    /// Forces the next `count` commits to report a version conflict after bumping the version,
    /// as if another writer had raced ahead.
    pub async fn inject_conflicts(&self, count: u32) {
        self.inner.lock().await.pending_conflicts = count;
    }

    pub async fn client(&self, client_id: Uuid) -> Option<LoyaltyClient> {
        self.inner.lock().await.clients.get(&client_id).cloned()
    }

    /// Overwrites a client's counters without touching the ledger, simulating a manual edit.
    pub async fn overwrite_state(&self, client_id: Uuid, state: ClientLoyaltyState) {
        if let Some(client) = self.inner.lock().await.clients.get_mut(&client_id) {
            client.state = state;
            client.version += 1;
        }
    }
}

#[async_trait::async_trait]
impl LoyaltyStore for InMemoryLoyaltyStore {
    async fn get_unit_fidelity_config(
        &self,
        unit_id: Uuid,
    ) -> Result<Option<UnitFidelityConfig>, StoreError> {
        Ok(self.inner.lock().await.units.get(&unit_id).cloned())
    }

    async fn update_unit_fidelity_config(
        &self,
        unit_id: Uuid,
        config: &UnitFidelityConfig,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.units.get_mut(&unit_id) {
            Some(existing) => {
                *existing = config.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_client(&self, client_id: Uuid) -> Result<Option<LoyaltyClient>, StoreError> {
        Ok(self.inner.lock().await.clients.get(&client_id).cloned())
    }

    async fn commit(
        &self,
        client_id: Uuid,
        expected_version: i64,
        state: &ClientLoyaltyState,
        entry: Option<&LedgerEntry>,
    ) -> Result<CommitOutcome, StoreError> {
        let mut inner = self.inner.lock().await;

        if inner.pending_conflicts > 0 {
            inner.pending_conflicts -= 1;
            if let Some(client) = inner.clients.get_mut(&client_id) {
                client.version += 1;
            }
            return Ok(CommitOutcome::VersionConflict);
        }

        let current_version = match inner.clients.get(&client_id) {
            Some(client) => client.version,
            None => return Ok(CommitOutcome::VersionConflict),
        };
        if current_version != expected_version {
            return Ok(CommitOutcome::VersionConflict);
        }

        if let Some(entry) = entry {
            if let Some(appointment_id) = entry.appointment_id() {
                if !inner.ledger.insert((entry.kind(), appointment_id)) {
                    return Ok(CommitOutcome::DuplicateEntry);
                }
            }
            if let LedgerEntry::Redemption { .. } = entry {
                *inner.redemptions.entry(client_id).or_insert(0) += 1;
            }
        }

        let client = inner
            .clients
            .get_mut(&client_id)
            .ok_or_else(|| StoreError::new("client disappeared during commit"))?;
        client.state = state.clone();
        client.version += 1;
        Ok(CommitOutcome::Committed {
            version: client.version,
        })
    }

    async fn list_completed_appointments(
        &self,
        client: &LoyaltyClient,
    ) -> Result<Vec<QualifyingEvent>, StoreError> {
        let inner = self.inner.lock().await;
        if inner.failing_clients.contains(&client.id) {
            return Err(StoreError::new(format!(
                "malformed appointment history for client {}",
                client.id
            )));
        }

        Ok(inner
            .appointments
            .iter()
            .filter(|appointment| appointment.completed && appointment.unit_id == client.unit_id)
            .filter(|appointment| {
                is_attributable(
                    client,
                    appointment.client_id,
                    appointment.client_name.as_deref(),
                    appointment.client_phone.as_deref(),
                )
            })
            .map(|appointment| appointment.event.clone())
            .collect())
    }

    async fn count_redemptions(&self, client_id: Uuid) -> Result<u32, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .redemptions
            .get(&client_id)
            .copied()
            .unwrap_or(0))
    }

    async fn list_unit_client_ids(&self, unit_id: Uuid) -> Result<Vec<Uuid>, StoreError> {
        let inner = self.inner.lock().await;
        let mut ids: Vec<Uuid> = inner
            .clients
            .values()
            .filter(|client| client.unit_id == unit_id)
            .map(|client| client.id)
            .collect();
        ids.sort();
        Ok(ids)
    }
}
