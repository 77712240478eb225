//! Loyalty service.
//!
//! Loads client state through a `LoyaltyStore`, applies the fidelity rule and
//! commits the result with a conditional update. A version conflict means another
//! writer changed the client in between; the operation is recomputed from fresh
//! state up to `max_commit_attempts` times.

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::accrual::{self, AccrualOutcome, AccrualResult, FreeCutPrediction};
use super::error::{LoyaltyError, StoreError};
use super::reconciliation::{reconcile, ReconciledCounters};
use super::store::{CommitOutcome, LedgerEntry, LoyaltyStore};
use crate::models::{
    ClientLoyaltyState, LoyaltyClient, LoyaltyPhase, LoyaltyStateResponse, QualifyingEvent,
    UnitFidelityConfig,
};

/// Default number of conditional-update attempts per operation.
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Default number of clients reconciled in parallel.
pub const DEFAULT_RECONCILIATION_CONCURRENCY: usize = 4;

/// Tuning for `LoyaltyService`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    pub max_commit_attempts: u32,
    pub reconciliation_concurrency: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            reconciliation_concurrency: DEFAULT_RECONCILIATION_CONCURRENCY,
        }
    }
}

/// Result of recording a completed appointment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct VisitResult {
    pub client_id: Uuid,
    pub unit_id: Uuid,
    pub outcome: AccrualOutcome,
    pub courtesies_earned: u32,
    pub state: ClientLoyaltyState,
    pub phase: LoyaltyPhase,
}

impl VisitResult {
    fn new(client: &LoyaltyClient, result: AccrualResult) -> Self {
        Self {
            client_id: client.id,
            unit_id: client.unit_id,
            outcome: result.outcome,
            courtesies_earned: result.courtesies_earned,
            phase: result.state.phase(),
            state: result.state,
        }
    }
}

/// Result of redeeming a courtesy.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RedemptionResult {
    pub client_id: Uuid,
    /// False when the redemption for this appointment had already been recorded.
    pub redeemed: bool,
    pub state: ClientLoyaltyState,
    pub phase: LoyaltyPhase,
}

/// A client that could not be reconciled during a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientReconciliationFailure {
    pub client_id: Uuid,
    pub error: String,
}

/// Summary of a unit-wide reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct BulkReconciliationReport {
    pub unit_id: Uuid,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: Vec<ClientReconciliationFailure>,
}

/// Fidelity program operations over a `LoyaltyStore`.
#[derive(Clone)]
pub struct LoyaltyService {
    store: Arc<dyn LoyaltyStore>,
    config: ServiceConfig,
}

impl LoyaltyService {
    pub fn new(store: Arc<dyn LoyaltyStore>, config: ServiceConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> ServiceConfig {
        self.config
    }

    /// Loads a client or fails with `ClientNotFound`.
    pub async fn client(&self, client_id: Uuid) -> Result<LoyaltyClient, LoyaltyError> {
        self.store
            .get_client(client_id)
            .await?
            .ok_or(LoyaltyError::ClientNotFound(client_id))
    }

    /// Loads a unit's fidelity settings or fails with `UnitNotConfigured`.
    pub async fn fidelity_config(&self, unit_id: Uuid) -> Result<UnitFidelityConfig, LoyaltyError> {
        self.store
            .get_unit_fidelity_config(unit_id)
            .await?
            .ok_or(LoyaltyError::UnitNotConfigured(unit_id))
    }

    /// Replaces a unit's fidelity settings.
    ///
    /// Counters already accrued are left as they are; a lower threshold takes effect
    /// on the next qualifying visit.
    pub async fn update_fidelity_config(
        &self,
        unit_id: Uuid,
        config: UnitFidelityConfig,
    ) -> Result<UnitFidelityConfig, LoyaltyError> {
        let config = UnitFidelityConfig::new(
            config.enabled,
            config.cuts_threshold,
            config.min_qualifying_value,
        );

        if !self.store.update_unit_fidelity_config(unit_id, &config).await? {
            return Err(LoyaltyError::UnitNotConfigured(unit_id));
        }

        info!(
            unit_id = %unit_id,
            enabled = config.enabled,
            cuts_threshold = config.cuts_threshold,
            min_qualifying_value = %config.min_qualifying_value,
            "Fidelity settings updated"
        );
        Ok(config)
    }

    pub async fn loyalty_state(&self, client_id: Uuid) -> Result<LoyaltyStateResponse, LoyaltyError> {
        let client = self.client(client_id).await?;
        let config = self.fidelity_config(client.unit_id).await?;
        Ok(LoyaltyStateResponse::new(&client, config.effective_threshold()))
    }

    pub async fn predict_free_cut(
        &self,
        client_id: Uuid,
        candidate_value: Decimal,
    ) -> Result<FreeCutPrediction, LoyaltyError> {
        let client = self.client(client_id).await?;
        let config = self.fidelity_config(client.unit_id).await?;
        Ok(accrual::check_if_next_cut_is_free(
            &client.state,
            &config,
            candidate_value,
        ))
    }

    /// Applies a completed appointment to the client's counters.
    ///
    /// When the event carries an appointment id, the appointment is applied at most
    /// once; a repeat returns `AccrualOutcome::AlreadyApplied` with the current counters.
    pub async fn record_completed_appointment(
        &self,
        client_id: Uuid,
        event: QualifyingEvent,
    ) -> Result<VisitResult, LoyaltyError> {
        let entry = event
            .appointment_id
            .map(|appointment_id| LedgerEntry::Accrual { appointment_id });

        for attempt in 1..=self.config.max_commit_attempts {
            let client = self.client(client_id).await?;
            let config = self.fidelity_config(client.unit_id).await?;
            let result = accrual::apply_qualifying_event(&client.state, &config, &event);

            if !result.outcome.changes_counters() {
                debug!(client_id = %client_id, outcome = ?result.outcome, "Visit left counters unchanged");
                return Ok(VisitResult::new(&client, result));
            }

            match self
                .store
                .commit(client.id, client.version, &result.state, entry.as_ref())
                .await?
            {
                CommitOutcome::Committed { version } => {
                    info!(
                        client_id = %client_id,
                        unit_id = %client.unit_id,
                        appointment_id = ?event.appointment_id,
                        outcome = ?result.outcome,
                        courtesies_earned = result.courtesies_earned,
                        version,
                        "Visit applied to loyalty counters"
                    );
                    return Ok(VisitResult::new(&client, result));
                }
                CommitOutcome::DuplicateEntry => {
                    info!(
                        client_id = %client_id,
                        appointment_id = ?event.appointment_id,
                        "Appointment already applied"
                    );
                    return Ok(VisitResult::new(
                        &client,
                        AccrualResult {
                            state: client.state.clone(),
                            outcome: AccrualOutcome::AlreadyApplied,
                            courtesies_earned: 0,
                        },
                    ));
                }
                CommitOutcome::VersionConflict => {
                    debug!(client_id = %client_id, attempt, "Version conflict while applying visit");
                }
            }
        }

        warn!(client_id = %client_id, "Gave up applying visit after repeated conflicts");
        Err(LoyaltyError::ConcurrentModification(client_id))
    }

    /// Redeems one available courtesy.
    ///
    /// With an appointment id the redemption is recorded at most once per appointment.
    pub async fn consume_courtesy(
        &self,
        client_id: Uuid,
        appointment_id: Option<Uuid>,
    ) -> Result<RedemptionResult, LoyaltyError> {
        let entry = LedgerEntry::Redemption { appointment_id };

        for attempt in 1..=self.config.max_commit_attempts {
            let client = self.client(client_id).await?;
            let next = accrual::consume_courtesy(&client.state)?;

            match self
                .store
                .commit(client.id, client.version, &next, Some(&entry))
                .await?
            {
                CommitOutcome::Committed { version } => {
                    info!(
                        client_id = %client_id,
                        unit_id = %client.unit_id,
                        appointment_id = ?appointment_id,
                        available_courtesies = next.available_courtesies,
                        version,
                        "Courtesy redeemed"
                    );
                    return Ok(RedemptionResult {
                        client_id,
                        redeemed: true,
                        phase: next.phase(),
                        state: next,
                    });
                }
                CommitOutcome::DuplicateEntry => {
                    info!(
                        client_id = %client_id,
                        appointment_id = ?appointment_id,
                        "Courtesy already redeemed for appointment"
                    );
                    return Ok(RedemptionResult {
                        client_id,
                        redeemed: false,
                        phase: client.state.phase(),
                        state: client.state,
                    });
                }
                CommitOutcome::VersionConflict => {
                    debug!(client_id = %client_id, attempt, "Version conflict while redeeming courtesy");
                }
            }
        }

        warn!(client_id = %client_id, "Gave up redeeming courtesy after repeated conflicts");
        Err(LoyaltyError::ConcurrentModification(client_id))
    }

    /// Rebuilds a client's counters from the completed appointment history.
    ///
    /// Running it twice over the same history yields the same counters.
    pub async fn recalculate(&self, client_id: Uuid) -> Result<ReconciledCounters, LoyaltyError> {
        for attempt in 1..=self.config.max_commit_attempts {
            let client = self.client(client_id).await?;
            let config = self.fidelity_config(client.unit_id).await?;
            let history = self.store.list_completed_appointments(&client).await?;
            let redeemed = self.store.count_redemptions(client.id).await?;

            let counters = reconcile(&history, &config, redeemed);
            let state = counters.clone().into_state();

            if state == client.state {
                debug!(client_id = %client_id, "Loyalty counters already consistent");
                return Ok(counters);
            }

            match self
                .store
                .commit(client.id, client.version, &state, None)
                .await?
            {
                CommitOutcome::VersionConflict => {
                    debug!(client_id = %client_id, attempt, "Version conflict while reconciling");
                }
                CommitOutcome::Committed { .. } | CommitOutcome::DuplicateEntry => {
                    info!(
                        client_id = %client_id,
                        unit_id = %client.unit_id,
                        previous_cuts = client.state.loyalty_cuts,
                        loyalty_cuts = counters.loyalty_cuts,
                        available_courtesies = counters.available_courtesies,
                        total_courtesies_earned = counters.total_courtesies_earned,
                        total_visits = counters.total_visits,
                        "Loyalty counters reconciled"
                    );
                    return Ok(counters);
                }
            }
        }

        warn!(client_id = %client_id, "Gave up reconciling after repeated conflicts");
        Err(LoyaltyError::ConcurrentModification(client_id))
    }

    /// Reconciles every client of a unit.
    ///
    /// Clients are processed independently; a failure is recorded in the report and
    /// never stops the others.
    pub async fn recalculate_unit(
        &self,
        unit_id: Uuid,
    ) -> Result<BulkReconciliationReport, LoyaltyError> {
        self.fidelity_config(unit_id).await?;
        let client_ids = self.store.list_unit_client_ids(unit_id).await?;

        let semaphore = Arc::new(Semaphore::new(self.config.reconciliation_concurrency.max(1)));
        let mut pending: HashSet<Uuid> = client_ids.iter().copied().collect();
        let mut tasks = JoinSet::new();

        for client_id in client_ids.iter().copied() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| StoreError::new(format!("reconciliation semaphore closed: {}", e)))?;
            let service = self.clone();
            tasks.spawn(async move {
                let result = service.recalculate(client_id).await;
                drop(permit);
                (client_id, result)
            });
        }

        let mut report = BulkReconciliationReport {
            unit_id,
            processed: client_ids.len(),
            ..Default::default()
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((client_id, Ok(_))) => {
                    pending.remove(&client_id);
                    report.succeeded += 1;
                }
                Ok((client_id, Err(e))) => {
                    pending.remove(&client_id);
                    warn!(client_id = %client_id, unit_id = %unit_id, error = %e, "Skipping client during unit reconciliation");
                    report.failed.push(ClientReconciliationFailure {
                        client_id,
                        error: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(unit_id = %unit_id, error = %e, "Reconciliation task aborted");
                }
            }
        }

        for client_id in pending {
            report.failed.push(ClientReconciliationFailure {
                client_id,
                error: "reconciliation task aborted".to_string(),
            });
        }
        report.failed.sort_by_key(|failure| failure.client_id);

        info!(
            unit_id = %unit_id,
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "Unit reconciliation finished"
        );
        Ok(report)
    }
}
