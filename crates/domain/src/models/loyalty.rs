//! Client loyalty counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted fidelity counters for one client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientLoyaltyState {
    /// Qualifying cuts since the last courtesy was earned.
    pub loyalty_cuts: u32,
    /// Earned courtesies not yet redeemed at checkout.
    pub available_courtesies: u32,
    /// Lifetime courtesies earned.
    pub total_courtesies_earned: u32,
    pub total_visits: u32,
    pub last_visit_at: Option<DateTime<Utc>>,
}

/// Where a client stands in the accrual cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoyaltyPhase {
    /// No courtesy waiting; qualifying cuts count toward the next one.
    Accumulating { cuts: u32 },
    /// At least one earned courtesy is waiting to be redeemed at checkout.
    /// Qualifying visits do not advance `cuts` in this phase.
    CourtesyPending { available: u32, cuts: u32 },
}

impl ClientLoyaltyState {
    pub fn phase(&self) -> LoyaltyPhase {
        if self.available_courtesies > 0 {
            LoyaltyPhase::CourtesyPending {
                available: self.available_courtesies,
                cuts: self.loyalty_cuts,
            }
        } else {
            LoyaltyPhase::Accumulating {
                cuts: self.loyalty_cuts,
            }
        }
    }

    pub fn has_pending_courtesy(&self) -> bool {
        matches!(self.phase(), LoyaltyPhase::CourtesyPending { .. })
    }

    /// Records a completed visit, keeping the most recent completion time.
    pub(crate) fn record_visit(&mut self, completed_at: DateTime<Utc>) {
        self.total_visits = self.total_visits.saturating_add(1);
        self.last_visit_at = Some(match self.last_visit_at {
            Some(previous) if previous > completed_at => previous,
            _ => completed_at,
        });
    }
}

/// A client row together with the data the fidelity rule needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoyaltyClient {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub state: ClientLoyaltyState,
    /// Row version for conditional updates.
    pub version: i64,
}

/// GET response for a client's loyalty counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LoyaltyStateResponse {
    pub client_id: Uuid,
    pub unit_id: Uuid,
    #[serde(flatten)]
    pub state: ClientLoyaltyState,
    pub phase: LoyaltyPhase,
    pub cuts_threshold: u32,
}

impl LoyaltyStateResponse {
    pub fn new(client: &LoyaltyClient, cuts_threshold: u32) -> Self {
        Self {
            client_id: client.id,
            unit_id: client.unit_id,
            state: client.state.clone(),
            phase: client.state.phase(),
            cuts_threshold,
        }
    }
}
