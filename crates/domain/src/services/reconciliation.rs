//! Reconciliation of loyalty counters from appointment history.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::qualification::is_qualifying;
use crate::models::{ClientLoyaltyState, QualifyingEvent, UnitFidelityConfig};

/// Counters recomputed from the full history of completed appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ReconciledCounters {
    pub loyalty_cuts: u32,
    pub available_courtesies: u32,
    pub total_courtesies_earned: u32,
    pub total_visits: u32,
    pub last_visit_at: Option<DateTime<Utc>>,
    /// Qualifying appointments found in the history.
    pub qualifying_visits: u32,
    /// Redemptions recorded in the ledger and subtracted from earned courtesies.
    pub redeemed_courtesies: u32,
}

impl ReconciledCounters {
    pub fn into_state(self) -> ClientLoyaltyState {
        ClientLoyaltyState {
            loyalty_cuts: self.loyalty_cuts,
            available_courtesies: self.available_courtesies,
            total_courtesies_earned: self.total_courtesies_earned,
            total_visits: self.total_visits,
            last_visit_at: self.last_visit_at,
        }
    }
}

/// Recomputes counters from scratch.
///
/// Every completed appointment is a visit. Qualifying ones are divided by the
/// threshold; the quotient is the lifetime courtesies earned and the remainder the
/// current cut count. Courtesies still available are the earned ones minus
/// `redeemed`, never below zero.
pub fn reconcile(
    history: &[QualifyingEvent],
    config: &UnitFidelityConfig,
    redeemed: u32,
) -> ReconciledCounters {
    let threshold = config.effective_threshold();
    let qualifying = history
        .iter()
        .filter(|event| is_qualifying(event, config))
        .count();
    let qualifying = u32::try_from(qualifying).unwrap_or(u32::MAX);
    let total_courtesies_earned = qualifying / threshold;

    ReconciledCounters {
        loyalty_cuts: qualifying % threshold,
        available_courtesies: total_courtesies_earned.saturating_sub(redeemed),
        total_courtesies_earned,
        total_visits: u32::try_from(history.len()).unwrap_or(u32::MAX),
        last_visit_at: history.iter().map(|event| event.completed_at).max(),
        qualifying_visits: qualifying,
        redeemed_courtesies: redeemed,
    }
}
