//! Accrual and redemption engine.
//!
//! Pure state transitions over `ClientLoyaltyState`. Persistence, atomicity and
//! at-most-once application are handled by `LoyaltyService`.

use rust_decimal::Decimal;
use serde::Serialize;

use super::error::LoyaltyError;
use super::qualification::is_qualifying;
use crate::models::{ClientLoyaltyState, LoyaltyPhase, QualifyingEvent, UnitFidelityConfig};

/// What applying a completed appointment did to the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccrualOutcome {
    /// Program disabled for the unit; nothing changed.
    Disabled,
    /// Visit recorded, but it did not count as a cut.
    NotQualifying,
    /// Qualifying visit while a courtesy is pending; the cut counter was held.
    Deferred,
    /// Cut counted toward the next courtesy.
    Accrued,
    /// Cut counted and completed at least one cycle.
    CourtesyEarned,
    /// The appointment had already been applied; nothing changed.
    AlreadyApplied,
}

impl AccrualOutcome {
    pub fn changes_counters(&self) -> bool {
        !matches!(self, Self::Disabled | Self::AlreadyApplied)
    }
}

/// New counters plus what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualResult {
    pub state: ClientLoyaltyState,
    pub outcome: AccrualOutcome,
    pub courtesies_earned: u32,
}

/// Advisory answer for the checkout screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FreeCutPrediction {
    pub is_free_cut: bool,
    pub loyalty_cuts: u32,
    pub threshold: u32,
}

/// Applies one completed appointment to a client's counters.
///
/// Callers must apply each appointment at most once; replaying an event counts it again.
pub fn apply_qualifying_event(
    state: &ClientLoyaltyState,
    config: &UnitFidelityConfig,
    event: &QualifyingEvent,
) -> AccrualResult {
    if !config.enabled {
        return AccrualResult {
            state: state.clone(),
            outcome: AccrualOutcome::Disabled,
            courtesies_earned: 0,
        };
    }

    let mut next = state.clone();
    next.record_visit(event.completed_at);

    if !is_qualifying(event, config) {
        return AccrualResult {
            state: next,
            outcome: AccrualOutcome::NotQualifying,
            courtesies_earned: 0,
        };
    }

    match state.phase() {
        LoyaltyPhase::CourtesyPending { .. } => AccrualResult {
            state: next,
            outcome: AccrualOutcome::Deferred,
            courtesies_earned: 0,
        },
        LoyaltyPhase::Accumulating { cuts } => {
            let threshold = config.effective_threshold();
            let mut cuts = cuts.saturating_add(1);
            let mut earned = 0;

            while cuts >= threshold {
                cuts -= threshold;
                earned += 1;
            }

            next.loyalty_cuts = cuts;
            next.available_courtesies = next.available_courtesies.saturating_add(earned);
            next.total_courtesies_earned = next.total_courtesies_earned.saturating_add(earned);

            AccrualResult {
                state: next,
                outcome: if earned > 0 {
                    AccrualOutcome::CourtesyEarned
                } else {
                    AccrualOutcome::Accrued
                },
                courtesies_earned: earned,
            }
        }
    }
}

/// Redeems one earned courtesy. Only `available_courtesies` changes.
pub fn consume_courtesy(state: &ClientLoyaltyState) -> Result<ClientLoyaltyState, LoyaltyError> {
    if state.available_courtesies == 0 {
        return Err(LoyaltyError::InsufficientCourtesies);
    }

    let mut next = state.clone();
    next.available_courtesies -= 1;
    Ok(next)
}

/// Predicts whether a service of `candidate_value` would be free for this client.
pub fn check_if_next_cut_is_free(
    state: &ClientLoyaltyState,
    config: &UnitFidelityConfig,
    candidate_value: Decimal,
) -> FreeCutPrediction {
    let threshold = config.effective_threshold();
    let is_free_cut = config.enabled
        && ((state.has_pending_courtesy() && candidate_value >= config.min_qualifying_value)
            || state.loyalty_cuts >= threshold);

    FreeCutPrediction {
        is_free_cut,
        loyalty_cuts: state.loyalty_cuts,
        threshold,
    }
}
