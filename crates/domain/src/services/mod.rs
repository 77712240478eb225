//! Domain services for the fidelity program.
//!
//! The rule itself (qualification, accrual, redemption, reconciliation) is a set of
//! pure functions. `LoyaltyService` loads state through a `LoyaltyStore`, applies
//! the rule and commits the result atomically per client.

pub mod accrual;
pub mod error;
pub mod loyalty;
pub mod qualification;
pub mod reconciliation;
pub mod store;

pub use accrual::{
    apply_qualifying_event, check_if_next_cut_is_free, consume_courtesy, AccrualOutcome,
    AccrualResult, FreeCutPrediction,
};
pub use error::{LoyaltyError, StoreError};
pub use loyalty::{
    BulkReconciliationReport, ClientReconciliationFailure, LoyaltyService, RedemptionResult,
    ServiceConfig, VisitResult, DEFAULT_MAX_COMMIT_ATTEMPTS, DEFAULT_RECONCILIATION_CONCURRENCY,
};
pub use qualification::is_qualifying;
pub use reconciliation::{reconcile, ReconciledCounters};
pub use store::{CommitOutcome, InMemoryLoyaltyStore, LedgerEntry, LoyaltyStore};
