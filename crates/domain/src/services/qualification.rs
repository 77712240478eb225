//! Qualification evaluator.

use crate::models::{QualifyingEvent, UnitFidelityConfig};

/// Decides whether a completed appointment counts toward the loyalty counter.
///
/// A visit qualifies only while the program is enabled, when its price reaches the
/// unit's minimum, and when it was not itself paid with a courtesy.
pub fn is_qualifying(event: &QualifyingEvent, config: &UnitFidelityConfig) -> bool {
    config.enabled
        && event.total_price >= config.min_qualifying_value
        && !event.payment_method.is_courtesy()
}
