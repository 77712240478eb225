//! Completed appointment as seen by the fidelity program.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Labels written by older checkout screens when a visit was paid with a courtesy.
pub const LEGACY_COURTESY_MARKERS: [&str; 2] = ["Cortesia de Fidelidade", "fidelity_courtesy"];

/// How a completed appointment was paid.
///
/// Decided when the appointment is written. Qualification only looks at the
/// variant, never at the free-text label the checkout screen displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum PaymentMethod {
    Cash,
    Card,
    Pix,
    /// Paid with a previously earned fidelity courtesy.
    Courtesy,
    Other,
}

impl PaymentMethod {
    /// Maps a stored or submitted label to a payment method. Case and surrounding
    /// whitespace are ignored, including for the legacy courtesy markers.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        if LEGACY_COURTESY_MARKERS
            .iter()
            .any(|marker| marker.to_lowercase() == normalized)
        {
            return Self::Courtesy;
        }

        match normalized.as_str() {
            "courtesy" => Self::Courtesy,
            "cash" | "dinheiro" => Self::Cash,
            "card" | "credit" | "debit" | "credit_card" | "debit_card" | "cartao"
            | "cartão" | "cartao de credito" | "cartão de crédito" | "cartao de debito"
            | "cartão de débito" => Self::Card,
            "pix" => Self::Pix,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Pix => "pix",
            Self::Courtesy => "courtesy",
            Self::Other => "other",
        }
    }

    pub fn is_courtesy(&self) -> bool {
        matches!(self, Self::Courtesy)
    }
}

impl From<String> for PaymentMethod {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One completed appointment, evaluated by the fidelity rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QualifyingEvent {
    /// Source appointment, when known. Used to apply each appointment at most once.
    pub appointment_id: Option<Uuid>,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub completed_at: DateTime<Utc>,
}

/// Request payload sent by checkout when an appointment is completed.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RecordVisitRequest {
    pub appointment_id: Option<Uuid>,

    #[validate(custom(function = "validate_price"))]
    pub total_price: Decimal,

    pub payment_method: PaymentMethod,

    /// Defaults to the time the request is received.
    #[validate(custom(function = "validate_completed_at"))]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RecordVisitRequest {
    pub fn into_event(self, received_at: DateTime<Utc>) -> QualifyingEvent {
        QualifyingEvent {
            appointment_id: self.appointment_id,
            total_price: self.total_price,
            payment_method: self.payment_method,
            completed_at: self.completed_at.unwrap_or(received_at),
        }
    }
}

fn validate_price(price: &Decimal) -> Result<(), validator::ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        let mut err = validator::ValidationError::new("total_price_range");
        err.message = Some("Total price cannot be negative".into());
        Err(err)
    } else {
        Ok(())
    }
}

fn validate_completed_at(completed_at: &DateTime<Utc>) -> Result<(), validator::ValidationError> {
    shared::validation::validate_completed_at(completed_at)
}
