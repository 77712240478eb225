//! Completed appointment rows read for reconciliation.

use chrono::{DateTime, Utc};
use domain::models::{PaymentMethod, QualifyingEvent};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

/// Projection of a completed appointment.
#[derive(Debug, Clone, FromRow)]
pub struct CompletedAppointmentEntity {
    pub id: Uuid,
    pub total_price: Decimal,
    pub payment_method: String,
    pub completed_at: DateTime<Utc>,
}

impl From<CompletedAppointmentEntity> for QualifyingEvent {
    fn from(entity: CompletedAppointmentEntity) -> Self {
        QualifyingEvent {
            appointment_id: Some(entity.id),
            total_price: entity.total_price,
            payment_method: PaymentMethod::from_label(&entity.payment_method),
            completed_at: entity.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_courtesy_label_maps_to_courtesy() {
        let entity = CompletedAppointmentEntity {
            id: Uuid::new_v4(),
            total_price: Decimal::from(45),
            payment_method: "Cortesia de Fidelidade".to_string(),
            completed_at: Utc::now(),
        };
        let event: QualifyingEvent = entity.clone().into();

        assert_eq!(event.appointment_id, Some(entity.id));
        assert_eq!(event.payment_method, PaymentMethod::Courtesy);
    }
}
