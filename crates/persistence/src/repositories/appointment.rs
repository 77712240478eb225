//! Appointment repository: completed history used by reconciliation.

use domain::models::LoyaltyClient;
use shared::validation::{normalize_name, normalize_phone};
use sqlx::PgPool;

use crate::entities::CompletedAppointmentEntity;
use crate::metrics::QueryTimer;

/// Repository for completed appointments.
#[derive(Clone)]
pub struct AppointmentRepository {
    pool: PgPool,
}

impl AppointmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Completed appointments in the client's unit that belong to the client.
    ///
    /// An appointment matches on `client_id`, or on the phone number / name typed at
    /// booking, normalized the same way as `shared::validation`.
    pub async fn find_completed_for_client(
        &self,
        client: &LoyaltyClient,
    ) -> Result<Vec<CompletedAppointmentEntity>, sqlx::Error> {
        let phone = client.phone.as_deref().and_then(normalize_phone);
        let name = normalize_name(&client.name);

        let timer = QueryTimer::new("find_completed_appointments_for_client");
        let result = sqlx::query_as::<_, CompletedAppointmentEntity>(
            r#"
            WITH normalized AS (
                SELECT a.id, a.client_id, a.total_price, a.payment_method,
                       COALESCE(a.completed_at, a.created_at) AS completed_at,
                       regexp_replace(COALESCE(a.client_phone, ''), '\D', '', 'g') AS phone_digits,
                       lower(regexp_replace(regexp_replace(COALESCE(a.client_name, ''), '^\s+|\s+$', '', 'g'), '\s+', ' ', 'g')) AS name_key
                FROM appointments a
                WHERE a.unit_id = $1 AND a.status = 'completed'
            )
            SELECT id, total_price, payment_method, completed_at
            FROM normalized
            WHERE client_id = $2
               OR ($3::text IS NOT NULL AND phone_digits <> '' AND
                   CASE WHEN length(phone_digits) > 11 AND phone_digits LIKE '55%'
                        THEN substr(phone_digits, 3)
                        ELSE phone_digits
                   END = $3)
               OR ($4::text IS NOT NULL AND name_key <> '' AND name_key = $4)
            ORDER BY completed_at
            "#,
        )
        .bind(client.unit_id)
        .bind(client.id)
        .bind(phone)
        .bind(name)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
