//! Loyalty ledger repository.

use domain::services::LedgerEntry;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::metrics::QueryTimer;

/// Repository for accrual and redemption ledger rows.
#[derive(Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a ledger row inside the caller's transaction.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        client_id: Uuid,
        entry: &LedgerEntry,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO loyalty_ledger (client_id, kind, appointment_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(client_id)
        .bind(entry.kind())
        .bind(entry.appointment_id())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn count_redemptions(&self, client_id: Uuid) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_redemptions");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM loyalty_ledger
            WHERE client_id = $1 AND kind = 'redemption'
            "#,
        )
        .bind(client_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}
