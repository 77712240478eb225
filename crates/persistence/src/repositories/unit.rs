//! Unit repository: fidelity program settings.

use domain::models::UnitFidelityConfig;
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::client::column;
use crate::entities::UnitEntity;
use crate::metrics::QueryTimer;

/// Repository for unit settings.
#[derive(Clone)]
pub struct UnitRepository {
    pool: PgPool,
}

impl UnitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UnitEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_unit_by_id");
        let result = sqlx::query_as::<_, UnitEntity>(
            r#"
            SELECT id, name, fidelity_enabled, fidelity_cuts_threshold, fidelity_min_value,
                   created_at, updated_at
            FROM units
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Writes the fidelity columns. Returns `false` when the unit does not exist.
    pub async fn update_fidelity_config(
        &self,
        id: Uuid,
        config: &UnitFidelityConfig,
    ) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("update_unit_fidelity_config");
        let result = sqlx::query(
            r#"
            UPDATE units
            SET fidelity_enabled = $2,
                fidelity_cuts_threshold = $3,
                fidelity_min_value = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(config.enabled)
        .bind(column(config.effective_threshold()))
        .bind(config.min_qualifying_value)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }
}
