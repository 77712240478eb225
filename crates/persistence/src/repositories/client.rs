//! Client repository: loyalty counters with conditional updates.

use domain::models::ClientLoyaltyState;
use domain::services::{CommitOutcome, LedgerEntry};
use sqlx::PgPool;
use uuid::Uuid;

use super::ledger::LedgerRepository;
use crate::entities::client::column;
use crate::entities::ClientEntity;
use crate::metrics::QueryTimer;

/// PostgreSQL unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Repository for client loyalty counters.
#[derive(Clone)]
pub struct ClientRepository {
    pool: PgPool,
}

impl ClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ClientEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_client_loyalty");
        let result = sqlx::query_as::<_, ClientEntity>(
            r#"
            SELECT id, unit_id, name, phone, loyalty_cuts, available_courtesies,
                   total_courtesies_earned, total_visits, last_visit_at, loyalty_version
            FROM clients
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_ids_by_unit(&self, unit_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        let timer = QueryTimer::new("list_unit_client_ids");
        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM clients
            WHERE unit_id = $1
            ORDER BY id
            "#,
        )
        .bind(unit_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Writes new counters if `loyalty_version` still equals `expected_version`.
    ///
    /// The ledger entry, if any, is inserted in the same transaction. A unique
    /// violation on the ledger rolls the whole write back.
    pub async fn commit_loyalty_state(
        &self,
        id: Uuid,
        expected_version: i64,
        state: &ClientLoyaltyState,
        entry: Option<&LedgerEntry>,
    ) -> Result<CommitOutcome, sqlx::Error> {
        let timer = QueryTimer::new("commit_client_loyalty");
        let mut tx = self.pool.begin().await?;

        let version = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE clients
            SET loyalty_cuts = $3,
                available_courtesies = $4,
                total_courtesies_earned = $5,
                total_visits = $6,
                last_visit_at = $7,
                loyalty_version = loyalty_version + 1,
                updated_at = NOW()
            WHERE id = $1 AND loyalty_version = $2
            RETURNING loyalty_version
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(column(state.loyalty_cuts))
        .bind(column(state.available_courtesies))
        .bind(column(state.total_courtesies_earned))
        .bind(column(state.total_visits))
        .bind(state.last_visit_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(version) = version else {
            tx.rollback().await?;
            timer.record();
            return Ok(CommitOutcome::VersionConflict);
        };

        if let Some(entry) = entry {
            let inserted = LedgerRepository::insert(&mut tx, id, entry).await;
            if let Err(sqlx::Error::Database(db_err)) = &inserted {
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                    tx.rollback().await?;
                    timer.record();
                    return Ok(CommitOutcome::DuplicateEntry);
                }
            }
            inserted?;
        }

        tx.commit().await?;
        timer.record();
        Ok(CommitOutcome::Committed { version })
    }
}
