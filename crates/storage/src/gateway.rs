use paisa_core::{CanonicalTransaction, Destination};
use serde::Serialize;
use sqlx::{Acquire, Sqlite, Transaction};
use tracing::warn;

use crate::db::DbPool;

/// Per-row write outcome. A duplicate key is a normal "already processed"
/// result, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Inserted,
    DuplicateSkipped,
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub inserted: u64,
    pub duplicates: u64,
    pub rejected: u64,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.rejected += other.rejected;
    }
}

/// Routes canonical records to their destination table and performs
/// idempotent, failure-isolated inserts.
pub struct PersistenceGateway {
    pool: DbPool,
}

impl PersistenceGateway {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn table(destination: Destination) -> &'static str {
        match destination {
            Destination::Transaction => "transactions",
            Destination::Bill => "bills",
            Destination::Statement => "statements",
        }
    }

    /// Write a batch inside one outer transaction, each row in its own
    /// savepoint: a failing row rolls back alone and the batch continues.
    /// All surviving rows commit together at batch end; a transport failure
    /// propagates and loses only the uncommitted tail.
    pub async fn persist_batch(
        &self,
        rows: &[(CanonicalTransaction, Destination)],
    ) -> Result<BatchReport, sqlx::Error> {
        let mut outer = self.pool.begin().await?;
        let mut report = BatchReport::default();
        for (record, destination) in rows {
            match Self::insert_row(&mut outer, record, *destination).await? {
                RowOutcome::Inserted => report.inserted += 1,
                RowOutcome::DuplicateSkipped => report.duplicates += 1,
                RowOutcome::Rejected => report.rejected += 1,
            }
        }
        outer.commit().await?;
        Ok(report)
    }

    async fn insert_row(
        outer: &mut Transaction<'_, Sqlite>,
        record: &CanonicalTransaction,
        destination: Destination,
    ) -> Result<RowOutcome, sqlx::Error> {
        let Some(amount_cents) = record.amount.to_cents() else {
            warn!(key = %record.idempotency_key, "amount out of range; row rejected");
            return Ok(RowOutcome::Rejected);
        };

        let sql = format!(
            "INSERT INTO {} (idempotency_key, amount_cents, direction, category, merchant,
                             currency, card_ref, counterparty_payment_id, remarks, institution,
                             source_timestamp)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(idempotency_key) DO NOTHING",
            Self::table(destination)
        );

        let mut savepoint = outer.begin().await?;
        let result = sqlx::query(&sql)
            .bind(&record.idempotency_key)
            .bind(amount_cents)
            .bind(record.direction.as_str())
            .bind(&record.category)
            .bind(&record.merchant)
            .bind(&record.currency)
            .bind(&record.card_ref)
            .bind(&record.counterparty_payment_id)
            .bind(&record.remarks)
            .bind(&record.institution)
            .bind(record.source_timestamp.to_rfc3339())
            .execute(&mut *savepoint)
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                savepoint.commit().await?;
                Ok(RowOutcome::DuplicateSkipped)
            }
            Ok(_) => {
                savepoint.commit().await?;
                Ok(RowOutcome::Inserted)
            }
            Err(sqlx::Error::Database(db_err)) => {
                // Constraint or type failure on this row only.
                savepoint.rollback().await?;
                warn!(
                    key = %record.idempotency_key,
                    error = %db_err,
                    payload = ?record,
                    "row insert failed; rolled back this row only"
                );
                Ok(RowOutcome::Rejected)
            }
            // Anything non-database (lost connection, pool closed) aborts the
            // batch and surfaces to the orchestrator for retry.
            Err(transport) => Err(transport),
        }
    }
}
