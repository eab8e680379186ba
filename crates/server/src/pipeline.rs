use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;

use paisa_core::{CanonicalTransaction, CategoryTable, Destination};
use paisa_extract::{normalize, GateConfig, ReviewLog, RuleSet, Verdict};
use paisa_mail::{decode_message, RawMessage};
use paisa_storage::PersistenceGateway;

/// Aggregate counts for one processing run. This is the whole user-visible
/// surface of a run; raw internal errors never leave the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub fetched: u64,
    pub inserted: u64,
    pub duplicates: u64,
    /// Normalization rejections plus row-level persistence failures.
    pub rejected: u64,
    /// No rule matched; body recorded in the review log.
    pub unmatched: u64,
    /// Gatekeeper said not a transaction.
    pub skipped: u64,
}

/// The single pipeline entry point: decode → gatekeep → select → normalize →
/// persist, in batches.
pub struct Pipeline {
    rules: RuleSet,
    gate: GateConfig,
    categories: CategoryTable,
    review: ReviewLog,
    gateway: PersistenceGateway,
    batch_size: usize,
}

impl Pipeline {
    pub fn new(
        rules: RuleSet,
        gate: GateConfig,
        categories: CategoryTable,
        review: ReviewLog,
        gateway: PersistenceGateway,
        batch_size: usize,
    ) -> Self {
        Self {
            rules,
            gate,
            categories,
            review,
            gateway,
            batch_size: batch_size.max(1),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Process raw messages in batches. Cancellation is batch-granular: the
    /// flag is consulted between batches only, so an in-flight batch always
    /// reaches its commit-or-rollback point.
    pub async fn process(
        &self,
        raw: &[RawMessage],
        cancel: Option<&watch::Receiver<bool>>,
    ) -> Result<PipelineReport, sqlx::Error> {
        let mut report = PipelineReport {
            fetched: raw.len() as u64,
            ..PipelineReport::default()
        };
        let ingested_at = Utc::now();

        for batch in raw.chunks(self.batch_size) {
            if cancel.is_some_and(|c| *c.borrow()) {
                tracing::info!("cancellation requested; stopping before next batch");
                break;
            }
            // Per-email work is pure; only the gateway touches the database.
            let rows = self.classify_batch(batch, ingested_at, &mut report);
            let batch_report = self.gateway.persist_batch(&rows).await?;
            report.inserted += batch_report.inserted;
            report.duplicates += batch_report.duplicates;
            report.rejected += batch_report.rejected;
        }

        Ok(report)
    }

    fn classify_batch(
        &self,
        batch: &[RawMessage],
        ingested_at: DateTime<Utc>,
        report: &mut PipelineReport,
    ) -> Vec<(CanonicalTransaction, Destination)> {
        let mut rows = Vec::new();
        for raw in batch {
            let email = decode_message(&raw.bytes);

            let destination = match self.gate.admit(&email) {
                Verdict::Candidate(destination) => destination,
                Verdict::Rejected(reason) => {
                    tracing::debug!(id = %raw.id, %reason, "not a transaction");
                    report.skipped += 1;
                    continue;
                }
            };

            let Some(matched) = self.rules.select(&email.body) else {
                report.unmatched += 1;
                if let Err(e) = self.review.record(&email) {
                    tracing::warn!(id = %raw.id, error = %e, "failed to append review log");
                }
                continue;
            };

            match normalize(
                matched.rule,
                &matched.capture,
                &email,
                &self.categories,
                ingested_at,
            ) {
                Ok(record) => rows.push((record, destination)),
                Err(e) => {
                    tracing::warn!(
                        id = %raw.id,
                        rule = matched.rule.id(),
                        error = %e,
                        capture = ?matched.capture,
                        "normalization rejected"
                    );
                    report.rejected += 1;
                }
            }
        }
        rows
    }
}

/// Retry a whole run on transport failure with doubling backoff. Safe to
/// retry because already-committed rows resolve as duplicate-skips.
pub async fn process_with_retry(
    pipeline: &Pipeline,
    raw: &[RawMessage],
    cancel: Option<&watch::Receiver<bool>>,
) -> Result<PipelineReport, sqlx::Error> {
    let mut delay = Duration::from_millis(200);
    let mut attempt = 1;
    loop {
        match pipeline.process(raw, cancel).await {
            Ok(report) => return Ok(report),
            Err(e) if attempt < 3 => {
                tracing::warn!(attempt, error = %e, "transport failure; retrying batch");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paisa_storage::create_memory_db;

    const ICICI_BODY: &str = "Dear Customer, Your ICICI Bank Credit Card XX1039 has been used for a transaction of INR 149.00 on May 09, 2025 at 06:05:07. Info: IND*Amazon.";

    fn eml(subject: &str, body: &str) -> Vec<u8> {
        format!(
            "From: alerts@bank.example\r\nDate: Fri, 09 May 2025 06:10:00 +0000\r\nSubject: {subject}\r\n\r\n{body}\r\n"
        )
        .into_bytes()
    }

    fn raw(id: &str, subject: &str, body: &str) -> RawMessage {
        RawMessage {
            id: id.to_string(),
            mailbox: "INBOX".to_string(),
            bytes: eml(subject, body),
        }
    }

    async fn pipeline(review_dir: &std::path::Path) -> (Pipeline, paisa_storage::DbPool) {
        let pool = create_memory_db().await.unwrap();
        let p = Pipeline::new(
            RuleSet::builtin().unwrap(),
            GateConfig::builtin(),
            CategoryTable::builtin(),
            ReviewLog::new(review_dir.join("review.log")),
            PersistenceGateway::new(pool.clone()),
            50,
        );
        (p, pool)
    }

    async fn tx_count(pool: &paisa_storage::DbPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn same_message_twice_inserts_once() {
        let tmp = tempfile::tempdir().unwrap();
        let (p, pool) = pipeline(tmp.path()).await;
        let msg = raw("1", "Transaction alert", ICICI_BODY);

        let first = p.process(std::slice::from_ref(&msg), None).await.unwrap();
        assert_eq!(first.inserted, 1);
        assert_eq!(first.duplicates, 0);

        let second = p.process(std::slice::from_ref(&msg), None).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 1);

        assert_eq!(tx_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn non_transaction_email_is_skipped_without_db_write() {
        let tmp = tempfile::tempdir().unwrap();
        let (p, pool) = pipeline(tmp.path()).await;
        let msg = raw(
            "1",
            "Dividend declared",
            "Board approved payment of final dividend of Rs. 20.55 per equity share before the annual general meeting.",
        );
        let report = p.process(&[msg], None).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.inserted, 0);
        assert_eq!(tx_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn unmatched_body_lands_in_review_log() {
        let tmp = tempfile::tempdir().unwrap();
        let (p, _pool) = pipeline(tmp.path()).await;
        // Financial keywords but an unknown format with no currency-marked
        // amount anywhere.
        let msg = raw(
            "1",
            "Alert",
            "Your account was debited towards loan installment number seven.",
        );
        let report = p.process(&[msg], None).await.unwrap();
        assert_eq!(report.unmatched, 1);
        let logged = std::fs::read_to_string(tmp.path().join("review.log")).unwrap();
        assert!(logged.contains("loan installment"));
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let (p, pool) = pipeline(tmp.path()).await;
        let (tx, rx) = watch::channel(true);
        let msgs = vec![
            raw("1", "Transaction alert", ICICI_BODY),
            raw("2", "Transaction alert", ICICI_BODY),
        ];
        let report = p.process(&msgs, Some(&rx)).await.unwrap();
        drop(tx);
        assert_eq!(report.inserted, 0);
        assert_eq!(report.fetched, 2);
        assert_eq!(tx_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn chunked_batches_all_commit() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = create_memory_db().await.unwrap();
        let p = Pipeline::new(
            RuleSet::builtin().unwrap(),
            GateConfig::builtin(),
            CategoryTable::builtin(),
            ReviewLog::new(tmp.path().join("review.log")),
            PersistenceGateway::new(pool.clone()),
            1,
        );
        let msgs = vec![
            raw("1", "Alert", "Rs. 10.00 spent on your SBI Credit Card ending 1111 at AMAZON on 15/08/25"),
            raw("2", "Alert", "Rs. 20.00 spent on your SBI Credit Card ending 2222 at SWIGGY on 16/08/25"),
            raw("3", "Alert", "Rs. 30.00 spent on your SBI Credit Card ending 3333 at UBER on 17/08/25"),
        ];
        let report = p.process(&msgs, None).await.unwrap();
        assert_eq!(report.inserted, 3);
        assert_eq!(tx_count(&pool).await, 3);
    }

    #[tokio::test]
    async fn transport_failure_surfaces_after_retries() {
        let tmp = tempfile::tempdir().unwrap();
        let (p, pool) = pipeline(tmp.path()).await;
        pool.close().await;
        let msg = raw("1", "Transaction alert", ICICI_BODY);
        let err = process_with_retry(&p, &[msg], None).await.unwrap_err();
        assert!(!matches!(err, sqlx::Error::Database(_)));
    }
}
