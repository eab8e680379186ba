use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

pub type DbPool = Pool<Sqlite>;

/// The three canonical-record tables. Identical shape; a record lands in
/// exactly one of them, chosen by the gatekeeper's destination hint.
pub const RECORD_TABLES: &[&str] = &["transactions", "bills", "statements"];

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema, for tests.
pub async fn create_memory_db() -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    for table in RECORD_TABLES {
        // The CHECKs encode the canonical-record invariants at the row level
        // so a malformed record fails its own savepoint, not the batch.
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                idempotency_key TEXT NOT NULL UNIQUE
                    CHECK (length(idempotency_key) > 0),
                amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
                direction TEXT NOT NULL
                    CHECK (direction IN ('debit', 'credit', 'upi')),
                category TEXT NOT NULL,
                merchant TEXT NOT NULL,
                currency TEXT NOT NULL DEFAULT 'INR',
                card_ref TEXT,
                counterparty_payment_id TEXT,
                remarks TEXT,
                institution TEXT,
                source_timestamp TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                CHECK (length(merchant) > 0 OR category <> 'others')
            )
            "#
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_source_timestamp ON {table}(source_timestamp)"
        ))
        .execute(pool)
        .await?;
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub transactions: i64,
    pub bills: i64,
    pub statements: i64,
    pub newest: Option<String>,
    pub oldest: Option<String>,
}

pub async fn stats(pool: &DbPool) -> Result<StoreStats, sqlx::Error> {
    let mut counts = [0i64; 3];
    for (slot, table) in counts.iter_mut().zip(RECORD_TABLES) {
        *slot = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await?;
    }

    let row = sqlx::query(
        "SELECT MAX(source_timestamp), MIN(source_timestamp) FROM (
            SELECT source_timestamp FROM transactions
            UNION ALL SELECT source_timestamp FROM bills
            UNION ALL SELECT source_timestamp FROM statements
        )",
    )
    .fetch_one(pool)
    .await?;

    Ok(StoreStats {
        transactions: counts[0],
        bills: counts[1],
        statements: counts[2],
        newest: row.try_get(0)?,
        oldest: row.try_get(1)?,
    })
}
