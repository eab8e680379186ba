pub mod db;
pub mod gateway;

pub use db::{create_db, create_memory_db, stats, DbPool, StoreStats, RECORD_TABLES};
pub use gateway::{BatchReport, PersistenceGateway, RowOutcome};
