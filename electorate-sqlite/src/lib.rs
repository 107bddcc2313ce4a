//! SQLite implementation of the LeaseStore trait from electorate

pub mod store;
mod types;

pub use store::SqliteLeaseStore;
use sqlx::migrate::Migrator;
pub static MIGRATOR: Migrator = sqlx::migrate!();
