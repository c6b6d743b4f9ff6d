//! SQLite persistence for the notification ledger.

mod notification_ledger;
mod util;

pub use notification_ledger::SqliteNotificationLedger;
pub use util::{connect_options, create_sqlite_pool, run_migrations};

/// Embedded SQL migrations for the ledger database.
pub const MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
