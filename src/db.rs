use crate::config::CONFIG;
use diesel::{Connection, ConnectionError, SqliteConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub fn raw_diesel_cxn_from_env() -> Result<SqliteConnection, ConnectionError> {
    SqliteConnection::establish(&CONFIG.database_url)
}

pub fn run_migrations(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    conn.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}
