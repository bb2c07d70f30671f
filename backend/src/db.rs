use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::{error, info};

use crate::error::AppError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const BUSY_TIMEOUT_MS: u32 = 5_000;

/// Pragmas and SQL functions applied to every pooled connection as it is
/// opened.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    wal: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        let mut pragmas = format!("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};");
        if self.wal {
            pragmas.push_str(" PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;");
        }
        conn.batch_execute(&pragmas)
            .and_then(|()| crate::candidate::register_sql_functions(conn))
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Builds the connection pool for `database_url` (a file path or `:memory:`).
///
/// An in-memory database only lives as long as its connection, so it is
/// pinned to a single pooled connection.
pub fn establish_pool(database_url: &str, max_size: u32) -> Result<DbPool, AppError> {
    let in_memory = database_url == ":memory:";
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let mut builder = Pool::builder()
        .max_size(if in_memory { 1 } else { max_size.max(1) })
        .connection_timeout(Duration::from_secs(10))
        .connection_customizer(Box::new(ConnectionOptions { wal: !in_memory }));
    if in_memory {
        builder = builder.idle_timeout(None).max_lifetime(None);
    }
    let pool = builder
        .build(manager)
        .map_err(|e| {
            error!("Failed to build connection pool for {}: {}", database_url, e);
            AppError::Pool(e)
        })?;
    info!("Connection pool ready for {}", database_url);
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| AppError::Migration(e.to_string()))?;
    for version in &applied {
        info!("Applied migration {}", version);
    }
    Ok(())
}

/// Runs `f` with a pooled connection on the blocking thread pool.
///
/// Once started, `f` runs to completion even if the awaiting request is
/// dropped, so a transaction inside it is either committed or rolled back.
pub async fn with_connection<F, T>(pool: &DbPool, f: F) -> Result<T, AppError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut *conn)
    })
    .await?
}

pub fn ping(conn: &mut SqliteConnection) -> Result<i32, AppError> {
    let one = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("1")).get_result(conn)?;
    Ok(one)
}
