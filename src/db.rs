// Connection handling for the fact store.

use async_once_cell::OnceCell;
use log::{debug, error};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

use netatlas_migration::{Migrator, MigratorTrait};

pub mod devices;
pub mod facts;
pub mod runs;

static DB: OnceCell<DatabaseConnection> = OnceCell::new();

// Open the process-wide connection on first use, applying pending migrations.
pub async fn connection(database_url: &str) -> Result<&'static DatabaseConnection, DbErr> {
    DB.get_or_try_init(async { open(database_url).await })
        .await
}

pub async fn open(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_string());
    options.sqlx_logging(false);
    if database_url.contains(":memory:") {
        // Every pooled connection to an in-memory database is a separate database.
        options.max_connections(1).min_connections(1);
    }
    let db = Database::connect(options).await?;
    if let Err(e) = Migrator::up(&db, None).await {
        error!("failed to apply migrations to {}: {}", database_url, e);
        return Err(e);
    }
    debug!("connected to {}", database_url);
    Ok(db)
}

// True when the error means the store itself cannot be reached.
pub fn is_unavailable(err: &DbErr) -> bool {
    matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_))
}

#[cfg(test)]
pub(crate) async fn test_connection() -> DatabaseConnection {
    open("sqlite::memory:")
        .await
        .expect("in-memory database should open")
}
