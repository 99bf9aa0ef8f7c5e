//! SQLite-backed repository implementations.

mod inspections;
mod settings;
mod sync_queue;
mod templates;
mod util;

pub use util::map_sqlx_error;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sqlx::{
    Sqlite, Transaction, query,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous},
};
use tokio::sync::{Mutex, MutexGuard};

use crate::application::context::Stores;
use crate::application::repos::RepoError;

/// All repositories over one pool.
///
/// Write transactions are serialized through `write_gate` so two deferred
/// transactions never race to upgrade their locks; reads go straight to the
/// pool and run concurrently under WAL.
#[derive(Clone)]
pub struct SqliteRepositories {
    pool: Arc<SqlitePool>,
    write_gate: Arc<Mutex<()>>,
}

pub(crate) struct WriteTx<'a> {
    pub(crate) tx: Transaction<'static, Sqlite>,
    _gate: MutexGuard<'a, ()>,
}

impl WriteTx<'_> {
    pub(crate) async fn commit(self) -> Result<(), RepoError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }
}

impl SqliteRepositories {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) async fn begin_write(&self) -> Result<WriteTx<'_>, RepoError> {
        let gate = self.write_gate.lock().await;
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(WriteTx { tx, _gate: gate })
    }

    pub async fn connect(
        path: &Path,
        max_connections: u32,
        busy_timeout: Duration,
    ) -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
    }

    pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Repository handles for [`crate::application::context::InspectionContext`].
    pub fn stores(self: &Arc<Self>) -> Stores {
        Stores {
            inspections: self.clone(),
            inspections_write: self.clone(),
            templates: self.clone(),
            templates_write: self.clone(),
            settings: self.clone(),
            sync_queue: self.clone(),
        }
    }
}
