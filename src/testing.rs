//! Shared test helpers.

use std::sync::Arc;

use crate::db::Database;
use crate::db::libsql::LibSqlBackend;

/// Open a migrated libSQL database in a fresh temp dir. The `TempDir` must
/// be kept alive for the duration of the test.
pub(crate) async fn test_db() -> (Arc<dyn Database>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let backend = LibSqlBackend::new_local(&tmp.path().join("factura-test.db"))
        .await
        .expect("open libsql database");
    backend.run_migrations().await.expect("run migrations");
    (Arc::new(backend), tmp)
}
