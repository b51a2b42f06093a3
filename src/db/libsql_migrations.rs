//! Ordered, idempotent schema migrations for the libSQL backend.
//!
//! Applied migrations are tracked by name in `schema_migrations`, so
//! re-running at every startup is safe. The Postgres backend has its own
//! refinery-managed copy of this schema under `migrations/`.

use chrono::Utc;
use libsql::params;

use crate::error::DatabaseError;

use super::libsql::fmt_ts;

const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_create_clients_and_invoices",
    "CREATE TABLE IF NOT EXISTS clients (\n\
         id INTEGER PRIMARY KEY AUTOINCREMENT,\n\
         name TEXT NOT NULL,\n\
         email TEXT NOT NULL UNIQUE,\n\
         created_at TEXT NOT NULL\n\
     );\n\
     CREATE TABLE IF NOT EXISTS invoices (\n\
         id INTEGER PRIMARY KEY AUTOINCREMENT,\n\
         invoice_number TEXT NOT NULL UNIQUE,\n\
         client_id INTEGER NOT NULL REFERENCES clients(id),\n\
         amount TEXT NOT NULL,\n\
         due_date TEXT NOT NULL,\n\
         status TEXT NOT NULL DEFAULT 'Pending',\n\
         items TEXT NOT NULL,\n\
         taxes TEXT NOT NULL DEFAULT '0.00',\n\
         notes TEXT,\n\
         created_at TEXT NOT NULL\n\
     );\n\
     CREATE INDEX IF NOT EXISTS invoices_client_id_idx ON invoices (client_id);",
)];

pub(crate) async fn run(conn: &libsql::Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
             name TEXT PRIMARY KEY, \
             applied_at TEXT NOT NULL\
         )",
        (),
    )
    .await?;

    for (name, sql) in MIGRATIONS {
        let applied = conn
            .query(
                "SELECT name FROM schema_migrations WHERE name = ?1",
                params![*name],
            )
            .await?
            .next()
            .await?
            .is_some();
        if applied {
            continue;
        }

        conn.execute_batch(sql)
            .await
            .map_err(|e| DatabaseError::Migration(format!("{name}: {e}")))?;
        conn.execute(
            "INSERT INTO schema_migrations (name, applied_at) VALUES (?1, ?2)",
            params![*name, fmt_ts(Utc::now())],
        )
        .await?;
    }

    Ok(())
}
