//! libSQL backend for the `Database` trait.
//!
//! Serves the embedded deployment (local file or remote replica) and doubles
//! as the test backend. Monetary columns hold canonical decimal text;
//! timestamps are fixed-width RFC 3339 UTC text, which keeps `due_date <= ?`
//! comparisons correct as plain string comparisons.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::params;
use rust_decimal::Decimal;

use crate::db::{
    ClientRecord, ClientStore, CreateClientParams, CreateInvoiceParams, Database, InvoiceFilter,
    InvoiceItem, InvoiceRecord, InvoiceStatus, InvoiceStore, UpdateClientParams,
    UpdateInvoiceParams, libsql_migrations,
};
use crate::error::DatabaseError;

/// libSQL database backend.
pub struct LibSqlBackend {
    db: libsql::Database,
}

impl LibSqlBackend {
    /// Open (or create) a local database file.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(path).build().await?;
        Ok(Self { db })
    }

    /// Open an embedded replica of a remote database.
    pub async fn new_remote_replica(
        path: &Path,
        url: &str,
        auth_token: &str,
    ) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_remote_replica(path, url.to_string(), auth_token.to_string())
            .build()
            .await?;
        Ok(Self { db })
    }

    fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        Ok(self.db.connect()?)
    }
}

pub(crate) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Serialization(format!("invalid timestamp '{raw}': {e}")))
}

fn get_text(row: &libsql::Row, idx: i32) -> String {
    match row.get_value(idx) {
        Ok(libsql::Value::Text(value)) => value,
        _ => String::new(),
    }
}

fn get_opt_text(row: &libsql::Row, idx: i32) -> Option<String> {
    match row.get_value(idx) {
        Ok(libsql::Value::Text(value)) => Some(value),
        _ => None,
    }
}

fn get_i64(row: &libsql::Row, idx: i32) -> i64 {
    match row.get_value(idx) {
        Ok(libsql::Value::Integer(value)) => value,
        _ => 0,
    }
}

fn opt_text(value: Option<&str>) -> libsql::Value {
    match value {
        Some(text) => libsql::Value::Text(text.to_string()),
        None => libsql::Value::Null,
    }
}

fn parse_row_id(raw: i64, field: &str) -> Result<i32, DatabaseError> {
    i32::try_from(raw).map_err(|_| DatabaseError::Serialization(format!("invalid {field} '{raw}'")))
}

fn parse_decimal(raw: &str, field: &str) -> Result<Decimal, DatabaseError> {
    raw.parse::<Decimal>()
        .map_err(|e| DatabaseError::Serialization(format!("invalid {field} '{raw}': {e}")))
}

fn parse_status(raw: &str) -> Result<InvoiceStatus, DatabaseError> {
    InvoiceStatus::from_db_value(raw)
        .ok_or_else(|| DatabaseError::Serialization(format!("invalid invoice status '{raw}'")))
}

fn parse_items(raw: &str) -> Result<Vec<InvoiceItem>, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::Serialization(format!("invalid items document: {e}")))
}

fn row_to_client_record(row: &libsql::Row) -> Result<ClientRecord, DatabaseError> {
    Ok(ClientRecord {
        id: parse_row_id(get_i64(row, 0), "client id")?,
        name: get_text(row, 1),
        email: get_text(row, 2),
        created_at: parse_timestamp(&get_text(row, 3))?,
    })
}

fn row_to_invoice_record(row: &libsql::Row) -> Result<InvoiceRecord, DatabaseError> {
    Ok(InvoiceRecord {
        id: parse_row_id(get_i64(row, 0), "invoice id")?,
        invoice_number: get_text(row, 1),
        client_id: parse_row_id(get_i64(row, 2), "client_id")?,
        amount: parse_decimal(&get_text(row, 3), "amount")?,
        due_date: parse_timestamp(&get_text(row, 4))?,
        status: parse_status(&get_text(row, 5))?,
        items: parse_items(&get_text(row, 6))?,
        taxes: parse_decimal(&get_text(row, 7), "taxes")?,
        notes: get_opt_text(row, 8),
        created_at: parse_timestamp(&get_text(row, 9))?,
    })
}

fn items_to_json(items: &[InvoiceItem]) -> Result<String, DatabaseError> {
    serde_json::to_string(items).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

// ==================== Database (supertrait) ====================

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let conn = self.connect()?;
        libsql_migrations::run(&conn).await
    }
}

// ==================== ClientStore ====================

#[async_trait]
impl ClientStore for LibSqlBackend {
    async fn create_client(
        &self,
        input: &CreateClientParams,
    ) -> Result<ClientRecord, DatabaseError> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO clients (name, email, created_at) VALUES (?1, ?2, ?3)",
            params![
                input.name.as_str(),
                input.email.as_str(),
                fmt_ts(Utc::now())
            ],
        )
        .await?;

        let id = parse_row_id(conn.last_insert_rowid(), "client id")?;
        self.get_client(id)
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created client".to_string()))
    }

    async fn list_clients(&self) -> Result<Vec<ClientRecord>, DatabaseError> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, name, email, created_at FROM clients ORDER BY id ASC",
                (),
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_client_record(&row)?);
        }
        Ok(out)
    }

    async fn get_client(&self, id: i32) -> Result<Option<ClientRecord>, DatabaseError> {
        let conn = self.connect()?;
        let row = conn
            .query(
                "SELECT id, name, email, created_at FROM clients WHERE id = ?1 LIMIT 1",
                params![id],
            )
            .await?
            .next()
            .await?;

        row.map(|row| row_to_client_record(&row)).transpose()
    }

    async fn update_client(
        &self,
        id: i32,
        input: &UpdateClientParams,
    ) -> Result<Option<ClientRecord>, DatabaseError> {
        let Some(existing) = self.get_client(id).await? else {
            return Ok(None);
        };

        let merged_name = input.name.clone().unwrap_or(existing.name);
        let merged_email = input.email.clone().unwrap_or(existing.email);

        let conn = self.connect()?;
        conn.execute(
            "UPDATE clients SET name = ?2, email = ?3 WHERE id = ?1",
            params![id, merged_name.as_str(), merged_email.as_str()],
        )
        .await?;

        self.get_client(id).await
    }

    async fn delete_client(&self, id: i32) -> Result<bool, DatabaseError> {
        let conn = self.connect()?;
        let deleted = conn
            .execute("DELETE FROM clients WHERE id = ?1", params![id])
            .await?;
        Ok(deleted > 0)
    }

    async fn client_exists(&self, id: i32) -> Result<bool, DatabaseError> {
        let conn = self.connect()?;
        let row = conn
            .query(
                "SELECT id FROM clients WHERE id = ?1 LIMIT 1",
                params![id],
            )
            .await?
            .next()
            .await?;
        Ok(row.is_some())
    }
}

// ==================== InvoiceStore ====================

#[async_trait]
impl InvoiceStore for LibSqlBackend {
    async fn create_invoice(
        &self,
        input: &CreateInvoiceParams,
    ) -> Result<InvoiceRecord, DatabaseError> {
        let items = items_to_json(&input.items)?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO invoices \
             (invoice_number, client_id, amount, due_date, status, items, taxes, notes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                input.invoice_number.as_str(),
                input.client_id,
                input.amount.to_string(),
                fmt_ts(input.due_date),
                input.status.as_str(),
                items.as_str(),
                input.taxes.to_string(),
                opt_text(input.notes.as_deref()),
                fmt_ts(Utc::now())
            ],
        )
        .await?;

        let id = parse_row_id(conn.last_insert_rowid(), "invoice id")?;
        self.get_invoice(id)
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created invoice".to_string()))
    }

    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
    ) -> Result<Vec<InvoiceRecord>, DatabaseError> {
        let conn = self.connect()?;
        let mut rows = match (filter.status, filter.due_before) {
            (Some(status), Some(bound)) => {
                conn.query(
                    "SELECT id, invoice_number, client_id, amount, due_date, status, items, taxes, notes, created_at \
                     FROM invoices WHERE status = ?1 AND due_date <= ?2 ORDER BY id ASC",
                    params![status.as_str(), fmt_ts(bound)],
                )
                .await?
            }
            (Some(status), None) => {
                conn.query(
                    "SELECT id, invoice_number, client_id, amount, due_date, status, items, taxes, notes, created_at \
                     FROM invoices WHERE status = ?1 ORDER BY id ASC",
                    params![status.as_str()],
                )
                .await?
            }
            (None, Some(bound)) => {
                conn.query(
                    "SELECT id, invoice_number, client_id, amount, due_date, status, items, taxes, notes, created_at \
                     FROM invoices WHERE due_date <= ?1 ORDER BY id ASC",
                    params![fmt_ts(bound)],
                )
                .await?
            }
            (None, None) => {
                conn.query(
                    "SELECT id, invoice_number, client_id, amount, due_date, status, items, taxes, notes, created_at \
                     FROM invoices ORDER BY id ASC",
                    (),
                )
                .await?
            }
        };

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_invoice_record(&row)?);
        }
        Ok(out)
    }

    async fn get_invoice(&self, id: i32) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let conn = self.connect()?;
        let row = conn
            .query(
                "SELECT id, invoice_number, client_id, amount, due_date, status, items, taxes, notes, created_at \
                 FROM invoices WHERE id = ?1 LIMIT 1",
                params![id],
            )
            .await?
            .next()
            .await?;

        row.map(|row| row_to_invoice_record(&row)).transpose()
    }

    async fn update_invoice(
        &self,
        id: i32,
        input: &UpdateInvoiceParams,
    ) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let Some(existing) = self.get_invoice(id).await? else {
            return Ok(None);
        };

        let merged_number = input
            .invoice_number
            .clone()
            .unwrap_or(existing.invoice_number);
        let merged_client_id = input.client_id.unwrap_or(existing.client_id);
        let merged_amount = input.amount.unwrap_or(existing.amount);
        let merged_due_date = input.due_date.unwrap_or(existing.due_date);
        let merged_status = input.status.unwrap_or(existing.status);
        let merged_items = input.items.clone().unwrap_or(existing.items);
        let merged_taxes = input.taxes.unwrap_or(existing.taxes);
        let merged_notes = input.notes.clone().unwrap_or(existing.notes);

        let items = items_to_json(&merged_items)?;
        let conn = self.connect()?;
        conn.execute(
            "UPDATE invoices SET \
               invoice_number = ?2, \
               client_id = ?3, \
               amount = ?4, \
               due_date = ?5, \
               status = ?6, \
               items = ?7, \
               taxes = ?8, \
               notes = ?9 \
             WHERE id = ?1",
            params![
                id,
                merged_number.as_str(),
                merged_client_id,
                merged_amount.to_string(),
                fmt_ts(merged_due_date),
                merged_status.as_str(),
                items.as_str(),
                merged_taxes.to_string(),
                opt_text(merged_notes.as_deref())
            ],
        )
        .await?;

        self.get_invoice(id).await
    }

    async fn delete_invoice(&self, id: i32) -> Result<bool, DatabaseError> {
        let conn = self.connect()?;
        let deleted = conn
            .execute("DELETE FROM invoices WHERE id = ?1", params![id])
            .await?;
        Ok(deleted > 0)
    }

    async fn mark_invoice_paid(&self, id: i32) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let conn = self.connect()?;
        let updated = conn
            .execute(
                "UPDATE invoices SET status = ?2 WHERE id = ?1",
                params![id, InvoiceStatus::Paid.as_str()],
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_invoice(id).await
    }

    async fn count_invoices_for_client(&self, client_id: i32) -> Result<i64, DatabaseError> {
        let conn = self.connect()?;
        let row = conn
            .query(
                "SELECT COUNT(*) FROM invoices WHERE client_id = ?1",
                params![client_id],
            )
            .await?
            .next()
            .await?;
        Ok(row.map(|row| get_i64(&row, 0)).unwrap_or(0))
    }
}
