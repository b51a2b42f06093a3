//! PostgreSQL backend for the `Database` trait.
//!
//! Raw SQL over a deadpool connection pool; schema managed by refinery
//! embedded migrations from `migrations/`.

use std::str::FromStr;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use secrecy::ExposeSecret as _;
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;

use crate::config::DatabaseConfig;
use crate::db::{
    ClientRecord, ClientStore, CreateClientParams, CreateInvoiceParams, Database, InvoiceFilter,
    InvoiceItem, InvoiceRecord, InvoiceStatus, InvoiceStore, UpdateClientParams,
    UpdateInvoiceParams,
};
use crate::error::DatabaseError;

mod embedded {
    refinery::embed_migrations!("migrations");
}

const POOL_MAX_SIZE: usize = 16;

/// PostgreSQL database backend.
pub struct PgBackend {
    pool: Pool,
}

impl PgBackend {
    /// Create a new PostgreSQL backend from configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = config
            .url
            .as_ref()
            .ok_or_else(|| DatabaseError::Pool("DATABASE_URL is not set".to_string()))?;
        let pg_config = tokio_postgres::Config::from_str(url.expose_secret())
            .map_err(|e| DatabaseError::Pool(format!("invalid DATABASE_URL: {e}")))?;

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );
        let pool = Pool::builder(manager)
            .max_size(POOL_MAX_SIZE)
            .build()
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Get a clone of the connection pool.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }

    async fn conn(&self) -> Result<deadpool_postgres::Object, DatabaseError> {
        Ok(self.pool.get().await?)
    }
}

fn row_to_client_record(row: &tokio_postgres::Row) -> ClientRecord {
    ClientRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }
}

fn row_to_invoice_record(row: &tokio_postgres::Row) -> Result<InvoiceRecord, DatabaseError> {
    let status_raw: String = row.get("status");
    let status = InvoiceStatus::from_db_value(&status_raw).ok_or_else(|| {
        DatabaseError::Serialization(format!("invalid invoice status '{status_raw}'"))
    })?;
    let items_value: serde_json::Value = row.get("items");
    let items: Vec<InvoiceItem> = serde_json::from_value(items_value)
        .map_err(|e| DatabaseError::Serialization(format!("invalid items document: {e}")))?;
    Ok(InvoiceRecord {
        id: row.get("id"),
        invoice_number: row.get("invoice_number"),
        client_id: row.get("client_id"),
        amount: row.get("amount"),
        due_date: row.get("due_date"),
        status,
        items,
        taxes: row.get("taxes"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
    })
}

fn items_to_json(items: &[InvoiceItem]) -> Result<serde_json::Value, DatabaseError> {
    serde_json::to_value(items).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

// ==================== Database (supertrait) ====================

#[async_trait]
impl Database for PgBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        let mut conn = self.pool.get().await?;
        embedded::migrations::runner()
            .run_async(&mut **conn)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(())
    }
}

// ==================== ClientStore ====================

#[async_trait]
impl ClientStore for PgBackend {
    async fn create_client(
        &self,
        input: &CreateClientParams,
    ) -> Result<ClientRecord, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO clients (name, email) \
                 VALUES ($1, $2) \
                 RETURNING id, name, email, created_at",
                &[&input.name, &input.email],
            )
            .await?;
        Ok(row_to_client_record(&row))
    }

    async fn list_clients(&self) -> Result<Vec<ClientRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT id, name, email, created_at FROM clients ORDER BY id ASC",
                &[],
            )
            .await?;
        Ok(rows.iter().map(row_to_client_record).collect())
    }

    async fn get_client(&self, id: i32) -> Result<Option<ClientRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, name, email, created_at FROM clients WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(row.map(|row| row_to_client_record(&row)))
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

        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "UPDATE clients SET name = $2, email = $3 \
                 WHERE id = $1 \
                 RETURNING id, name, email, created_at",
                &[&id, &merged_name, &merged_email],
            )
            .await?;
        Ok(row.map(|row| row_to_client_record(&row)))
    }

    async fn delete_client(&self, id: i32) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute("DELETE FROM clients WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }

    async fn client_exists(&self, id: i32) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt("SELECT id FROM clients WHERE id = $1", &[&id])
            .await?;
        Ok(row.is_some())
    }
}

// ==================== InvoiceStore ====================

#[async_trait]
impl InvoiceStore for PgBackend {
    async fn create_invoice(
        &self,
        input: &CreateInvoiceParams,
    ) -> Result<InvoiceRecord, DatabaseError> {
        let items = items_to_json(&input.items)?;
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                "INSERT INTO invoices \
                 (invoice_number, client_id, amount, due_date, status, items, taxes, notes) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 RETURNING id, invoice_number, client_id, amount, due_date, status, items, taxes, notes, created_at",
                &[
                    &input.invoice_number,
                    &input.client_id,
                    &input.amount,
                    &input.due_date,
                    &input.status.as_str(),
                    &items,
                    &input.taxes,
                    &input.notes,
                ],
            )
            .await?;
        row_to_invoice_record(&row)
    }

    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
    ) -> Result<Vec<InvoiceRecord>, DatabaseError> {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

        let status_str = filter.status.map(InvoiceStatus::as_str);
        if let Some(ref status) = status_str {
            conditions.push(format!("status = ${}", params.len() + 1));
            params.push(status);
        }
        if let Some(ref bound) = filter.due_before {
            conditions.push(format!("due_date <= ${}", params.len() + 1));
            params.push(bound);
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let sql = format!(
            "SELECT id, invoice_number, client_id, amount, due_date, status, items, taxes, notes, created_at \
             FROM invoices{where_clause} ORDER BY id ASC"
        );

        let conn = self.conn().await?;
        let rows = conn.query(&sql, &params).await?;
        rows.iter().map(row_to_invoice_record).collect()
    }

    async fn get_invoice(&self, id: i32) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, invoice_number, client_id, amount, due_date, status, items, taxes, notes, created_at \
                 FROM invoices WHERE id = $1",
                &[&id],
            )
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
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "UPDATE invoices SET \
                    invoice_number = $2, \
                    client_id = $3, \
                    amount = $4, \
                    due_date = $5, \
                    status = $6, \
                    items = $7, \
                    taxes = $8, \
                    notes = $9 \
                 WHERE id = $1 \
                 RETURNING id, invoice_number, client_id, amount, due_date, status, items, taxes, notes, created_at",
                &[
                    &id,
                    &merged_number,
                    &merged_client_id,
                    &merged_amount,
                    &merged_due_date,
                    &merged_status.as_str(),
                    &items,
                    &merged_taxes,
                    &merged_notes,
                ],
            )
            .await?;
        row.map(|row| row_to_invoice_record(&row)).transpose()
    }

    async fn delete_invoice(&self, id: i32) -> Result<bool, DatabaseError> {
        let conn = self.conn().await?;
        let deleted = conn
            .execute("DELETE FROM invoices WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }

    async fn mark_invoice_paid(&self, id: i32) -> Result<Option<InvoiceRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "UPDATE invoices SET status = $2 \
                 WHERE id = $1 \
                 RETURNING id, invoice_number, client_id, amount, due_date, status, items, taxes, notes, created_at",
                &[&id, &InvoiceStatus::Paid.as_str()],
            )
            .await?;
        row.map(|row| row_to_invoice_record(&row)).transpose()
    }

    async fn count_invoices_for_client(&self, client_id: i32) -> Result<i64, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_one(
                "SELECT COUNT(*) FROM invoices WHERE client_id = $1",
                &[&client_id],
            )
            .await?;
        Ok(row.get(0))
    }
}
