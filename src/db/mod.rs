//! Database abstraction layer.
//!
//! Provides a backend-agnostic `Database` trait that unifies all persistence
//! operations. Two implementations exist behind feature flags:
//!
//! - `postgres` (default): Uses `deadpool-postgres` + `tokio-postgres`
//! - `libsql`: Uses libSQL for embedded deployment; also the test backend
//!
//! Handlers receive a single long-lived `Arc<dyn Database>` at construction;
//! nothing in the crate touches a connection directly.

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "libsql")]
pub mod libsql;

#[cfg(feature = "libsql")]
pub mod libsql_migrations;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::DatabaseConfig;
use crate::error::DatabaseError;

/// Create a database backend from configuration, run migrations, and return it.
pub async fn connect_from_config(
    config: &DatabaseConfig,
) -> Result<Arc<dyn Database>, DatabaseError> {
    match config.backend {
        #[cfg(feature = "libsql")]
        crate::config::DatabaseBackend::LibSql => {
            use secrecy::ExposeSecret as _;

            let backend = if let Some(ref url) = config.libsql_url {
                let token = config.libsql_auth_token.as_ref().ok_or_else(|| {
                    DatabaseError::Pool(
                        "LIBSQL_AUTH_TOKEN required when LIBSQL_URL is set".to_string(),
                    )
                })?;
                libsql::LibSqlBackend::new_remote_replica(
                    &config.libsql_path,
                    url,
                    token.expose_secret(),
                )
                .await?
            } else {
                libsql::LibSqlBackend::new_local(&config.libsql_path).await?
            };
            backend.run_migrations().await?;
            Ok(Arc::new(backend))
        }
        #[cfg(feature = "postgres")]
        _ => {
            let pg = postgres::PgBackend::new(config).await?;
            pg.run_migrations().await?;
            Ok(Arc::new(pg))
        }
        #[cfg(not(feature = "postgres"))]
        _ => Err(DatabaseError::Pool(
            "No database backend available. Enable 'postgres' or 'libsql' feature.".to_string(),
        )),
    }
}

/// Invoice lifecycle state.
///
/// No transition graph is enforced: updates may set any state directly, and
/// `Overdue` is never derived from `due_date` by the store; a caller sets it
/// explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Paid => "Paid",
            Self::Overdue => "Overdue",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(Self::Pending),
            "Paid" => Some(Self::Paid),
            "Overdue" => Some(Self::Overdue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// One line on an invoice. Embedded in the invoice's JSON document; items
/// have no identity of their own and are never queried individually.
///
/// `total` is supplied by the caller and passed through verbatim; it is
/// not checked against `quantity * unit_price`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: i32,
    pub invoice_number: String,
    pub client_id: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub items: Vec<InvoiceItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub taxes: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateClientParams {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateClientParams {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateInvoiceParams {
    pub invoice_number: String,
    pub client_id: i32,
    pub amount: Decimal,
    pub due_date: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub items: Vec<InvoiceItem>,
    pub taxes: Decimal,
    pub notes: Option<String>,
}

/// Partial invoice update. `None` leaves a field untouched; for `notes` the
/// outer option is "was the field supplied" and the inner option is the
/// nullable value, so an explicit null is distinct from an omitted field.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoiceParams {
    pub invoice_number: Option<String>,
    pub client_id: Option<i32>,
    pub amount: Option<Decimal>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<InvoiceStatus>,
    pub items: Option<Vec<InvoiceItem>>,
    pub taxes: Option<Decimal>,
    pub notes: Option<Option<String>>,
}

/// Listing filter: exact status match and/or inclusive due-date upper bound.
/// Both present means both must hold.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub due_before: Option<DateTime<Utc>>,
}

// ==================== Sub-traits ====================
//
// Each sub-trait groups related persistence methods. The `Database`
// supertrait combines them, so `Arc<dyn Database>` consumers keep working
// while leaf consumers can depend on a specific sub-trait instead.

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn create_client(
        &self,
        input: &CreateClientParams,
    ) -> Result<ClientRecord, DatabaseError>;
    /// All clients in store-insertion order.
    async fn list_clients(&self) -> Result<Vec<ClientRecord>, DatabaseError>;
    async fn get_client(&self, id: i32) -> Result<Option<ClientRecord>, DatabaseError>;
    /// Applies the supplied fields over the stored row. `None` when the id
    /// does not exist.
    async fn update_client(
        &self,
        id: i32,
        input: &UpdateClientParams,
    ) -> Result<Option<ClientRecord>, DatabaseError>;
    /// `true` when a row was removed.
    async fn delete_client(&self, id: i32) -> Result<bool, DatabaseError>;
    async fn client_exists(&self, id: i32) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn create_invoice(
        &self,
        input: &CreateInvoiceParams,
    ) -> Result<InvoiceRecord, DatabaseError>;
    /// Invoices matching the filter, in store-insertion order.
    async fn list_invoices(
        &self,
        filter: &InvoiceFilter,
    ) -> Result<Vec<InvoiceRecord>, DatabaseError>;
    async fn get_invoice(&self, id: i32) -> Result<Option<InvoiceRecord>, DatabaseError>;
    /// Applies the supplied fields over the stored row. `None` when the id
    /// does not exist.
    async fn update_invoice(
        &self,
        id: i32,
        input: &UpdateInvoiceParams,
    ) -> Result<Option<InvoiceRecord>, DatabaseError>;
    /// `true` when a row was removed.
    async fn delete_invoice(&self, id: i32) -> Result<bool, DatabaseError>;
    /// Sets the status to `Paid` regardless of the current state. `None`
    /// when the id does not exist.
    async fn mark_invoice_paid(&self, id: i32) -> Result<Option<InvoiceRecord>, DatabaseError>;
    async fn count_invoices_for_client(&self, client_id: i32) -> Result<i64, DatabaseError>;
}

/// Backend-agnostic database supertrait.
#[async_trait]
pub trait Database: ClientStore + InvoiceStore + Send + Sync {
    /// Run schema migrations for this backend.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;
}
