//! factura: a small invoice-tracking service.
//!
//! Clients and invoices in a relational store (PostgreSQL or embedded
//! libSQL), validated operation handlers, and a typed HTTP API on axum.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod invoicing;

#[cfg(all(test, feature = "libsql"))]
pub(crate) mod testing;
