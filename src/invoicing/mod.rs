//! Operation handlers and input validation.
//!
//! One async function per named operation, each taking the shared
//! `&dyn Database` handle and performing the full contract:
//! validate, referential check, persist, shape the response.

pub mod clients;
pub mod inputs;
pub mod invoices;
