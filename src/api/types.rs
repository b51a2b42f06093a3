//! Response DTOs for the HTTP API.
//!
//! Entity bodies reuse the store records directly; operation inputs live in
//! `crate::invoicing::inputs`. Only shapes unique to the HTTP surface are
//! defined here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}
