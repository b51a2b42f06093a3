//! Axum HTTP server for the invoice-tracking API.
//!
//! Each named operation maps to one route and one thin handler around the
//! corresponding `invoicing` operation. Handlers never touch the store
//! directly; they share the single long-lived database handle in `ApiState`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::types::HealthResponse;
use crate::db::{ClientRecord, Database, InvoiceRecord};
use crate::error::{OperationError, ServerError};
use crate::invoicing::inputs::{
    CreateClientInput, CreateInvoiceInput, InvoiceFilterInput, UpdateClientInput,
    UpdateInvoiceInput,
};
use crate::invoicing::{clients, invoices};

/// Shared state for all API handlers.
pub struct ApiState {
    pub db: Arc<dyn Database>,
}

/// Build the API router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/clients",
            get(clients_list_handler).post(clients_create_handler),
        )
        .route(
            "/api/clients/{id}",
            get(clients_get_handler)
                .patch(clients_update_handler)
                .delete(clients_delete_handler),
        )
        .route(
            "/api/invoices",
            get(invoices_list_handler).post(invoices_create_handler),
        )
        .route(
            "/api/invoices/{id}",
            get(invoices_get_handler)
                .patch(invoices_update_handler)
                .delete(invoices_delete_handler),
        )
        .route("/api/invoices/{id}/mark-paid", post(invoices_mark_paid_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0).
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<ApiState>,
) -> Result<SocketAddr, ServerError> {
    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::StartupFailed {
                reason: format!("failed to bind to {addr}: {e}"),
            })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| ServerError::StartupFailed {
            reason: format!("failed to get local addr: {e}"),
        })?;

    let app = router(state);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "http server terminated");
        }
    });

    Ok(bound_addr)
}

fn error_response(err: OperationError) -> (StatusCode, String) {
    let status = match &err {
        OperationError::Validation(_) => StatusCode::BAD_REQUEST,
        OperationError::ClientNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        OperationError::NotFound { .. } => StatusCode::NOT_FOUND,
        OperationError::UniqueViolation { .. } => StatusCode::CONFLICT,
        OperationError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "operation failed on a store error");
    }
    (status, err.to_string())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

// --- Clients ---

async fn clients_create_handler(
    State(state): State<Arc<ApiState>>,
    Json(input): Json<CreateClientInput>,
) -> Result<(StatusCode, Json<ClientRecord>), (StatusCode, String)> {
    let record = clients::create_client(state.db.as_ref(), input)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn clients_list_handler(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<ClientRecord>>, (StatusCode, String)> {
    let records = clients::get_clients(state.db.as_ref())
        .await
        .map_err(error_response)?;
    Ok(Json(records))
}

/// Absence is a 200 with a JSON `null` body, not a 404.
async fn clients_get_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i32>,
) -> Result<Json<Option<ClientRecord>>, (StatusCode, String)> {
    let record = clients::get_client(state.db.as_ref(), id)
        .await
        .map_err(error_response)?;
    Ok(Json(record))
}

async fn clients_update_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i32>,
    Json(input): Json<UpdateClientInput>,
) -> Result<Json<ClientRecord>, (StatusCode, String)> {
    let record = clients::update_client(state.db.as_ref(), id, input)
        .await
        .map_err(error_response)?;
    Ok(Json(record))
}

async fn clients_delete_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i32>,
) -> Result<Json<bool>, (StatusCode, String)> {
    let deleted = clients::delete_client(state.db.as_ref(), id)
        .await
        .map_err(error_response)?;
    Ok(Json(deleted))
}

// --- Invoices ---

async fn invoices_create_handler(
    State(state): State<Arc<ApiState>>,
    Json(input): Json<CreateInvoiceInput>,
) -> Result<(StatusCode, Json<InvoiceRecord>), (StatusCode, String)> {
    let record = invoices::create_invoice(state.db.as_ref(), input)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn invoices_list_handler(
    State(state): State<Arc<ApiState>>,
    Query(filter): Query<InvoiceFilterInput>,
) -> Result<Json<Vec<InvoiceRecord>>, (StatusCode, String)> {
    let records = invoices::get_invoices(state.db.as_ref(), filter)
        .await
        .map_err(error_response)?;
    Ok(Json(records))
}

/// Absence is a 200 with a JSON `null` body, not a 404.
async fn invoices_get_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i32>,
) -> Result<Json<Option<InvoiceRecord>>, (StatusCode, String)> {
    let record = invoices::get_invoice(state.db.as_ref(), id)
        .await
        .map_err(error_response)?;
    Ok(Json(record))
}

async fn invoices_update_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i32>,
    Json(input): Json<UpdateInvoiceInput>,
) -> Result<Json<InvoiceRecord>, (StatusCode, String)> {
    let record = invoices::update_invoice(state.db.as_ref(), id, input)
        .await
        .map_err(error_response)?;
    Ok(Json(record))
}

async fn invoices_delete_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i32>,
) -> Result<Json<bool>, (StatusCode, String)> {
    let deleted = invoices::delete_invoice(state.db.as_ref(), id)
        .await
        .map_err(error_response)?;
    Ok(Json(deleted))
}

async fn invoices_mark_paid_handler(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<i32>,
) -> Result<Json<InvoiceRecord>, (StatusCode, String)> {
    let record = invoices::mark_invoice_as_paid(state.db.as_ref(), id)
        .await
        .map_err(error_response)?;
    Ok(Json(record))
}
