//! Client operations: create, list, get, update, delete.

use crate::db::{ClientRecord, CreateClientParams, Database, UpdateClientParams};
use crate::error::OperationError;

use super::inputs::{CreateClientInput, UpdateClientInput};

pub async fn create_client(
    db: &dyn Database,
    input: CreateClientInput,
) -> Result<ClientRecord, OperationError> {
    input.validate()?;
    let record = db
        .create_client(&CreateClientParams {
            name: input.name.trim().to_string(),
            email: input.email.trim().to_string(),
        })
        .await?;
    Ok(record)
}

pub async fn get_clients(db: &dyn Database) -> Result<Vec<ClientRecord>, OperationError> {
    Ok(db.list_clients().await?)
}

/// Absence is a `None` result, not an error.
pub async fn get_client(
    db: &dyn Database,
    id: i32,
) -> Result<Option<ClientRecord>, OperationError> {
    Ok(db.get_client(id).await?)
}

/// Supplying neither field is a legal no-op: the stored entity is returned
/// unchanged. A missing id is an error either way.
pub async fn update_client(
    db: &dyn Database,
    id: i32,
    input: UpdateClientInput,
) -> Result<ClientRecord, OperationError> {
    input.validate()?;

    if input.is_empty() {
        return db.get_client(id).await?.ok_or(OperationError::NotFound {
            entity: "Client",
            id,
        });
    }

    db.update_client(
        id,
        &UpdateClientParams {
            name: input.name.map(|name| name.trim().to_string()),
            email: input.email.map(|email| email.trim().to_string()),
        },
    )
    .await?
    .ok_or(OperationError::NotFound {
        entity: "Client",
        id,
    })
}

/// Refuses (returns `false`) while any invoice still references the client;
/// the client and its invoices are left untouched. A missing id also
/// returns `false` rather than an error.
pub async fn delete_client(db: &dyn Database, id: i32) -> Result<bool, OperationError> {
    let referencing = db.count_invoices_for_client(id).await?;
    if referencing > 0 {
        tracing::info!(
            client_id = id,
            invoices = referencing,
            "refusing to delete client with invoices"
        );
        return Ok(false);
    }
    Ok(db.delete_client(id).await?)
}
