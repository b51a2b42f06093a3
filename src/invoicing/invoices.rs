//! Invoice operations: create, list (filtered), get, update, delete, and the
//! mark-as-paid transition.
//!
//! Monetary fields are normalized to two decimal places before persistence.
//! `amount` and item `total` are trusted from the caller; the store never
//! recomputes them from the line items.

use rust_decimal::Decimal;

use crate::db::{
    CreateInvoiceParams, Database, InvoiceItem, InvoiceRecord, UpdateInvoiceParams,
};
use crate::error::OperationError;

use super::inputs::{CreateInvoiceInput, InvoiceFilterInput, UpdateInvoiceInput};

fn round_money(value: Decimal) -> Decimal {
    value.round_dp(2)
}

fn normalize_items(items: Vec<InvoiceItem>) -> Vec<InvoiceItem> {
    items
        .into_iter()
        .map(|item| InvoiceItem {
            description: item.description,
            quantity: item.quantity,
            unit_price: round_money(item.unit_price),
            total: round_money(item.total),
        })
        .collect()
}

async fn require_client(db: &dyn Database, id: i32) -> Result<(), OperationError> {
    if db.client_exists(id).await? {
        Ok(())
    } else {
        Err(OperationError::ClientNotFound { id })
    }
}

pub async fn create_invoice(
    db: &dyn Database,
    input: CreateInvoiceInput,
) -> Result<InvoiceRecord, OperationError> {
    input.validate()?;
    require_client(db, input.client_id).await?;

    let record = db
        .create_invoice(&CreateInvoiceParams {
            invoice_number: input.invoice_number.trim().to_string(),
            client_id: input.client_id,
            amount: round_money(input.amount),
            due_date: input.due_date,
            status: input.status,
            items: normalize_items(input.items),
            taxes: round_money(input.taxes),
            notes: input.notes,
        })
        .await?;
    Ok(record)
}

pub async fn get_invoices(
    db: &dyn Database,
    filter: InvoiceFilterInput,
) -> Result<Vec<InvoiceRecord>, OperationError> {
    Ok(db.list_invoices(&filter.into_filter()).await?)
}

/// Absence is a `None` result, not an error.
pub async fn get_invoice(
    db: &dyn Database,
    id: i32,
) -> Result<Option<InvoiceRecord>, OperationError> {
    Ok(db.get_invoice(id).await?)
}

/// Applies only the supplied fields; a supplied `client_id` must resolve to
/// an existing client before anything is written.
pub async fn update_invoice(
    db: &dyn Database,
    id: i32,
    input: UpdateInvoiceInput,
) -> Result<InvoiceRecord, OperationError> {
    input.validate()?;
    if let Some(client_id) = input.client_id {
        require_client(db, client_id).await?;
    }

    db.update_invoice(
        id,
        &UpdateInvoiceParams {
            invoice_number: input.invoice_number.map(|n| n.trim().to_string()),
            client_id: input.client_id,
            amount: input.amount.map(round_money),
            due_date: input.due_date,
            status: input.status,
            items: input.items.map(normalize_items),
            taxes: input.taxes.map(round_money),
            notes: input.notes,
        },
    )
    .await?
    .ok_or(OperationError::NotFound {
        entity: "Invoice",
        id,
    })
}

/// Unconditional removal; no referential guard, unlike client deletion.
pub async fn delete_invoice(db: &dyn Database, id: i32) -> Result<bool, OperationError> {
    Ok(db.delete_invoice(id).await?)
}

/// Sets `status = Paid` regardless of the current state.
pub async fn mark_invoice_as_paid(
    db: &dyn Database,
    id: i32,
) -> Result<InvoiceRecord, OperationError> {
    db.mark_invoice_paid(id)
        .await?
        .ok_or(OperationError::NotFound {
            entity: "Invoice",
            id,
        })
}

#[cfg(all(test, feature = "libsql"))]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use crate::db::InvoiceStatus;
    use crate::error::OperationError;
    use crate::invoicing::clients::create_client;
    use crate::invoicing::inputs::{CreateClientInput, parse_lenient_datetime};
    use crate::testing::test_db;

    use super::*;

    async fn seed_client(db: &dyn Database) -> i32 {
        create_client(
            db,
            CreateClientInput {
                name: "Acme".to_string(),
                email: "a@x.com".to_string(),
            },
        )
        .await
        .expect("create client")
        .id
    }

    fn widget_item() -> InvoiceItem {
        InvoiceItem {
            description: "Widget".to_string(),
            quantity: dec!(2),
            unit_price: dec!(50),
            total: dec!(100),
        }
    }

    fn invoice_input(client_id: i32, number: &str) -> CreateInvoiceInput {
        CreateInvoiceInput {
            invoice_number: number.to_string(),
            client_id,
            amount: dec!(110),
            due_date: parse_lenient_datetime("2025-01-01").unwrap(),
            status: InvoiceStatus::Pending,
            items: vec![widget_item()],
            taxes: dec!(10),
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_with_unknown_client_fails_and_persists_nothing() {
        let (db, _tmp) = test_db().await;

        let err = create_invoice(db.as_ref(), invoice_input(42, "INV-1"))
            .await
            .expect_err("unknown client should fail");
        assert_eq!(err.to_string(), "Client with ID 42 not found");

        let all = get_invoices(db.as_ref(), InvoiceFilterInput::default())
            .await
            .expect("list invoices");
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn create_round_trips_amounts_and_items_through_get() {
        let (db, _tmp) = test_db().await;
        let client_id = seed_client(db.as_ref()).await;

        let mut input = invoice_input(client_id, "INV-1");
        input.items.push(InvoiceItem {
            description: "Gadget".to_string(),
            quantity: dec!(1.5),
            unit_price: dec!(19.99),
            total: dec!(29.994),
        });
        let created = create_invoice(db.as_ref(), input).await.expect("create");

        assert_eq!(created.status, InvoiceStatus::Pending);
        assert_eq!(created.amount, dec!(110.00));
        assert_eq!(created.taxes, dec!(10.00));
        // Monetary item fields are stored at two decimals; quantity is not
        // monetary and stays untouched.
        assert_eq!(created.items[1].total, dec!(29.99));
        assert_eq!(created.items[1].quantity, dec!(1.5));

        let fetched = get_invoice(db.as_ref(), created.id)
            .await
            .expect("get invoice")
            .expect("invoice should exist");
        assert_eq!(fetched, created);
        assert_eq!(
            fetched.items.iter().map(|i| i.description.as_str()).collect::<Vec<_>>(),
            vec!["Widget", "Gadget"]
        );
    }

    #[tokio::test]
    async fn duplicate_invoice_number_fails_with_a_unique_violation() {
        let (db, _tmp) = test_db().await;
        let client_id = seed_client(db.as_ref()).await;

        create_invoice(db.as_ref(), invoice_input(client_id, "INV-1"))
            .await
            .expect("first create");
        let err = create_invoice(db.as_ref(), invoice_input(client_id, "INV-1"))
            .await
            .expect_err("duplicate number should fail");
        assert!(matches!(err, OperationError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn list_filters_by_status_and_due_date_together() {
        let (db, _tmp) = test_db().await;
        let client_id = seed_client(db.as_ref()).await;

        let mut early = invoice_input(client_id, "INV-1");
        early.due_date = parse_lenient_datetime("2025-01-01").unwrap();
        create_invoice(db.as_ref(), early).await.expect("create");

        let mut late = invoice_input(client_id, "INV-2");
        late.due_date = parse_lenient_datetime("2025-06-01").unwrap();
        create_invoice(db.as_ref(), late).await.expect("create");

        let mut paid = invoice_input(client_id, "INV-3");
        paid.due_date = parse_lenient_datetime("2025-01-01").unwrap();
        paid.status = InvoiceStatus::Paid;
        create_invoice(db.as_ref(), paid).await.expect("create");

        let filter = InvoiceFilterInput {
            status: Some(InvoiceStatus::Pending),
            due_date: parse_lenient_datetime("2025-03-01"),
        };
        let matching = get_invoices(db.as_ref(), filter).await.expect("list");
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].invoice_number, "INV-1");

        // The bound is inclusive.
        let filter = InvoiceFilterInput {
            status: None,
            due_date: parse_lenient_datetime("2025-01-01"),
        };
        let matching = get_invoices(db.as_ref(), filter).await.expect("list");
        assert_eq!(matching.len(), 2);

        // No filter returns everything in insertion order.
        let all = get_invoices(db.as_ref(), InvoiceFilterInput::default())
            .await
            .expect("list");
        assert_eq!(
            all.iter().map(|i| i.invoice_number.as_str()).collect::<Vec<_>>(),
            vec!["INV-1", "INV-2", "INV-3"]
        );
    }

    #[tokio::test]
    async fn update_with_only_a_status_leaves_every_other_field_intact() {
        let (db, _tmp) = test_db().await;
        let client_id = seed_client(db.as_ref()).await;

        let mut input = invoice_input(client_id, "INV-1");
        input.notes = Some("net 30".to_string());
        let created = create_invoice(db.as_ref(), input).await.expect("create");

        let updated = update_invoice(
            db.as_ref(),
            created.id,
            UpdateInvoiceInput {
                status: Some(InvoiceStatus::Paid),
                ..UpdateInvoiceInput::default()
            },
        )
        .await
        .expect("update");

        assert_eq!(updated.status, InvoiceStatus::Paid);
        let mut expected = created.clone();
        expected.status = InvoiceStatus::Paid;
        assert_eq!(updated, expected);
    }

    #[tokio::test]
    async fn update_distinguishes_explicit_null_notes_from_omitted() {
        let (db, _tmp) = test_db().await;
        let client_id = seed_client(db.as_ref()).await;

        let mut input = invoice_input(client_id, "INV-1");
        input.notes = Some("net 30".to_string());
        let created = create_invoice(db.as_ref(), input).await.expect("create");

        // Omitted notes keep the stored value.
        let updated = update_invoice(
            db.as_ref(),
            created.id,
            UpdateInvoiceInput {
                amount: Some(dec!(120)),
                ..UpdateInvoiceInput::default()
            },
        )
        .await
        .expect("update");
        assert_eq!(updated.notes.as_deref(), Some("net 30"));
        assert_eq!(updated.amount, dec!(120.00));

        // An explicit null clears it.
        let cleared = update_invoice(
            db.as_ref(),
            created.id,
            UpdateInvoiceInput {
                notes: Some(None),
                ..UpdateInvoiceInput::default()
            },
        )
        .await
        .expect("update");
        assert_eq!(cleared.notes, None);
    }

    #[tokio::test]
    async fn update_checks_a_supplied_client_reference() {
        let (db, _tmp) = test_db().await;
        let client_id = seed_client(db.as_ref()).await;
        let created = create_invoice(db.as_ref(), invoice_input(client_id, "INV-1"))
            .await
            .expect("create");

        let err = update_invoice(
            db.as_ref(),
            created.id,
            UpdateInvoiceInput {
                client_id: Some(999),
                ..UpdateInvoiceInput::default()
            },
        )
        .await
        .expect_err("unknown client should fail");
        assert_eq!(err.to_string(), "Client with ID 999 not found");

        let err = update_invoice(db.as_ref(), 999, UpdateInvoiceInput::default())
            .await
            .expect_err("unknown invoice should fail");
        assert_eq!(err.to_string(), "Invoice with id 999 not found");
    }

    #[tokio::test]
    async fn delete_is_unconditional_and_reports_whether_a_row_was_removed() {
        let (db, _tmp) = test_db().await;
        let client_id = seed_client(db.as_ref()).await;
        let created = create_invoice(db.as_ref(), invoice_input(client_id, "INV-1"))
            .await
            .expect("create");

        assert!(delete_invoice(db.as_ref(), created.id).await.expect("delete"));
        assert!(!delete_invoice(db.as_ref(), created.id).await.expect("delete"));
        assert!(get_invoice(db.as_ref(), created.id)
            .await
            .expect("get")
            .is_none());
    }

    #[tokio::test]
    async fn mark_as_paid_transitions_any_state_and_embeds_the_id_on_failure() {
        let (db, _tmp) = test_db().await;
        let client_id = seed_client(db.as_ref()).await;
        let created = create_invoice(db.as_ref(), invoice_input(client_id, "INV-1"))
            .await
            .expect("create");
        assert_eq!(created.status, InvoiceStatus::Pending);

        let paid = mark_invoice_as_paid(db.as_ref(), created.id)
            .await
            .expect("mark paid");
        assert_eq!(paid.status, InvoiceStatus::Paid);

        // Already-paid invoices transition again without complaint.
        let paid_again = mark_invoice_as_paid(db.as_ref(), created.id)
            .await
            .expect("mark paid twice");
        assert_eq!(paid_again.status, InvoiceStatus::Paid);

        let err = mark_invoice_as_paid(db.as_ref(), 41)
            .await
            .expect_err("missing invoice should fail");
        assert_eq!(err.to_string(), "Invoice with id 41 not found");
    }
}
