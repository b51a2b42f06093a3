//! Typed operation inputs and their domain validation.
//!
//! Every operation input is a serde struct with an explicit `validate()`
//! that runs before any store access. Dates are parsed leniently (bare
//! `YYYY-MM-DD` or full RFC 3339); monetary fields arrive as JSON numbers.
//! `UpdateInvoiceInput::notes` is tri-state: an omitted field, an explicit
//! null, and a value are all distinct.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use crate::db::{InvoiceFilter, InvoiceItem, InvoiceStatus};
use crate::error::ValidationError;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex must compile")
});

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

fn require_email(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(value.trim()) {
        return Err(ValidationError::new(field, "must be a valid email address"));
    }
    Ok(())
}

fn require_positive(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::new(field, "must be positive"));
    }
    Ok(())
}

fn validate_items(items: &[InvoiceItem]) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::new(
            "items",
            "at least one line item is required",
        ));
    }
    for item in items {
        if item.description.trim().is_empty() {
            return Err(ValidationError::new(
                "items",
                "item description must not be empty",
            ));
        }
        if item.quantity <= Decimal::ZERO {
            return Err(ValidationError::new(
                "items",
                "item quantity must be positive",
            ));
        }
        if item.unit_price <= Decimal::ZERO {
            return Err(ValidationError::new(
                "items",
                "item unit_price must be positive",
            ));
        }
        if item.total <= Decimal::ZERO {
            return Err(ValidationError::new("items", "item total must be positive"));
        }
    }
    Ok(())
}

/// Accepts a bare date (pinned to midnight UTC) or a full RFC 3339 timestamp.
pub(crate) fn parse_lenient_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn lenient_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_lenient_datetime(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date/time '{raw}'")))
}

fn lenient_datetime_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_lenient_datetime(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date/time '{raw}'"))),
    }
}

/// Missing field stays `None` (via `#[serde(default)]`); a present field,
/// even an explicit null, becomes `Some(..)`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn default_status() -> InvoiceStatus {
    InvoiceStatus::Pending
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClientInput {
    pub name: String,
    pub email: String,
}

impl CreateClientInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("name", &self.name)?;
        require_email("email", &self.email)
    }
}

/// Both fields optional; supplying neither is legal and leaves the client
/// unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClientInput {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UpdateClientInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(ref name) = self.name {
            require_non_empty("name", name)?;
        }
        if let Some(ref email) = self.email {
            require_email("email", email)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoiceInput {
    pub invoice_number: String,
    pub client_id: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(deserialize_with = "lenient_datetime")]
    pub due_date: DateTime<Utc>,
    #[serde(default = "default_status")]
    pub status: InvoiceStatus,
    pub items: Vec<InvoiceItem>,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub taxes: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateInvoiceInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("invoice_number", &self.invoice_number)?;
        if self.client_id <= 0 {
            return Err(ValidationError::new("client_id", "must be positive"));
        }
        require_positive("amount", self.amount)?;
        if self.taxes < Decimal::ZERO {
            return Err(ValidationError::new("taxes", "must not be negative"));
        }
        validate_items(&self.items)
    }
}

/// Mirrors creation with every field optional. `notes` distinguishes an
/// explicit null (clear the field) from an omitted field (keep the value).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateInvoiceInput {
    pub invoice_number: Option<String>,
    pub client_id: Option<i32>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_datetime_opt")]
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<InvoiceStatus>,
    pub items: Option<Vec<InvoiceItem>>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub taxes: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub notes: Option<Option<String>>,
}

impl UpdateInvoiceInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(ref number) = self.invoice_number {
            require_non_empty("invoice_number", number)?;
        }
        if let Some(client_id) = self.client_id {
            if client_id <= 0 {
                return Err(ValidationError::new("client_id", "must be positive"));
            }
        }
        if let Some(amount) = self.amount {
            require_positive("amount", amount)?;
        }
        if let Some(taxes) = self.taxes {
            if taxes < Decimal::ZERO {
                return Err(ValidationError::new("taxes", "must not be negative"));
            }
        }
        if let Some(ref items) = self.items {
            validate_items(items)?;
        }
        Ok(())
    }
}

/// Listing filter: exact status and/or inclusive due-date upper bound.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct InvoiceFilterInput {
    pub status: Option<InvoiceStatus>,
    #[serde(default, deserialize_with = "lenient_datetime_opt")]
    pub due_date: Option<DateTime<Utc>>,
}

impl InvoiceFilterInput {
    pub fn into_filter(self) -> InvoiceFilter {
        InvoiceFilter {
            status: self.status,
            due_before: self.due_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn widget_item() -> InvoiceItem {
        InvoiceItem {
            description: "Widget".to_string(),
            quantity: dec!(2),
            unit_price: dec!(50),
            total: dec!(100),
        }
    }

    fn create_invoice_input() -> CreateInvoiceInput {
        CreateInvoiceInput {
            invoice_number: "INV-1".to_string(),
            client_id: 1,
            amount: dec!(110),
            due_date: parse_lenient_datetime("2025-01-01").unwrap(),
            status: InvoiceStatus::Pending,
            items: vec![widget_item()],
            taxes: dec!(10),
            notes: None,
        }
    }

    #[test]
    fn client_input_rejects_blank_name_and_bad_email() {
        let input = CreateClientInput {
            name: "  ".to_string(),
            email: "a@x.com".to_string(),
        };
        assert_eq!(input.validate().unwrap_err().field, "name");

        let input = CreateClientInput {
            name: "Acme".to_string(),
            email: "not-an-email".to_string(),
        };
        assert_eq!(input.validate().unwrap_err().field, "email");

        let input = CreateClientInput {
            name: "Acme".to_string(),
            email: "a@x.com".to_string(),
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn update_client_input_validates_only_supplied_fields() {
        assert!(UpdateClientInput::default().validate().is_ok());
        assert!(UpdateClientInput::default().is_empty());

        let input = UpdateClientInput {
            name: None,
            email: Some("nope".to_string()),
        };
        assert_eq!(input.validate().unwrap_err().field, "email");
    }

    #[test]
    fn invoice_input_enforces_domain_constraints() {
        assert!(create_invoice_input().validate().is_ok());

        let mut input = create_invoice_input();
        input.amount = dec!(0);
        assert_eq!(input.validate().unwrap_err().field, "amount");

        let mut input = create_invoice_input();
        input.taxes = dec!(-1);
        assert_eq!(input.validate().unwrap_err().field, "taxes");

        let mut input = create_invoice_input();
        input.items.clear();
        assert_eq!(input.validate().unwrap_err().field, "items");

        let mut input = create_invoice_input();
        input.items[0].unit_price = dec!(0);
        assert_eq!(input.validate().unwrap_err().field, "items");

        let mut input = create_invoice_input();
        input.client_id = 0;
        assert_eq!(input.validate().unwrap_err().field, "client_id");
    }

    #[test]
    fn invoice_input_applies_defaults_on_deserialization() {
        let input: CreateInvoiceInput = serde_json::from_str(
            r#"{
                "invoice_number": "INV-1",
                "client_id": 1,
                "amount": 110,
                "due_date": "2025-01-01",
                "items": [{"description": "Widget", "quantity": 2, "unit_price": 50, "total": 100}]
            }"#,
        )
        .expect("input should deserialize");

        assert_eq!(input.status, InvoiceStatus::Pending);
        assert_eq!(input.taxes, Decimal::ZERO);
        assert_eq!(input.notes, None);
        assert_eq!(input.amount, dec!(110));
    }

    #[test]
    fn lenient_dates_accept_both_shapes_and_reject_garbage() {
        let from_date = parse_lenient_datetime("2025-01-01").unwrap();
        assert_eq!(from_date.to_rfc3339(), "2025-01-01T00:00:00+00:00");

        let from_ts = parse_lenient_datetime("2025-01-01T12:30:00Z").unwrap();
        assert_eq!(from_ts.to_rfc3339(), "2025-01-01T12:30:00+00:00");

        assert!(parse_lenient_datetime("01/01/2025").is_none());
        assert!(parse_lenient_datetime("").is_none());
    }

    #[test]
    fn update_notes_distinguishes_omitted_null_and_value() {
        let omitted: UpdateInvoiceInput = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(omitted.notes, None);

        let explicit_null: UpdateInvoiceInput = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(explicit_null.notes, Some(None));

        let value: UpdateInvoiceInput = serde_json::from_str(r#"{"notes": "paid in full"}"#).unwrap();
        assert_eq!(value.notes, Some(Some("paid in full".to_string())));
    }
}
