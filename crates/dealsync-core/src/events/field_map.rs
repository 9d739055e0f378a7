//! Static snake_case → model field tables.
//!
//! Each row names the wire field, the model field it lands on, and the
//! conversion. Fields without a row are reported as unknown; rows whose
//! conversion fails are reported as invalid. Neither stops the other rows.

use super::payload::parse_timestamp;
use crate::document::{DocumentPatch, DocumentStatus};
use crate::transaction::{TransactionPatch, TransactionStatus};
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::str::FromStr;

type Convert<P> = fn(&mut P, &Value) -> Result<(), String>;

/// One row of a field-mapping table.
pub struct FieldMapping<P> {
    pub source: &'static str,
    pub target: &'static str,
    pub apply: Convert<P>,
}

/// Output of [`map_fields`].
#[derive(Debug, Clone, PartialEq)]
pub struct MappedFields<P> {
    pub patch: P,
    /// Model fields that were set.
    pub applied: Vec<&'static str>,
    /// Wire fields with no row in the table.
    pub unknown: Vec<String>,
    /// Wire fields whose value could not be converted, with the reason.
    pub invalid: Vec<(String, String)>,
}

impl<P> MappedFields<P> {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Maps `updates` through `table` into a fresh patch.
pub fn map_fields<P: Default>(table: &[FieldMapping<P>], updates: &Map<String, Value>) -> MappedFields<P> {
    let mut mapped = MappedFields {
        patch: P::default(),
        applied: Vec::new(),
        unknown: Vec::new(),
        invalid: Vec::new(),
    };

    for (field, value) in updates {
        let Some(row) = table.iter().find(|row| row.source == field) else {
            mapped.unknown.push(field.clone());
            continue;
        };
        match (row.apply)(&mut mapped.patch, value) {
            Ok(()) => mapped.applied.push(row.target),
            Err(reason) => mapped.invalid.push((field.clone(), reason)),
        }
    }
    mapped
}

fn string(value: &Value) -> Result<String, String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("expected string, got {value}"))
}

fn nullable_string(value: &Value) -> Result<Option<String>, String> {
    if value.is_null() {
        return Ok(None);
    }
    string(value).map(Some)
}

fn parsed<T: FromStr>(value: &Value) -> Result<T, String> {
    let raw = string(value)?;
    T::from_str(&raw).map_err(|_| format!("unrecognized value '{raw}'"))
}

fn timestamp(value: &Value) -> Result<chrono::DateTime<chrono::Utc>, String> {
    parse_timestamp(value).ok_or_else(|| format!("expected timestamp, got {value}"))
}

// Document

fn doc_name(patch: &mut DocumentPatch, value: &Value) -> Result<(), String> {
    patch.name = Some(string(value)?);
    Ok(())
}

fn doc_status(patch: &mut DocumentPatch, value: &Value) -> Result<(), String> {
    patch.status = Some(parsed::<DocumentStatus>(value)?);
    Ok(())
}

fn doc_type(patch: &mut DocumentPatch, value: &Value) -> Result<(), String> {
    patch.document_type = Some(nullable_string(value)?);
    Ok(())
}

fn doc_page_count(patch: &mut DocumentPatch, value: &Value) -> Result<(), String> {
    let count = match value {
        Value::Null => None,
        other => Some(
            other
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| format!("expected page count, got {other}"))?,
        ),
    };
    patch.page_count = Some(count);
    Ok(())
}

fn doc_tags(patch: &mut DocumentPatch, value: &Value) -> Result<(), String> {
    let tags = value
        .as_array()
        .ok_or_else(|| format!("expected array, got {value}"))?
        .iter()
        .map(string)
        .collect::<Result<Vec<_>, _>>()?;
    patch.tags = Some(tags);
    Ok(())
}

fn doc_updated_at(patch: &mut DocumentPatch, value: &Value) -> Result<(), String> {
    patch.updated_at = Some(timestamp(value)?);
    Ok(())
}

pub static DOCUMENT_FIELDS: &[FieldMapping<DocumentPatch>] = &[
    FieldMapping { source: "name", target: "name", apply: doc_name },
    FieldMapping { source: "status", target: "status", apply: doc_status },
    FieldMapping { source: "document_type", target: "documentType", apply: doc_type },
    FieldMapping { source: "page_count", target: "pageCount", apply: doc_page_count },
    FieldMapping { source: "tags", target: "tags", apply: doc_tags },
    FieldMapping { source: "updated_at", target: "updatedAt", apply: doc_updated_at },
];

// Transaction

fn txn_name(patch: &mut TransactionPatch, value: &Value) -> Result<(), String> {
    patch.name = Some(string(value)?);
    Ok(())
}

fn txn_status(patch: &mut TransactionPatch, value: &Value) -> Result<(), String> {
    patch.status = Some(parsed::<TransactionStatus>(value)?);
    Ok(())
}

fn txn_address(patch: &mut TransactionPatch, value: &Value) -> Result<(), String> {
    patch.property_address = Some(nullable_string(value)?);
    Ok(())
}

fn txn_closing_date(patch: &mut TransactionPatch, value: &Value) -> Result<(), String> {
    let date = match value {
        Value::Null => None,
        other => Some(parsed::<NaiveDate>(other)?),
    };
    patch.closing_date = Some(date);
    Ok(())
}

fn txn_price(patch: &mut TransactionPatch, value: &Value) -> Result<(), String> {
    let price = match value {
        Value::Null => None,
        other => Some(
            other
                .as_f64()
                .ok_or_else(|| format!("expected number, got {other}"))?,
        ),
    };
    patch.price = Some(price);
    Ok(())
}

fn txn_updated_at(patch: &mut TransactionPatch, value: &Value) -> Result<(), String> {
    patch.updated_at = Some(timestamp(value)?);
    Ok(())
}

pub static TRANSACTION_FIELDS: &[FieldMapping<TransactionPatch>] = &[
    FieldMapping { source: "name", target: "name", apply: txn_name },
    FieldMapping { source: "status", target: "status", apply: txn_status },
    FieldMapping { source: "property_address", target: "propertyAddress", apply: txn_address },
    FieldMapping { source: "closing_date", target: "closingDate", apply: txn_closing_date },
    FieldMapping { source: "price", target: "price", apply: txn_price },
    FieldMapping { source: "updated_at", target: "updatedAt", apply: txn_updated_at },
];
