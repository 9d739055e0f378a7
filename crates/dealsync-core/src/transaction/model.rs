//! Transaction entity.

use crate::entity::{merge_field, merge_optional_field, Entity};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Draft,
    Active,
    UnderContract,
    Closed,
    Cancelled,
}

/// A real-estate transaction; the unit most scopes are keyed by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: TransactionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for [`Transaction`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionPatch {
    pub name: Option<String>,
    pub status: Option<TransactionStatus>,
    pub property_address: Option<Option<String>>,
    pub closing_date: Option<Option<NaiveDate>>,
    pub price: Option<Option<f64>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TransactionStatus::Draft,
            property_address: None,
            closing_date: None,
            price: None,
            updated_at: Utc::now(),
        }
    }
}

impl Entity for Transaction {
    type Patch = TransactionPatch;
    const ENTITY_TYPE: &'static str = "Transaction";

    fn id(&self) -> &str {
        &self.id
    }

    fn apply_patch(&mut self, patch: &TransactionPatch) -> bool {
        let mut changed = false;
        changed |= merge_field(&mut self.name, &patch.name);
        changed |= merge_field(&mut self.status, &patch.status);
        changed |= merge_optional_field(&mut self.property_address, &patch.property_address);
        changed |= merge_optional_field(&mut self.closing_date, &patch.closing_date);
        changed |= merge_optional_field(&mut self.price, &patch.price);
        if changed {
            self.updated_at = patch.updated_at.unwrap_or_else(Utc::now).max(self.updated_at);
        }
        changed
    }
}
