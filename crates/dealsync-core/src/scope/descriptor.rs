//! Scope descriptors and the stable keys derived from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Filters of a global (unscoped) view, e.g. `status=active`.
pub type ScopeFilters = BTreeMap<String, String>;

/// The context the user is currently working in.
///
/// Constructed at the boundary from whatever the UI reports; downstream code
/// matches on the variant instead of probing for fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ScopeDescriptor {
    Transaction {
        #[serde(rename = "transactionId")]
        transaction_id: String,
        /// Selected sub-resource (a document). Not part of routing.
        #[serde(
            rename = "selectedDocumentId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        selected_document_id: Option<String>,
    },
    GlobalFiltered {
        #[serde(default)]
        filters: ScopeFilters,
    },
    #[default]
    Unknown,
}

impl ScopeDescriptor {
    pub fn transaction(transaction_id: impl Into<String>) -> Self {
        Self::Transaction {
            transaction_id: transaction_id.into(),
            selected_document_id: None,
        }
    }

    pub fn global() -> Self {
        Self::GlobalFiltered {
            filters: ScopeFilters::new(),
        }
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            Self::Transaction { transaction_id, .. } => Some(transaction_id),
            _ => None,
        }
    }

    pub fn selected_document_id(&self) -> Option<&str> {
        match self {
            Self::Transaction {
                selected_document_id,
                ..
            } => selected_document_id.as_deref(),
            _ => None,
        }
    }

    pub fn key(&self) -> ScopeKey {
        ScopeKey::from(self)
    }
}

impl Default for ScopeKey {
    fn default() -> Self {
        Self::global()
    }
}

/// Stable routing key of a [`ScopeDescriptor`].
///
/// `"scope:<transactionId>"` for transaction scopes, [`ScopeKey::GLOBAL`] for
/// everything else. Two descriptors that differ only in non-routing fields
/// (selection, filters) share a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub const GLOBAL: &'static str = "global";
    const SCOPED_PREFIX: &'static str = "scope:";

    pub fn global() -> Self {
        Self(Self::GLOBAL.to_string())
    }

    pub fn for_transaction(transaction_id: &str) -> Self {
        Self(format!("{}{}", Self::SCOPED_PREFIX, transaction_id))
    }

    /// Wraps a persisted key string without validation.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_global(&self) -> bool {
        self.0 == Self::GLOBAL
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.0.strip_prefix(Self::SCOPED_PREFIX)
    }
}

impl From<&ScopeDescriptor> for ScopeKey {
    fn from(descriptor: &ScopeDescriptor) -> Self {
        match descriptor {
            ScopeDescriptor::Transaction { transaction_id, .. } => {
                Self::for_transaction(transaction_id)
            }
            ScopeDescriptor::GlobalFiltered { .. } | ScopeDescriptor::Unknown => Self::global(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Refreshed authorization token returned when the active scope changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeToken {
    pub token: String,
    pub scope_key: ScopeKey,
}
