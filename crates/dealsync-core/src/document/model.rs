//! Document entity.

use crate::entity::{merge_field, merge_optional_field, Entity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Coarse lifecycle of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Uploaded,
    Processing,
    Completed,
    Failed,
}

/// Server-side processing pipeline steps.
///
/// `Completed` is the terminal sentinel; every other variant is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingStep {
    Queued,
    Uploading,
    Extracting,
    Ocr,
    Classifying,
    Indexing,
    Summarizing,
    Completed,
}

impl ProcessingStep {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Parses a wire step name; unknown names yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::from_str(raw.trim()).ok()
    }
}

/// Last progress report received for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingProgress {
    /// `None` when the last report named a step this client does not know.
    pub step: Option<ProcessingStep>,
    /// Clamped to `0.0..=100.0`.
    pub percentage: f32,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingProgress {
    pub fn clamp_percentage(value: f64) -> f32 {
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(0.0, 100.0) as f32
    }
}

/// A document belonging to a transaction scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    /// Owning transaction.
    pub scope_id: String,
    pub name: String,
    #[serde(default)]
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProcessingProgress>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update for [`Document`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub name: Option<String>,
    pub status: Option<DocumentStatus>,
    pub document_type: Option<Option<String>>,
    pub page_count: Option<Option<u32>>,
    pub tags: Option<Vec<String>>,
    pub progress: Option<Option<ProcessingProgress>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl Document {
    /// Creates a freshly uploaded document.
    pub fn new(id: impl Into<String>, scope_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            scope_id: scope_id.into(),
            name: name.into(),
            status: DocumentStatus::Uploaded,
            document_type: None,
            page_count: None,
            tags: Vec::new(),
            progress: None,
            uploaded_at: now,
            updated_at: now,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.status == DocumentStatus::Processing
    }
}

impl Entity for Document {
    type Patch = DocumentPatch;
    const ENTITY_TYPE: &'static str = "Document";

    fn id(&self) -> &str {
        &self.id
    }

    fn apply_patch(&mut self, patch: &DocumentPatch) -> bool {
        let mut changed = false;
        changed |= merge_field(&mut self.name, &patch.name);
        changed |= merge_field(&mut self.status, &patch.status);
        changed |= merge_optional_field(&mut self.document_type, &patch.document_type);
        changed |= merge_optional_field(&mut self.page_count, &patch.page_count);
        changed |= merge_field(&mut self.tags, &patch.tags);
        changed |= merge_optional_field(&mut self.progress, &patch.progress);
        // A timestamp alone does not count as a change.
        if changed {
            self.updated_at = patch.updated_at.unwrap_or_else(Utc::now).max(self.updated_at);
        }
        changed
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.id, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_parse() {
        assert_eq!(ProcessingStep::parse("ocr"), Some(ProcessingStep::Ocr));
        assert_eq!(ProcessingStep::parse(" completed "), Some(ProcessingStep::Completed));
        assert_eq!(ProcessingStep::parse("teleporting"), None);
        assert!(ProcessingStep::Completed.is_terminal());
        assert!(!ProcessingStep::Indexing.is_terminal());
    }

    #[test]
    fn test_clamp_percentage() {
        assert_eq!(ProcessingProgress::clamp_percentage(140.0), 100.0);
        assert_eq!(ProcessingProgress::clamp_percentage(-3.0), 0.0);
        assert_eq!(ProcessingProgress::clamp_percentage(f64::NAN), 0.0);
        assert_eq!(ProcessingProgress::clamp_percentage(42.5), 42.5);
    }

    #[test]
    fn test_timestamp_only_patch_is_not_a_change() {
        let mut document = Document::new("d1", "t1", "Offer.pdf");
        let patch = DocumentPatch {
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        assert!(!document.apply_patch(&patch));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(DocumentStatus::Processing.to_string(), "processing");
    }
}
