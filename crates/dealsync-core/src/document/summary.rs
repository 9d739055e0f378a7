//! Generated document summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a generated summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    /// Nothing requested yet.
    Missing,
    /// A generation job is queued or running.
    Generating,
    Ready,
    Failed,
}

impl SummaryStatus {
    /// Whether polling can stop.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

/// A summary as last observed for one `(scope, document)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub status: SummaryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl DocumentSummary {
    pub fn missing() -> Self {
        Self {
            status: SummaryStatus::Missing,
            text: None,
            job_id: None,
            generated_at: None,
        }
    }

    pub fn generating(job_id: Option<String>) -> Self {
        Self {
            status: SummaryStatus::Generating,
            text: None,
            job_id,
            generated_at: None,
        }
    }

    pub fn failed() -> Self {
        Self {
            status: SummaryStatus::Failed,
            ..Self::missing()
        }
    }
}
