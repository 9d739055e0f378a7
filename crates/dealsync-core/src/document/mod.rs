//! Document domain module.
//!
//! # Module Structure
//!
//! - `model`: the `Document` entity, its processing state and patch
//! - `summary`: generated summaries, cached per owning scope

mod model;
mod summary;

pub use model::{Document, DocumentPatch, DocumentStatus, ProcessingProgress, ProcessingStep};
pub use summary::{DocumentSummary, SummaryStatus};
