//! Reconciliation primitives shared by the stores.
//!
//! # Module Structure
//!
//! - `dedup`: admission checks for push events against what a store already holds
//! - `echo`: self-echo markers for locally-initiated changes
//! - `registry`: multi-subscriber callback registry with revocable registrations

mod dedup;
mod echo;
mod registry;

pub use dedup::{Admission, DedupGuard};
pub use echo::{SelfEchoMarker, SelfEchoSuppressor, DEFAULT_ECHO_WINDOW};
pub use registry::{CallbackRegistry, Registration};
