//! Sync status model and transport retry policy.

mod retry_policy;
mod sync_status_model;

pub use retry_policy::*;
pub use sync_status_model::*;
