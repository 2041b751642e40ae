//! Layout metadata: record types, page layout sections/items, picklists, localization rows.

mod metadata_model;
mod metadata_service;
mod metadata_traits;

pub use metadata_model::*;
pub use metadata_service::*;
pub use metadata_traits::*;
