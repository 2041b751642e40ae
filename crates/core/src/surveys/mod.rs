//! Survey records: local model, remote mapping, persistence contract and sync service.

mod survey_mapping;
mod survey_model;
mod survey_service;
mod survey_traits;

pub use survey_mapping::*;
pub use survey_model::*;
pub use survey_service::*;
pub use survey_traits::*;
