//! SQLite persistence for the layout-derived survey table.

mod repository;
mod table;

pub use repository::SurveyRepository;
pub use table::{SURVEY_TABLE, SURVEY_FINGERPRINT_KEY};
