//! Local schema derived from remote page-layout metadata.

mod field_type;
mod survey_schema;

pub use field_type::*;
pub use survey_schema::*;
