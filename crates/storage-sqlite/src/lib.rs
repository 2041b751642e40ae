//! SQLite storage for survey sync: layout metadata tables and the survey
//! table whose columns follow the current layout.

pub mod db;
pub mod errors;
pub mod metadata;
mod schema;
pub mod surveys;

pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};
pub use errors::StorageError;
pub use metadata::MetadataRepository;
pub use surveys::SurveyRepository;
