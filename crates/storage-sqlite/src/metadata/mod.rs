//! SQLite persistence for layout metadata.

mod model;
mod repository;

pub use repository::MetadataRepository;
