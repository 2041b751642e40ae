//! Offline survey capture synced against a CRM: layout metadata, the local
//! survey schema derived from it, and the services that move surveys between
//! the device and the remote org.

pub mod crm;
pub mod errors;
pub mod metadata;
pub mod schema;
pub mod session;
pub mod settings;
pub mod surveys;
pub mod sync;
pub mod utils;

pub use errors::{Error, Result};
