//! Salesforce REST client for survey sync.

mod client;
mod error;

pub use client::SalesforceClient;
pub use error::{CrmError, Result};
