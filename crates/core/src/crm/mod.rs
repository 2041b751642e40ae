//! CRM API contract: wire models of the endpoints the sync layer uses and the
//! client trait implemented by the transport crate.

mod crm_model;
mod crm_traits;

pub use crm_model::*;
pub use crm_traits::*;
