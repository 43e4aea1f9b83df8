//! Host boundary for DataDesk.
//! Hosts call [`ApiContext::dispatch`] with a call name and a JSON payload;
//! nothing here holds business rules.

pub mod api;

pub use api::{core_version, init_logging, ping, ApiContext, ApiResponse, CallError, CALLS};
