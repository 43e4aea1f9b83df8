//! Domain records for the three managed resource kinds.
//!
//! # Responsibility
//! - Define persisted records plus the sanitized drafts and partial changes
//!   that repositories accept.
//!
//! # Invariants
//! - Drafts and changes are produced only by the validation layer after a
//!   passing validation.
//! - Timestamps are Unix epoch milliseconds assigned by the store.

pub mod account;
pub mod document;
pub mod setting;

/// Integer surrogate key of accounts and documents.
pub type RecordId = i64;
