//! Core types and traits for the Hashlink URL shortener.
//!
//! This crate provides the identity model (short ids, URLs, users), the
//! storage error taxonomy and the [`Storage`] contract shared by every backend.

mod decimal;
pub mod error;
pub mod short_id;
pub mod storage;
pub mod user;

pub use error::{Result, StorageError};
pub use short_id::{parse_short_id, FullUrl, ShortId};
pub use storage::{BatchRequest, BatchResponse, SavedUrls, Storage};
pub use user::{parse_user, CorrelationId, User};
