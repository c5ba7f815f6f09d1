//! URL shortener service.
//!
//! [`ShortenerService`] sits between request handlers and a
//! [`Storage`](hashlink_core::Storage) backend from `hashlink_storage`.

pub mod error;
pub mod service;

pub use error::ShortenerError;
pub use service::{ShortenerService, UrlPair};
