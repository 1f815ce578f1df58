//! Core types and traits for the snip URL shortener.
//!
//! This crate holds the domain model, the error taxonomy and the two
//! contracts the rest of the workspace is built around: the storage
//! traits ([`Storage`], [`Database`]) and the engine trait ([`Shortener`]).

pub mod error;
pub mod owner;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use error::{ShortenerError, StorageError};
pub use owner::OwnerId;
pub use repository::{AddOutcome, Database, DeleteRequest, Resolution, Storage, UrlRecord};
pub use shortcode::ShortCode;
pub use shortener::{BatchEntry, BatchItem, CreateOutcome, Shortener, Stats};
