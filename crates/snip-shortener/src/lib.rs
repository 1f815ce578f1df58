//! The shortening engine.
//!
//! [`ShortenerService`] glues a [`Generator`](snip_generator::Generator) to a
//! [`Database`](snip_core::Database) and implements the
//! [`Shortener`](snip_core::Shortener) contract on top of them. Deletions are
//! handed to a background [`DeletionPipeline`] that batches them.

pub mod deletion;
pub mod service;

#[cfg(test)]
mod testing;

pub use deletion::{DeletionConfig, DeletionPipeline};
pub use service::{ShortenerConfig, ShortenerService};
