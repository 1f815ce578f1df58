//! HTTP transport for the snip shortener.
//!
//! The router maps HTTP requests onto a [`Shortener`](snip_core::Shortener)
//! held behind a trait object, so any storage backend can sit underneath.

pub mod app;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;
pub mod subnet;

pub use app::App;
pub use error::AppError;
pub use state::{AppState, Owner, TrustedClient, DEFAULT_OWNER_HEADER};
pub use subnet::{SubnetParseError, TrustedSubnet};
