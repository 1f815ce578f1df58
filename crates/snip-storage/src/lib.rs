//! Storage backends for the snip URL shortener.
//!
//! Every backend implements both [`Storage`] and [`Database`] from
//! `snip_core`, so the engine can run on any of them unchanged.

pub mod file;
pub mod memory;
pub mod mysql;

pub use file::FileRepository;
pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use snip_core::{Database, Storage, StorageError};
