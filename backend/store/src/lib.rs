//! # Store
//!
//! Documents and the rules that govern them.
//!
//! - [`models`] holds the marketplace documents (users, donations, pickup slots, conversations, ratings,
//!   notifications) and the guards on every state change
//! - [`Database`] gives typed, compare-and-swap updates over any [`Backend`]
//! - [`MemoryBackend`] for local runs and tests, [`RedisBackend`] for deployments
pub mod backend;
pub mod database;
pub mod error;
pub mod memory;
pub mod models;
pub mod remote;

pub use backend::Backend;
pub use database::{Database, Document};
pub use error::{DomainError, StoreError};
pub use memory::MemoryBackend;
pub use remote::RedisBackend;
