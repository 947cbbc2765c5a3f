//! # Tradesim Database Crate
//!
//! This crate is the persistence boundary of the trading core. It defines the
//! transactional `Store` contract the rest of the workspace is written against and
//! ships two implementations of it.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Adapter:** All SQL lives here. Callers see accounts, instruments,
//!   positions, transactions and price observations, never rows or queries.
//! - **Injected, not global:** There is no shared client singleton. A store handle is
//!   built once at process start (`connect` + `DbRepository::new`) and passed in as
//!   `Arc<dyn Store>`; tests pass a `MemoryStore` instead.
//! - **Atomic units of work:** `Store::begin` returns a `StoreTx`. Everything written
//!   through it becomes visible on `commit` or not at all.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: open the PostgreSQL pool and bring the schema up to date.
//! - `Store` / `StoreTx`: the persistence contract.
//! - `DbRepository`: the PostgreSQL store.
//! - `MemoryStore`: the in-process store.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use memory::MemoryStore;
pub use repository::DbRepository;
pub use store::{Store, StoreTx};
