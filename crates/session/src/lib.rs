//! `cargolane-session`
//!
//! **Responsibility:** the process-wide Local Session Cache.
//!
//! This crate provides:
//! - A persisted key/value store contract ([`KeyValueStore`]) with a SQLite
//!   implementation that survives restarts and an in-memory one for tests
//! - [`LocalSessionCache`]: last-known principal plus coarse verification and
//!   onboarding flags, used only as a fallback when the backend is unreachable
//!
//! Lifecycle: written on every successful status fetch, cleared on logout,
//! read as a fallback only.

pub mod cache;
pub mod store;

pub use cache::{LocalSessionCache, SESSION_KEY, SessionSnapshot};
pub use store::{KeyValueStore, MemoryStore, SqliteStore, StoreError};
