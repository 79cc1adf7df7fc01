//! Conversation context storage.
//!
//! A [`ContextStore`] holds JSON values under a `(namespace, key)` address.
//! A [`Context`] binds a store to one namespace derived from a
//! [`ContextScope`]; two facades built from the same scope over the same
//! store see each other's writes.
//!
//! Backends: [`InMemoryContextStore`] for tests and single-run agents,
//! [`SqliteContextStore`] for state that must survive restarts.

pub mod context;
pub mod error;
pub mod memory;
pub mod scope;
pub mod sqlite;
pub mod store;

pub use {
    context::Context,
    error::{Error, Result},
    memory::InMemoryContextStore,
    scope::ContextScope,
    sqlite::SqliteContextStore,
    store::{ContextEntry, ContextStore},
};
