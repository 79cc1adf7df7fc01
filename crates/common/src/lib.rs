//! Shared types, error definitions, and utilities used across all parley crates.

pub mod error;
pub mod message;

pub use {
    error::{Error, FromMessage, Result},
    message::Message,
};
