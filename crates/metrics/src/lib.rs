//! Metric names for parley, recorded through the `metrics` crate facade.
//!
//! Nothing here installs a recorder. Crates emit through the re-exported
//! macros behind their own `metrics` feature, and the embedding application
//! decides where the numbers go.
//!
//! ```rust,ignore
//! use parley_metrics::{counter, routing};
//!
//! counter!(routing::MESSAGES_TOTAL, "path" => "routed").increment(1);
//! ```

mod definitions;

pub use definitions::*;

pub use metrics::{counter, gauge, histogram};
