//! Message dispatch and conversation state.
//!
//! The [`Router`] owns the route table, the named handlers, per-peer
//! continuations and pending waits. Handlers run as spawned tasks through an
//! injected [`Spawner`], so tests can drive dispatch deterministically with
//! [`ManualSpawner`].

pub mod continuation;
pub mod error;
pub mod handler;
pub mod key;
mod router;
pub mod spawn;
pub mod waiters;

pub use {
    continuation::NamedHandlerRegistry,
    error::{Error, Result},
    handler::{Delivery, FnHandler, Handler, LogUnknownHandler, UNKNOWN_HANDLER_NAME, handler_fn},
    key::PeerKey,
    router::{Dispatch, Router, RouterBuilder},
    spawn::{ManualSpawner, Spawner, Task, TokioSpawner, supervise},
    waiters::{AwaitRegistry, PendingMessage},
};
