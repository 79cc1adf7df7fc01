//! Handler trait and the values handlers receive.

use std::{fmt, future::Future, sync::Arc};

use {
    async_trait::async_trait,
    parley_common::Message,
    parley_context::Context,
    tracing::{debug, warn},
};

use crate::Router;

/// Everything a handler (or a waiter) gets for one inbound message.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Arc<Message>,
    /// State about the sending peer.
    pub contact: Context,
    /// State for the message's thread; `None` when the message has no `thid`.
    pub thread: Option<Context>,
}

impl Delivery {
    pub fn msg_type(&self) -> &str {
        &self.message.msg_type
    }

    /// The sending peer.
    pub fn peer(&self) -> &str {
        &self.message.from
    }
}

/// Message handling logic addressable by a stable name.
///
/// Handlers run as independent tasks. The router handle lets a handler
/// engage a continuation for the peer's next message or wait for one inline.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Stable name; continuations refer to handlers by this name.
    fn name(&self) -> &str;

    async fn handle(&self, router: Router, delivery: Delivery) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`Handler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Router, Delivery) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, router: Router, delivery: Delivery) -> anyhow::Result<()> {
        (self.f)(router, delivery).await
    }
}

/// Build a named handler from an async closure.
///
/// ```rust,ignore
/// router.add_route(
///     "https://didcomm.org/trust-ping/2.0/ping",
///     handler_fn("trust_ping", |_router, delivery| async move {
///         delivery.contact.set("last_ping", true).await?;
///         Ok(())
///     }),
/// )?;
/// ```
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Handler>
where
    F: Fn(Router, Delivery) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

/// Default fallback for messages nothing else claimed.
#[derive(Debug, Default)]
pub struct LogUnknownHandler;

pub const UNKNOWN_HANDLER_NAME: &str = "unknown_message";

#[async_trait]
impl Handler for LogUnknownHandler {
    fn name(&self) -> &str {
        UNKNOWN_HANDLER_NAME
    }

    async fn handle(&self, _router: Router, delivery: Delivery) -> anyhow::Result<()> {
        warn!(
            msg_type = %delivery.message.msg_type,
            from = %delivery.message.from,
            id = delivery.message.id.as_deref().unwrap_or("-"),
            "unknown message"
        );
        debug!(
            contact = delivery.contact.namespace(),
            thread = ?delivery.thread.as_ref().map(Context::namespace),
            body = %delivery.message.body,
            "unknown message context"
        );
        Ok(())
    }
}
