use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use {
    futures::FutureExt,
    parley_common::Message,
    parley_context::{Context, ContextStore},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use parley_metrics::{counter, labels, routing as routing_metrics};

use crate::{
    Error, Result,
    continuation::NamedHandlerRegistry,
    handler::{Delivery, Handler, LogUnknownHandler},
    spawn::{Spawner, Task},
    waiters::{AwaitRegistry, PendingMessage},
};

/// Which dispatch path an inbound message took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// An engaged continuation claimed the message.
    Continuation { handler: String },
    /// A pending wait received the message.
    Awaited,
    /// Standing routes for the type were spawned, in this order.
    Routed { handlers: Vec<String> },
    /// Nothing matched; the unknown-message handler was spawned.
    Unknown,
}

impl Dispatch {
    /// Short label for logs and metrics.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Continuation { .. } => "continuation",
            Self::Awaited => "awaited",
            Self::Routed { .. } => "routed",
            Self::Unknown => "unknown",
        }
    }
}

/// Builder for [`Router`].
pub struct RouterBuilder {
    store: Arc<dyn ContextStore>,
    spawner: Arc<dyn Spawner>,
    wait_timeout: Option<Duration>,
    unknown: Arc<dyn Handler>,
}

impl RouterBuilder {
    /// Default deadline for [`Router::wait_for_message`]; `None` waits forever.
    #[must_use]
    pub fn wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout;
        self
    }

    #[must_use]
    pub fn unknown_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.unknown = handler;
        self
    }

    pub fn build(self) -> Router {
        Router {
            inner: Arc::new(RouterInner {
                store: self.store,
                spawner: self.spawner,
                wait_timeout: self.wait_timeout,
                routes: RwLock::new(HashMap::new()),
                handlers: RwLock::new(HashMap::new()),
                unknown: RwLock::new(self.unknown),
                continuations: NamedHandlerRegistry::new(),
                waiters: AwaitRegistry::new(),
            }),
        }
    }
}

struct RouterInner {
    store: Arc<dyn ContextStore>,
    spawner: Arc<dyn Spawner>,
    wait_timeout: Option<Duration>,
    /// message type -> handler names, in registration order
    routes: RwLock<HashMap<String, Vec<String>>>,
    /// handler name -> handler
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    unknown: RwLock<Arc<dyn Handler>>,
    continuations: NamedHandlerRegistry,
    waiters: AwaitRegistry,
}

/// Message dispatcher and owner of all routing state.
///
/// Cheap to clone; clones share the same tables. Every inbound message takes
/// exactly one path, checked in this order:
///
/// 1. an engaged continuation for `(from, type)`
/// 2. a pending wait for `(from, type)`
/// 3. the standing routes for `type` (all of them, in registration order)
/// 4. the unknown-message handler
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("backend", &self.inner.store.backend())
            .field("continuations", &self.inner.continuations.len())
            .field("waiters", &self.inner.waiters.len())
            .finish()
    }
}

impl Router {
    pub fn builder(store: Arc<dyn ContextStore>, spawner: Arc<dyn Spawner>) -> RouterBuilder {
        RouterBuilder {
            store,
            spawner,
            wait_timeout: None,
            unknown: Arc::new(LogUnknownHandler),
        }
    }

    pub fn new(store: Arc<dyn ContextStore>, spawner: Arc<dyn Spawner>) -> Self {
        Self::builder(store, spawner).build()
    }

    // ── Setup ───────────────────────────────────────────────────────────────

    /// Register `handler` for every message of `msg_type`.
    ///
    /// Several handlers may share a type; all of them run, in the order they
    /// were added. Adding the same handler to the same type twice is a no-op.
    /// Fails with [`Error::HandlerNameTaken`] when a different handler already
    /// holds the name, leaving existing routes untouched.
    pub fn add_route(&self, msg_type: impl Into<String>, handler: Arc<dyn Handler>) -> Result<()> {
        let msg_type = msg_type.into();
        let name = handler.name().to_string();
        self.add_named_handler(handler)?;

        let mut routes = write(&self.inner.routes);
        let names = routes.entry(msg_type.clone()).or_default();
        if names.contains(&name) {
            debug!(msg_type = %msg_type, handler = %name, "route already present");
            return Ok(());
        }
        names.push(name.clone());
        info!(msg_type = %msg_type, handler = %name, "route added");
        Ok(())
    }

    /// Make `handler` addressable by name for continuations.
    ///
    /// Re-adding the same handler is a no-op; a different handler under a
    /// taken name is rejected, since routes and continuations resolve by name.
    pub fn add_named_handler(&self, handler: Arc<dyn Handler>) -> Result<()> {
        let name = handler.name().to_string();
        let mut handlers = write(&self.inner.handlers);
        match handlers.get(&name) {
            Some(existing) if Arc::ptr_eq(existing, &handler) => Ok(()),
            Some(_) => {
                warn!(handler = %name, "rejecting second handler under the same name");
                Err(Error::HandlerNameTaken { name })
            },
            None => {
                handlers.insert(name, handler);
                Ok(())
            },
        }
    }

    pub fn set_unknown_handler(&self, handler: Arc<dyn Handler>) {
        *write(&self.inner.unknown) = handler;
    }

    // ── Conversation state ──────────────────────────────────────────────────

    /// Send the next `msg_type` message from `peer` to the handler registered
    /// as `name`, bypassing waits and standing routes. Replaces any earlier
    /// continuation for the same pair.
    pub fn engage_named_handler(&self, peer: &str, msg_type: &str, name: &str) -> Result<()> {
        if !read(&self.inner.handlers).contains_key(name) {
            return Err(Error::unknown_handler(name));
        }
        self.inner.continuations.register(peer, msg_type, name);
        #[cfg(feature = "metrics")]
        counter!(routing_metrics::CONTINUATIONS_ENGAGED_TOTAL).increment(1);
        Ok(())
    }

    /// Register `handler` by name and engage it for `(peer, msg_type)`.
    pub fn engage(&self, peer: &str, msg_type: &str, handler: Arc<dyn Handler>) -> Result<()> {
        let name = handler.name().to_string();
        self.add_named_handler(handler)?;
        self.inner.continuations.register(peer, msg_type, name);
        #[cfg(feature = "metrics")]
        counter!(routing_metrics::CONTINUATIONS_ENGAGED_TOTAL).increment(1);
        Ok(())
    }

    /// Drop an engaged continuation. Returns whether one existed.
    pub fn disengage(&self, peer: &str, msg_type: &str) -> bool {
        self.inner.continuations.remove(peer, msg_type)
    }

    /// The continuation currently engaged for `(peer, msg_type)`.
    pub fn continuation_for(&self, peer: &str, msg_type: &str) -> Option<String> {
        self.inner.continuations.peek(peer, msg_type)
    }

    /// Wait for the next `msg_type` message from `peer`, using the router's
    /// default deadline.
    pub fn wait_for_message(&self, peer: &str, msg_type: &str) -> Result<PendingMessage> {
        self.wait_for_message_with_deadline(peer, msg_type, self.inner.wait_timeout)
    }

    pub fn wait_for_message_with_deadline(
        &self,
        peer: &str,
        msg_type: &str,
        deadline: Option<Duration>,
    ) -> Result<PendingMessage> {
        self.inner.waiters.register_wait(peer, msg_type, deadline)
    }

    pub fn cancel_wait(&self, peer: &str, msg_type: &str) -> bool {
        self.inner.waiters.cancel(peer, msg_type)
    }

    pub fn is_waiting(&self, peer: &str, msg_type: &str) -> bool {
        self.inner.waiters.is_waiting(peer, msg_type)
    }

    // ── Contexts ────────────────────────────────────────────────────────────

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.inner.store
    }

    pub fn contact_context(&self, peer: &str) -> Context {
        Context::contact(Arc::clone(&self.inner.store), peer)
    }

    pub fn thread_context(&self, peer: &str, thid: &str) -> Context {
        Context::thread(Arc::clone(&self.inner.store), peer, thid)
    }

    // ── Inspection ──────────────────────────────────────────────────────────

    /// Route table snapshot, sorted by message type.
    pub fn routes(&self) -> Vec<(String, Vec<String>)> {
        let mut routes: Vec<_> = read(&self.inner.routes)
            .iter()
            .map(|(msg_type, names)| (msg_type.clone(), names.clone()))
            .collect();
        routes.sort();
        routes
    }

    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.inner.handlers).keys().cloned().collect();
        names.sort();
        names
    }

    // ── Dispatch ────────────────────────────────────────────────────────────

    /// Decode a raw JSON message and dispatch it.
    pub fn route_value(&self, value: serde_json::Value) -> Result<Dispatch> {
        let message = Message::from_value(value).inspect_err(|e| {
            warn!(error = %e, "rejecting undecodable message");
            self.record_rejected();
        })?;
        self.route_message(message)
    }

    /// Dispatch one inbound message.
    ///
    /// The routing decision is made synchronously; handler bodies run as
    /// spawned tasks and are not awaited. A message without `type` or `from`
    /// is rejected before any context is resolved.
    pub fn route_message(&self, message: Message) -> Result<Dispatch> {
        if let Err(e) = message.validate() {
            warn!(error = %e, id = message.id.as_deref().unwrap_or("-"), "rejecting message");
            self.record_rejected();
            return Err(e.into());
        }

        let delivery = self.deliver(message);
        let (peer, msg_type) = (delivery.peer().to_string(), delivery.msg_type().to_string());

        let dispatch = self.dispatch(&peer, &msg_type, delivery);
        debug!(from = %peer, msg_type = %msg_type, path = dispatch.path(), "message dispatched");

        #[cfg(feature = "metrics")]
        counter!(routing_metrics::MESSAGES_TOTAL, labels::PATH => dispatch.path()).increment(1);

        Ok(dispatch)
    }

    fn deliver(&self, message: Message) -> Delivery {
        let contact = self.contact_context(&message.from);
        let thread = message
            .thid
            .as_deref()
            .map(|thid| self.thread_context(&message.from, thid));
        Delivery {
            message: Arc::new(message),
            contact,
            thread,
        }
    }

    fn dispatch(&self, peer: &str, msg_type: &str, delivery: Delivery) -> Dispatch {
        if let Some(name) = self.inner.continuations.resolve_and_consume(peer, msg_type) {
            match self.handler(&name) {
                Some(handler) => {
                    self.spawn_handler(handler, delivery);
                    return Dispatch::Continuation { handler: name };
                },
                None => warn!(
                    handler = %name,
                    from = %peer,
                    msg_type = %msg_type,
                    "continuation names an unregistered handler, falling through"
                ),
            }
        }

        if self.inner.waiters.try_resolve(peer, msg_type, delivery.clone()) {
            return Dispatch::Awaited;
        }

        let names = read(&self.inner.routes)
            .get(msg_type)
            .cloned()
            .unwrap_or_default();
        let handlers: Vec<_> = names
            .iter()
            .filter_map(|name| self.handler(name))
            .collect();
        if !handlers.is_empty() {
            let spawned = handlers.iter().map(|h| h.name().to_string()).collect();
            for handler in handlers {
                self.spawn_handler(handler, delivery.clone());
            }
            return Dispatch::Routed { handlers: spawned };
        }

        let unknown = Arc::clone(&*read(&self.inner.unknown));
        self.spawn_handler(unknown, delivery);
        Dispatch::Unknown
    }

    fn handler(&self, name: &str) -> Option<Arc<dyn Handler>> {
        read(&self.inner.handlers).get(name).cloned()
    }

    fn spawn_handler(&self, handler: Arc<dyn Handler>, delivery: Delivery) {
        let router = self.clone();
        let label = handler.name().to_string();
        let future = async move { handler.handle(router, delivery).await }.boxed();
        self.inner.spawner.spawn(Task::new(label, future));
    }

    #[cfg(feature = "metrics")]
    fn record_rejected(&self) {
        counter!(routing_metrics::REJECTED_TOTAL).increment(1);
    }

    #[cfg(not(feature = "metrics"))]
    fn record_rejected(&self) {}
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}
