//! Built-in demo handlers: basicmessage conversations and user profiles.

use std::sync::Arc;

use {
    anyhow::Context as _,
    parley_common::Message,
    parley_routing::{Delivery, Router, handler_fn},
    serde_json::json,
    tokio::sync::mpsc,
    tracing::info,
};

pub const BASIC_MESSAGE: &str = "https://didcomm.org/basicmessage/2.0/message";
pub const REQUEST_PROFILE: &str = "https://didcomm.org/user-profile/1.0/request-profile";
pub const PROFILE: &str = "https://didcomm.org/user-profile/1.0/profile";

const COLORS_COLOR: &str = "colors_color";
const COLORS_ANIMAL: &str = "colors_animal";

/// Outbound message queue drained by the run loop.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Message>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, message: Message) -> anyhow::Result<()> {
        self.tx
            .send(message)
            .map_err(|_| anyhow::anyhow!("outbox closed"))
    }
}

/// Our side of the conversation.
#[derive(Debug)]
pub struct Agent {
    pub did: String,
    pub label: String,
    pub outbox: Outbox,
}

impl Agent {
    fn basic_message(&self, to: &str, content: &str) -> anyhow::Result<()> {
        self.outbox.send(
            Message::new(BASIC_MESSAGE, &self.did)
                .with_id(new_id())
                .with_field("to", json!([to]))
                .with_field("lang", json!("en"))
                .with_body(json!({ "content": content })),
        )
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Register the demo routes and continuation handlers on `router`.
pub fn install(router: &Router, agent: Arc<Agent>) -> anyhow::Result<()> {
    let a = Arc::clone(&agent);
    router.add_route(
        BASIC_MESSAGE,
        handler_fn("basicmessage", move |router, delivery| {
            let agent = Arc::clone(&a);
            async move { basic_message(&router, &agent, delivery).await }
        }),
    )?;

    let a = Arc::clone(&agent);
    router.add_route(
        REQUEST_PROFILE,
        handler_fn("request_profile", move |_router, delivery| {
            let agent = Arc::clone(&a);
            async move { request_profile(&agent, &delivery) }
        }),
    )?;

    router.add_route(
        PROFILE,
        handler_fn("profile", |_router, delivery| async move {
            let name = delivery
                .message
                .body
                .pointer("/profile/displayName")
                .and_then(|v| v.as_str())
                .unwrap_or("<unnamed>");
            info!(from = %delivery.peer(), display_name = %name, "profile received");
            delivery.contact.set("display_name", name).await?;
            Ok(())
        }),
    )?;

    let a = Arc::clone(&agent);
    router.add_named_handler(handler_fn(COLORS_COLOR, move |router, delivery| {
        let agent = Arc::clone(&a);
        async move { colors_color(&router, &agent, delivery).await }
    }))?;

    let a = agent;
    router.add_named_handler(handler_fn(COLORS_ANIMAL, move |_router, delivery| {
        let agent = Arc::clone(&a);
        async move { colors_animal(&agent, delivery).await }
    }))?;
    Ok(())
}

async fn basic_message(router: &Router, agent: &Agent, delivery: Delivery) -> anyhow::Result<()> {
    match delivery.message.content() {
        Some("count") => step_process(router, agent, &delivery).await,
        Some("colors") => {
            delivery.contact.set("step", "color").await?;
            agent.basic_message(delivery.peer(), "What is your favourite colour?")?;
            router.engage_named_handler(delivery.peer(), BASIC_MESSAGE, COLORS_COLOR)?;
            Ok(())
        },
        Some(content) => {
            info!(from = %delivery.peer(), content, "basicmessage");
            Ok(())
        },
        None => {
            info!(from = %delivery.peer(), "basicmessage without content");
            Ok(())
        },
    }
}

/// Ask a question and wait inline for the answer.
async fn step_process(router: &Router, agent: &Agent, delivery: &Delivery) -> anyhow::Result<()> {
    let peer = delivery.peer();
    info!(from = %peer, "starting step process");

    let pending = router.wait_for_message(peer, BASIC_MESSAGE)?;
    agent.basic_message(peer, "Send a basicmessage with color")?;

    let answer = pending.await?;
    let color = answer.message.content().unwrap_or_default();
    info!(from = %peer, color, "step process answered");
    agent.basic_message(peer, &format!("You picked {color}"))
}

async fn colors_color(router: &Router, agent: &Agent, delivery: Delivery) -> anyhow::Result<()> {
    let color = delivery.message.content().unwrap_or_default();
    delivery.contact.set("color", color).await?;
    delivery.contact.set("step", "animal").await?;
    agent.basic_message(delivery.peer(), "And your favourite animal?")?;
    router.engage_named_handler(delivery.peer(), BASIC_MESSAGE, COLORS_ANIMAL)?;
    Ok(())
}

async fn colors_animal(agent: &Agent, delivery: Delivery) -> anyhow::Result<()> {
    let animal = delivery.message.content().unwrap_or_default();
    let color: String = delivery
        .contact
        .get_as("color")
        .await?
        .context("colour answer missing from contact context")?;
    delivery.contact.set("animal", animal).await?;
    delivery.contact.set("step", "done").await?;
    agent.basic_message(delivery.peer(), &format!("A {color} {animal}, noted."))
}

fn request_profile(agent: &Agent, delivery: &Delivery) -> anyhow::Result<()> {
    let mut reply = Message::new(PROFILE, &agent.did)
        .with_id(new_id())
        .with_field("to", json!([delivery.peer()]))
        .with_field("lang", json!("en"))
        .with_body(json!({ "profile": { "displayName": agent.label } }));
    if let Some(id) = &delivery.message.id {
        reply = reply.with_thid(id);
    }
    info!(to = %delivery.peer(), "answering profile request");
    agent.outbox.send(reply)
}
