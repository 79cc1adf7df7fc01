use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    parley_common::Message,
    parley_config::ParleyConfig,
    parley_routing::{Router, TokioSpawner},
    tokio::{
        io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
        sync::mpsc,
    },
    tracing::{debug, info, warn},
};

use crate::{
    demo::{self, Agent, Outbox},
    store::open_store,
};

#[derive(clap::Args)]
pub struct RunArgs {
    /// Read messages from this file instead of stdin (one JSON object per line).
    #[arg(long)]
    input: Option<PathBuf>,
    /// Our own DID, used as `from` on outbound messages.
    #[arg(long, env = "PARLEY_DID", default_value = "did:example:parley")]
    did: String,
    /// How long to keep draining handler output after input ends.
    #[arg(long, default_value_t = 500)]
    grace_ms: u64,
}

/// Counters reported when a run finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub routed: usize,
    pub rejected: usize,
    pub sent: usize,
}

pub async fn handle_run(args: RunArgs, config: &ParleyConfig) -> anyhow::Result<()> {
    let store = open_store(&config.context).await?;
    let router = Router::builder(store, Arc::new(TokioSpawner::new()))
        .wait_timeout(config.routing.wait_timeout())
        .build();

    let (outbox, rx) = Outbox::channel();
    demo::install(&router, Arc::new(Agent {
        did: args.did,
        label: config.agent.label.clone(),
        outbox,
    }))?;
    info!(routes = router.routes().len(), "agent ready for messages");

    let grace = Duration::from_millis(args.grace_ms);
    let mut stdout = tokio::io::stdout();
    let stats = match args.input {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| anyhow::anyhow!("failed to open {}: {e}", path.display()))?;
            drive(&router, BufReader::new(file), rx, &mut stdout, grace).await?
        },
        None => drive(&router, BufReader::new(tokio::io::stdin()), rx, &mut stdout, grace).await?,
    };

    info!(
        routed = stats.routed,
        rejected = stats.rejected,
        sent = stats.sent,
        "input finished"
    );
    Ok(())
}

/// Route every input line and write outbound messages as JSON lines.
///
/// Outbound messages are written as soon as handlers produce them. Once the
/// input ends, output keeps draining for `grace` so in-flight handlers can
/// finish.
pub async fn drive<R, W>(
    router: &Router,
    input: R,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    out: &mut W,
    grace: Duration,
) -> anyhow::Result<RunStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = RunStats::default();
    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => route_line(router, &line, &mut stats),
                None => break,
            },
            Some(message) = outbound.recv() => {
                write_message(out, &message).await?;
                stats.sent += 1;
            },
        }
    }

    let deadline = tokio::time::sleep(grace);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            message = outbound.recv() => match message {
                Some(message) => {
                    write_message(out, &message).await?;
                    stats.sent += 1;
                },
                None => break,
            },
        }
    }
    Ok(stats)
}

fn route_line(router: &Router, line: &str, stats: &mut RunStats) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "skipping malformed input line");
            stats.rejected += 1;
            return;
        },
    };
    match router.route_value(value) {
        Ok(dispatch) => {
            debug!(path = dispatch.path(), "routed");
            stats.routed += 1;
        },
        Err(e) => {
            warn!(error = %e, "skipping invalid message");
            stats.rejected += 1;
        },
    }
}

async fn write_message<W: AsyncWrite + Unpin>(out: &mut W, message: &Message) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    out.write_all(&line).await?;
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::demo::{BASIC_MESSAGE, PROFILE, REQUEST_PROFILE},
        parley_context::{ContextStore, InMemoryContextStore},
        serde_json::json,
    };

    fn agent_router() -> (Router, mpsc::UnboundedReceiver<Message>) {
        let store: Arc<dyn ContextStore> = Arc::new(InMemoryContextStore::new());
        let router = Router::new(store, Arc::new(TokioSpawner::new()));
        let (outbox, rx) = Outbox::channel();
        demo::install(&router, Arc::new(Agent {
            did: "did:example:parley".into(),
            label: "Parley".into(),
            outbox,
        }))
        .unwrap();
        (router, rx)
    }

    fn line(value: serde_json::Value) -> String {
        format!("{value}\n")
    }

    fn decode(out: &[u8]) -> Vec<Message> {
        String::from_utf8_lossy(out)
            .lines()
            .map(|l| Message::from_json(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let (router, rx) = agent_router();
        let input = [
            "not json\n".to_string(),
            "\n".to_string(),
            line(json!({ "type": BASIC_MESSAGE })),
            line(json!({ "type": REQUEST_PROFILE, "from": "did:a", "id": "r1" })),
        ]
        .concat();

        let mut out = Vec::new();
        let stats = drive(&router, input.as_bytes(), rx, &mut out, Duration::from_millis(200))
            .await
            .unwrap();

        assert_eq!(stats.routed, 1);
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.sent, 1);
        let sent = decode(&out);
        assert_eq!(sent[0].msg_type, PROFILE);
        assert_eq!(sent[0].thid.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn count_process_waits_for_the_colour() {
        let (router, rx) = agent_router();
        let input = [
            line(json!({ "type": BASIC_MESSAGE, "from": "did:a", "body": { "content": "count" } })),
        ]
        .concat();

        // Feed the question first, then answer once the handler is waiting.
        let r = router.clone();
        let answer = tokio::spawn(async move {
            while !r.is_waiting("did:a", BASIC_MESSAGE) {
                tokio::task::yield_now().await;
            }
            r.route_message(
                Message::new(BASIC_MESSAGE, "did:a").with_body(json!({ "content": "red" })),
            )
            .unwrap()
        });

        let mut out = Vec::new();
        let stats = drive(&router, input.as_bytes(), rx, &mut out, Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(answer.await.unwrap(), parley_routing::Dispatch::Awaited);

        let contents: Vec<String> = decode(&out)
            .iter()
            .filter_map(|m| m.content().map(str::to_string))
            .collect();
        assert_eq!(contents, ["Send a basicmessage with color", "You picked red"]);
        assert_eq!(stats.sent, 2);
    }
}
