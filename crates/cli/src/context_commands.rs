use {clap::Subcommand, parley_config::ParleyConfig, parley_context::ContextStore};

use crate::store::open_store;

#[derive(Subcommand)]
pub enum ContextAction {
    /// List namespaces that hold at least one entry.
    Namespaces,
    /// Show every entry in a namespace (e.g. `contact:did:example:alice`).
    List { namespace: String },
    /// Delete every entry in a namespace.
    Clear { namespace: String },
}

pub async fn handle_context(action: ContextAction, config: &ParleyConfig) -> anyhow::Result<()> {
    let store = open_store(&config.context).await?;
    if store.backend() == "memory" {
        eprintln!("note: the memory backend starts empty; configure sqlite to inspect saved state");
    }
    run(action, &*store).await
}

async fn run(action: ContextAction, store: &dyn ContextStore) -> anyhow::Result<()> {
    match action {
        ContextAction::Namespaces => {
            let namespaces = store.namespaces().await?;
            if namespaces.is_empty() {
                println!("No namespaces.");
            }
            for ns in namespaces {
                println!("{ns}");
            }
        },
        ContextAction::List { namespace } => {
            let entries = store.list(&namespace).await?;
            if entries.is_empty() {
                println!("No entries in {namespace}.");
            }
            for entry in entries {
                println!("{} = {}  (updated {})", entry.key, entry.value, entry.updated_at);
            }
        },
        ContextAction::Clear { namespace } => {
            let removed = store.clear(&namespace).await?;
            println!("Removed {removed} entries from {namespace}.");
        },
    }
    Ok(())
}
