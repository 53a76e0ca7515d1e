//! Chatsync
//!
//! Line-oriented terminal front end for the chatsync core. Type a message to
//! send it; replies stream in as they arrive and every conversation is kept
//! in a local JSON file.
//!
//! # Usage
//!
//! ```bash
//! # Start with the default config ($XDG_CONFIG_HOME/chatsync/config.toml)
//! chatsync
//!
//! # Use a specific model and conversation file
//! chatsync --model gpt-4o-mini --store /tmp/conversations.json
//!
//! # With verbose logging (logs go to stderr)
//! RUST_LOG=debug chatsync
//! ```
//!
//! # Environment Variables
//!
//! - `CHATSYNC_CONFIG`: Config file path
//! - `CHATSYNC_MODEL`, `CHATSYNC_SYSTEM_PROMPT`, `CHATSYNC_TEMPERATURE`: Chat defaults
//! - `CHATSYNC_STORE_PATH`: Conversation file
//! - `GOOGLE_GENERATIVE_AI_API_KEY`, `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`,
//!   `OPENROUTER_API_KEY`: Provider credentials
//! - `RUST_LOG`: Log level (trace, debug, info, warn, error)

mod commands;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use chatsync_core::{
    load_config_from_path, ConfigSource, JsonFileStore, ModelRegistry, OpenAiCompatibleBackend,
    SyncEngine, SyncEvent, SyncMessage,
};

use crate::commands::Command;
use crate::render::{Renderer, View};

/// Streaming chat in the terminal
#[derive(Debug, Parser)]
#[command(name = "chatsync", version, about)]
struct Args {
    /// Config file (defaults to the XDG config location)
    #[arg(long, env = "CHATSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Model for new conversations
    #[arg(long)]
    model: Option<String>,

    /// Conversation file
    #[arg(long)]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout belongs to the conversation
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chatsync=info".parse()?)
                .add_directive("chatsync_core=info".parse()?),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config_path = args.config.or_else(chatsync_core::config::default_config_path);
    let (mut config, mut source) = load_config_from_path(config_path)?;
    if let Some(model) = args.model {
        config.model = model;
        source = ConfigSource::Cli;
    }
    if let Some(store) = args.store {
        config.store_path = Some(store);
        source = ConfigSource::Cli;
    }
    config.validate()?;
    info!(source = %source, model = %config.model, "Configuration loaded");

    let mut registry = ModelRegistry::builtin();
    // The engine reports an unsupported model; here it only marks /models
    let _ = registry.set_default_model(&config.model);
    let store_path = config
        .store_path
        .clone()
        .unwrap_or_else(JsonFileStore::default_path);
    let store = JsonFileStore::open(store_path, &registry);
    let backend = OpenAiCompatibleBackend::from_env(registry.clone());

    let (msg_tx, mut msg_rx) = mpsc::channel::<SyncMessage>(100);
    let mut engine = SyncEngine::new(backend, store, registry.clone(), config, msg_tx);
    let events = engine
        .event_sender()
        .ok_or_else(|| anyhow::anyhow!("Engine event bus closed before start"))?;

    let view = Arc::new(Mutex::new(View::default()));

    // Render engine messages until it says goodbye
    let render_view = Arc::clone(&view);
    let render_task = tokio::spawn(async move {
        let mut renderer = Renderer::new(std::io::stdout());
        while let Some(msg) = msg_rx.recv().await {
            let mut view = render_view.lock().await;
            match renderer.render(msg, &mut view) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!(error = %e, "Failed to write to terminal");
                    break;
                }
            }
        }
    });

    engine.start().await?;
    let engine_task = tokio::spawn(async move {
        if let Err(e) = engine.run().await {
            error!(error = %e, "Engine stopped with error");
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = signal::ctrl_c() => {
                info!("Received interrupt");
                None
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let event = match commands::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => match to_event(command, &view, &registry).await {
                Some(event) => event,
                None => continue,
            },
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };
        if events.send(event).await.is_err() {
            break;
        }
    }

    // The engine may already be gone if its bus closed
    let _ = events.send(SyncEvent::Shutdown).await;
    drop(events);
    engine_task.await?;
    render_task.await?;
    Ok(())
}

/// Turn a command into an engine event, handling local-only commands here
async fn to_event(
    command: Command,
    view: &Mutex<View>,
    registry: &ModelRegistry,
) -> Option<SyncEvent> {
    let view = view.lock().await;
    match command {
        Command::Send(content) => Some(SyncEvent::UserMessage { content }),
        Command::New => Some(SyncEvent::NewConversation),
        Command::List => Some(SyncEvent::ListConversations),
        Command::Switch(target) => match view.resolve(&target) {
            Some(id) => Some(SyncEvent::SelectConversation { id }),
            None => {
                println!("No conversation matches '{target}' (see /list)");
                None
            }
        },
        Command::Rename(title) => match view.active.clone() {
            Some(id) => Some(SyncEvent::RenameConversation { id, title }),
            None => {
                println!("No active conversation");
                None
            }
        },
        Command::Delete(target) => {
            let id = match target {
                Some(target) => view.resolve(&target),
                None => view.active.clone(),
            };
            match id {
                Some(id) => Some(SyncEvent::DeleteConversation { id }),
                None => {
                    println!("Nothing to delete");
                    None
                }
            }
        }
        Command::Model(model) => Some(SyncEvent::ChangeModel { model }),
        Command::Models => {
            for model in registry.models() {
                let marker = if model.id == registry.default_model() {
                    '*'
                } else {
                    ' '
                };
                println!(
                    "{marker} {:<40} {} ({})",
                    model.id,
                    model.name,
                    model.provider.display_name()
                );
            }
            None
        }
        Command::Help => {
            println!("{}", commands::HELP);
            None
        }
        Command::Quit => None,
    }
}
