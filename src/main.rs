#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::style)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::Level;

use substation::cli::{Args, Command, UserCommand, prompt_select};
use substation::fetch::{SubStoreClient, share_url};
use substation::model::{SyncResult, unbound_tokens};
use substation::scheduler;
use substation::settings::{Settings, expand_tilde};
use substation::store::{FileStore, KvStore, KvStoreExt, MemoryStore, keys};
use substation::sync::{SyncEngine, log};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let is_verbose = args.verbose;
    tracing_subscriber::fmt()
        .with_max_level(if is_verbose {
            Level::TRACE
        } else {
            Level::INFO
        })
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = Settings::load(args.config.as_deref()).await?;
    let store = open_store(&settings).await?;
    let client = SubStoreClient::new(Duration::from_millis(settings.fetch_timeout_ms))?;
    let engine = SyncEngine::new(store, client, settings);

    match args.command {
        Command::Sync => run_sync(&engine).await,
        Command::SyncUser { username } => run_sync_user(&engine, &username).await,
        Command::SyncAll => run_sync_all(&engine).await,
        Command::Watch { interval_minutes } => run_watch(&engine, interval_minutes).await,
        Command::Status => run_status(&engine).await,
        Command::Tokens => run_tokens(&engine).await,
        Command::User(command) => run_user(&engine, command).await,
    }
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn KvStore>> {
    match settings.data_file.as_deref() {
        None | Some("memory") => {
            tracing::debug!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        Some(path) => {
            let expanded = expand_tilde(path);
            tracing::debug!("Opening store file: {}", expanded);
            let store = FileStore::open(expanded).await?;
            Ok(Arc::new(store))
        }
    }
}

async fn run_sync(engine: &SyncEngine) -> Result<()> {
    let outcome = engine.sync_global().await;
    if !outcome.success {
        bail!(
            "Sync failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    println!("Synced {} nodes", outcome.node_count.unwrap_or(0));
    if let Some(expire) = outcome.earliest_expire {
        println!("Earliest expiry: {}", expire);
    }
    if let Some(gb) = outcome.total_remain_gb {
        println!("Remaining traffic: {} GB", gb);
    }
    if let Some(invalid) = outcome.invalid_lines
        && invalid > 0
    {
        println!("Rejected lines: {}", invalid);
    }
    Ok(())
}

async fn run_sync_user(engine: &SyncEngine, username: &str) -> Result<()> {
    let outcome = engine.sync_user(username).await;
    if !outcome.success {
        bail!(
            "Sync for '{}' failed: {}",
            username,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    println!(
        "Synced {} nodes for '{}'",
        outcome.node_count.unwrap_or(0),
        username
    );
    Ok(())
}

async fn run_sync_all(engine: &SyncEngine) -> Result<()> {
    let outcome = engine.sync_all_users().await;
    println!(
        "Synced {}/{} bound users ({} scanned)",
        outcome.success, outcome.synced, outcome.total
    );
    if outcome.failed > 0 {
        bail!("{} user syncs failed", outcome.failed);
    }
    Ok(())
}

async fn run_watch(engine: &SyncEngine, interval_minutes: Option<u64>) -> Result<()> {
    if let Some(minutes) = interval_minutes {
        engine.enable_auto_sync(minutes).await?;
    }
    let config = engine.auto_sync_config().await?;
    if !config.enabled {
        bail!("Auto-sync is disabled; pass --interval-minutes to enable it");
    }

    scheduler::run(engine).await;
    Ok(())
}

async fn run_status(engine: &SyncEngine) -> Result<()> {
    let result: Option<SyncResult> = engine.store().get_json(keys::SYNC_RESULT).await?;
    match result {
        Some(result) => {
            println!("Last sync: {}", result.last_sync);
            println!("Nodes: {} ({})", result.node_count, result.protocols);
            if let Some(expire) = &result.earliest_expire {
                println!("Earliest expiry: {}", expire);
            }
            if let Some(gb) = result.total_remain_gb {
                println!("Remaining traffic: {} GB", gb);
            }
        }
        None => println!("No successful sync recorded yet"),
    }

    let entries = log::entries(engine.store()).await;
    if !entries.is_empty() {
        println!("\nRecent syncs:");
        for entry in entries {
            if entry.success {
                println!(
                    "  {}  ok, {} nodes",
                    entry.timestamp,
                    entry.node_count.unwrap_or(0)
                );
            } else {
                println!(
                    "  {}  failed: {}",
                    entry.timestamp,
                    entry.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
    Ok(())
}

async fn run_tokens(engine: &SyncEngine) -> Result<()> {
    let tokens = engine.list_upstream_tokens().await?;
    if tokens.is_empty() {
        println!("No tokens on the upstream backend");
        return Ok(());
    }

    let users = engine.list_users().await?;
    let unbound: Vec<&str> = unbound_tokens(&tokens, &users)
        .into_iter()
        .map(|token| token.token.as_str())
        .collect();

    println!("{} upstream tokens, {} unbound:", tokens.len(), unbound.len());
    for token in &tokens {
        let state = if unbound.contains(&token.token.as_str()) {
            "unbound"
        } else {
            "bound"
        };
        match &token.name {
            Some(name) => println!("  {}  ({})  {}", token.token, name, state),
            None => println!("  {}  {}", token.token, state),
        }
    }
    Ok(())
}

async fn run_user(engine: &SyncEngine, command: UserCommand) -> Result<()> {
    match command {
        UserCommand::Add { username } => {
            let user = engine.create_user(&username).await?;
            println!("Created user '{}'", user.username);
            Ok(())
        }
        UserCommand::List => run_user_list(engine).await,
        UserCommand::Bind {
            username,
            collection,
            token,
        } => run_user_bind(engine, &username, collection, token).await,
        UserCommand::Unbind { username } => {
            engine.unbind_user(&username).await?;
            println!("Removed binding for '{}'", username);
            Ok(())
        }
        UserCommand::Url { username } => run_user_url(engine, &username).await,
    }
}

async fn run_user_list(engine: &SyncEngine) -> Result<()> {
    let users = engine.list_users().await?;
    if users.is_empty() {
        println!("No users");
        return Ok(());
    }

    for user in users {
        let binding = match &user.binding {
            Some(binding) => format!("{} / {}", binding.collection, binding.token),
            None => "unbound".to_string(),
        };
        let last = match &user.last_sync_result {
            Some(result) => format!("{} nodes at {}", result.node_count, result.last_sync),
            None => "never synced".to_string(),
        };
        println!("{}  [{}]  {}", user.username, binding, last);
    }
    Ok(())
}

async fn run_user_bind(
    engine: &SyncEngine,
    username: &str,
    collection: Option<String>,
    token: Option<String>,
) -> Result<()> {
    let collection = match collection {
        Some(collection) => collection,
        None => {
            let collections = engine.list_upstream_collections().await?;
            let names: Vec<String> = collections.into_iter().map(|c| c.name).collect();
            let Some(name) = prompt_select("Select a collection", &names) else {
                println!("Cancelled");
                return Ok(());
            };
            name
        }
    };

    let token = match token {
        Some(token) => token,
        None => {
            let tokens = engine.list_upstream_tokens().await?;
            let users = engine.list_users().await?;
            let values: Vec<String> = unbound_tokens(&tokens, &users)
                .into_iter()
                .map(|token| token.token.clone())
                .collect();
            let Some(value) = prompt_select("Select an unbound token", &values) else {
                println!("Cancelled");
                return Ok(());
            };
            value
        }
    };

    engine.bind_user(username, &collection, &token).await?;
    println!("Bound '{}' to collection '{}'", username, collection);
    Ok(())
}

async fn run_user_url(engine: &SyncEngine, username: &str) -> Result<()> {
    let user = engine
        .get_user(username)
        .await?
        .with_context(|| format!("Unknown user '{}'", username))?;
    let binding = user
        .binding
        .with_context(|| format!("User '{}' has no subscription binding", username))?;
    let base_url = engine
        .resolve_base_url()
        .await?
        .context("No Sub-Store URL configured")?;

    println!("{}", share_url(&base_url, &binding.collection, &binding.token));
    Ok(())
}
