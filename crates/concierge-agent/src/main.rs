//! # concierge-agent
//!
//! Interactive shopping assistant CLI — wires the reasoning engine, tool
//! registry, and checkpoint store into a [`DialogMachine`] and drives it
//! from a terminal loop. Sensitive tool batches pause for a y/n decision
//! at the prompt; a thread suspended in a previous run asks for that
//! decision again on startup.

#![deny(unsafe_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use concierge_core::events::AgentEvent;
use concierge_core::ids::ThreadId;
use concierge_core::messages::ToolCall;
use concierge_core::state::UserProfile;
use concierge_llm::openai::OpenAiProvider;
use concierge_runtime::adapter::Adapter;
use concierge_runtime::{DialogMachine, TurnOutcome};
use concierge_store::CheckpointStore;
use concierge_tools::{ToolRegistry, db};

/// Concierge shopping assistant.
#[derive(Parser, Debug)]
#[command(name = "concierge-agent", about = "Interactive shopping assistant")]
struct Cli {
    /// Path to the shop `SQLite` database.
    #[arg(long)]
    shop_db: Option<PathBuf>,

    /// Path to the conversation checkpoint `SQLite` database.
    #[arg(long)]
    state_db: Option<PathBuf>,

    /// Chat completions base URL (OpenAI-compatible).
    #[arg(long, default_value = "https://api.openai.com/v1")]
    base_url: String,

    /// Model to complete with.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,

    /// Environment variable holding the API key.
    #[arg(long, default_value = "OPENAI_API_KEY")]
    api_key_env: String,

    /// Resume an existing thread instead of creating a new one.
    #[arg(long)]
    thread: Option<String>,

    /// Shop account ID for the session user.
    #[arg(long, default_value = "1")]
    user_id: i64,

    /// Display name for the session user.
    #[arg(long, default_value = "Alex")]
    user_name: String,

    /// Delivery address on file for the session user.
    #[arg(long)]
    address: Option<String>,
}

impl Cli {
    fn default_db_path(file: &str) -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".concierge").join(file)
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn prompt(label: &str) -> Result<()> {
    print!("{label}");
    std::io::stdout().flush().context("Failed to flush stdout")?;
    Ok(())
}

fn print_suspended(tool_calls: &[ToolCall]) {
    println!("The assistant wants to run the following sensitive actions:");
    for call in tool_calls {
        let args =
            serde_json::to_string(&call.arguments).unwrap_or_else(|_| "{}".to_string());
        println!("  - {} {args}", call.name);
    }
}

/// Drive a turn outcome to rest, prompting for approve/deny as needed.
async fn settle(
    machine: &DialogMachine,
    thread_id: &ThreadId,
    lines: &mut Lines<BufReader<Stdin>>,
    mut outcome: TurnOutcome,
) -> Result<()> {
    loop {
        match outcome {
            TurnOutcome::Reply { context, content } => {
                println!("[{context}] {content}");
                return Ok(());
            }
            TurnOutcome::Suspended { ref tool_calls, .. } => {
                print_suspended(tool_calls);
                prompt("Approve? [y/N] ")?;
                let answer = lines.next_line().await?.unwrap_or_default();
                let next = if answer.trim().eq_ignore_ascii_case("y") {
                    machine.approve(thread_id).await
                } else {
                    prompt("Reason for denying (optional): ")?;
                    let reason = lines.next_line().await?.unwrap_or_default();
                    let reason = if reason.trim().is_empty() {
                        "No reason given".to_string()
                    } else {
                        reason.trim().to_string()
                    };
                    machine.deny(thread_id, &reason).await
                };
                match next {
                    Ok(o) => outcome = o,
                    Err(e) => {
                        eprintln!("error: {e}");
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn run_repl(machine: &DialogMachine, thread_id: &ThreadId) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // A thread suspended in a previous run still needs its decision.
    let state = machine.store().load(thread_id)?;
    if let Some(pending) = &state.pending {
        println!("This thread is awaiting a decision from a previous session.");
        let outcome = TurnOutcome::Suspended {
            context: pending.context,
            tool_calls: pending.tool_calls.clone(),
        };
        settle(machine, thread_id, &mut lines, outcome).await?;
    }

    println!("Type a message, or /quit to exit.");
    loop {
        prompt("you> ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/exit" {
            break;
        }
        match machine.handle_message(thread_id, line).await {
            Ok(outcome) => settle(machine, thread_id, &mut lines, outcome).await?,
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

/// Print context transitions and tool executions as they happen.
fn spawn_event_printer(machine: &DialogMachine) {
    let mut rx = machine.emitter().subscribe();
    drop(tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                AgentEvent::ContextEntered { context, .. } => {
                    println!("  (entering {context} assistant)");
                }
                AgentEvent::ContextLeft { resumed, .. } => {
                    println!("  (back to {resumed} assistant)");
                }
                AgentEvent::ToolExecutionStart { tool_name, .. } => {
                    println!("  (running {tool_name})");
                }
                _ => {}
            }
        }
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let shop_path = args
        .shop_db
        .unwrap_or_else(|| Cli::default_db_path("shop.db"));
    let state_path = args
        .state_db
        .unwrap_or_else(|| Cli::default_db_path("threads.db"));
    ensure_parent_dir(&shop_path)?;
    ensure_parent_dir(&state_path)?;

    let shop_pool = db::new_file(
        &shop_path.to_string_lossy(),
        &db::ConnectionConfig::default(),
    )
    .context("Failed to open shop database")?;
    let shop_conn = shop_pool.get().context("Failed to get shop connection")?;
    db::seed_demo_data(&shop_conn).context("Failed to seed shop database")?;
    drop(shop_conn);

    let store_pool = concierge_store::connection::new_file(
        &state_path.to_string_lossy(),
        &concierge_store::connection::ConnectionConfig::default(),
    )
    .context("Failed to open checkpoint database")?;
    let store = CheckpointStore::new(store_pool);

    let api_key = std::env::var(&args.api_key_env)
        .with_context(|| format!("{} is not set", args.api_key_env))?;
    let provider = Arc::new(OpenAiProvider::new(args.base_url, api_key, args.model));

    let registry = Arc::new(ToolRegistry::with_catalog(shop_pool));
    let machine = DialogMachine::new(Adapter::new(provider), registry, store);

    let thread_id = match args.thread {
        Some(id) => {
            let thread_id = ThreadId::from(id);
            // Fail fast on unknown or incompatible threads.
            let _ = machine.store().load(&thread_id)?;
            thread_id
        }
        None => {
            let mut user = UserProfile::new(args.user_id, args.user_name);
            user.address = args.address;
            let thread_id = machine.create_thread(&user)?;
            println!("New thread: {thread_id}");
            thread_id
        }
    };

    spawn_event_printer(&machine);
    run_repl(&machine, &thread_id).await
}
