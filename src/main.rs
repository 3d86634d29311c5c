//! Telegram MCP Server
//!
//! This binary runs an MCP server that exposes Telegram messaging commands
//! via stdin/stdout transport. Logging and interactive login prompts go to
//! stderr; stdout carries the MCP protocol only.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tg_mcp::backend::{ApiCredentials, BackendConnector};
use tg_mcp::prompt::ConsolePrompt;
use tg_mcp::session::{reconcile, ReconcileOptions, SessionManager};
use tg_mcp::store::RecordStore;
use tg_mcp::{CommandDispatcher, TgMcpServer};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tg-mcp", version, about = "Telegram MCP Server")]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct CommonArgs {
    /// Directory holding persisted session records
    #[arg(long, env = "TG_MCP_SESSION_DIR", default_value = "./tg-sessions")]
    session_dir: PathBuf,

    /// Telegram application api_id (from my.telegram.org)
    #[arg(long, env = "TG_API_ID")]
    api_id: Option<i32>,

    /// Telegram application api_hash (from my.telegram.org)
    #[arg(long, env = "TG_API_HASH")]
    api_hash: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server over stdio (default)
    Serve(ServeArgs),
    /// Log one session in interactively, then exit
    Login(LoginArgs),
    /// List persisted session records
    Sessions,
}

#[derive(Args)]
struct ServeArgs {
    /// Skip the startup scan of persisted session records
    #[arg(long)]
    skip_reconcile: bool,

    /// Exercise one persisted record against the backend at startup
    #[arg(long)]
    probe: bool,

    /// Wall-clock bound for the startup probe, in seconds
    #[arg(long, default_value_t = 30)]
    probe_timeout_secs: u64,
}

#[derive(Args)]
struct LoginArgs {
    /// Session identifier (international phone number)
    session: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging to stderr (stdout is used for MCP protocol)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tg_mcp=info")))
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve(ServeArgs {
        skip_reconcile: false,
        probe: false,
        probe_timeout_secs: 30,
    })) {
        Command::Serve(args) => run_server(&cli.common, args).await,
        Command::Login(args) => run_login(&cli.common, args).await,
        Command::Sessions => run_sessions(&cli.common).await,
    }
}

/// Credentials must come as a pair: one half configured without the other is
/// a deployment mistake worth failing loudly on.
fn credentials(common: &CommonArgs) -> anyhow::Result<Option<ApiCredentials>> {
    match (common.api_id, common.api_hash.as_deref()) {
        (Some(api_id), Some(api_hash)) => Ok(Some(ApiCredentials {
            api_id,
            api_hash: api_hash.to_string(),
        })),
        (None, None) => Ok(None),
        (Some(_), None) => anyhow::bail!("TG_API_ID is set but TG_API_HASH is missing"),
        (None, Some(_)) => anyhow::bail!("TG_API_HASH is set but TG_API_ID is missing"),
    }
}

#[cfg(feature = "grammers")]
fn make_connector(
    credentials: Option<ApiCredentials>,
) -> anyhow::Result<Arc<dyn BackendConnector>> {
    Ok(Arc::new(tg_mcp::backend::grammers::GrammersConnector::new(
        credentials,
    )))
}

#[cfg(not(feature = "grammers"))]
fn make_connector(
    _credentials: Option<ApiCredentials>,
) -> anyhow::Result<Arc<dyn BackendConnector>> {
    anyhow::bail!(
        "this build has no backend; rebuild with `--features grammers` to connect to Telegram"
    )
}

fn build_manager(common: &CommonArgs) -> anyhow::Result<Arc<SessionManager>> {
    let credentials = credentials(common)?;
    let connector = make_connector(credentials.clone())?;
    let store = Arc::new(RecordStore::new(&common.session_dir));
    let prompt = Arc::new(ConsolePrompt::new());
    if credentials.is_none() {
        info!("no API credentials configured; only saved sessions can be used");
    }
    Ok(Arc::new(SessionManager::new(
        store, connector, prompt, credentials,
    )))
}

async fn run_server(common: &CommonArgs, args: ServeArgs) -> anyhow::Result<()> {
    info!("Starting Telegram MCP server");
    let manager = build_manager(common)?;

    if !args.skip_reconcile {
        let options = ReconcileOptions {
            probe: args.probe,
            probe_timeout: Duration::from_secs(args.probe_timeout_secs),
        };
        let report = reconcile(&manager, &options).await;
        info!(sessions = report.sessions.len(), "startup reconciliation done");
    }

    let dispatcher = Arc::new(CommandDispatcher::new(manager));
    let server = TgMcpServer::new(dispatcher);

    info!("MCP server listening on stdio");
    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP service")?;
    service.waiting().await?;
    info!("MCP server stopped");
    Ok(())
}

async fn run_login(common: &CommonArgs, args: LoginArgs) -> anyhow::Result<()> {
    let manager = build_manager(common)?;
    let handle = manager
        .acquire(&args.session)
        .await
        .with_context(|| format!("login failed for {}", args.session))?;
    println!("logged in: {}", handle.session_id());
    Ok(())
}

async fn run_sessions(common: &CommonArgs) -> anyhow::Result<()> {
    let store = RecordStore::new(&common.session_dir);
    let sessions = store.list_valid().await?;
    if sessions.is_empty() {
        println!("no persisted sessions in {}", store.dir().display());
        return Ok(());
    }
    for session in sessions {
        println!("{session}");
    }
    Ok(())
}
