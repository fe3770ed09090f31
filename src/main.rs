//! Telegram tools CLI - main entry point
//!
//! One binary for every tool; the standalone binaries under `src/bin/` run
//! the same commands.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use telegram_tools::commands::{chatlog, chatwipe, ddns, graph, intersection, login};
use telegram_tools::error::exit_code_for;
use telegram_tools::{init_logging, metrics, Config};
use tracing::{error, warn};

#[derive(Parser)]
#[command(name = "telegram_tools")]
#[command(about = "Telegram chat tools and a REG.RU dynamic DNS hook", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.yml (defaults to ./config.yml, then ../config.yml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the Telegram session file (login code and 2FA password)
    Login(login::LoginArgs),

    /// List or delete your own messages in megagroups
    Chatwipe(chatwipe::ChatwipeArgs),

    /// Forward chat messages to Graylog as GELF
    Chatlog(chatlog::ChatlogArgs),

    /// Report members shared between chats
    Intersection(intersection::IntersectionArgs),

    /// Render followed channels and their mentions as PlantUML
    Graph(graph::GraphArgs),

    /// Update the REG.RU A record from a network hook
    Ddns(ddns::DdnsArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Login(_) => "login",
            Commands::Chatwipe(_) => "chatwipe",
            Commands::Chatlog(_) => "chatlog",
            Commands::Intersection(_) => "intersection",
            Commands::Graph(_) => "graph",
            Commands::Ddns(_) => "ddns",
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(&cli).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    if let Err(err) = result {
        error!("{:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

async fn execute_command(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load_from(cli.config.as_deref())?;

    match &cli.command {
        Commands::Login(args) => login::run(args, &config).await?,
        Commands::Chatwipe(args) => chatwipe::run(args, &config).await?,
        Commands::Chatlog(args) => chatlog::run(args, &config).await?,
        Commands::Intersection(args) => intersection::run(args, &config).await?,
        Commands::Graph(args) => graph::run(args, &config).await?,
        Commands::Ddns(args) => {
            ddns::run(args, &config).await?;
        }
    }

    Ok(())
}
