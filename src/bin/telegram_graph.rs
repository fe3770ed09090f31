//! Render followed Telegram channels and their mentions as PlantUML

use clap::Parser;
use std::path::PathBuf;

use telegram_tools::commands::{graph, finish};
use telegram_tools::{init_logging, Config};

#[derive(Parser)]
#[command(name = "telegram_graph")]
#[command(about = "Render followed Telegram channels and their mentions as PlantUML", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.yml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    args: graph::GraphArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match Config::load_from(cli.config.as_deref()) {
        Ok(config) => graph::run(&cli.args, &config).await,
        Err(err) => Err(err),
    };
    finish(result);
}
