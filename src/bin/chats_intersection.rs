//! Report members shared between Telegram chats

use clap::Parser;
use std::path::PathBuf;

use telegram_tools::commands::{intersection, finish};
use telegram_tools::{init_logging, Config};

#[derive(Parser)]
#[command(name = "chats_intersection")]
#[command(about = "Report members shared between Telegram chats", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.yml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    args: intersection::IntersectionArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match Config::load_from(cli.config.as_deref()) {
        Ok(config) => intersection::run(&cli.args, &config).await,
        Err(err) => Err(err),
    };
    finish(result);
}
