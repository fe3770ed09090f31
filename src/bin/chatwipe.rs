//! List or delete your own messages in Telegram megagroups

use clap::Parser;
use std::path::PathBuf;

use telegram_tools::commands::{chatwipe, finish};
use telegram_tools::{init_logging, Config};

#[derive(Parser)]
#[command(name = "chatwipe")]
#[command(about = "List or delete your own messages in Telegram megagroups", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.yml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    args: chatwipe::ChatwipeArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match Config::load_from(cli.config.as_deref()) {
        Ok(config) => chatwipe::run(&cli.args, &config).await,
        Err(err) => Err(err),
    };
    finish(result);
}
