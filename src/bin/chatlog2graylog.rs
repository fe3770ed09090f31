//! Forward Telegram chat messages to Graylog as GELF

use clap::Parser;
use std::path::PathBuf;

use telegram_tools::commands::{chatlog, finish};
use telegram_tools::{init_logging, Config};

#[derive(Parser)]
#[command(name = "chatlog2graylog")]
#[command(about = "Forward Telegram chat messages to Graylog as GELF", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.yml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    args: chatlog::ChatlogArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match Config::load_from(cli.config.as_deref()) {
        Ok(config) => chatlog::run(&cli.args, &config).await,
        Err(err) => Err(err),
    };
    finish(result);
}
