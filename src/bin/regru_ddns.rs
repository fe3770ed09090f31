//! Update a REG.RU A record from a network interface hook

use clap::Parser;
use std::path::PathBuf;

use telegram_tools::commands::{ddns, finish};
use telegram_tools::{init_logging, Config};

#[derive(Parser)]
#[command(name = "regru_ddns")]
#[command(about = "Update a REG.RU A record from a network interface hook", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.yml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    args: ddns::DdnsArgs,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match Config::load_from(cli.config.as_deref()) {
        Ok(config) => ddns::run(&cli.args, &config).await,
        Err(err) => Err(err),
    };
    finish(result);
}
