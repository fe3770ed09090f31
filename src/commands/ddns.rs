//! REG.RU dynamic DNS hook

use clap::Args;
use tracing::info;

use crate::config::Config;
use crate::ddns::{DdnsUpdater, Outcome};
use crate::error::Result;

#[derive(Debug, Clone, Default, Args)]
pub struct DdnsArgs {
    /// Network interface reported by the hook
    pub interface: String,

    /// Hook action (`up`, `dhcp4-change`, ...)
    pub action: String,
}

pub async fn run(args: &DdnsArgs, config: &Config) -> Result<Outcome> {
    let updater = DdnsUpdater::new(config.ddns.clone())?;
    let outcome = updater.run(&args.interface, &args.action).await?;
    info!(?outcome, "DNS update finished");
    Ok(outcome)
}
