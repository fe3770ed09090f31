//! Command implementations
//!
//! Each module backs one subcommand of the `telegram_tools` CLI and one
//! standalone binary under `src/bin/`.

pub mod chatlog;
pub mod chatwipe;
pub mod ddns;
pub mod graph;
pub mod intersection;
pub mod login;

use clap::Args;
use tracing::error;

use crate::collector::{parse_date, FetchWindow};
use crate::config::TelegramConfig;
use crate::error::{Error, Result};

/// Telegram credentials that override `config.yml`.
#[derive(Debug, Clone, Default, Args)]
pub struct TelegramArgs {
    /// Registered phone number
    #[arg(long, env = "TELEGRAM_PHONE")]
    pub phone: Option<String>,

    /// Telegram API ID
    #[arg(long, env = "TELEGRAM_API_ID")]
    pub api_id: Option<i32>,

    /// Telegram API hash
    #[arg(long, env = "TELEGRAM_API_HASH")]
    pub api_hash: Option<String>,

    /// Session name (file is `<name>.session`)
    #[arg(long, env = "TELEGRAM_SESSION")]
    pub session: Option<String>,
}

impl TelegramArgs {
    pub fn apply(&self, config: &TelegramConfig) -> TelegramConfig {
        let mut config = config.clone();
        if let Some(phone) = &self.phone {
            config.phone = phone.clone();
        }
        if let Some(api_id) = self.api_id {
            config.api_id = api_id;
        }
        if let Some(api_hash) = &self.api_hash {
            config.api_hash = api_hash.clone();
        }
        if let Some(session) = &self.session {
            config.session_name = session.clone();
        }
        config
    }

    /// Fill unset fields from `<PREFIX>_PHONE`, `<PREFIX>_API_ID`, `<PREFIX>_API_HASH`.
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();
        if self.phone.is_none() {
            self.phone = var("PHONE");
        }
        if self.api_id.is_none() {
            self.api_id = var("API_ID").and_then(|v| v.parse().ok());
        }
        if self.api_hash.is_none() {
            self.api_hash = var("API_HASH");
        }
        self
    }
}

/// Exit with the error's sysexits code after logging it.
pub fn finish<T>(result: Result<T>) {
    if let Err(err) = result {
        error!("{}", err);
        std::process::exit(err.exit_code());
    }
}

/// Build a whole-day window from optional `YYYY-MM-DD` bounds.
pub fn window_from_args(since: Option<&str>, until: Option<&str>) -> Result<FetchWindow> {
    let since = since.map(parse_date).transpose()?;
    let until = until.map(parse_date).transpose()?;
    FetchWindow::from_dates(since, until)
}

/// Like [`window_from_args`], but a lower bound is mandatory.
pub fn bounded_window(since: Option<&str>, until: Option<&str>) -> Result<FetchWindow> {
    if since.is_none() {
        return Err(Error::InvalidArgument(
            "--since is required in history mode".to_string(),
        ));
    }
    window_from_args(since, until)
}
