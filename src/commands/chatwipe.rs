//! Chat history eraser
//!
//! Lists or deletes the account's own messages in the chosen megagroups
//! within a date window.

use std::io::{self, Write};

use clap::{Args, ValueEnum};
use tracing::{info, warn};

use crate::chat::{choose_peers, list_megagroups, ChannelRef, DIALOG_SCAN_LIMIT};
use crate::collector::{delete_in_chunks, Collector, FetchWindow, MessageSink, MessageSource};
use crate::commands::{window_from_args, TelegramArgs};
use crate::config::Config;
use crate::error::Result;
use crate::history::TelegramHistory;
use crate::session::{get_client, SessionLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum WipeMode {
    /// Print the messages that would be deleted
    #[default]
    List,
    /// Delete them
    Delete,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ChatwipeArgs {
    #[command(flatten)]
    pub telegram: TelegramArgs,

    /// Oldest day to include (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<String>,

    /// Newest day to include (YYYY-MM-DD), defaults to now
    #[arg(long)]
    pub until: Option<String>,

    /// Operating mode
    #[arg(long, value_enum, default_value_t = WipeMode::List)]
    pub mode: WipeMode,

    /// Megagroup id(s); asks interactively when omitted or unknown
    #[arg(long, value_delimiter = ',')]
    pub peer: Vec<i64>,
}

/// Result of wiping one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WipeReport {
    pub found: usize,
    pub deleted: usize,
}

/// Collect the window from `peer`, then list or delete what was found.
pub async fn wipe_peer<H, W>(
    history: &H,
    collector: &Collector,
    peer: &ChannelRef,
    window: &FetchWindow,
    mode: WipeMode,
    chunk_size: usize,
    out: &mut W,
) -> Result<WipeReport>
where
    H: MessageSource + MessageSink + Sync,
    W: Write,
{
    info!("Peer: {}", peer.title);
    let items = collector.collect(history, peer, window).await?;
    let mut report = WipeReport {
        found: items.len(),
        deleted: 0,
    };

    match mode {
        WipeMode::List => {
            for item in &items {
                writeln!(out, "{}", item.render())?;
            }
        }
        WipeMode::Delete => {
            if !items.is_empty() {
                warn!("Going to delete among {} messages", items.len());
            }
            let ids: Vec<i32> = items.iter().map(|item| item.id).collect();
            report.deleted = delete_in_chunks(history, peer, &ids, chunk_size).await?;
        }
    }

    Ok(report)
}

pub async fn run(args: &ChatwipeArgs, config: &Config) -> Result<()> {
    let window = window_from_args(args.since.as_deref(), args.until.as_deref())?;
    let collector = Collector::from_config(&config.collector)?;
    let telegram = args.telegram.apply(&config.telegram);

    let _lock = SessionLock::for_session(&telegram)?;
    let client = get_client(&telegram).await?;

    let candidates = list_megagroups(&client, DIALOG_SCAN_LIMIT).await?;
    let peers = choose_peers(
        &candidates,
        &args.peer,
        &mut io::BufReader::new(io::stdin()),
        &mut io::stdout(),
    )?;

    let history = TelegramHistory::own_messages(&client);
    let mut out = io::stdout();
    let mut total = WipeReport::default();

    for peer in &peers {
        let report = wipe_peer(
            &history,
            &collector,
            peer,
            &window,
            args.mode,
            config.collector.delete_chunk_size,
            &mut out,
        )
        .await?;
        total.found += report.found;
        total.deleted += report.deleted;
    }

    info!(
        found = total.found,
        deleted = total.deleted,
        "Processed {} peer(s)",
        peers.len()
    );
    Ok(())
}
