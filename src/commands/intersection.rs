//! Participant overlap report for the account's chats

use std::time::Duration;

use clap::Args;
use tracing::info;

use crate::chat::{list_channels, list_megagroups, ChannelRef, DIALOG_SCAN_LIMIT};
use crate::commands::TelegramArgs;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::intersection::{fetch_members, find_overlaps, render_yaml};
use crate::session::{get_client, SessionLock};

/// Pause between participant downloads of consecutive chats.
const CHAT_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default, Args)]
pub struct IntersectionArgs {
    #[command(flatten)]
    pub telegram: TelegramArgs,

    /// Chat ids to compare; every megagroup when omitted
    #[arg(short, long, value_delimiter = ',', num_args = 1..)]
    pub peers: Vec<i64>,

    /// Include the common users in the report
    #[arg(long, default_value_t = false)]
    pub show_users: bool,
}

/// The chats named in `peers` (in the requested order), or all megagroups.
pub fn pick_chats(
    megagroups: Vec<ChannelRef>,
    all_channels: &[ChannelRef],
    peers: &[i64],
) -> Result<Vec<ChannelRef>> {
    let chats: Vec<ChannelRef> = if peers.is_empty() {
        megagroups
    } else {
        peers
            .iter()
            .filter_map(|id| all_channels.iter().find(|c| c.id == *id).cloned())
            .collect()
    };

    if chats.len() < 2 {
        return Err(Error::NoMatchingPeer(format!(
            "at least two chats are needed, found {}",
            chats.len()
        )));
    }
    Ok(chats)
}

pub async fn run(args: &IntersectionArgs, config: &Config) -> Result<()> {
    let telegram = args.telegram.apply(&config.telegram);
    let _lock = SessionLock::for_session(&telegram)?;
    let client = get_client(&telegram).await?;

    let me = client.get_me().await?;
    let self_id = me.raw.id();

    let chats = if args.peers.is_empty() {
        pick_chats(list_megagroups(&client, DIALOG_SCAN_LIMIT).await?, &[], &[])?
    } else {
        let all: Vec<ChannelRef> = list_channels(&client, usize::MAX)
            .await?
            .into_iter()
            .map(|(_, channel)| channel)
            .collect();
        pick_chats(Vec::new(), &all, &args.peers)?
    };

    let mut members = Vec::with_capacity(chats.len());
    for (idx, chat) in chats.iter().enumerate() {
        if idx > 0 {
            tokio::time::sleep(CHAT_PAUSE).await;
        }
        members.push(fetch_members(&client, chat, self_id).await?);
    }

    let overlaps = find_overlaps(&members);
    info!("Found {} overlapping pair(s)", overlaps.len());
    print!("{}", render_yaml(&overlaps, args.show_users)?);
    Ok(())
}
