//! Telegram to Graylog forwarder
//!
//! `history` mode pushes a past window of every chosen megagroup, `realtime`
//! mode follows the update stream until Ctrl+C. Messages leave as GELF over UDP.

use std::io;

use clap::{Args, ValueEnum};
use grammers_client::client::UpdatesConfiguration;
use grammers_client::types::update::Update;
use tokio::signal;
use tracing::{debug, info, warn};

use crate::chat::{
    channel_ref, choose_peers, list_channels, list_megagroups, ChannelRef, DIALOG_SCAN_LIMIT,
};
use crate::collector::{Collector, Item};
use crate::commands::{bounded_window, TelegramArgs};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gelf::{local_host, GelfMessage, GelfUdpSender};
use crate::history::{sender_from_peer, TelegramHistory};
use crate::session::{get_client, SessionLock, TelegramClient};

const ENV_PREFIX: &str = "CHATLOG2GRAYLOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogMode {
    /// Forward a past window and exit
    History,
    /// Follow new messages until interrupted
    #[default]
    Realtime,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ChatlogArgs {
    #[command(flatten)]
    pub telegram: TelegramArgs,

    /// Operating mode
    #[arg(short, long, value_enum, env = "CHATLOG2GRAYLOG_MODE", default_value_t = LogMode::Realtime)]
    pub mode: LogMode,

    /// Graylog GELF UDP input host
    #[arg(long, env = "CHATLOG2GRAYLOG_GRAYLOG_HOST")]
    pub graylog_host: Option<String>,

    /// Graylog GELF UDP input port
    #[arg(long, env = "CHATLOG2GRAYLOG_GRAYLOG_PORT")]
    pub graylog_port: Option<u16>,

    /// Oldest day to forward in history mode (YYYY-MM-DD)
    #[arg(long, env = "CHATLOG2GRAYLOG_SINCE")]
    pub since: Option<String>,

    /// Newest day to forward in history mode (YYYY-MM-DD), defaults to now
    #[arg(short, long, env = "CHATLOG2GRAYLOG_UNTIL")]
    pub until: Option<String>,

    /// Channel ids to follow; all chats when omitted
    #[arg(short, long, env = "CHATLOG2GRAYLOG_PEERS", value_delimiter = ' ', num_args = 1..)]
    pub peers: Vec<i64>,
}

impl ChatlogArgs {
    /// Graylog endpoint from the flags, then from `config.yml`.
    pub fn graylog_target(&self, config: &Config) -> Result<(String, u16)> {
        let host = self
            .graylog_host
            .clone()
            .or_else(|| config.graylog.host.clone())
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| Error::Config("graylog host is not set".to_string()))?;
        let port = self.graylog_port.unwrap_or(config.graylog.port);
        Ok((host, port))
    }
}

/// Keep the chats listed in `peers`, or everything when the list is empty.
pub fn filter_targets<K>(channels: Vec<(K, ChannelRef)>, peers: &[i64]) -> Vec<(K, ChannelRef)> {
    if peers.is_empty() {
        return channels;
    }
    channels
        .into_iter()
        .filter(|(_, channel)| peers.contains(&channel.id))
        .collect()
}

/// Channel a new message is forwarded under. Known targets match by key.
/// Without explicit peers any channel qualifies, including ones joined later.
pub fn route_message<K: PartialEq>(
    targets: &[(K, ChannelRef)],
    peers: &[i64],
    key: &K,
    live: Option<ChannelRef>,
) -> Option<ChannelRef> {
    if let Some((_, channel)) = targets.iter().find(|(k, _)| k == key) {
        return Some(channel.clone());
    }
    if peers.is_empty() {
        live
    } else {
        None
    }
}

/// Send every loggable item, returning how many went out.
pub async fn forward_items(
    sender: &GelfUdpSender,
    items: &[Item],
    channel: &ChannelRef,
    host: &str,
) -> Result<usize> {
    let mut sent = 0;
    for item in items {
        match GelfMessage::from_item(item, channel, host) {
            Some(message) => {
                sender.send(&message).await?;
                sent += 1;
            }
            None => debug!(id = item.id, "Skipping item without text or user sender"),
        }
    }
    Ok(sent)
}

pub async fn run(args: &ChatlogArgs, config: &Config) -> Result<()> {
    let (host, port) = args.graylog_target(config)?;
    let telegram = args
        .telegram
        .clone()
        .with_env_prefix(ENV_PREFIX)
        .apply(&config.telegram);

    match args.mode {
        LogMode::History => {
            let window = bounded_window(args.since.as_deref(), args.until.as_deref())?;
            let collector = Collector::from_config(&config.collector)?;
            let gelf = GelfUdpSender::connect(&host, port).await?;

            let _lock = SessionLock::for_session(&telegram)?;
            let client = get_client(&telegram).await?;

            let candidates = list_megagroups(&client, DIALOG_SCAN_LIMIT).await?;
            let peers = choose_peers(
                &candidates,
                &args.peers,
                &mut io::BufReader::new(io::stdin()),
                &mut io::stdout(),
            )?;

            let history = TelegramHistory::new(&client);
            let local = local_host();
            let mut total = 0;
            for peer in &peers {
                let items = collector.collect(&history, peer, &window).await?;
                let sent = forward_items(&gelf, &items, peer, &local).await?;
                info!(peer = peer.id, collected = items.len(), sent, "Forwarded {}", peer.title);
                total += sent;
            }
            info!(target = gelf.target(), "Sent {} message(s) to Graylog", total);
            Ok(())
        }
        LogMode::Realtime => {
            let gelf = GelfUdpSender::connect(&host, port).await?;
            let _lock = SessionLock::for_session(&telegram)?;
            let mut client = get_client(&telegram).await?;
            follow(&mut client, &gelf, &args.peers).await
        }
    }
}

async fn follow(client: &mut TelegramClient, gelf: &GelfUdpSender, peers: &[i64]) -> Result<()> {
    let channels = list_channels(client, usize::MAX).await?;
    let targets: Vec<_> = filter_targets(
        channels
            .into_iter()
            .map(|(peer, channel)| (peer.id(), channel))
            .collect(),
        peers,
    );
    if targets.is_empty() && !peers.is_empty() {
        return Err(Error::NoMatchingPeer(format!("{:?}", peers)));
    }
    for (_, channel) in &targets {
        info!("Following: {} ({})", channel.title, channel.id);
    }

    let updates_rx = client.take_updates().ok_or_else(|| {
        Error::TransportFailure("update channel is no longer available".to_string())
    })?;
    let mut updates = client.stream_updates(
        updates_rx,
        UpdatesConfiguration {
            catch_up: false,
            ..Default::default()
        },
    );

    let host = local_host();
    info!(target = gelf.target(), "Waiting for new messages, press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Stopping");
                break;
            }
            update = updates.next() => {
                match update {
                    Ok(Update::NewMessage(msg)) => {
                        let live = msg.peer().ok().and_then(channel_ref);
                        let Some(channel) = route_message(&targets, peers, &msg.peer_id(), live) else {
                            continue;
                        };

                        let mut item = Item::normal(msg.id(), msg.date(), msg.text());
                        if let Some(sender) = msg.sender().and_then(sender_from_peer) {
                            item = item.with_sender(sender);
                        }

                        if let Some(message) = GelfMessage::from_item(&item, &channel, &host) {
                            if let Err(e) = gelf.send(&message).await {
                                warn!("{}", e);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        updates.sync_update_state();
                        return Err(Error::TransportFailure(format!("update stream: {}", err)));
                    }
                }
            }
        }
    }

    updates.sync_update_state();
    Ok(())
}
