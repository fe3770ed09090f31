//! Chat discovery and peer selection
//!
//! Every tool here works on channels (broadcast channels or megagroups).
//! [`ChannelRef`] is the resolved handle: id, access hash and title.

use std::io::{BufRead, Write};

use grammers_client::types::peer::Peer;
use grammers_client::Client;
use grammers_tl_types as tl;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// How many dialogs are scanned when looking for chats.
pub const DIALOG_SCAN_LIMIT: usize = 100;

/// A resolved channel or megagroup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: i64,
    pub access_hash: i64,
    pub title: String,
    pub megagroup: bool,
}

impl ChannelRef {
    pub fn new(id: i64, access_hash: i64, title: impl Into<String>, megagroup: bool) -> Self {
        Self {
            id,
            access_hash,
            title: title.into(),
            megagroup,
        }
    }

    /// Bot-API style marked id (`-100` prefix), as used by log consumers.
    pub fn marked_id(&self) -> i64 {
        -1_000_000_000_000 - self.id
    }

    pub fn input_peer(&self) -> tl::enums::InputPeer {
        tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
            channel_id: self.id,
            access_hash: self.access_hash,
        })
    }

    pub fn input_channel(&self) -> tl::enums::InputChannel {
        tl::enums::InputChannel::Channel(tl::types::InputChannel {
            channel_id: self.id,
            access_hash: self.access_hash,
        })
    }
}

fn channel_from_raw(raw: &tl::types::Channel) -> ChannelRef {
    ChannelRef::new(
        raw.id,
        raw.access_hash.unwrap_or(0),
        raw.title.clone(),
        raw.megagroup,
    )
}

/// Extract a channel handle from a dialog peer. Megagroups show up as groups.
pub fn channel_ref(peer: &Peer) -> Option<ChannelRef> {
    match peer {
        Peer::Channel(channel) => Some(channel_from_raw(&channel.raw)),
        Peer::Group(group) => match &group.raw {
            tl::enums::Chat::Channel(c) => Some(channel_from_raw(c)),
            _ => None,
        },
        Peer::User(_) => None,
    }
}

/// Channels among the first `limit` dialogs, paired with their dialog peer.
pub async fn list_channels(client: &Client, limit: usize) -> Result<Vec<(Peer, ChannelRef)>> {
    let mut dialogs = client.iter_dialogs();
    let mut channels = Vec::new();
    let mut seen = 0;

    while let Some(dialog) = dialogs.next().await? {
        seen += 1;
        if let Some(channel) = channel_ref(&dialog.peer) {
            channels.push((dialog.peer.clone(), channel));
        }
        if seen >= limit {
            break;
        }
    }

    Ok(channels)
}

/// Megagroups the account participates in.
pub async fn list_megagroups(client: &Client, limit: usize) -> Result<Vec<ChannelRef>> {
    let channels = list_channels(client, limit).await?;
    Ok(channels
        .into_iter()
        .map(|(_, channel)| channel)
        .filter(|channel| channel.megagroup)
        .collect())
}

/// Explicit peer choice made by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerSelection {
    All,
    Ids(Vec<i64>),
}

/// Pick candidates matching a selection. Unknown ids are reported and skipped.
pub fn select_peers(candidates: &[ChannelRef], selection: &PeerSelection) -> Result<Vec<ChannelRef>> {
    if candidates.is_empty() {
        return Err(Error::NoMatchingPeer(
            "the account does not participate in any group".to_string(),
        ));
    }

    let chosen: Vec<ChannelRef> = match selection {
        PeerSelection::All => candidates.to_vec(),
        PeerSelection::Ids(ids) => {
            for id in ids {
                if !candidates.iter().any(|c| c.id == *id) {
                    warn!(peer = id, "Peer is not among the available chats");
                }
            }
            candidates
                .iter()
                .filter(|c| ids.contains(&c.id))
                .cloned()
                .collect()
        }
    };

    if chosen.is_empty() {
        return Err(Error::NoMatchingPeer(format!("{:?}", selection)));
    }

    for channel in &chosen {
        info!("Chosen: {}", channel.title);
    }

    Ok(chosen)
}

/// Numbered menu, `0` meaning every peer.
pub fn render_menu(candidates: &[ChannelRef]) -> String {
    let mut menu = String::from("0. [All Peers]\n");
    for (idx, channel) in candidates.iter().enumerate() {
        menu.push_str(&format!(
            "{}. {} (Peer {})\n",
            idx + 1,
            channel.title,
            channel.id
        ));
    }
    menu
}

/// Translate a menu answer into a selection.
pub fn parse_menu_choice(answer: &str, candidates: &[ChannelRef]) -> Result<PeerSelection> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(Error::NoMatchingPeer("nothing chosen".to_string()));
    }

    let num: usize = answer
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("'{}' is not a menu number", answer)))?;

    match num {
        0 => Ok(PeerSelection::All),
        n if n <= candidates.len() => Ok(PeerSelection::Ids(vec![candidates[n - 1].id])),
        _ => Err(Error::NoMatchingPeer(format!(
            "item {} is not in the list",
            num
        ))),
    }
}

/// Interactive fallback: print the menu and read the choice.
pub fn prompt_selection<R: BufRead, W: Write>(
    candidates: &[ChannelRef],
    input: &mut R,
    output: &mut W,
) -> Result<PeerSelection> {
    if candidates.is_empty() {
        return Err(Error::NoMatchingPeer(
            "the account does not participate in any group".to_string(),
        ));
    }

    writeln!(output, "{}", render_menu(candidates))?;
    write!(output, "Choose chat: ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    parse_menu_choice(&answer, candidates)
}

/// Resolve peers from an explicit id list, falling back to the interactive menu.
pub fn choose_peers<R: BufRead, W: Write>(
    candidates: &[ChannelRef],
    requested: &[i64],
    input: &mut R,
    output: &mut W,
) -> Result<Vec<ChannelRef>> {
    if !requested.is_empty() {
        let known = requested
            .iter()
            .any(|id| candidates.iter().any(|c| c.id == *id));
        if known {
            return select_peers(candidates, &PeerSelection::Ids(requested.to_vec()));
        }
        warn!(?requested, "Requested peers were not found, asking interactively");
    }

    let selection = prompt_selection(candidates, input, output)?;
    select_peers(candidates, &selection)
}
