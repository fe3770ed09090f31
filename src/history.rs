//! Telegram history adapter
//!
//! [`TelegramHistory`] pages a channel with the raw `messages.search` request
//! (`add_offset` pagination, `max_date` window hint) and deletes through
//! `channels.deleteMessages`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grammers_client::types::peer::Peer;
use grammers_client::Client;
use grammers_tl_types as tl;
use tracing::{debug, trace};

use crate::chat::ChannelRef;
use crate::collector::{FetchWindow, Item, MessageSink, MessageSource, Sender};
use crate::error::Result;

/// Search-based history of one account.
pub struct TelegramHistory<'a> {
    client: &'a Client,
    own_messages_only: bool,
}

impl<'a> TelegramHistory<'a> {
    /// Every sender.
    pub fn new(client: &'a Client) -> Self {
        Self {
            client,
            own_messages_only: false,
        }
    }

    /// Only messages written by the logged-in account.
    pub fn own_messages(client: &'a Client) -> Self {
        Self {
            client,
            own_messages_only: true,
        }
    }

    fn search_request(
        &self,
        peer: &ChannelRef,
        offset: usize,
        limit: usize,
        window: &FetchWindow,
    ) -> tl::functions::messages::Search {
        build_search(peer, offset, limit, window, self.own_messages_only)
    }
}

fn build_search(
    peer: &ChannelRef,
    offset: usize,
    limit: usize,
    window: &FetchWindow,
    own_messages_only: bool,
) -> tl::functions::messages::Search {
    tl::functions::messages::Search {
        peer: peer.input_peer(),
        q: String::new(),
        from_id: own_messages_only.then_some(tl::enums::InputPeer::PeerSelf),
        saved_peer_id: None,
        saved_reaction: None,
        top_msg_id: None,
        filter: tl::enums::MessagesFilter::InputMessagesFilterEmpty,
        min_date: 0,
        max_date: clamp_timestamp(window.until()),
        offset_id: 0,
        add_offset: i32::try_from(offset).unwrap_or(i32::MAX),
        limit: i32::try_from(limit).unwrap_or(i32::MAX),
        max_id: 0,
        min_id: 0,
        hash: 0,
    }
}

fn clamp_timestamp(ts: DateTime<Utc>) -> i32 {
    i32::try_from(ts.timestamp()).unwrap_or(i32::MAX)
}

#[async_trait]
impl MessageSource for TelegramHistory<'_> {
    async fn search(
        &self,
        peer: &ChannelRef,
        offset: usize,
        limit: usize,
        window: &FetchWindow,
    ) -> Result<Vec<Item>> {
        let request = self.search_request(peer, offset, limit, window);
        let response = self.client.invoke(&request).await?;
        let items = items_from_response(response);
        debug!(
            peer = peer.id,
            offset,
            received = items.len(),
            "Received: {} messages. Offset: {}",
            items.len(),
            offset
        );
        Ok(items)
    }
}

#[async_trait]
impl MessageSink for TelegramHistory<'_> {
    async fn delete(&self, peer: &ChannelRef, ids: &[i32]) -> Result<usize> {
        let request = tl::functions::channels::DeleteMessages {
            channel: peer.input_channel(),
            id: ids.to_vec(),
        };
        let tl::enums::messages::AffectedMessages::Messages(affected) =
            self.client.invoke(&request).await?;
        Ok(usize::try_from(affected.pts_count).unwrap_or(0))
    }
}

/// Flatten any `messages.Messages` variant into items, newest-first as received.
pub fn items_from_response(response: tl::enums::messages::Messages) -> Vec<Item> {
    let (messages, users) = match response {
        tl::enums::messages::Messages::Messages(m) => (m.messages, m.users),
        tl::enums::messages::Messages::Slice(m) => (m.messages, m.users),
        tl::enums::messages::Messages::ChannelMessages(m) => (m.messages, m.users),
        tl::enums::messages::Messages::NotModified(_) => (Vec::new(), Vec::new()),
    };

    messages
        .iter()
        .map(|message| item_from_raw(message, &users))
        .collect()
}

fn timestamp(date: i32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(date), 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn sender_of(from_id: Option<&tl::enums::Peer>, users: &[tl::enums::User]) -> Option<Sender> {
    let user_id = match from_id? {
        tl::enums::Peer::User(u) => u.user_id,
        _ => return None,
    };
    users
        .iter()
        .find(|u| u.id() == user_id)
        .map(sender_from_user)
        .or(Some(Sender {
            id: user_id,
            ..Sender::default()
        }))
}

/// Sender details from a raw user record.
pub fn sender_from_user(user: &tl::enums::User) -> Sender {
    match user {
        tl::enums::User::User(u) => Sender {
            id: u.id,
            username: u.username.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
        },
        tl::enums::User::Empty(u) => Sender {
            id: u.id,
            ..Sender::default()
        },
    }
}

/// Sender details of a high-level peer, users only.
pub fn sender_from_peer(peer: &Peer) -> Option<Sender> {
    match peer {
        Peer::User(u) => Some(sender_from_user(&u.raw)),
        _ => None,
    }
}

fn item_from_raw(message: &tl::enums::Message, users: &[tl::enums::User]) -> Item {
    match message {
        tl::enums::Message::Empty(m) => Item::placeholder(m.id),
        tl::enums::Message::Message(m) => {
            let item = Item::normal(m.id, timestamp(m.date), m.message.clone());
            match sender_of(m.from_id.as_ref(), users) {
                Some(sender) => item.with_sender(sender),
                None => item,
            }
        }
        tl::enums::Message::Service(m) => {
            trace!(id = m.id, action = ?m.action, "Service message");
            let item = Item::service(m.id, timestamp(m.date), describe_action(&m.action));
            match sender_of(m.from_id.as_ref(), users) {
                Some(sender) => item.with_sender(sender),
                None => item,
            }
        }
    }
}

/// Human-readable description of a service action.
pub fn describe_action(action: &tl::enums::MessageAction) -> String {
    match action {
        tl::enums::MessageAction::ChatCreate(a) => format!("created the group \"{}\"", a.title),
        tl::enums::MessageAction::ChannelCreate(a) => format!("created the channel \"{}\"", a.title),
        tl::enums::MessageAction::ChatEditTitle(a) => format!("changed the title to \"{}\"", a.title),
        tl::enums::MessageAction::ChatAddUser(a) => match a.users.len() {
            1 => "added a member".to_string(),
            n => format!("added {} members", n),
        },
        tl::enums::MessageAction::ChatDeleteUser(a) => format!("removed user {}", a.user_id),
        tl::enums::MessageAction::ChatJoinedByLink(_) => "joined via invite link".to_string(),
        other => humanize_variant(&format!("{:?}", other)),
    }
}

/// `PinMessage(..)` -> `pin message`.
fn humanize_variant(debug: &str) -> String {
    let name = debug
        .split(|c: char| c == '(' || c == ' ' || c == '{')
        .next()
        .unwrap_or(debug);

    let mut out = String::with_capacity(name.len() + 4);
    for (idx, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if idx > 0 {
                out.push(' ');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
