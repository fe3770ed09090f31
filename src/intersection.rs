//! Participant overlap between chats
//!
//! Members of every selected chat are gathered once, then each unordered pair
//! of chats is compared. Pairs sharing at least one member are reported as
//! YAML under `overlapping_<a>_<b>` keys.

use std::collections::{BTreeMap, HashMap};

use grammers_client::Client;
use grammers_tl_types as tl;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::chat::ChannelRef;
use crate::error::Result;

const PARTICIPANTS_PAGE: i32 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Member {
    pub fn from_user(user: &tl::enums::User) -> Self {
        match user {
            tl::enums::User::User(u) => Self {
                id: u.id,
                username: u.username.clone(),
                first_name: u.first_name.clone(),
                last_name: u.last_name.clone(),
            },
            tl::enums::User::Empty(u) => Self {
                id: u.id,
                username: None,
                first_name: None,
                last_name: None,
            },
        }
    }
}

/// Members of one chat. `total` counts every participant, the account itself included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMembers {
    pub id: i64,
    pub title: String,
    pub total: usize,
    pub members: BTreeMap<i64, Member>,
}

impl ChatMembers {
    /// Keeps every participant except `self_id`. Repeated ids count once.
    pub fn new(
        id: i64,
        title: impl Into<String>,
        participants: impl IntoIterator<Item = Member>,
        self_id: i64,
    ) -> Self {
        let mut has_self = false;
        let mut members = BTreeMap::new();
        for member in participants {
            if member.id == self_id {
                has_self = true;
            } else {
                members.entry(member.id).or_insert(member);
            }
        }
        Self {
            id,
            title: title.into(),
            total: members.len() + usize::from(has_self),
            members,
        }
    }
}

/// One side of an overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatShare {
    pub id: i64,
    pub title: String,
    pub percentage: String,
    pub part: String,
}

impl ChatShare {
    fn of(chat: &ChatMembers, common: usize) -> Self {
        Self {
            id: chat.id,
            title: chat.title.clone(),
            percentage: percentage(common, chat.total),
            part: format!("{}/{}", common, chat.total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overlap {
    pub first: ChatShare,
    pub second: ChatShare,
    /// Common members sorted by id, details taken from the first chat.
    pub users: Vec<Member>,
}

impl Overlap {
    pub fn key(&self) -> String {
        format!("overlapping_{}_{}", self.first.id, self.second.id)
    }
}

/// `part` as a share of `whole`, two decimals.
pub fn percentage(part: usize, whole: usize) -> String {
    if whole == 0 {
        return "0.00".to_string();
    }
    format!("{:.2}", 100.0 * part as f64 / whole as f64)
}

/// Every pair `(i, j)` with `i < j` that shares members, in input order.
pub fn find_overlaps(chats: &[ChatMembers]) -> Vec<Overlap> {
    let mut overlaps = Vec::new();

    for (i, first) in chats.iter().enumerate() {
        for second in &chats[i + 1..] {
            info!("Intersection \"{}\" with \"{}\"", first.title, second.title);

            let users: Vec<Member> = first
                .members
                .iter()
                .filter(|(id, _)| second.members.contains_key(id))
                .map(|(_, member)| member.clone())
                .collect();

            if users.is_empty() {
                debug!("Did not find common users");
                continue;
            }

            overlaps.push(Overlap {
                first: ChatShare::of(first, users.len()),
                second: ChatShare::of(second, users.len()),
                users,
            });
        }
    }

    overlaps
}

fn share_value(share: &ChatShare) -> Value {
    let mut map = Mapping::new();
    map.insert("title".into(), share.title.clone().into());
    map.insert("percentage".into(), share.percentage.clone().into());
    map.insert("part".into(), share.part.clone().into());
    Value::Mapping(map)
}

fn member_value(member: &Member) -> Value {
    let mut map = Mapping::new();
    if let Some(first) = &member.first_name {
        map.insert("firstname".into(), first.clone().into());
    }
    if let Some(last) = &member.last_name {
        map.insert("lastname".into(), last.clone().into());
    }
    if let Some(username) = &member.username {
        map.insert("username".into(), username.clone().into());
    }
    Value::Mapping(map)
}

/// YAML document keyed by `overlapping_<a>_<b>`.
pub fn render_yaml(overlaps: &[Overlap], show_users: bool) -> Result<String> {
    let mut root = Mapping::new();

    for overlap in overlaps {
        let mut entry = Mapping::new();
        entry.insert(Value::from(overlap.first.id), share_value(&overlap.first));
        entry.insert(Value::from(overlap.second.id), share_value(&overlap.second));

        if show_users {
            let mut users = Mapping::new();
            for member in &overlap.users {
                users.insert(Value::from(member.id), member_value(member));
            }
            entry.insert("users".into(), Value::Mapping(users));
        }

        root.insert(overlap.key().into(), Value::Mapping(entry));
    }

    Ok(serde_yaml::to_string(&Value::Mapping(root))?)
}

/// User id of a current participant. Users who left yield `None`.
fn participant_user_id(participant: &tl::enums::ChannelParticipant) -> Option<i64> {
    use tl::enums::ChannelParticipant as P;

    match participant {
        P::Participant(p) => Some(p.user_id),
        P::ParticipantSelf(p) => Some(p.user_id),
        P::Creator(p) => Some(p.user_id),
        P::Admin(p) => Some(p.user_id),
        P::Banned(p) if !p.left => match &p.peer {
            tl::enums::Peer::User(user) => Some(user.user_id),
            _ => None,
        },
        P::Banned(_) | P::Left(_) => None,
    }
}

/// Members of one participants page. `users` also lists inviters and
/// promoters, so only ids named by `participants` are kept.
pub fn page_members(
    participants: &[tl::enums::ChannelParticipant],
    users: &[tl::enums::User],
) -> Vec<Member> {
    let known: HashMap<i64, &tl::enums::User> = users
        .iter()
        .map(|user| match user {
            tl::enums::User::User(u) => (u.id, user),
            tl::enums::User::Empty(u) => (u.id, user),
        })
        .collect();

    participants
        .iter()
        .filter_map(participant_user_id)
        .map(|id| match known.get(&id) {
            Some(user) => Member::from_user(user),
            None => Member {
                id,
                username: None,
                first_name: None,
                last_name: None,
            },
        })
        .collect()
}

/// All participants of a channel, paged through `channels.getParticipants`.
pub async fn fetch_members(client: &Client, channel: &ChannelRef, self_id: i64) -> Result<ChatMembers> {
    let mut participants = Vec::new();
    let mut offset = 0i32;

    loop {
        let request = tl::functions::channels::GetParticipants {
            channel: channel.input_channel(),
            filter: tl::enums::ChannelParticipantsFilter::ChannelParticipantsSearch(
                tl::types::ChannelParticipantsSearch { q: String::new() },
            ),
            offset,
            limit: PARTICIPANTS_PAGE,
            hash: 0,
        };

        let page = match client.invoke(&request).await? {
            tl::enums::channels::ChannelParticipants::Participants(page) => page,
            _ => break,
        };

        if page.participants.is_empty() {
            break;
        }

        let received = i32::try_from(page.participants.len()).unwrap_or(i32::MAX);
        participants.extend(page_members(&page.participants, &page.users));
        offset = offset.saturating_add(received);

        if received == 0 || offset >= page.count {
            break;
        }
    }

    let members = ChatMembers::new(channel.id, channel.title.clone(), participants, self_id);
    info!(
        "Parsing \"{}\" ({}) with {} users",
        channel.title, channel.id, members.total
    );

    Ok(members)
}
