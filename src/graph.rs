//! Channel relationship graph rendered as PlantUML
//!
//! The logged-in account is the root, every channel it follows hangs off the
//! root, and every `@username` mentioned in a channel description hangs off
//! that channel. The graph is undirected and nodes are deduplicated.

use grammers_client::Client;
use grammers_tl_types as tl;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::chat::ChannelRef;
use crate::config::GraphConfig;
use crate::error::Result;

static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@([A-Za-z0-9_]{1,100})").expect("valid mention regex"));

/// `@name` mentions in order of appearance, without the `@`.
pub fn extract_mentions(text: &str) -> Vec<String> {
    MENTION_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Greedy word wrap at `width` characters. Over-long words are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        loop {
            let current_len = current.chars().count();
            let needed = if current.is_empty() { word.len() } else { current_len + 1 + word.len() };

            if needed <= width {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.extend(word.iter());
                break;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                continue;
            }

            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
            if word.is_empty() {
                break;
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    /// Account or mentioned user.
    Name(String),
    Channel(i64),
}

impl NodeKey {
    fn label(&self) -> String {
        match self {
            NodeKey::Name(name) => name.clone(),
            NodeKey::Channel(id) => id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub key: NodeKey,
    /// Present for channels only.
    pub title: Option<String>,
    pub color: String,
    neighbors: Vec<usize>,
}

/// Undirected graph preserving insertion order of nodes and adjacency.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_of(&self, key: &NodeKey) -> Option<usize> {
        self.nodes.iter().position(|n| &n.key == key)
    }

    /// Insert a node or update the attributes of an existing one.
    pub fn add_node(&mut self, key: NodeKey, title: Option<String>, color: &str) -> usize {
        match self.index_of(&key) {
            Some(idx) => {
                let node = &mut self.nodes[idx];
                if title.is_some() {
                    node.title = title;
                }
                node.color = color.to_string();
                idx
            }
            None => {
                self.nodes.push(Node {
                    key,
                    title,
                    color: color.to_string(),
                    neighbors: Vec::new(),
                });
                self.nodes.len() - 1
            }
        }
    }

    pub fn add_edge(&mut self, a: usize, b: usize) {
        if !self.nodes[a].neighbors.contains(&b) {
            self.nodes[a].neighbors.push(b);
        }
        if !self.nodes[b].neighbors.contains(&a) {
            self.nodes[b].neighbors.push(a);
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Each edge once, walking nodes in insertion order.
    pub fn edges(&self) -> Vec<(&NodeKey, &NodeKey)> {
        let mut edges = Vec::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            for &nbr in &node.neighbors {
                if nbr >= idx {
                    edges.push((&node.key, &self.nodes[nbr].key));
                }
            }
        }
        edges
    }
}

/// Channel with the description text to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: i64,
    pub title: String,
    pub about: String,
}

/// Build the account → channels → mentions graph.
pub fn build_graph(root_name: &str, channels: &[ChannelInfo], config: &GraphConfig) -> Graph {
    let mut graph = Graph::new();
    let root = graph.add_node(NodeKey::Name(root_name.to_string()), None, &config.colors.client);

    for channel in channels {
        if config.channels_ignore.contains(&channel.id) {
            debug!(channel = channel.id, "Ignored channel");
            continue;
        }

        let title = wrap(&channel.title, config.wordwrap_length).join("\\n");
        let node = graph.add_node(
            NodeKey::Channel(channel.id),
            Some(title),
            &config.colors.channel,
        );
        graph.add_edge(root, node);

        for mention in extract_mentions(&channel.about) {
            let user = graph.add_node(NodeKey::Name(mention), None, &config.colors.user);
            graph.add_edge(user, node);
        }
    }

    graph
}

pub fn render_plantuml(graph: &Graph, title: &str) -> String {
    let mut out = format!("@startuml\ntitle {}\nleft to right direction\n", title);

    for node in graph.nodes() {
        let line = match &node.title {
            Some(channel_title) => format!(
                "frame {} as \"{}\" #{}\n",
                node.key.label(),
                channel_title,
                node.color
            ),
            None => format!("usecase {0} as \"@{0}\" #{1}\n", node.key.label(), node.color),
        };
        out.push_str(&line);
    }

    for (a, b) in graph.edges() {
        out.push_str(&format!("{} 0--# {}\n", a.label(), b.label()));
    }

    out.push_str("@enduml");
    out
}

pub fn output_file_name(root_name: &str) -> String {
    format!("{}_telegram_graph.plantuml", root_name)
}

/// Description (`about`) of a channel.
pub async fn fetch_about(client: &Client, channel: &ChannelRef) -> Result<String> {
    let request = tl::functions::channels::GetFullChannel {
        channel: channel.input_channel(),
    };
    let tl::enums::messages::ChatFull::Full(full) = client.invoke(&request).await?;
    let about = match full.full_chat {
        tl::enums::ChatFull::ChannelFull(c) => c.about,
        _ => String::new(),
    };
    info!(channel = channel.id, "Fetched description of {}", channel.title);
    Ok(about)
}
