//! GELF 1.1 payloads and the UDP sender used to forward chat messages to Graylog.

use std::net::IpAddr;

use serde::Serialize;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::chat::ChannelRef;
use crate::collector::{Item, ItemKind};
use crate::error::{Error, Result};
use crate::metrics;

pub const GELF_VERSION: &str = "1.1";
/// Characters kept in `short_message` before the `..` marker.
pub const SHORT_MESSAGE_LEN: usize = 60;

/// One chat message in GELF form. Additional fields carry the mandatory `_` prefix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GelfMessage {
    pub version: String,
    pub host: String,
    pub short_message: String,
    pub full_message: String,
    pub timestamp: i64,
    #[serde(rename = "_channel_title")]
    pub channel_title: String,
    #[serde(rename = "_channel_id")]
    pub channel_id: i64,
    #[serde(rename = "_sender_id")]
    pub sender_id: i64,
    #[serde(rename = "_sender_username")]
    pub sender_username: Option<String>,
    #[serde(rename = "_sender_firstname")]
    pub sender_firstname: Option<String>,
    #[serde(rename = "_sender_lastname")]
    pub sender_lastname: Option<String>,
    #[serde(rename = "_message_id")]
    pub message_id: i32,
}

impl GelfMessage {
    /// Build a payload for a user's text message in a channel.
    /// Service items, placeholders, messages without a user sender and empty
    /// texts yield `None`.
    pub fn from_item(item: &Item, channel: &ChannelRef, host: &str) -> Option<Self> {
        if item.kind != ItemKind::Normal || item.body.is_empty() {
            return None;
        }
        let sender = item.sender.as_ref()?;

        Some(Self {
            version: GELF_VERSION.to_string(),
            host: host.to_string(),
            short_message: short_message(&item.body),
            full_message: item.body.clone(),
            timestamp: item.timestamp.timestamp(),
            channel_title: channel.title.clone(),
            channel_id: channel.marked_id(),
            sender_id: sender.id,
            sender_username: sender.username.clone(),
            sender_firstname: sender.first_name.clone(),
            sender_lastname: sender.last_name.clone(),
            message_id: item.id,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// First 60 characters, with `..` appended when anything was cut.
pub fn short_message(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(SHORT_MESSAGE_LEN).collect();
    if chars.next().is_some() {
        format!("{}..", head)
    } else {
        head
    }
}

/// Address reported in the `host` field.
pub fn local_host() -> String {
    local_ip_address::local_ip()
        .map(|ip: IpAddr| ip.to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Fire-and-forget UDP delivery to a Graylog GELF input.
pub struct GelfUdpSender {
    socket: UdpSocket,
    target: String,
}

impl GelfUdpSender {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        if host.trim().is_empty() {
            return Err(Error::Config("graylog host is not set".to_string()));
        }
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self {
            socket,
            target: format!("{}:{}", host, port),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn send(&self, message: &GelfMessage) -> Result<()> {
        let payload = message.to_json()?;
        debug!(target = %self.target, "Sending parsed message: {}", payload);
        self.socket
            .send_to(payload.as_bytes(), &self.target)
            .await
            .map_err(|e| Error::TransportFailure(format!("GELF send to {}: {}", self.target, e)))?;
        metrics::record_gelf_sent();
        Ok(())
    }
}
