//! Telegram tools library
//!
//! This library provides tools to:
//! - Collect a channel's history within a date window (paged, rate-limited)
//! - List or delete your own messages in megagroups
//! - Forward chat messages to Graylog as GELF over UDP
//! - Report members shared between chats
//! - Render followed channels and their mentions as a PlantUML graph
//! - Keep a REG.RU A record pointed at the WAN address

pub mod chat;
pub mod collector;
pub mod config;
pub mod ddns;
pub mod error;
pub mod gelf;
pub mod graph;
pub mod history;
pub mod intersection;
pub mod logging;
pub mod metrics;
pub mod session;

// Re-export common types
pub use chat::{ChannelRef, PeerSelection};
pub use collector::{Collector, FetchWindow, Item, ItemKind, MessageSink, MessageSource};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use session::{check_session_exists, get_client, SessionLock};

pub mod commands;
