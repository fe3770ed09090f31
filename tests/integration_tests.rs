//! Integration tests for telegram_tools library
//!
//! These tests verify the public API and module interactions.

mod commands;

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use telegram_tools::{
    chat::ChannelRef,
    collector::{delete_in_chunks, FetchWindow, Item, MessageSink, MessageSource, Sender},
    config::{Config, SESSION_NAME},
    error::{exit_code_for, Error, Result},
    gelf::GelfMessage,
    graph::{build_graph, render_plantuml},
    intersection::{find_overlaps, render_yaml, ChatMembers, Member},
    Collector,
};

// ============================================================================
// Fakes
// ============================================================================

/// Newest-first history served from memory, recording every request.
struct MemoryChat {
    items: Vec<Item>,
    requests: Mutex<Vec<(usize, usize)>>,
    deleted: Mutex<Vec<i32>>,
}

impl MemoryChat {
    fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            requests: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MessageSource for MemoryChat {
    async fn search(
        &self,
        _peer: &ChannelRef,
        offset: usize,
        limit: usize,
        _window: &FetchWindow,
    ) -> Result<Vec<Item>> {
        self.requests.lock().unwrap().push((offset, limit));
        Ok(self.items.iter().skip(offset).take(limit).cloned().collect())
    }
}

#[async_trait]
impl MessageSink for MemoryChat {
    async fn delete(&self, _peer: &ChannelRef, ids: &[i32]) -> Result<usize> {
        self.deleted.lock().unwrap().extend_from_slice(ids);
        Ok(ids.len())
    }
}

fn peer() -> ChannelRef {
    ChannelRef::new(1234567890, 42, "Rust Chat", true)
}

fn day(d: u32, h: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
}

// ============================================================================
// Collector Tests
// ============================================================================

#[tokio::test]
async fn test_collect_window_then_delete() {
    // Newest first: two after the window, three inside, one before.
    let chat = MemoryChat::new(vec![
        Item::normal(60, day(25, 0), "too new"),
        Item::normal(50, day(21, 0), "too new"),
        Item::normal(40, day(20, 12), "keep"),
        Item::placeholder(35),
        Item::service(30, day(15, 9), "pinned a message"),
        Item::normal(20, day(10, 0), "keep"),
        Item::normal(10, day(5, 0), "too old"),
    ]);
    let window = FetchWindow::new(Some(day(10, 0)), day(20, 23)).unwrap();
    let collector = Collector::new(3).unwrap().with_page_delay(Duration::ZERO);

    let items = collector.collect(&chat, &peer(), &window).await.unwrap();
    let ids: Vec<i32> = items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![40, 30, 20]);

    let requests = chat.requests.lock().unwrap().clone();
    assert_eq!(requests, vec![(0, 3), (3, 3), (6, 3)]);

    let deleted = delete_in_chunks(&chat, &peer(), &ids, 2).await.unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(*chat.deleted.lock().unwrap(), vec![40, 30, 20]);
}

#[tokio::test]
async fn test_collect_open_ended_window_reads_everything() {
    let chat = MemoryChat::new((0..5).map(|i| Item::normal(100 - i, day(1, 0), "x")).collect());
    let window = FetchWindow::up_to_now(None).unwrap();
    let collector = Collector::new(10).unwrap().with_page_delay(Duration::ZERO);

    let items = collector.collect(&chat, &peer(), &window).await.unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(chat.requests.lock().unwrap().len(), 1);
}

#[test]
fn test_window_rejects_reversed_bounds() {
    let result = FetchWindow::new(Some(day(20, 0)), day(10, 0));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_file_roundtrip_through_tempdir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yml");
    std::fs::write(
        &path,
        "collector:\n  page_size: 25\ngraph:\n  channels_ignore: [7]\n",
    )
    .unwrap();

    let config = Config::load_from(Some(path.as_path())).unwrap();
    assert_eq!(config.collector.page_size, 25);
    assert_eq!(config.graph.channels_ignore, vec![7]);

    let collector = Collector::from_config(&config.collector).unwrap();
    assert_eq!(collector.page_size(), 25);
}

#[test]
fn test_default_session_name() {
    assert_eq!(Config::defaults().telegram.session_name, SESSION_NAME);
}

// ============================================================================
// GELF Tests
// ============================================================================

#[test]
fn test_collected_item_becomes_gelf_payload() {
    let item = Item::normal(9, day(3, 4), "a".repeat(80)).with_sender(Sender {
        id: 5,
        username: Some("ferris".into()),
        ..Sender::default()
    });

    let gelf = GelfMessage::from_item(&item, &peer(), "10.0.0.2").unwrap();
    let json: serde_json::Value = serde_json::from_str(&gelf.to_json().unwrap()).unwrap();

    assert_eq!(json["version"], "1.1");
    assert_eq!(json["host"], "10.0.0.2");
    assert_eq!(json["short_message"].as_str().unwrap().len(), 62);
    assert_eq!(json["_channel_id"], -1001234567890i64);
    assert_eq!(json["_sender_username"], "ferris");
}

// ============================================================================
// Intersection Tests
// ============================================================================

fn member(id: i64, username: &str) -> Member {
    Member {
        id,
        username: Some(username.to_string()),
        first_name: None,
        last_name: None,
    }
}

#[test]
fn test_intersection_report() {
    let me = 1;
    let chats = vec![
        ChatMembers::new(10, "A", vec![member(1, "me"), member(2, "bob"), member(3, "eve")], me),
        ChatMembers::new(20, "B", vec![member(1, "me"), member(3, "eve")], me),
        ChatMembers::new(30, "C", vec![member(1, "me"), member(3, "eve"), member(4, "dan")], me),
    ];

    let overlaps = find_overlaps(&chats);
    let keys: Vec<String> = overlaps.iter().map(|o| o.key()).collect();
    assert_eq!(
        keys,
        vec!["overlapping_10_20", "overlapping_10_30", "overlapping_20_30"]
    );

    let yaml = render_yaml(&overlaps, true).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(doc["overlapping_10_20"][20]["part"], serde_yaml::Value::from("1/2"));
    assert_eq!(doc["overlapping_10_20"][20]["percentage"], serde_yaml::Value::from("50.00"));
    assert_eq!(
        doc["overlapping_20_30"]["users"][3]["username"],
        serde_yaml::Value::from("eve")
    );
}

// ============================================================================
// Graph Tests
// ============================================================================

#[test]
fn test_graph_document_for_two_channels() {
    use telegram_tools::graph::ChannelInfo;

    let config = Config::defaults().graph;
    let channels = vec![
        ChannelInfo {
            id: 1,
            title: "One".into(),
            about: "by @shared".into(),
        },
        ChannelInfo {
            id: 2,
            title: "Two".into(),
            about: "also @shared and @other".into(),
        },
    ];

    let uml = render_plantuml(&build_graph("Me", &channels, &config), &config.title);
    assert!(uml.starts_with("@startuml\n"));
    assert!(uml.ends_with("@enduml"));
    assert_eq!(uml.matches("usecase shared").count(), 1);
    assert!(uml.contains("shared 0--# 2"));
    assert!(uml.contains("Me 0--# 2"));
}

// ============================================================================
// Error Tests
// ============================================================================

#[test]
fn test_exit_codes_follow_sysexits() {
    assert_eq!(Error::InvalidDateFormat("x".into()).exit_code(), 64);
    assert_eq!(Error::HttpError("x".into()).exit_code(), 65);
    assert_eq!(Error::TransportFailure("x".into()).exit_code(), 69);
    assert_eq!(Error::AuthorizationRequired.exit_code(), 77);
    assert_eq!(Error::DnsApi("x".into()).exit_code(), 78);

    let wrapped = anyhow::Error::new(Error::SessionLocked);
    assert_eq!(exit_code_for(&wrapped), 69);
    assert_eq!(exit_code_for(&anyhow::anyhow!("plain")), 70);
}
