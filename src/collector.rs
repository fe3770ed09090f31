//! Paginated range collector
//!
//! Pages through a remote message history ordered newest-first, keeps the
//! items whose timestamp falls inside a [`FetchWindow`] and stops at the first
//! item older than the window. Pagination is "skip N already consumed items"
//! (the `add_offset` idiom of Telegram search), not a cursor token.
//!
//! The window is inclusive on both ends: `since <= timestamp <= until`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};

use crate::chat::ChannelRef;
use crate::config::{CollectorConfig, DEFAULT_PAGE_DELAY_MS, DEFAULT_PAGE_SIZE};
use crate::error::{Error, Result};
use crate::metrics;

/// Largest page Telegram search serves in one call. Larger requests come
/// back short and would read as the end of the chat.
pub const MAX_PAGE_SIZE: usize = 100;

/// Accepted date format for window bounds on the command line.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| Error::InvalidDateFormat(raw.to_string()))
}

/// Inclusive time range items must fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    since: Option<DateTime<Utc>>,
    until: DateTime<Utc>,
}

impl FetchWindow {
    pub fn new(since: Option<DateTime<Utc>>, until: DateTime<Utc>) -> Result<Self> {
        if let Some(since) = since {
            if since > until {
                return Err(Error::InvalidArgument(format!(
                    "window start {} is after window end {}",
                    since, until
                )));
            }
        }
        Ok(Self { since, until })
    }

    /// Everything up to now.
    pub fn up_to_now(since: Option<DateTime<Utc>>) -> Result<Self> {
        Self::new(since, Utc::now())
    }

    /// Whole-day window: `since` from 00:00:00, `until` through 23:59:59 (UTC).
    /// A missing `until` means "now".
    pub fn from_dates(since: Option<NaiveDate>, until: Option<NaiveDate>) -> Result<Self> {
        let since = since.map(|d| d.and_time(NaiveTime::MIN).and_utc());
        let until = match until {
            Some(d) => d
                .and_hms_opt(23, 59, 59)
                .map(|dt| dt.and_utc())
                .ok_or_else(|| Error::InvalidDateFormat(d.to_string()))?,
            None => Utc::now(),
        };
        Self::new(since, until)
    }

    pub fn since(&self) -> Option<DateTime<Utc>> {
        self.since
    }

    pub fn until(&self) -> DateTime<Utc> {
        self.until
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts <= self.until && self.since.is_none_or(|since| ts >= since)
    }

    pub fn is_older(&self, ts: DateTime<Utc>) -> bool {
        self.since.is_some_and(|since| ts < since)
    }

    pub fn is_newer(&self, ts: DateTime<Utc>) -> bool {
        ts > self.until
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Normal,
    /// Tombstone of a deleted message.
    Empty,
    /// System event (join, pin, title change...).
    Service,
}

/// Author details carried along for forwarding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// One remote message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: i32,
    /// Placeholders carry no date; theirs is the Unix epoch.
    pub timestamp: DateTime<Utc>,
    pub kind: ItemKind,
    /// Message text, or the action description for service items.
    pub body: String,
    pub sender: Option<Sender>,
}

impl Item {
    pub fn normal(id: i32, timestamp: DateTime<Utc>, body: impl Into<String>) -> Self {
        Self {
            id,
            timestamp,
            kind: ItemKind::Normal,
            body: body.into(),
            sender: None,
        }
    }

    pub fn service(id: i32, timestamp: DateTime<Utc>, action: impl Into<String>) -> Self {
        Self {
            id,
            timestamp,
            kind: ItemKind::Service,
            body: action.into(),
            sender: None,
        }
    }

    pub fn placeholder(id: i32) -> Self {
        Self {
            id,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            kind: ItemKind::Empty,
            body: String::new(),
            sender: None,
        }
    }

    pub fn with_sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == ItemKind::Empty
    }

    /// `(Jan 15 2024 10:00:00 UTC) [ID:7]: text` or `(...) action` for service items.
    pub fn render(&self) -> String {
        let ts = self.timestamp.format("%b %d %Y %H:%M:%S UTC");
        match self.kind {
            ItemKind::Service => format!("({}) {}", ts, self.body),
            _ => format!("({}) [ID:{}]: {}", ts, self.id, self.body),
        }
    }
}

/// Remote paged history, newest-first.
#[async_trait]
pub trait MessageSource {
    /// Up to `limit` items, skipping the first `offset` matches.
    /// The window is a hint the source may apply server-side.
    async fn search(
        &self,
        peer: &ChannelRef,
        offset: usize,
        limit: usize,
        window: &FetchWindow,
    ) -> Result<Vec<Item>>;
}

/// Remote deletion.
#[async_trait]
pub trait MessageSink {
    /// Delete `ids`, returning how many the remote side reports as affected.
    async fn delete(&self, peer: &ChannelRef, ids: &[i32]) -> Result<usize>;
}

#[derive(Debug, Clone)]
pub struct Collector {
    page_size: usize,
    page_delay: Duration,
}

impl Default for Collector {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
        }
    }
}

impl Collector {
    pub fn new(page_size: usize) -> Result<Self> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(Error::InvalidArgument(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, page_size
            )));
        }
        Ok(Self {
            page_size,
            ..Self::default()
        })
    }

    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        Ok(Self::new(config.page_size)?.with_page_delay(config.page_delay))
    }

    /// Fixed pause between page requests (rate-limit courtesy, not a backoff).
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Collect every in-window item, newest-first.
    pub async fn collect<S>(
        &self,
        source: &S,
        peer: &ChannelRef,
        window: &FetchWindow,
    ) -> Result<Vec<Item>>
    where
        S: MessageSource + Sync + ?Sized,
    {
        info!(
            peer = peer.id,
            since = ?window.since(),
            until = %window.until(),
            "Collecting messages from {}",
            peer.title
        );

        let mut offset = 0usize;
        let mut accepted = Vec::new();
        let mut first_page = true;

        loop {
            if !first_page && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
            first_page = false;

            let page = source.search(peer, offset, self.page_size, window).await?;
            metrics::record_page_fetched();

            if page.is_empty() {
                info!("Stopped at the end of the chat");
                break;
            }

            debug!(received = page.len(), offset, "Received page");
            let exhausted = page.len() < self.page_size;

            for item in page {
                if item.is_placeholder() {
                    offset += 1;
                    continue;
                }
                if window.is_older(item.timestamp) {
                    info!(id = item.id, ts = %item.timestamp, "Reached the window start");
                    metrics::record_items_accepted(accepted.len());
                    return Ok(accepted);
                }
                offset += 1;
                if window.is_newer(item.timestamp) {
                    continue;
                }
                accepted.push(item);
            }

            if exhausted {
                info!("Stopped at the end of the chat");
                break;
            }
        }

        metrics::record_items_accepted(accepted.len());
        Ok(accepted)
    }
}

/// Delete `ids` in fixed-size chunks, in order. Returns the summed affected count.
pub async fn delete_in_chunks<K>(
    sink: &K,
    peer: &ChannelRef,
    ids: &[i32],
    chunk_size: usize,
) -> Result<usize>
where
    K: MessageSink + Sync + ?Sized,
{
    if chunk_size == 0 {
        return Err(Error::InvalidArgument(
            "chunk size must be positive".to_string(),
        ));
    }

    let mut affected = 0;
    for chunk in ids.chunks(chunk_size) {
        let deleted = sink.delete(peer, chunk).await?;
        info!("Deleted {} messages", deleted);
        metrics::record_items_deleted(deleted);
        affected += deleted;
    }
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn peer() -> ChannelRef {
        ChannelRef::new(1, 2, "test", true)
    }

    fn january() -> FetchWindow {
        FetchWindow::from_dates(
            Some(parse_date("2024-01-01").unwrap()),
            Some(parse_date("2024-01-31").unwrap()),
        )
        .unwrap()
    }

    /// In-memory history honoring offset/limit, recording every call.
    struct FakeSource {
        items: Vec<Item>,
        calls: Mutex<Vec<(usize, usize, usize)>>,
    }

    impl FakeSource {
        fn new(items: Vec<Item>) -> Self {
            Self {
                items,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(usize, usize, usize)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageSource for FakeSource {
        async fn search(
            &self,
            _peer: &ChannelRef,
            offset: usize,
            limit: usize,
            _window: &FetchWindow,
        ) -> Result<Vec<Item>> {
            let page: Vec<Item> = self.items.iter().skip(offset).take(limit).cloned().collect();
            self.calls.lock().unwrap().push((offset, limit, page.len()));
            Ok(page)
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MessageSource for FailingSource {
        async fn search(
            &self,
            _peer: &ChannelRef,
            _offset: usize,
            _limit: usize,
            _window: &FetchWindow,
        ) -> Result<Vec<Item>> {
            Err(Error::TransportFailure("connection reset".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<Vec<i32>>>,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn delete(&self, _peer: &ChannelRef, ids: &[i32]) -> Result<usize> {
            self.calls.lock().unwrap().push(ids.to_vec());
            Ok(ids.len())
        }
    }

    fn collector(page_size: usize) -> Collector {
        Collector::new(page_size)
            .unwrap()
            .with_page_delay(Duration::ZERO)
    }

    #[test]
    fn parse_date_accepts_iso_dates_only() {
        assert_eq!(
            parse_date("2024-01-31").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
        );
        assert!(matches!(
            parse_date("31.01.2024"),
            Err(Error::InvalidDateFormat(_))
        ));
        assert!(matches!(
            parse_date("2024-02-30"),
            Err(Error::InvalidDateFormat(_))
        ));
    }

    #[test]
    fn window_rejects_inverted_bounds() {
        let result = FetchWindow::new(Some(ts(2024, 2, 1)), ts(2024, 1, 1));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let window = january();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();

        assert!(window.contains(start));
        assert!(window.contains(end));
        assert!(!window.contains(start - chrono::Duration::seconds(1)));
        assert!(!window.contains(end + chrono::Duration::seconds(1)));
        assert!(window.is_older(start - chrono::Duration::seconds(1)));
        assert!(window.is_newer(end + chrono::Duration::seconds(1)));
    }

    #[test]
    fn window_without_since_has_no_lower_bound() {
        let window = FetchWindow::new(None, ts(2024, 1, 31)).unwrap();
        assert!(window.contains(ts(1999, 1, 1)));
        assert!(!window.is_older(ts(1999, 1, 1)));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        assert!(matches!(Collector::new(0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn page_size_above_server_cap_is_rejected() {
        assert!(Collector::new(MAX_PAGE_SIZE).is_ok());
        assert!(matches!(
            Collector::new(MAX_PAGE_SIZE + 1),
            Err(Error::InvalidArgument(_))
        ));

        let config = CollectorConfig {
            page_size: 200,
            page_delay: Duration::ZERO,
            delete_chunk_size: 100,
        };
        assert!(matches!(
            Collector::from_config(&config),
            Err(Error::InvalidArgument(_))
        ));
    }

    /// Serves at most `MAX_PAGE_SIZE` items per call whatever the limit.
    struct CappedSource(FakeSource);

    #[async_trait]
    impl MessageSource for CappedSource {
        async fn search(
            &self,
            peer: &ChannelRef,
            offset: usize,
            limit: usize,
            window: &FetchWindow,
        ) -> Result<Vec<Item>> {
            self.0
                .search(peer, offset, limit.min(MAX_PAGE_SIZE), window)
                .await
        }
    }

    #[tokio::test]
    async fn largest_page_size_reads_past_server_cap() {
        let source = CappedSource(FakeSource::new(
            (1..=250)
                .rev()
                .map(|id| Item::normal(id, ts(2024, 1, 15), "m"))
                .collect(),
        ));

        let items = collector(MAX_PAGE_SIZE)
            .collect(&source, &peer(), &january())
            .await
            .unwrap();

        assert_eq!(items.len(), 250);
        assert_eq!(source.0.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_pages_but_not_before_the_first() {
        let source = FakeSource::new(
            (1..=5)
                .rev()
                .map(|id| Item::normal(id, ts(2024, 1, 10 + id as u32), "m"))
                .collect(),
        );
        let collector = Collector::new(2)
            .unwrap()
            .with_page_delay(Duration::from_millis(100));

        let started = tokio::time::Instant::now();
        let items = collector
            .collect(&source, &peer(), &january())
            .await
            .unwrap();

        assert_eq!(items.len(), 5);
        assert_eq!(source.calls().len(), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn render_normal_and_service_items() {
        let when = Utc.with_ymd_and_hms(2024, 1, 15, 9, 5, 7).unwrap();
        assert_eq!(
            Item::normal(7, when, "hello").render(),
            "(Jan 15 2024 09:05:07 UTC) [ID:7]: hello"
        );
        assert_eq!(
            Item::service(8, when, "joined the group").render(),
            "(Jan 15 2024 09:05:07 UTC) joined the group"
        );
    }

    #[tokio::test]
    async fn empty_first_page_issues_exactly_one_fetch() {
        let source = FakeSource::new(Vec::new());
        let items = collector(100)
            .collect(&source, &peer(), &january())
            .await
            .unwrap();

        assert!(items.is_empty());
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn stops_at_first_item_older_than_window() {
        let source = FakeSource::new(vec![
            Item::normal(3, ts(2024, 1, 15), "in window"),
            Item::placeholder(2),
            Item::normal(1, ts(2023, 12, 20), "too old"),
        ]);

        let items = collector(100)
            .collect(&source, &peer(), &january())
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 3);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn no_page_is_fetched_after_out_of_window_item() {
        let source = FakeSource::new(vec![
            Item::normal(6, ts(2024, 1, 20), "a"),
            Item::normal(5, ts(2024, 1, 19), "b"),
            Item::normal(4, ts(2023, 12, 1), "old"),
            Item::normal(3, ts(2023, 11, 1), "older"),
            Item::normal(2, ts(2023, 10, 1), "oldest"),
        ]);

        let items = collector(3)
            .collect(&source, &peer(), &january())
            .await
            .unwrap();

        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![6, 5]);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn pages_of_two_over_five_items() {
        let source = FakeSource::new(
            (1..=5)
                .rev()
                .map(|id| Item::normal(id, ts(2024, 1, 10 + id as u32), "m"))
                .collect(),
        );

        let items = collector(2)
            .collect(&source, &peer(), &january())
            .await
            .unwrap();

        assert_eq!(
            items.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![5, 4, 3, 2, 1]
        );
        let calls = source.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls.iter().map(|(_, _, got)| *got).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert_eq!(
            calls.iter().map(|(offset, _, _)| *offset).collect::<Vec<_>>(),
            vec![0, 2, 4]
        );
    }

    #[tokio::test]
    async fn placeholders_are_skipped_but_advance_offset() {
        let source = FakeSource::new(vec![
            Item::normal(5, ts(2024, 1, 20), "a"),
            Item::placeholder(4),
            Item::placeholder(3),
            Item::normal(2, ts(2024, 1, 10), "b"),
            Item::normal(1, ts(2024, 1, 5), "c"),
        ]);

        let items = collector(2)
            .collect(&source, &peer(), &january())
            .await
            .unwrap();

        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![5, 2, 1]);
        assert!(items.iter().all(|i| !i.is_placeholder()));
        let offsets: Vec<usize> = source.calls().iter().map(|(o, _, _)| *o).collect();
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn items_newer_than_until_are_skipped() {
        let source = FakeSource::new(vec![
            Item::normal(3, ts(2024, 2, 10), "future"),
            Item::normal(2, ts(2024, 1, 10), "in window"),
            Item::normal(1, ts(2023, 12, 31), "old"),
        ]);

        let items = collector(100)
            .collect(&source, &peer(), &january())
            .await
            .unwrap();

        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![2]);
    }

    #[tokio::test]
    async fn service_items_are_collected() {
        let source = FakeSource::new(vec![
            Item::service(2, ts(2024, 1, 12), "pinned a message"),
            Item::normal(1, ts(2024, 1, 11), "text"),
        ]);

        let items = collector(100)
            .collect(&source, &peer(), &january())
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].kind, ItemKind::Service);
    }

    #[tokio::test]
    async fn collect_is_idempotent() {
        let source = FakeSource::new(vec![
            Item::normal(3, ts(2024, 1, 15), "a"),
            Item::placeholder(2),
            Item::normal(1, ts(2024, 1, 2), "b"),
        ]);
        let collector = collector(2);

        let first = collector.collect(&source, &peer(), &january()).await.unwrap();
        let second = collector.collect(&source, &peer(), &january()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let result = collector(10)
            .collect(&FailingSource, &peer(), &january())
            .await;
        assert!(matches!(result, Err(Error::TransportFailure(_))));
    }

    #[tokio::test]
    async fn delete_150_ids_in_chunks_of_100() {
        let sink = RecordingSink::default();
        let ids: Vec<i32> = (1..=150).collect();

        let affected = delete_in_chunks(&sink, &peer(), &ids, 100).await.unwrap();

        let calls = sink.calls.lock().unwrap();
        assert_eq!(affected, 150);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].len(), 100);
        assert_eq!(calls[1].len(), 50);
        assert_eq!(calls[1][0], 101);
    }

    #[tokio::test]
    async fn delete_nothing_issues_no_calls() {
        let sink = RecordingSink::default();
        let affected = delete_in_chunks(&sink, &peer(), &[], 100).await.unwrap();
        assert_eq!(affected, 0);
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_rejects_zero_chunk() {
        let sink = RecordingSink::default();
        let result = delete_in_chunks(&sink, &peer(), &[1], 0).await;
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
