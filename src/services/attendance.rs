//! Attendance decision engine
//!
//! Given a beacon event and the current local time, decides which templated
//! message goes to the team channel, persists the attendance record, and
//! produces the acknowledgement reply for the originating user.
//!
//! Persistence is authoritative: a failed append aborts the event before any
//! notification goes out. Notification delivery is best-effort and never
//! rolls back or re-attempts the persisted record.

use crate::domain::types::{AttendanceRecord, BeaconKind, Event, RecordKind};
use crate::infra::error::StoreError;
use crate::infra::metrics::Metrics;
use crate::io::slack::TeamNotifier;
use crate::io::store::AttendanceStore;
use chrono::{DateTime, Duration, FixedOffset, Timelike};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Rolling window for the check-in rate limit
const RECENT_WINDOW_MIN: i64 = 60;
/// Window approximating "today" (a work day, not a calendar day)
const TODAY_WINDOW_MIN: i64 = 480;
/// More than this many records in the recent window trips the rate limit
const RECENT_LIMIT: usize = 9;
/// Arrivals after this hour get scolded instead of greeted
const MORNING_CUTOFF_HOUR: u32 = 10;
/// Departures before this hour count as leaving early
const EARLY_LEAVE_HOUR: u32 = 19;
/// Departures at or after this hour count as working late
const LATE_LEAVE_HOUR: u32 = 22;

pub const REPLY_ARRIVED: &str = "来た！";
pub const REPLY_DEPARTED: &str = "去った！";
pub const REPLY_BEACON_OTHER: &str = "Beaconイベントキャッチ！";

const NOTIFY_GOOD_MORNING: &str = "おはよう！今日も１日頑張ろう！";
const NOTIFY_LEAVING_EARLY: &str = "あれ？今日は帰るの早いね！";
const NOTIFY_WORKED_LATE: &str = "今日は遅くまでよく頑張りました！";
const NOTIFY_GOOD_DAY: &str = "今日も１日お疲れ様！";

/// Pick the team notification for an arrival, first matching rule wins.
///
/// `recent_count` and `today_count` are record counts over the rolling
/// 60-minute and 480-minute windows ending at `now`, taken after the
/// arrival itself was persisted.
pub fn arrival_notification(
    now: DateTime<FixedOffset>,
    recent_count: usize,
    today_count: usize,
) -> Option<String> {
    if recent_count > RECENT_LIMIT {
        return Some(format!(
            "仕事中なのにここ1時間で{}回もLINEを起動しているよ！",
            recent_count
        ));
    }
    if now.hour() > MORNING_CUTOFF_HOUR && today_count == 1 {
        return Some(format!("もう{}時だよ！来るの遅い！", now.hour()));
    }
    if now.hour() <= MORNING_CUTOFF_HOUR && today_count == 1 {
        return Some(NOTIFY_GOOD_MORNING.to_string());
    }
    None
}

/// Pick the team notification for a departure. The three buckets are
/// exhaustive over the 24-hour clock, so a departure always notifies.
pub fn departure_notification(now: DateTime<FixedOffset>) -> &'static str {
    let hour = now.hour();
    if hour < EARLY_LEAVE_HOUR {
        NOTIFY_LEAVING_EARLY
    } else if hour >= LATE_LEAVE_HOUR {
        NOTIFY_WORKED_LATE
    } else {
        NOTIFY_GOOD_DAY
    }
}

/// Orchestrates persist -> count -> notify for one inbound event and yields
/// the reply text. Sending the reply stays with the caller, which owns the
/// reply token.
pub struct AttendanceService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    metrics: Arc<Metrics>,
}

impl<S: AttendanceStore, N: TeamNotifier> AttendanceService<S, N> {
    pub fn new(store: Arc<S>, notifier: Arc<N>, metrics: Arc<Metrics>) -> Self {
        Self { store, notifier, metrics }
    }

    /// Process one event at local time `now`.
    ///
    /// Returns the reply text for the originating user. A persistence
    /// failure is the only fatal outcome; notification failures are logged
    /// and swallowed.
    pub async fn handle_event(
        &self,
        event: &Event,
        now: DateTime<FixedOffset>,
    ) -> Result<String, StoreError> {
        match event {
            Event::Beacon { kind: BeaconKind::Enter, .. } => self.handle_arrival(now).await,
            Event::Beacon { kind: BeaconKind::Leave, .. } => self.handle_departure(now).await,
            Event::Beacon { kind: BeaconKind::Other, .. } => {
                debug!("beacon_event_unclassified");
                Ok(REPLY_BEACON_OTHER.to_string())
            }
            Event::Text { text, .. } => {
                // Pure echo, no side effects beyond the reply itself
                self.metrics.record_echo();
                debug!(chars = %text.chars().count(), "text_echoed");
                Ok(text.clone())
            }
        }
    }

    async fn handle_arrival(&self, now: DateTime<FixedOffset>) -> Result<String, StoreError> {
        self.persist(RecordKind::Arrival, now)?;
        self.metrics.record_arrival();

        let recent_count =
            self.count_or_zero(now - Duration::minutes(RECENT_WINDOW_MIN), now, "recent");
        let today_count =
            self.count_or_zero(now - Duration::minutes(TODAY_WINDOW_MIN), now, "today");

        info!(
            recent_count = %recent_count,
            today_count = %today_count,
            hour = %now.hour(),
            "arrival_recorded"
        );

        if let Some(message) = arrival_notification(now, recent_count, today_count) {
            self.notify(&message).await;
        }

        Ok(REPLY_ARRIVED.to_string())
    }

    async fn handle_departure(&self, now: DateTime<FixedOffset>) -> Result<String, StoreError> {
        self.persist(RecordKind::Departure, now)?;
        self.metrics.record_departure();

        info!(hour = %now.hour(), "departure_recorded");

        self.notify(departure_notification(now)).await;

        Ok(REPLY_DEPARTED.to_string())
    }

    fn persist(&self, kind: RecordKind, now: DateTime<FixedOffset>) -> Result<(), StoreError> {
        let record = AttendanceRecord::new(kind, now);
        self.store.append(&record).map_err(|e| {
            self.metrics.record_persist_failure();
            error!(kind = %kind.as_str(), error = %e, "attendance_persist_failed");
            e
        })
    }

    /// A failed window query degrades to zero instead of failing the event,
    /// which suppresses count-gated notifications for that event.
    fn count_or_zero(
        &self,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
        window: &'static str,
    ) -> usize {
        match self.store.count_in_range(from, to) {
            Ok(count) => count,
            Err(e) => {
                warn!(window = %window, error = %e, "count_query_failed");
                0
            }
        }
    }

    async fn notify(&self, message: &str) {
        match self.notifier.post(message).await {
            Ok(()) => self.metrics.record_notification(),
            Err(e) => {
                self.metrics.record_notification_failure();
                error!(error = %e, "notification_failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ReplyToken;
    use crate::infra::error::NotifyError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    fn jst(h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 4, 1, h, m, 0)
            .unwrap()
    }

    /// In-memory store with a switchable failure mode
    #[derive(Default)]
    struct MemoryStore {
        records: Mutex<Vec<AttendanceRecord>>,
        fail_appends: bool,
    }

    impl MemoryStore {
        fn failing() -> Self {
            Self { records: Mutex::new(Vec::new()), fail_appends: true }
        }

        fn seeded(records: Vec<AttendanceRecord>) -> Self {
            Self { records: Mutex::new(records), fail_appends: false }
        }

        fn len(&self) -> usize {
            self.records.lock().len()
        }
    }

    impl AttendanceStore for MemoryStore {
        fn append(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
            if self.fail_appends {
                return Err(StoreError::Io(std::io::Error::other("disk gone")));
            }
            self.records.lock().push(record.clone());
            Ok(())
        }

        fn count_in_range(
            &self,
            from: DateTime<FixedOffset>,
            to: DateTime<FixedOffset>,
        ) -> Result<usize, StoreError> {
            Ok(self
                .records
                .lock()
                .iter()
                .filter(|r| r.at >= from && r.at <= to)
                .count())
        }
    }

    /// Notifier that records every posted message
    #[derive(Default)]
    struct RecordingNotifier {
        posts: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn posts(&self) -> Vec<String> {
            self.posts.lock().clone()
        }
    }

    #[async_trait]
    impl TeamNotifier for RecordingNotifier {
        async fn post(&self, text: &str) -> Result<(), NotifyError> {
            self.posts.lock().push(text.to_string());
            Ok(())
        }
    }

    fn service(
        store: MemoryStore,
    ) -> (AttendanceService<MemoryStore, RecordingNotifier>, Arc<MemoryStore>, Arc<RecordingNotifier>)
    {
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::default());
        let svc = AttendanceService::new(store.clone(), notifier.clone(), Arc::new(Metrics::new()));
        (svc, store, notifier)
    }

    fn enter() -> Event {
        Event::Beacon { reply_token: ReplyToken("rt".to_string()), kind: BeaconKind::Enter }
    }

    fn leave() -> Event {
        Event::Beacon { reply_token: ReplyToken("rt".to_string()), kind: BeaconKind::Leave }
    }

    #[test]
    fn test_arrival_notification_good_morning() {
        let msg = arrival_notification(jst(9, 0), 1, 1).unwrap();
        assert_eq!(msg, NOTIFY_GOOD_MORNING);
        // Hour 10 still counts as morning
        assert_eq!(arrival_notification(jst(10, 59), 1, 1).unwrap(), NOTIFY_GOOD_MORNING);
    }

    #[test]
    fn test_arrival_notification_late() {
        let msg = arrival_notification(jst(11, 0), 1, 1).unwrap();
        assert_eq!(msg, "もう11時だよ！来るの遅い！");
    }

    #[test]
    fn test_arrival_morning_and_late_are_exclusive() {
        for hour in 0..24 {
            let msg = arrival_notification(jst(hour, 0), 1, 1).unwrap();
            let is_morning = msg == NOTIFY_GOOD_MORNING;
            let is_late = msg.starts_with("もう");
            assert!(is_morning != is_late, "hour {}: {}", hour, msg);
            assert_eq!(is_morning, hour <= 10);
        }
    }

    #[test]
    fn test_arrival_notification_rate_limit_wins() {
        // Rate limit overrides the time-of-day rules at any hour
        let msg = arrival_notification(jst(9, 0), 10, 1).unwrap();
        assert_eq!(msg, "仕事中なのにここ1時間で10回もLINEを起動しているよ！");
        assert!(arrival_notification(jst(15, 0), 12, 3).is_some());
    }

    #[test]
    fn test_arrival_notification_rate_limit_threshold() {
        // Exactly 9 recent records does not trip the limit
        assert!(arrival_notification(jst(15, 0), 9, 3).is_none());
        assert!(arrival_notification(jst(15, 0), 10, 3).is_some());
    }

    #[test]
    fn test_arrival_notification_silent_after_first() {
        // Second arrival of the day, nothing recent to rate-limit
        assert!(arrival_notification(jst(13, 0), 2, 2).is_none());
    }

    #[test]
    fn test_departure_notification_buckets() {
        assert_eq!(departure_notification(jst(18, 59)), NOTIFY_LEAVING_EARLY);
        assert_eq!(departure_notification(jst(19, 0)), NOTIFY_GOOD_DAY);
        assert_eq!(departure_notification(jst(21, 59)), NOTIFY_GOOD_DAY);
        assert_eq!(departure_notification(jst(22, 0)), NOTIFY_WORKED_LATE);
        assert_eq!(departure_notification(jst(23, 0)), NOTIFY_WORKED_LATE);
        assert_eq!(departure_notification(jst(0, 0)), NOTIFY_LEAVING_EARLY);
    }

    #[test]
    fn test_departure_buckets_exhaustive() {
        for hour in 0..24 {
            let msg = departure_notification(jst(hour, 0));
            let expected = if hour < 19 {
                NOTIFY_LEAVING_EARLY
            } else if hour >= 22 {
                NOTIFY_WORKED_LATE
            } else {
                NOTIFY_GOOD_DAY
            };
            assert_eq!(msg, expected, "hour {}", hour);
        }
    }

    #[tokio::test]
    async fn test_first_arrival_of_the_day() {
        let (svc, store, notifier) = service(MemoryStore::default());

        let reply = svc.handle_event(&enter(), jst(9, 0)).await.unwrap();

        assert_eq!(reply, REPLY_ARRIVED);
        assert_eq!(store.len(), 1);
        assert_eq!(notifier.posts(), vec![NOTIFY_GOOD_MORNING.to_string()]);
    }

    #[tokio::test]
    async fn test_late_first_arrival() {
        let (svc, _, notifier) = service(MemoryStore::default());

        svc.handle_event(&enter(), jst(11, 30)).await.unwrap();

        assert_eq!(notifier.posts(), vec!["もう11時だよ！来るの遅い！".to_string()]);
    }

    #[tokio::test]
    async fn test_repeat_arrival_stays_silent() {
        let seeded = MemoryStore::seeded(vec![AttendanceRecord::new(
            RecordKind::Arrival,
            jst(9, 0),
        )]);
        let (svc, store, notifier) = service(seeded);

        svc.handle_event(&enter(), jst(9, 30)).await.unwrap();

        assert_eq!(store.len(), 2);
        assert!(notifier.posts().is_empty());
    }

    #[tokio::test]
    async fn test_tenth_checkin_trips_rate_limit() {
        let seeded: Vec<AttendanceRecord> = (0..9)
            .map(|i| AttendanceRecord::new(RecordKind::Arrival, jst(14, 5 * i)))
            .collect();
        let (svc, _, notifier) = service(MemoryStore::seeded(seeded));

        svc.handle_event(&enter(), jst(14, 50)).await.unwrap();

        assert_eq!(
            notifier.posts(),
            vec!["仕事中なのにここ1時間で10回もLINEを起動しているよ！".to_string()]
        );
    }

    #[tokio::test]
    async fn test_departure_notifies_and_replies() {
        let (svc, store, notifier) = service(MemoryStore::default());

        let reply = svc.handle_event(&leave(), jst(22, 15)).await.unwrap();

        assert_eq!(reply, REPLY_DEPARTED);
        assert_eq!(store.len(), 1);
        assert_eq!(notifier.posts(), vec![NOTIFY_WORKED_LATE.to_string()]);
    }

    #[tokio::test]
    async fn test_persist_failure_suppresses_notification() {
        let (svc, _, notifier) = service(MemoryStore::failing());

        let result = svc.handle_event(&enter(), jst(9, 0)).await;

        assert!(result.is_err());
        assert!(notifier.posts().is_empty());
    }

    #[tokio::test]
    async fn test_text_event_echoes_verbatim() {
        let (svc, store, notifier) = service(MemoryStore::default());
        let event = Event::Text {
            reply_token: ReplyToken("rt".to_string()),
            text: "今日の天気は？".to_string(),
        };

        let reply = svc.handle_event(&event, jst(12, 0)).await.unwrap();

        assert_eq!(reply, "今日の天気は？");
        assert_eq!(store.len(), 0);
        assert!(notifier.posts().is_empty());
    }

    #[tokio::test]
    async fn test_unclassified_beacon_acknowledged_only() {
        let (svc, store, notifier) = service(MemoryStore::default());
        let event =
            Event::Beacon { reply_token: ReplyToken("rt".to_string()), kind: BeaconKind::Other };

        let reply = svc.handle_event(&event, jst(9, 0)).await.unwrap();

        assert_eq!(reply, REPLY_BEACON_OTHER);
        assert_eq!(store.len(), 0);
        assert!(notifier.posts().is_empty());
    }
}
