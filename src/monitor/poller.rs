//! Change detector and poller.
//!
//! While `Polling`, a single task ticks on a fixed period: fetch the newest
//! inbox item → compare with the cursor → on change emit `ItemObserved` and,
//! when the item has a body, the evaluation result. Ticks run sequentially in
//! that task and late ticks are skipped, so two ticks never overlap.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::event::Event;
use crate::audit::RuleEngine;
use crate::error::EvaluationError;
use crate::inbox::{InboxItem, InboxSource};

/// Receiver of the events a poll run produces.
///
/// `run` identifies the poll run that produced the event; sinks use it to
/// discard events from a run that has since been stopped.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, run: u64, event: Event);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollerState {
    Idle,
    Polling,
}

/// Last observed inbox item id. Written only by the poll task.
#[derive(Debug, Clone, Default)]
pub struct Cursor(Arc<RwLock<Option<String>>>);

impl Cursor {
    pub async fn get(&self) -> Option<String> {
        self.0.read().await.clone()
    }

    /// Move the cursor to `id`. Returns `false` if it was already there.
    pub async fn advance(&self, id: &str) -> bool {
        let mut current = self.0.write().await;
        if current.as_deref() == Some(id) {
            return false;
        }
        *current = Some(id.to_string());
        true
    }
}

struct PollRun {
    id: u64,
    handle: JoinHandle<()>,
}

/// Demand-driven poller: started and stopped by the registry.
pub struct Poller {
    source: Arc<dyn InboxSource>,
    engine: Arc<RuleEngine>,
    interval: Duration,
    cursor: Cursor,
    run: Option<PollRun>,
    runs_started: u64,
    runs_stopped: u64,
}

impl Poller {
    pub fn new(source: Arc<dyn InboxSource>, engine: Arc<RuleEngine>, interval: Duration) -> Self {
        Self {
            source,
            engine,
            interval,
            cursor: Cursor::default(),
            run: None,
            runs_started: 0,
            runs_stopped: 0,
        }
    }

    pub fn state(&self) -> PollerState {
        if self.run.is_some() {
            PollerState::Polling
        } else {
            PollerState::Idle
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Number of `Idle → Polling` transitions so far.
    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    /// Number of `Polling → Idle` transitions so far.
    pub fn runs_stopped(&self) -> u64 {
        self.runs_stopped
    }

    /// Whether `run` is the currently active poll run.
    pub fn is_current(&self, run: u64) -> bool {
        self.run.as_ref().is_some_and(|r| r.id == run)
    }

    /// `Idle → Polling`. No-op when already polling; returns whether a
    /// transition happened.
    pub fn start(&mut self, sink: Weak<dyn EventSink>) -> bool {
        if self.run.is_some() {
            return false;
        }

        self.runs_started += 1;
        let run = self.runs_started;
        let ticker = Ticker {
            run,
            source: Arc::clone(&self.source),
            engine: Arc::clone(&self.engine),
            cursor: self.cursor.clone(),
        };
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tick.tick().await;

                let Some(sink) = sink.upgrade() else {
                    debug!(run, "Event sink dropped, poll run exiting");
                    return;
                };
                ticker.tick(sink.as_ref()).await;
            }
        });

        info!(run, interval_ms = interval.as_millis() as u64, "Poller started");
        self.run = Some(PollRun { id: run, handle });
        true
    }

    /// `Polling → Idle`. Cancels the poll task; no-op when already idle.
    pub fn stop(&mut self) -> bool {
        let Some(run) = self.run.take() else {
            return false;
        };
        run.handle.abort();
        self.runs_stopped += 1;
        info!(run = run.id, "Poller stopped");
        true
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(run) = self.run.take() {
            run.handle.abort();
        }
    }
}

/// Everything one poll run needs for a tick.
pub struct Ticker {
    run: u64,
    source: Arc<dyn InboxSource>,
    engine: Arc<RuleEngine>,
    cursor: Cursor,
}

impl Ticker {
    pub fn new(run: u64, source: Arc<dyn InboxSource>, engine: Arc<RuleEngine>, cursor: Cursor) -> Self {
        Self {
            run,
            source,
            engine,
            cursor,
        }
    }

    /// One fetch → detect → evaluate → publish pass.
    pub async fn tick(&self, sink: &dyn EventSink) {
        let item = match self.source.fetch_latest().await {
            Ok(Some(item)) => item,
            Ok(None) => {
                debug!(run = self.run, "Inbox empty");
                return;
            }
            Err(e) => {
                warn!(run = self.run, error = %e, "Inbox poll failed");
                sink.publish(self.run, Event::poll_failed(e.to_string())).await;
                return;
            }
        };

        if !self.cursor.advance(&item.id).await {
            debug!(run = self.run, id = %item.id, "No new inbox item");
            return;
        }

        info!(run = self.run, id = %item.id, subject = %item.subject, "New inbox item");
        sink.publish(
            self.run,
            Event::ItemObserved {
                id: item.id.clone(),
                subject: item.subject.clone(),
                has_body: item.has_body(),
            },
        )
        .await;

        if !item.has_body() {
            return;
        }

        let id = item.id.clone();
        let subject = item.subject.clone();
        let event = match self.evaluate(item).await {
            Ok(report) => {
                info!(
                    run = self.run,
                    id = %id,
                    violations = report.violations.len(),
                    "Scan complete"
                );
                Event::ScanCompleted { id, subject, report }
            }
            Err(e) => {
                warn!(run = self.run, id = %id, error = %e, "Scan failed");
                Event::ScanFailed {
                    id,
                    reason: e.to_string(),
                }
            }
        };
        sink.publish(self.run, event).await;
    }

    async fn evaluate(&self, item: InboxItem) -> Result<crate::audit::ScanReport, EvaluationError> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.evaluate_html(&item.body))
            .await
            .map_err(|e| EvaluationError::TaskFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::audit::Outcome;
    use crate::config::AuditConfig;
    use crate::error::TransportError;

    /// Inbox stub that replays scripted responses, repeating the last one.
    struct ScriptedInbox {
        responses: Mutex<VecDeque<Result<Option<InboxItem>, String>>>,
    }

    impl ScriptedInbox {
        fn new(responses: Vec<Result<Option<InboxItem>, String>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
            })
        }
    }

    #[async_trait]
    impl InboxSource for ScriptedInbox {
        async fn fetch_latest(&self) -> Result<Option<InboxItem>, TransportError> {
            let mut responses = self.responses.lock().unwrap();
            let next = if responses.len() > 1 {
                responses.pop_front().unwrap()
            } else {
                responses.front().cloned().unwrap_or(Ok(None))
            };
            next.map_err(TransportError::Malformed)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn publish(&self, _run: u64, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn item(id: &str, body: &str) -> InboxItem {
        InboxItem {
            id: id.into(),
            subject: format!("Subject {id}"),
            body: body.into(),
        }
    }

    fn engine(max_document_bytes: usize) -> Arc<RuleEngine> {
        Arc::new(RuleEngine::new(AuditConfig { max_document_bytes }).unwrap())
    }

    fn ticker(source: Arc<ScriptedInbox>, engine: Arc<RuleEngine>) -> Ticker {
        Ticker::new(1, source, engine, Cursor::default())
    }

    #[tokio::test]
    async fn new_item_with_body_emits_observed_then_scan() {
        let source = ScriptedInbox::new(vec![Ok(Some(item("42", "<img>")))]);
        let sink = RecordingSink::default();
        ticker(source, engine(1024)).tick(&sink).await;

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            Event::ItemObserved {
                id: "42".into(),
                subject: "Subject 42".into(),
                has_body: true,
            }
        );
        match &events[1] {
            Event::ScanCompleted { id, report, .. } => {
                assert_eq!(id, "42");
                assert_eq!(report.for_rule(Outcome::Violation, "image-alt").count(), 1);
                assert_eq!(report.for_rule(Outcome::Pass, "image-alt").count(), 0);
            }
            other => panic!("Expected ScanCompleted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn same_id_twice_emits_nothing_new() {
        let source = ScriptedInbox::new(vec![Ok(Some(item("7", "<p>hi</p>")))]);
        let sink = RecordingSink::default();
        let ticker = ticker(source, engine(1024));

        ticker.tick(&sink).await;
        let after_first = sink.events().len();
        ticker.tick(&sink).await;

        assert_eq!(after_first, 2);
        assert_eq!(sink.events().len(), after_first);
    }

    #[tokio::test]
    async fn item_without_body_only_emits_observed() {
        let source = ScriptedInbox::new(vec![Ok(Some(item("1", "")))]);
        let sink = RecordingSink::default();
        ticker(source, engine(1024)).tick(&sink).await;

        assert_eq!(
            sink.events(),
            vec![Event::ItemObserved {
                id: "1".into(),
                subject: "Subject 1".into(),
                has_body: false,
            }]
        );
    }

    #[tokio::test]
    async fn empty_inbox_emits_nothing() {
        let source = ScriptedInbox::new(vec![Ok(None)]);
        let sink = RecordingSink::default();
        let ticker = ticker(source, engine(1024));
        ticker.tick(&sink).await;
        assert!(sink.events().is_empty());
        assert_eq!(ticker.cursor.get().await, None);
    }

    #[tokio::test]
    async fn transport_failure_emits_poll_failed_and_keeps_cursor() {
        let source = ScriptedInbox::new(vec![
            Ok(Some(item("1", ""))),
            Err("connection refused".into()),
            Ok(Some(item("1", ""))),
        ]);
        let sink = RecordingSink::default();
        let ticker = ticker(source, engine(1024));

        ticker.tick(&sink).await;
        ticker.tick(&sink).await;
        ticker.tick(&sink).await;

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], Event::PollFailed { reason, .. } if reason.contains("connection refused")));
        assert_eq!(ticker.cursor.get().await.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn engine_error_emits_scan_failed() {
        let source = ScriptedInbox::new(vec![Ok(Some(item("9", "<p>way too long for the limit</p>")))]);
        let sink = RecordingSink::default();
        ticker(source, engine(8)).tick(&sink).await;

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Event::ItemObserved { .. }));
        assert!(matches!(&events[1], Event::ScanFailed { id, .. } if id == "9"));
    }

    #[tokio::test]
    async fn cursor_advances_to_newest_id() {
        let source = ScriptedInbox::new(vec![Ok(Some(item("1", ""))), Ok(Some(item("2", "")))]);
        let sink = RecordingSink::default();
        let ticker = ticker(source, engine(1024));

        ticker.tick(&sink).await;
        ticker.tick(&sink).await;

        assert_eq!(sink.events().len(), 2);
        assert_eq!(ticker.cursor.get().await.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let source = ScriptedInbox::new(vec![Ok(None)]);
        let mut poller = Poller::new(source, engine(1024), Duration::from_millis(10));
        let sink: Arc<dyn EventSink> = Arc::new(RecordingSink::default());

        assert_eq!(poller.state(), PollerState::Idle);
        assert!(!poller.stop());

        assert!(poller.start(Arc::downgrade(&sink)));
        assert!(!poller.start(Arc::downgrade(&sink)));
        assert_eq!(poller.state(), PollerState::Polling);
        assert!(poller.is_current(1));

        assert!(poller.stop());
        assert!(!poller.stop());
        assert_eq!(poller.state(), PollerState::Idle);
        assert!(!poller.is_current(1));
        assert_eq!((poller.runs_started(), poller.runs_stopped()), (1, 1));
    }

    /// Empty inbox that counts fetches.
    #[derive(Default)]
    struct CountingInbox {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl InboxSource for CountingInbox {
        async fn fetch_latest(&self) -> Result<Option<InboxItem>, TransportError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn no_fetches_after_stop_until_restarted() {
        let inbox = Arc::new(CountingInbox::default());
        let mut poller = Poller::new(inbox.clone(), engine(1024), Duration::from_millis(10));
        let sink: Arc<dyn EventSink> = Arc::new(RecordingSink::default());

        poller.start(Arc::downgrade(&sink));
        tokio::time::sleep(Duration::from_millis(50)).await;
        poller.stop();
        // Let an aborted task finish unwinding.
        tokio::task::yield_now().await;

        let at_stop = inbox.fetches.load(Ordering::SeqCst);
        assert!(at_stop >= 1);
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(inbox.fetches.load(Ordering::SeqCst), at_stop);

        poller.start(Arc::downgrade(&sink));
        tokio::time::sleep(Duration::from_millis(50)).await;
        poller.stop();
        assert!(inbox.fetches.load(Ordering::SeqCst) > at_stop);
        assert_eq!((poller.runs_started(), poller.runs_stopped()), (2, 2));
    }

    #[tokio::test]
    async fn running_poller_ticks_and_stops_ticking() {
        let source = ScriptedInbox::new(vec![Ok(Some(item("5", "")))]);
        let mut poller = Poller::new(source, engine(1024), Duration::from_millis(10));
        let recorder = Arc::new(RecordingSink::default());
        let sink: Arc<dyn EventSink> = recorder.clone();

        poller.start(Arc::downgrade(&sink));
        tokio::time::sleep(Duration::from_millis(60)).await;
        poller.stop();

        // Only the first tick saw a new id.
        assert_eq!(recorder.events().len(), 1);
        assert_eq!(poller.cursor().get().await.as_deref(), Some("5"));
    }
}
