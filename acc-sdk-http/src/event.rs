//! Polling collector for the relay task feed.
//!
//! [`TaskEventCollector`] remembers the newest sequence it has seen, polls
//! the feed at a fixed interval and hands each newer task to a
//! [`TaskEventListener`]. Failures never stop the loop: they are logged at
//! `warn` and counted in [`CollectorStats`].
//!
//! ```text
//! Idle -> Starting -> Running -> Stopping -> Stopped
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use acc_sdk::types::{PaymentTaskItem, ShopTaskItem, TaskItem, TaskRecord};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::RelayClient;
use crate::error::ClientError;

/// Default pause between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Error a listener may return; it is logged and counted, never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Source of task records.
#[async_trait::async_trait]
pub trait TaskFeed: Send + Sync {
    /// Sequence of the newest task currently in the feed.
    async fn latest_sequence(&self) -> Result<u64, ClientError>;

    /// Records after `sequence`.
    async fn records_after(&self, sequence: u64) -> Result<Vec<TaskRecord>, ClientError>;
}

#[async_trait::async_trait]
impl TaskFeed for RelayClient {
    async fn latest_sequence(&self) -> Result<u64, ClientError> {
        self.get_latest_task_sequence().await
    }

    async fn records_after(&self, sequence: u64) -> Result<Vec<TaskRecord>, ClientError> {
        self.get_task_records(sequence).await
    }
}

#[async_trait::async_trait]
impl<T: TaskFeed + ?Sized> TaskFeed for Arc<T> {
    async fn latest_sequence(&self) -> Result<u64, ClientError> {
        (**self).latest_sequence().await
    }

    async fn records_after(&self, sequence: u64) -> Result<Vec<TaskRecord>, ClientError> {
        (**self).records_after(sequence).await
    }
}

/// Receives the tasks observed by a [`TaskEventCollector`].
pub trait TaskEventListener: Send + Sync {
    /// A `pay_new` or `pay_cancel` task.
    ///
    /// # Errors
    ///
    /// Any error is logged and counted as a collector failure.
    fn on_new_payment_event(
        &self,
        kind: &str,
        code: i64,
        message: &str,
        sequence: u64,
        item: &PaymentTaskItem,
    ) -> Result<(), ListenerError>;

    /// Any other task.
    ///
    /// # Errors
    ///
    /// Any error is logged and counted as a collector failure.
    fn on_new_shop_event(
        &self,
        kind: &str,
        code: i64,
        message: &str,
        sequence: u64,
        item: &ShopTaskItem,
    ) -> Result<(), ListenerError>;
}

/// Lifecycle of a [`TaskEventCollector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CollectorState {
    /// Created, not started.
    Idle = 0,
    /// Fetching the starting sequence.
    Starting = 1,
    /// Polling.
    Running = 2,
    /// Stop requested; the current iteration is finishing.
    Stopping = 3,
    /// Loop exited.
    Stopped = 4,
}

impl CollectorState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Counters of a [`TaskEventCollector`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStats {
    /// Completed feed requests.
    pub polls: u64,
    /// Tasks handed to the listener successfully.
    pub dispatched: u64,
    /// Swallowed errors from the feed, decoding or the listener.
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    polls: AtomicU64,
    dispatched: AtomicU64,
    failures: AtomicU64,
}

struct Shared<F, L> {
    feed: F,
    listener: L,
    interval: Duration,
    state: AtomicU8,
    last_seen: AtomicU64,
    counters: Counters,
}

impl<F: TaskFeed, L: TaskEventListener> Shared<F, L> {
    fn state(&self) -> CollectorState {
        CollectorState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: CollectorState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn fail(&self) {
        self.counters.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Fetches the starting sequence, retrying every interval until it
    /// succeeds or `cancel` fires. Returns `false` when cancelled.
    async fn seed(&self, cancel: &CancellationToken) -> bool {
        loop {
            match self.feed.latest_sequence().await {
                Ok(sequence) => {
                    self.last_seen.fetch_max(sequence, Ordering::AcqRel);
                    tracing::info!(sequence, "Task collector starting");
                    return true;
                }
                Err(err) => {
                    self.fail();
                    tracing::warn!(error = %err, "Failed to fetch the latest task sequence");
                }
            }
            tokio::select! {
                () = cancel.cancelled() => return false,
                () = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    async fn poll(&self) {
        let after = self.last_seen.load(Ordering::Acquire);
        let records = match self.feed.records_after(after).await {
            Ok(records) => records,
            Err(err) => {
                self.fail();
                tracing::warn!(error = %err, after, "Failed to fetch tasks");
                return;
            }
        };
        self.counters.polls.fetch_add(1, Ordering::Relaxed);

        for record in records {
            let sequence = record.sequence;
            // claim the sequence; a concurrent poll that got there first wins
            if self.last_seen.fetch_max(sequence, Ordering::AcqRel) >= sequence {
                continue;
            }
            match self.dispatch(record) {
                Ok(()) => {
                    self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    self.fail();
                    tracing::warn!(error = %err, sequence, "Failed to dispatch task");
                }
            }
        }
    }

    fn dispatch(&self, record: TaskRecord) -> Result<(), ListenerError> {
        let event = record.into_event()?;
        match &event.item {
            TaskItem::Payment(item) => self.listener.on_new_payment_event(
                &event.kind,
                event.code,
                &event.message,
                event.sequence,
                item,
            ),
            TaskItem::Shop(item) => self.listener.on_new_shop_event(
                &event.kind,
                event.code,
                &event.message,
                event.sequence,
                item,
            ),
        }
    }
}

/// Background poller that forwards new tasks to a listener.
pub struct TaskEventCollector<F, L> {
    shared: Arc<Shared<F, L>>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<F, L> fmt::Debug for TaskEventCollector<F, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEventCollector")
            .field(
                "state",
                &CollectorState::from_u8(self.shared.state.load(Ordering::Acquire)),
            )
            .field("last_seen", &self.shared.last_seen.load(Ordering::Acquire))
            .field("counters", &self.shared.counters)
            .finish_non_exhaustive()
    }
}

impl<F, L> TaskEventCollector<F, L>
where
    F: TaskFeed + 'static,
    L: TaskEventListener + 'static,
{
    /// Creates an idle collector polling every [`DEFAULT_POLL_INTERVAL`].
    pub fn new(feed: F, listener: L) -> Self {
        Self::with_interval(feed, listener, DEFAULT_POLL_INTERVAL)
    }

    /// Creates an idle collector with a custom poll interval.
    pub fn with_interval(feed: F, listener: L, interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                feed,
                listener,
                interval,
                state: AtomicU8::new(CollectorState::Idle as u8),
                last_seen: AtomicU64::new(0),
                counters: Counters::default(),
            }),
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CollectorState {
        self.shared.state()
    }

    /// Newest sequence seen so far; never decreases.
    pub fn last_sequence(&self) -> u64 {
        self.shared.last_seen.load(Ordering::Acquire)
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CollectorStats {
        let counters = &self.shared.counters;
        CollectorStats {
            polls: counters.polls.load(Ordering::Relaxed),
            dispatched: counters.dispatched.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Spawns the polling loop on the current Tokio runtime.
    ///
    /// Returns `false` if the collector was already started or stopped.
    pub async fn start(&self) -> bool {
        let mut handle = self.handle.lock().await;
        if self
            .shared
            .state
            .compare_exchange(
                CollectorState::Idle as u8,
                CollectorState::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        *handle = Some(tokio::spawn(async move {
            if shared.seed(&cancel).await {
                shared.set_state(CollectorState::Running);
                loop {
                    shared.poll().await;
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(shared.interval) => {}
                    }
                }
            }
            shared.set_state(CollectorState::Stopped);
            tracing::info!("Task collector stopped");
        }));
        true
    }

    /// Runs a single poll on the caller's task.
    ///
    /// Useful for callers that drive their own schedule; does not require
    /// [`TaskEventCollector::start`].
    pub async fn poll_once(&self) {
        self.shared.poll().await;
    }

    /// Sets the starting sequence without querying the feed.
    ///
    /// Has no effect if a newer sequence has already been seen.
    pub fn resume_from(&self, sequence: u64) {
        self.shared.last_seen.fetch_max(sequence, Ordering::AcqRel);
    }

    /// Stops the loop and waits for the current iteration to finish.
    ///
    /// Idempotent; stopping an idle collector moves it straight to
    /// [`CollectorState::Stopped`].
    pub async fn stop(&self) {
        let mut handle = self.handle.lock().await;
        if self.state() == CollectorState::Stopped {
            return;
        }
        self.cancel.cancel();
        if let Some(task) = handle.take() {
            self.shared.set_state(CollectorState::Stopping);
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "Task collector exited abnormally");
            }
        }
        self.shared.set_state(CollectorState::Stopped);
    }
}

impl<F, L> Drop for TaskEventCollector<F, L> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acc_sdk::error::{ResponseError, ServerError};
    use serde_json::json;
    use std::collections::VecDeque;

    fn shop_record(sequence: u64) -> TaskRecord {
        serde_json::from_value(json!({
            "sequence": sequence,
            "type": "shop_update",
            "code": 0,
            "message": "Success",
            "data": {
                "taskId": format!("0x{sequence:02x}"),
                "shopId": "0x0001be96d74202df38fd21462ffcef10dfe0fcbd7caa3947689a3903e8b6b874",
                "name": "Shop",
                "currency": "php",
                "status": 1,
                "account": "0x5A3Fc8990417b3e6ddCdAE0E8039E798A609Ef84",
                "taskStatus": 2
            }
        }))
        .unwrap()
    }

    fn payment_record(sequence: u64) -> TaskRecord {
        serde_json::from_value(json!({
            "sequence": sequence,
            "type": "pay_new",
            "code": 0,
            "message": "Success",
            "data": {
                "paymentId": "0x6e3b5e0a0a1c1e1b2c4a9b0e2f0c6a8d3b1f9e2d7c5a4b3e2d1c0b9a8f7e6d5c",
                "purchaseId": "P000001",
                "amount": "1000000000000000000",
                "currency": "php",
                "shopId": "0x0001be96d74202df38fd21462ffcef10dfe0fcbd7caa3947689a3903e8b6b874",
                "account": "0x5A3Fc8990417b3e6ddCdAE0E8039E798A609Ef84",
                "paidPoint": "1",
                "paidValue": "1",
                "feePoint": "0",
                "feeValue": "0",
                "totalPoint": "1",
                "totalValue": "1",
                "terminalId": "POS001",
                "paymentStatus": 11
            }
        }))
        .unwrap()
    }

    fn broken_record(sequence: u64) -> TaskRecord {
        serde_json::from_value(json!({
            "sequence": sequence,
            "type": "pay_cancel",
            "code": 0,
            "message": "",
            "data": {"paymentId": "not-hex"}
        }))
        .unwrap()
    }

    #[derive(Default)]
    struct FakeFeed {
        latest: u64,
        batches: std::sync::Mutex<VecDeque<Result<Vec<TaskRecord>, ClientError>>>,
        requested: std::sync::Mutex<Vec<u64>>,
    }

    impl FakeFeed {
        fn new(latest: u64) -> Self {
            Self {
                latest,
                ..Self::default()
            }
        }

        fn push(&self, batch: Result<Vec<TaskRecord>, ClientError>) {
            self.batches.lock().unwrap().push_back(batch);
        }
    }

    #[async_trait::async_trait]
    impl TaskFeed for FakeFeed {
        async fn latest_sequence(&self) -> Result<u64, ClientError> {
            Ok(self.latest)
        }

        async fn records_after(&self, sequence: u64) -> Result<Vec<TaskRecord>, ClientError> {
            self.requested.lock().unwrap().push(sequence);
            self.batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: std::sync::Mutex<Vec<(String, u64)>>,
        reject: Option<u64>,
    }

    impl Recorder {
        fn record(&self, kind: &str, sequence: u64) -> Result<(), ListenerError> {
            if self.reject == Some(sequence) {
                return Err("rejected".into());
            }
            self.seen.lock().unwrap().push((kind.to_owned(), sequence));
            Ok(())
        }

        fn sequences(&self) -> Vec<u64> {
            self.seen.lock().unwrap().iter().map(|(_, s)| *s).collect()
        }
    }

    impl TaskEventListener for Arc<Recorder> {
        fn on_new_payment_event(
            &self,
            kind: &str,
            _code: i64,
            _message: &str,
            sequence: u64,
            item: &PaymentTaskItem,
        ) -> Result<(), ListenerError> {
            assert_eq!(item.purchase_id, "P000001");
            self.record(kind, sequence)
        }

        fn on_new_shop_event(
            &self,
            kind: &str,
            _code: i64,
            _message: &str,
            sequence: u64,
            item: &ShopTaskItem,
        ) -> Result<(), ListenerError> {
            assert_eq!(item.name, "Shop");
            self.record(kind, sequence)
        }
    }

    #[tokio::test]
    async fn dispatches_each_sequence_once() {
        let feed = Arc::new(FakeFeed::new(0));
        feed.push(Ok(vec![shop_record(1), payment_record(2)]));
        feed.push(Ok(vec![payment_record(2), shop_record(3)]));
        let recorder = Arc::new(Recorder::default());
        let collector = TaskEventCollector::new(Arc::clone(&feed), Arc::clone(&recorder));

        collector.poll_once().await;
        collector.poll_once().await;

        assert_eq!(recorder.sequences(), vec![1, 2, 3]);
        assert_eq!(recorder.seen.lock().unwrap()[1].0, "pay_new");
        assert_eq!(collector.last_sequence(), 3);
        assert_eq!(*feed.requested.lock().unwrap(), vec![0, 2]);
        assert_eq!(
            collector.stats(),
            CollectorStats {
                polls: 2,
                dispatched: 3,
                failures: 0
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn overlapping_polls_dispatch_once() {
        let feed = Arc::new(FakeFeed::new(0));
        for _ in 0..2 {
            feed.push(Ok(vec![shop_record(1), shop_record(2), shop_record(3)]));
        }
        let recorder = Arc::new(Recorder::default());
        let collector = Arc::new(TaskEventCollector::new(
            Arc::clone(&feed),
            Arc::clone(&recorder),
        ));

        let first = tokio::spawn({
            let collector = Arc::clone(&collector);
            async move { collector.poll_once().await }
        });
        collector.poll_once().await;
        first.await.unwrap();

        let mut sequences = recorder.sequences();
        sequences.sort_unstable();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(collector.last_sequence(), 3);
        assert_eq!(collector.stats().dispatched, 3);
    }

    #[tokio::test]
    async fn last_sequence_never_moves_back() {
        let feed = Arc::new(FakeFeed::new(0));
        feed.push(Ok(vec![shop_record(5), shop_record(4)]));
        let recorder = Arc::new(Recorder::default());
        let collector = TaskEventCollector::new(Arc::clone(&feed), Arc::clone(&recorder));
        collector.resume_from(3);

        collector.poll_once().await;
        assert_eq!(collector.last_sequence(), 5);
        assert_eq!(recorder.sequences(), vec![5]);

        collector.resume_from(1);
        assert_eq!(collector.last_sequence(), 5);
    }

    #[tokio::test]
    async fn failures_are_counted_and_skipped() {
        let feed = Arc::new(FakeFeed::new(0));
        feed.push(Err(ClientError::from(ResponseError::from(
            ServerError::new(500).with_message("down"),
        ))));
        feed.push(Ok(vec![broken_record(1), shop_record(2), shop_record(3)]));
        let recorder = Arc::new(Recorder {
            reject: Some(2),
            ..Recorder::default()
        });
        let collector = TaskEventCollector::new(Arc::clone(&feed), Arc::clone(&recorder));

        collector.poll_once().await;
        collector.poll_once().await;

        assert_eq!(recorder.sequences(), vec![3]);
        assert_eq!(collector.last_sequence(), 3);
        assert_eq!(
            collector.stats(),
            CollectorStats {
                polls: 1,
                dispatched: 1,
                failures: 3
            }
        );
    }

    #[tokio::test]
    async fn start_skips_backlog_and_stop_is_idempotent() {
        let feed = Arc::new(FakeFeed::new(10));
        feed.push(Ok(vec![shop_record(9), shop_record(11)]));
        let recorder = Arc::new(Recorder::default());
        let collector = TaskEventCollector::with_interval(
            Arc::clone(&feed),
            Arc::clone(&recorder),
            Duration::from_millis(10),
        );
        assert_eq!(collector.state(), CollectorState::Idle);

        assert!(collector.start().await);
        assert!(!collector.start().await);
        for _ in 0..200 {
            if collector.stats().dispatched > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        collector.stop().await;
        assert_eq!(collector.state(), CollectorState::Stopped);
        collector.stop().await;
        assert_eq!(collector.state(), CollectorState::Stopped);
        assert!(!collector.start().await);
        assert_eq!(recorder.sequences(), vec![11]);
        assert_eq!(feed.requested.lock().unwrap().first(), Some(&10));
    }

    #[tokio::test]
    async fn stopping_an_idle_collector() {
        let collector = TaskEventCollector::new(
            Arc::new(FakeFeed::new(0)),
            Arc::new(Recorder::default()),
        );
        collector.stop().await;
        assert_eq!(collector.state(), CollectorState::Stopped);
        assert_eq!(collector.stats(), CollectorStats::default());
    }
}
