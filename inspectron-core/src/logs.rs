//! Per-job log channels and idle-timeout subscriptions.
//!
//! The running job writes lines through a [`JobLogger`]. Every subscriber
//! gets its own queue, so readers never compete for a line: each published
//! line is fanned out to all live subscribers and kept in a bounded history
//! that late subscribers replay first.

use crate::job::JobId;
use chrono::{SecondsFormat, Utc};
use futures::Stream;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_IDLE_POLLS: u32 = 60;
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub poll_interval: Duration,
    /// Consecutive empty polls before a subscription ends.
    pub max_idle_polls: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_idle_polls: DEFAULT_MAX_IDLE_POLLS,
        }
    }
}

/// What a subscriber sees on each poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Line(String),
    KeepAlive,
    /// Final notice. Nothing follows it.
    Inactive(String),
}

impl StreamEvent {
    /// Server-sent-events framing.
    pub fn to_sse_frame(&self) -> String {
        match self {
            StreamEvent::Line(line) => format!("data: {}\n\n", line),
            StreamEvent::KeepAlive => ": ping\n\n".to_string(),
            StreamEvent::Inactive(notice) => format!("data: {}\n\n", notice),
        }
    }
}

#[derive(Debug)]
struct ChannelState {
    history: VecDeque<String>,
    capacity: usize,
    subscribers: Vec<mpsc::UnboundedSender<String>>,
}

/// Append-only line channel for one job.
#[derive(Debug, Clone)]
pub struct LogChannel {
    job_id: JobId,
    state: Arc<Mutex<ChannelState>>,
}

impl LogChannel {
    pub fn new(job_id: JobId, capacity: usize) -> Self {
        Self {
            job_id,
            state: Arc::new(Mutex::new(ChannelState {
                history: VecDeque::new(),
                capacity: capacity.max(1),
                subscribers: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Appends a line and hands a copy to every live subscriber.
    pub fn publish(&self, line: impl Into<String>) {
        let line = line.into();
        let mut state = self.lock();
        if state.history.len() >= state.capacity {
            state.history.pop_front();
        }
        state.history.push_back(line.clone());
        state.subscribers.retain(|tx| tx.send(line.clone()).is_ok());
    }

    /// Opens a subscription that replays the retained history and then
    /// follows new lines.
    pub fn subscribe(&self, config: StreamConfig) -> LogSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        for line in &state.history {
            // The receiver is alive, so this cannot fail.
            let _ = tx.send(line.clone());
        }
        state.subscribers.push(tx);
        LogSubscription::new(self.job_id, rx, config)
    }

    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    pub fn history(&self) -> Vec<String> {
        self.lock().history.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionState {
    Open,
    /// The idle budget is spent; the next poll yields the notice.
    Expiring,
    Finished,
}

/// One reader's view of a [`LogChannel`].
#[derive(Debug)]
pub struct LogSubscription {
    job_id: JobId,
    rx: mpsc::UnboundedReceiver<String>,
    config: StreamConfig,
    idle_polls: u32,
    state: SubscriptionState,
}

impl LogSubscription {
    fn new(job_id: JobId, rx: mpsc::UnboundedReceiver<String>, config: StreamConfig) -> Self {
        Self {
            job_id,
            rx,
            config,
            idle_polls: 0,
            state: SubscriptionState::Open,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn is_finished(&self) -> bool {
        self.state == SubscriptionState::Finished
    }

    /// Polls once. A line resets the idle counter; an empty poll sleeps the
    /// poll interval and yields a keep-alive. Returns `None` after the
    /// inactivity notice.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        match self.state {
            SubscriptionState::Finished => return None,
            SubscriptionState::Expiring => {
                self.state = SubscriptionState::Finished;
                return Some(StreamEvent::Inactive(format!(
                    "Job {} completed or inactive",
                    self.job_id
                )));
            }
            SubscriptionState::Open => {}
        }

        if let Ok(line) = self.rx.try_recv() {
            self.idle_polls = 0;
            return Some(StreamEvent::Line(line));
        }

        self.idle_polls += 1;
        tokio::time::sleep(self.config.poll_interval).await;
        if self.idle_polls >= self.config.max_idle_polls {
            self.state = SubscriptionState::Expiring;
            // Lets `publish` prune this subscriber; queued lines stay drainable.
            self.rx.close();
        }
        Some(StreamEvent::KeepAlive)
    }

    /// Lines already queued for this subscriber, without waiting.
    pub fn drain_pending(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    pub fn into_stream(self) -> impl Stream<Item = StreamEvent> + Send {
        futures::stream::unfold(self, |mut subscription| async move {
            let event = subscription.next_event().await?;
            Some((event, subscription))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Writes formatted lines to a job's channel and mirrors them to `tracing`.
#[derive(Debug, Clone)]
pub struct JobLogger {
    channel: LogChannel,
}

impl JobLogger {
    pub fn new(channel: LogChannel) -> Self {
        Self { channel }
    }

    pub fn job_id(&self) -> JobId {
        self.channel.job_id()
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let job_id = self.channel.job_id();
        match level {
            LogLevel::Info => info!(%job_id, "{}", message),
            LogLevel::Warn => warn!(%job_id, "{}", message),
            LogLevel::Error => error!(%job_id, "{}", message),
        }
        self.channel.publish(format_line(job_id, level, message));
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message.as_ref());
    }
}

/// `<timestamp> - job.<id> - <LEVEL> - <message>`
pub fn format_line(job_id: JobId, level: LogLevel, message: &str) -> String {
    format!(
        "{} - job.{} - {} - {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        job_id,
        level.as_str(),
        message
    )
}

/// Process-wide table of per-job channels.
#[derive(Debug)]
pub struct LogHub {
    channels: Mutex<HashMap<JobId, LogChannel>>,
    history_capacity: usize,
}

impl LogHub {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            history_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, LogChannel>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the job's channel, creating it on first use.
    pub fn channel(&self, job_id: JobId) -> LogChannel {
        self.lock()
            .entry(job_id)
            .or_insert_with(|| LogChannel::new(job_id, self.history_capacity))
            .clone()
    }

    pub fn logger(&self, job_id: JobId) -> JobLogger {
        JobLogger::new(self.channel(job_id))
    }

    pub fn get(&self, job_id: &JobId) -> Option<LogChannel> {
        self.lock().get(job_id).cloned()
    }

    pub fn subscribe(&self, job_id: &JobId, config: StreamConfig) -> Option<LogSubscription> {
        self.get(job_id).map(|channel| channel.subscribe(config))
    }
}

impl Default for LogHub {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
