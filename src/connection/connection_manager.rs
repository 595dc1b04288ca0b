use std::time::{Duration, Instant};

use derive_more::Display;
use tracing::{debug, info, warn};

use crate::connection::{BackoffClock, Capability, JitterSource, ThreadRngJitter};
use crate::ext::DurationExt;
use crate::tree::{StoreEvent, TreeEngine, TreeObserver};

const MIN_COUNTDOWN_REARM: Duration = Duration::from_millis(100);
/// Milliseconds of countdown re-arm delay per remaining second.
const COUNTDOWN_REARM_FACTOR: u32 = 9;

/// Receiver of the decoded event stream.
pub trait EventSink {
    /// Drops everything received over previous connections.
    fn reset(&mut self);
    fn apply(&mut self, event: &StoreEvent);
}

impl<O: TreeObserver> EventSink for TreeEngine<O> {
    fn reset(&mut self) {
        TreeEngine::reset(self);
    }

    fn apply(&mut self, event: &StoreEvent) {
        TreeEngine::apply(self, event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    #[display("connecting")]
    Connecting,
    #[display("open")]
    Open,
    #[display("closed")]
    Closed,
    #[display("error")]
    Error,
    #[display("waiting")]
    WaitingToRetry,
    #[display("unsupported")]
    Unsupported,
    #[display("stopped")]
    Stopped,
}

/// What the driver has to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Open a new push channel, dropping any pending countdown timer.
    Connect,
    /// Re-evaluate the countdown after this delay.
    Wait(Duration),
    /// Nothing is scheduled.
    Idle,
}

/// Snapshot of everything the status line shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub state: ConnectionState,
    pub text: String,
    pub retry_message: Option<String>,
    pub were_back: bool,
}

/// Connection lifecycle state machine.
///
/// It performs no IO: the driver reports what the channel did together with
/// the current instant, and gets back the [`Action`] to perform.
pub struct ConnectionManager<J: JitterSource = ThreadRngJitter> {
    state: ConnectionState,
    capability: Capability,
    backoff: BackoffClock<J>,
    deadline: Option<Instant>,
    status: String,
    retry_message: Option<String>,
    were_back_for: Duration,
    were_back_until: Option<Instant>,
}

impl<J: JitterSource> ConnectionManager<J> {
    pub fn new(capability: Capability, backoff: BackoffClock<J>, were_back_for: Duration) -> Self {
        Self {
            state: ConnectionState::Connecting,
            capability,
            backoff,
            deadline: None,
            status: "loading".to_string(),
            retry_message: None,
            were_back_for,
            were_back_until: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn start(&mut self) -> Action {
        if let Capability::Unsupported { reason } = &self.capability {
            warn!("Not connecting: {}", reason);
            self.status = reason.clone();
            self.state = ConnectionState::Unsupported;
            return Action::Idle;
        }
        self.connect()
    }

    pub fn stop(&mut self) -> Action {
        info!("Stopping connection manager in state {}", self.state);
        self.state = ConnectionState::Stopped;
        self.deadline = None;
        self.retry_message = None;
        Action::Idle
    }

    pub fn on_open(&mut self, now: Instant, sink: &mut impl EventSink) {
        if self.state != ConnectionState::Connecting {
            debug!("Ignoring open notification in state {}", self.state);
            return;
        }
        if self.backoff.has_failed() {
            info!("Connection re-established");
            self.were_back_until = Some(now + self.were_back_for);
        } else {
            info!("Connection established");
        }
        self.backoff.reset();
        self.state = ConnectionState::Open;
        self.status = "open".to_string();
        sink.reset();
    }

    pub fn on_message(&mut self, payload: &str, sink: &mut impl EventSink) {
        if self.state != ConnectionState::Open {
            debug!("Dropping message received in state {}", self.state);
            return;
        }
        match StoreEvent::try_from(payload) {
            Ok(event) => sink.apply(&event),
            Err(err) => debug!("Dropping malformed message {:?}: {}", payload, err),
        }
    }

    pub fn on_closed(&mut self, now: Instant) -> Action {
        if !self.is_live() {
            return Action::Idle;
        }
        info!("Connection closed");
        self.state = ConnectionState::Closed;
        self.status = "closed".to_string();
        self.retry(now)
    }

    pub fn on_error(&mut self, now: Instant, reason: &str) -> Action {
        if !self.is_live() {
            return Action::Idle;
        }
        warn!("Connection failed: {}", reason);
        self.state = ConnectionState::Error;
        self.status = format!("error {reason}");
        self.retry(now)
    }

    /// Re-evaluates the countdown; connects once the deadline has passed.
    pub fn countdown(&mut self, now: Instant) -> Action {
        if self.state != ConnectionState::WaitingToRetry {
            return Action::Idle;
        }
        match self.deadline {
            Some(deadline) if now <= deadline => {
                let remaining = deadline - now;
                self.retry_message = Some(format!("retrying in {}", remaining.to_human_interval()));
                let rearm = rearm_delay(remaining);
                debug!("Next countdown check in {:?}", rearm);
                Action::Wait(rearm)
            }
            _ => self.connect(),
        }
    }

    /// Skips the rest of the countdown.
    pub fn retry_now(&mut self, now: Instant) -> Action {
        if self.state != ConnectionState::WaitingToRetry {
            debug!("Ignoring manual retry in state {}", self.state);
            return Action::Idle;
        }
        info!("Manual retry requested");
        self.deadline = None;
        self.countdown(now)
    }

    /// Instant at which the status line changes without any input.
    pub fn next_status_change(&self, now: Instant) -> Option<Instant> {
        self.were_back_until.filter(|until| *until > now)
    }

    pub fn status(&self, now: Instant) -> StatusLine {
        StatusLine {
            state: self.state,
            text: self.status.clone(),
            retry_message: self.retry_message.clone(),
            were_back: self.were_back_until.is_some_and(|until| now < until),
        }
    }

    fn is_live(&self) -> bool {
        matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        )
    }

    fn connect(&mut self) -> Action {
        self.state = ConnectionState::Connecting;
        self.deadline = None;
        self.retry_message = None;
        self.status = "connecting".to_string();
        Action::Connect
    }

    fn retry(&mut self, now: Instant) -> Action {
        self.were_back_until = None;
        let delay = self.backoff.fail();
        info!(
            "Retrying in {} (next interval {})",
            delay.to_human_interval(),
            self.backoff.interval().to_human_interval()
        );
        self.deadline = Some(now.checked_add(delay).unwrap_or_else(|| {
            warn!("Retry delay {:?} is out of range, retrying now", delay);
            now
        }));
        self.state = ConnectionState::WaitingToRetry;
        self.countdown(now)
    }
}

/// Delay before the countdown is looked at again: long while far from the
/// deadline, never below [`MIN_COUNTDOWN_REARM`].
pub fn rearm_delay(remaining: Duration) -> Duration {
    (remaining.saturating_mul(COUNTDOWN_REARM_FACTOR) / 1000).max(MIN_COUNTDOWN_REARM)
}
