//! Session supervision: absolute expiry and inactivity.
//!
//! `SessionMachine` is the synchronous two-state machine (`Active` →
//! `Expired`). `SessionMonitor` mounts it on a tokio task that feeds it
//! periodic ticks, interaction events and inactivity deadlines, and performs
//! the one-time expiry side effects (clear session, redirect to login).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::Config;
use crate::navigation::{Navigator, Redirect, SessionNotice};

use super::SessionContext;

/// Idle time after which the session is force-expired.
pub const DEFAULT_INACTIVITY_MINUTES: u64 = 30;

/// Interval between expiry timestamp checks.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Upper bound for both the inactivity budget and the poll interval.
pub const MAX_MONITOR_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Deadline used when the inactivity deadline cannot be represented
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// User interactions that count as activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    TouchStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Periodic expiry poll
    Tick,
    Interaction(InteractionKind),
    /// The inactivity timer fired
    InactivityElapsed,
}

/// What ended the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ExpiryCause {
    /// Expiry timestamp reached, missing or unreadable
    Expired,
    Inactivity,
    /// The token was removed by someone else (logout, 401 handler)
    Revoked,
}

impl ExpiryCause {
    /// Notice shown to the user, if this monitor is the one reporting it
    pub fn notice(&self) -> Option<SessionNotice> {
        match self {
            ExpiryCause::Expired => Some(SessionNotice::Expired),
            ExpiryCause::Inactivity => Some(SessionNotice::Inactivity),
            ExpiryCause::Revoked => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Expired(ExpiryCause),
}

/// Explicit session state machine.
///
/// `Expired` is terminal: once reached, every further event is ignored and
/// `expire` reports nothing, so the expiry side effects run at most once.
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
    inactivity_budget: Duration,
    last_activity: Instant,
}

impl SessionMachine {
    pub fn new(inactivity_budget: Duration, now: Instant) -> Self {
        Self {
            state: SessionState::Active,
            inactivity_budget: inactivity_budget.min(MAX_MONITOR_PERIOD),
            last_activity: now,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn inactivity_deadline(&self) -> Instant {
        self.last_activity
            .checked_add(self.inactivity_budget)
            .or_else(|| self.last_activity.checked_add(FAR_FUTURE))
            .unwrap_or(self.last_activity)
    }

    /// Feed one event.
    ///
    /// `expires_at` is the stored expiry (None when missing or unreadable),
    /// `wall_now` the current wall-clock time and `now` the monotonic time
    /// used for inactivity. Returns the cause when this event ends the
    /// session.
    pub fn handle(
        &mut self,
        event: MonitorEvent,
        expires_at: Option<DateTime<Utc>>,
        wall_now: DateTime<Utc>,
        now: Instant,
    ) -> Option<ExpiryCause> {
        if !self.is_active() {
            return None;
        }

        let past_expiry = expires_at.map(|at| wall_now >= at).unwrap_or(true);
        let idle = now >= self.inactivity_deadline();

        match event {
            MonitorEvent::Tick | MonitorEvent::Interaction(_) if past_expiry => {
                self.expire(ExpiryCause::Expired)
            }
            // An interaction arriving after the deadline does not revive the session
            MonitorEvent::Tick | MonitorEvent::Interaction(_) | MonitorEvent::InactivityElapsed
                if idle =>
            {
                self.expire(ExpiryCause::Inactivity)
            }
            MonitorEvent::Interaction(_) => {
                self.last_activity = now;
                None
            }
            // Tick within budget, or a timer that fired before a reset took effect
            MonitorEvent::Tick | MonitorEvent::InactivityElapsed => None,
        }
    }

    /// Move to `Expired`. Only the first call returns the cause.
    pub fn expire(&mut self, cause: ExpiryCause) -> Option<ExpiryCause> {
        if !self.is_active() {
            return None;
        }
        self.state = SessionState::Expired(cause);
        Some(cause)
    }
}

/// Source of wall-clock time for expiry comparisons
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub inactivity_budget: Duration,
    pub poll_interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            inactivity_budget: Duration::from_secs(DEFAULT_INACTIVITY_MINUTES * 60),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

impl MonitorSettings {
    /// Settings from config; zero values fall back to the defaults and
    /// oversized ones are capped at `MAX_MONITOR_PERIOD`.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            inactivity_budget: config
                .inactivity_minutes
                .filter(|m| *m > 0)
                .map(|m| Duration::from_secs(m.saturating_mul(60)))
                .unwrap_or(defaults.inactivity_budget),
            poll_interval: config
                .poll_interval_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
        }
        .clamped()
    }

    /// Cap both periods at `MAX_MONITOR_PERIOD`; a zero poll interval
    /// becomes the default.
    pub fn clamped(self) -> Self {
        let poll_interval = if self.poll_interval.is_zero() {
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
        } else {
            self.poll_interval
        };
        Self {
            inactivity_budget: self.inactivity_budget.min(MAX_MONITOR_PERIOD),
            poll_interval: poll_interval.min(MAX_MONITOR_PERIOD),
        }
    }
}

/// Supervises one session from mount until expiry or unmount.
pub struct SessionMonitor {
    session: Arc<SessionContext>,
    navigator: Arc<dyn Navigator>,
    settings: MonitorSettings,
    clock: Arc<dyn Clock>,
}

impl SessionMonitor {
    pub fn new(session: Arc<SessionContext>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            session,
            navigator,
            settings: MonitorSettings::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_settings(mut self, settings: MonitorSettings) -> Self {
        self.settings = settings.clamped();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start supervising. Must be called inside a tokio runtime.
    ///
    /// Returns None, without touching storage or navigating, when there is
    /// no session token to supervise.
    pub fn mount(self) -> Option<MonitorHandle> {
        if !self.session.has_token() {
            debug!("No session to supervise");
            return None;
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Active);

        debug!(
            inactivity_secs = self.settings.inactivity_budget.as_secs(),
            poll_secs = self.settings.poll_interval.as_secs(),
            "Session monitor mounted"
        );
        let task = tokio::spawn(self.run(events_rx, state_tx));

        Some(MonitorHandle {
            events: events_tx,
            state: state_rx,
            task,
        })
    }

    async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<InteractionKind>,
        state_tx: watch::Sender<SessionState>,
    ) {
        let mut machine = SessionMachine::new(self.settings.inactivity_budget, Instant::now());

        // First tick completes immediately, so an already-expired session is
        // caught at mount.
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let inactivity = tokio::time::sleep_until(machine.inactivity_deadline());
        tokio::pin!(inactivity);

        loop {
            let event = tokio::select! {
                _ = ticker.tick() => MonitorEvent::Tick,
                _ = &mut inactivity => MonitorEvent::InactivityElapsed,
                received = events.recv() => match received {
                    Some(kind) => MonitorEvent::Interaction(kind),
                    None => {
                        debug!("Session monitor unmounted");
                        return;
                    }
                },
            };

            let cause = if self.session.has_token() {
                machine.handle(
                    event,
                    self.session.expires_at(),
                    self.clock.now(),
                    Instant::now(),
                )
            } else {
                machine.expire(ExpiryCause::Revoked)
            };

            if let Some(cause) = cause {
                self.finish(cause);
                let _ = state_tx.send(machine.state());
                return;
            }

            inactivity.as_mut().reset(machine.inactivity_deadline());
        }
    }

    /// One-time expiry side effects
    fn finish(&self, cause: ExpiryCause) {
        match cause.notice() {
            Some(notice) => {
                let cleared = self.session.clear();
                info!(?cause, cleared, "Session ended, redirecting to login");
                self.navigator.navigate(Redirect::to_login(notice));
            }
            None => {
                debug!("Session cleared elsewhere, monitor stopping");
            }
        }
    }
}

/// Handle to a mounted monitor. Dropping it unmounts the monitor.
#[derive(Debug)]
pub struct MonitorHandle {
    events: mpsc::UnboundedSender<InteractionKind>,
    state: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Report a user interaction
    pub fn record(&self, kind: InteractionKind) {
        // Closed once the monitor has expired
        let _ = self.events.send(kind);
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Wait until the monitor leaves `Active`.
    ///
    /// Returns `Active` if the monitor task ended without expiring.
    pub async fn wait_expired(&mut self) -> SessionState {
        loop {
            let current = *self.state.borrow_and_update();
            if current != SessionState::Active {
                return current;
            }
            if self.state.changed().await.is_err() {
                return *self.state.borrow();
            }
        }
    }

    /// Unmount: cancel timers and stop accepting events
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
