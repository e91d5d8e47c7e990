//! Checkout countdown.
//!
//! [`Countdown`] is the pure state: remaining seconds, pause flag, urgency.
//! [`CountdownTimer`] drives it from a Tokio task ticking once per second
//! while the page is visible. On reaching zero it stops, raises one error
//! notification and schedules the redirect home.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::page::{Page, PageContext};

/// Countdown length of a checkout.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(900);

/// Remaining seconds at or below which the indicator turns amber.
pub const CAUTION_THRESHOLD_SECS: u32 = 300;

/// Remaining seconds at or below which the indicator turns red.
pub const WARNING_THRESHOLD_SECS: u32 = 60;

/// Delay between the expiry notification and the redirect home.
pub const EXPIRY_REDIRECT_DELAY: Duration = Duration::from_secs(3);

pub const EXPIRED_MESSAGE: &str = "Payment time expired. Redirecting to home page...";

const TICK: Duration = Duration::from_secs(1);

/// Visual urgency of the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Caution,
    Warning,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Counted down one second; seconds left.
    Running(u32),
    /// Reached zero on this tick.
    Expired,
    /// Paused or already stopped; nothing changed.
    Idle,
}

/// Countdown state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    total: u32,
    remaining: u32,
    paused: bool,
    stopped: bool,
}

impl Countdown {
    #[must_use]
    pub const fn new(total_secs: u32) -> Self {
        Self {
            total: total_secs,
            remaining: total_secs,
            paused: false,
            stopped: false,
        }
    }

    /// Count down one second.
    pub const fn tick(&mut self) -> Tick {
        if self.paused || self.stopped || self.remaining == 0 {
            return Tick::Idle;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.stopped = true;
            Tick::Expired
        } else {
            Tick::Running(self.remaining)
        }
    }

    pub const fn pause(&mut self) {
        self.paused = true;
    }

    pub const fn resume(&mut self) {
        self.paused = false;
    }

    pub const fn stop(&mut self) {
        self.stopped = true;
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub const fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }

    #[must_use]
    pub const fn is_expired(&self) -> bool {
        self.remaining == 0
    }

    /// Fraction of the countdown already elapsed, from 0.0 to 1.0.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        f64::from(self.total - self.remaining) / f64::from(self.total)
    }

    #[must_use]
    pub const fn urgency(&self) -> Urgency {
        if self.remaining <= WARNING_THRESHOLD_SECS {
            Urgency::Warning
        } else if self.remaining <= CAUTION_THRESHOLD_SECS {
            Urgency::Caution
        } else {
            Urgency::Normal
        }
    }

    /// Remaining time as `MM:SS`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.remaining / 60, self.remaining % 60)
    }
}

/// A running countdown bound to a page.
pub struct CountdownTimer {
    countdown: Arc<Mutex<Countdown>>,
    visible: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CountdownTimer {
    /// Start counting down `duration` (whole seconds) on behalf of `page`.
    ///
    /// Must be called inside a Tokio runtime.
    #[must_use]
    pub fn start(duration: Duration, page: PageContext) -> Self {
        let total = u32::try_from(duration.as_secs()).unwrap_or(u32::MAX);
        let countdown = Arc::new(Mutex::new(Countdown::new(total)));
        let (visible, visible_rx) = watch::channel(true);

        let task = tokio::spawn(drive(Arc::clone(&countdown), visible_rx, page));
        tracing::debug!(total_secs = total, "countdown started");

        Self {
            countdown,
            visible,
            task: Mutex::new(Some(task)),
        }
    }

    /// Copy of the current countdown state.
    #[must_use]
    pub fn snapshot(&self) -> Countdown {
        self.lock().clone()
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.lock().remaining()
    }

    /// Report page visibility. Hidden pages do not count down.
    pub fn set_visible(&self, visible: bool) {
        self.visible.send_replace(visible);
    }

    /// Visibility as last reported by the page.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        *self.visible.borrow()
    }

    /// Stop the countdown for good.
    pub fn stop(&self) {
        self.lock().stop();
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Countdown> {
        self.countdown.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        if let Some(task) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

impl std::fmt::Debug for CountdownTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownTimer")
            .field("countdown", &self.snapshot())
            .finish_non_exhaustive()
    }
}

async fn drive(
    countdown: Arc<Mutex<Countdown>>,
    mut visible: watch::Receiver<bool>,
    page: PageContext,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let tick = countdown
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .tick();
                if tick == Tick::Expired {
                    tracing::info!("checkout countdown expired");
                    page.notifications.error(EXPIRED_MESSAGE);
                    page.navigator.redirect_after(Page::Home, EXPIRY_REDIRECT_DELAY);
                    break;
                }
            }
            changed = visible.changed() => {
                if changed.is_err() {
                    break;
                }
                let is_visible = *visible.borrow_and_update();
                let mut state = countdown.lock().unwrap_or_else(PoisonError::into_inner);
                if is_visible {
                    state.resume();
                    drop(state);
                    ticker.reset();
                } else {
                    state.pause();
                }
            }
        }
    }
}
