//! Transient notifications.
//!
//! A [`NotificationCenter`] stacks messages in arrival order and removes each
//! one after a fixed delay, or earlier when the customer dismisses it.
//! Notifications are never persisted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use digitalhub_core::Severity;

/// Default auto-dismiss delay.
pub const DEFAULT_DISMISS_AFTER: Duration = Duration::from_millis(4500);

/// A message shown to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub icon: &'static str,
}

/// Why a notification went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DismissReason {
    Timeout,
    Manual,
}

/// Presentation events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Shown(Notification),
    Dismissed { id: u64, reason: DismissReason },
}

/// Stack of auto-dismissing notifications.
///
/// Cloning yields another handle on the same stack.
#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

struct Inner {
    dismiss_after: Duration,
    state: Mutex<State>,
    events: broadcast::Sender<NotificationEvent>,
}

#[derive(Default)]
struct State {
    next_id: u64,
    active: Vec<Notification>,
    shown: Vec<Notification>,
    timers: HashMap<u64, JoinHandle<()>>,
}

impl NotificationCenter {
    /// Create a center dismissing notifications after `dismiss_after`.
    #[must_use]
    pub fn new(dismiss_after: Duration) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                dismiss_after,
                state: Mutex::new(State::default()),
                events,
            }),
        }
    }

    /// Show a notification and schedule its dismissal. Returns its id.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn show(&self, message: impl Into<String>, severity: Severity) -> u64 {
        let message = message.into();
        let mut state = self.inner.lock();
        let id = state.next_id;
        state.next_id += 1;

        let notification = Notification {
            id,
            message,
            severity,
            icon: severity.icon(),
        };
        match severity {
            Severity::Error => tracing::warn!(id, text = %notification.message, "notification"),
            _ => tracing::debug!(id, text = %notification.message, %severity, "notification"),
        }

        state.active.push(notification.clone());
        state.shown.push(notification.clone());

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let delay = self.inner.dismiss_after;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.remove(id, DismissReason::Timeout);
            }
        });
        state.timers.insert(id, timer);
        drop(state);

        let _ = self.inner.events.send(NotificationEvent::Shown(notification));
        id
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.show(message, Severity::Info)
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.show(message, Severity::Success)
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.show(message, Severity::Warning)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.show(message, Severity::Error)
    }

    /// Dismiss a notification now, cancelling its pending auto-dismiss.
    ///
    /// Returns `false` if it was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        self.inner.remove(id, DismissReason::Manual)
    }

    /// Notifications currently on screen, oldest first.
    #[must_use]
    pub fn active(&self) -> Vec<Notification> {
        self.inner.lock().active.clone()
    }

    /// Every notification shown so far, oldest first.
    #[must_use]
    pub fn shown(&self) -> Vec<Notification> {
        self.inner.lock().shown.clone()
    }

    /// Notifications of one severity shown so far.
    #[must_use]
    pub fn shown_with(&self, severity: Severity) -> Vec<Notification> {
        self.inner
            .lock()
            .shown
            .iter()
            .filter(|n| n.severity == severity)
            .cloned()
            .collect()
    }

    /// Subscribe to show/dismiss events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.events.subscribe()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(DEFAULT_DISMISS_AFTER)
    }
}

impl std::fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("dismiss_after", &self.inner.dismiss_after)
            .field("active", &self.active())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64, reason: DismissReason) -> bool {
        let mut state = self.lock();
        let Some(pos) = state.active.iter().position(|n| n.id == id) else {
            return false;
        };
        state.active.remove(pos);
        if let Some(timer) = state.timers.remove(&id)
            && reason == DismissReason::Manual
        {
            timer.abort();
        }
        drop(state);

        let _ = self.events.send(NotificationEvent::Dismissed { id, reason });
        true
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, timer) in state.timers.drain() {
            timer.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_auto_dismiss_after_delay() {
        let center = NotificationCenter::default();
        center.info("hello");
        assert_eq!(center.active().len(), 1);

        tokio::time::sleep(Duration::from_millis(4499)).await;
        assert_eq!(center.active().len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(center.active().is_empty());
        assert_eq!(center.shown().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stack_in_arrival_order_without_dedup() {
        let center = NotificationCenter::default();
        center.error("same");
        center.error("same");
        center.success("other");

        let messages: Vec<_> = center.active().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["same", "same", "other"]);
        assert_eq!(center.shown_with(Severity::Error).len(), 2);
        assert_eq!(center.active().last().unwrap().icon, "check-circle");
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_dismiss_cancels_timer() {
        let center = NotificationCenter::default();
        let mut events = center.subscribe();
        let id = center.warning("careful");

        assert!(center.dismiss(id));
        assert!(!center.dismiss(id));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(matches!(events.recv().await.unwrap(), NotificationEvent::Shown(_)));
        assert_eq!(
            events.recv().await.unwrap(),
            NotificationEvent::Dismissed {
                id,
                reason: DismissReason::Manual
            }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_center_cancels_timers() {
        let center = NotificationCenter::default();
        let mut events = center.subscribe();
        center.info("bye");
        drop(center);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(matches!(events.recv().await.unwrap(), NotificationEvent::Shown(_)));
        assert!(events.recv().await.is_err());
    }
}
