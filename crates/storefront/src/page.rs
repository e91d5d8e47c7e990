//! Pages, navigation and the per-page context.
//!
//! Navigation is modelled rather than performed: the [`Navigator`] records
//! where a page is sending the customer and when. The HTTP layer reports a
//! scheduled redirect to the client, and tests observe it directly.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Serialize, Serializer, ser::SerializeStruct};
use tokio::task::JoinHandle;

use crate::notify::NotificationCenter;

/// The storefront's pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Home,
    Login,
    Checkout,
    Profile,
}

impl Page {
    /// Path the page is served at.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Checkout => "/checkout",
            Self::Profile => "/profile",
        }
    }
}

/// A navigation that fires after a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    pub page: Page,
    pub after: Duration,
}

impl Serialize for Redirect {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Redirect", 2)?;
        s.serialize_field("path", self.page.path())?;
        s.serialize_field(
            "after_ms",
            &u64::try_from(self.after.as_millis()).unwrap_or(u64::MAX),
        )?;
        s.end()
    }
}

#[derive(Default)]
struct NavState {
    scheduled: Option<Redirect>,
    visited: Vec<Page>,
    task: Option<JoinHandle<()>>,
}

/// Records and performs page navigation.
#[derive(Clone, Default)]
pub struct Navigator {
    state: Arc<Mutex<NavState>>,
}

impl Navigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigate now, cancelling any scheduled redirect.
    pub fn navigate(&self, page: Page) {
        let mut state = self.lock();
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.scheduled = None;
        state.visited.push(page);
        tracing::debug!(path = page.path(), "navigate");
    }

    /// Navigate to `page` once `after` has elapsed.
    ///
    /// A later call replaces an earlier pending redirect.
    pub fn redirect_after(&self, page: Page, after: Duration) {
        let redirect = Redirect { page, after };
        let mut state = self.lock();
        state.scheduled = Some(redirect);

        let nav = Arc::downgrade(&self.state);
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(state) = nav.upgrade() {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if state.scheduled == Some(redirect) {
                    state.scheduled = None;
                    state.task = None;
                    state.visited.push(page);
                }
            }
        });

        if let Some(previous) = state.task.replace(task) {
            previous.abort();
        }
        tracing::debug!(path = page.path(), after = ?after, "redirect scheduled");
    }

    /// Cancel a pending redirect.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if let Some(task) = state.task.take() {
            task.abort();
        }
        state.scheduled = None;
    }

    /// The redirect waiting to fire, if any.
    #[must_use]
    pub fn scheduled(&self) -> Option<Redirect> {
        self.lock().scheduled
    }

    /// The most recent navigation that actually happened.
    #[must_use]
    pub fn location(&self) -> Option<Page> {
        self.lock().visited.last().copied()
    }

    /// Every navigation that happened, oldest first.
    #[must_use]
    pub fn visited(&self) -> Vec<Page> {
        self.lock().visited.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NavState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Navigator")
            .field("scheduled", &state.scheduled)
            .field("visited", &state.visited)
            .finish()
    }
}

impl Drop for NavState {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// What one page instance owns: its notifications and its navigation.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub notifications: NotificationCenter,
    pub navigator: Navigator,
}

impl PageContext {
    /// Create a context whose notifications dismiss after `dismiss_after`.
    #[must_use]
    pub fn new(dismiss_after: Duration) -> Self {
        Self {
            notifications: NotificationCenter::new(dismiss_after),
            navigator: Navigator::new(),
        }
    }
}
