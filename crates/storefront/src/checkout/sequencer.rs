//! Confirmation state machine.
//!
//! ```text
//! idle -> validating -> persisting -> animating -> succeeded
//!              |             |
//!              +---> failed -+---> idle
//! ```
//!
//! `succeeded` is terminal. A failed attempt returns to `idle` so the
//! customer can retry; nothing is retried automatically.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use digitalhub_core::{OrderId, Severity};

use crate::backend::ErrorCategory;
use crate::db::RepositoryError;
use crate::models::AccountDetails;
use crate::page::{Page, Redirect};

/// Labels of the processing animation, one per step.
pub const PROCESSING_STEPS: [&str; 4] = [
    "Verifying payment",
    "Confirming transaction",
    "Creating your account",
    "Finalizing order",
];

/// Default delay between animation steps.
pub const DEFAULT_STEP_INTERVAL: Duration = Duration::from_millis(1500);

/// Pause after the last step before the credentials are revealed.
pub const DEFAULT_FINAL_PAUSE: Duration = Duration::from_secs(1);

/// Delay before leaving checkout when the stored product is invalid.
pub const INVALID_PRODUCT_REDIRECT_DELAY: Duration = Duration::from_secs(2);

/// Sequencer states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SequencerState {
    #[default]
    Idle,
    Validating,
    Persisting,
    Animating,
    Succeeded,
    Failed,
}

impl SequencerState {
    /// Whether a confirmation is running.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(self, Self::Validating | Self::Persisting | Self::Animating)
    }
}

/// State transitions for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutEvent {
    StateChanged(SequencerState),
    StepActivated { index: usize, label: &'static str },
    CredentialsRevealed { order_id: OrderId, account: AccountDetails },
}

/// Why a confirmation did not go through.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("no payment method selected")]
    NoPaymentMethod,

    #[error("no authenticated user")]
    Unauthenticated,

    #[error("checkout time expired")]
    Expired,

    #[error("unknown product: {0:?}")]
    UnknownProduct(String),

    #[error("checkout already completed")]
    AlreadyCompleted,

    #[error("confirmation already in progress")]
    InProgress,

    #[error("failed to save order: {0}")]
    Persist(#[from] RepositoryError),
}

impl CheckoutError {
    /// Severity of the notification raised for this error.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::NoPaymentMethod => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Message shown to the customer.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoPaymentMethod => "Please select a payment method first",
            Self::Unauthenticated => "Please login to complete purchase",
            Self::Expired => super::timer::EXPIRED_MESSAGE,
            Self::UnknownProduct(_) => "Invalid product selected. Redirecting to store.",
            Self::AlreadyCompleted => "This order has already been completed.",
            Self::InProgress => "Your payment is already being processed.",
            Self::Persist(err) => match err.code().map(crate::backend::ErrorCode::category) {
                Some(ErrorCategory::PermissionDenied) => {
                    "Payment access denied. Check your account permissions."
                }
                Some(ErrorCategory::Unavailable | ErrorCategory::NetworkUnreachable) => {
                    "Network error. Check your connection and try again."
                }
                _ => "Error processing payment. Please try again.",
            },
        }
    }

    /// Navigation that follows the error, if any.
    #[must_use]
    pub const fn redirect(&self) -> Option<Redirect> {
        match self {
            Self::UnknownProduct(_) => Some(Redirect {
                page: Page::Home,
                after: INVALID_PRODUCT_REDIRECT_DELAY,
            }),
            _ => None,
        }
    }

    /// Whether the attempt consumed the sequencer (and so must reset it).
    const fn entered_sequencer(&self) -> bool {
        !matches!(self, Self::AlreadyCompleted | Self::InProgress)
    }
}

/// The confirmation state machine of one checkout session.
#[derive(Debug)]
pub struct Sequencer {
    state: Mutex<SequencerState>,
    step: Mutex<Option<usize>>,
    events: broadcast::Sender<CheckoutEvent>,
}

impl Default for Sequencer {
    fn default() -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            state: Mutex::new(SequencerState::Idle),
            step: Mutex::new(None),
            events,
        }
    }
}

impl Sequencer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SequencerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Index of the active animation step.
    #[must_use]
    pub fn step(&self) -> Option<usize> {
        *self.step.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CheckoutEvent> {
        self.events.subscribe()
    }

    /// Enter `validating` from `idle`.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::AlreadyCompleted` after success and
    /// `CheckoutError::InProgress` while another attempt runs.
    pub fn begin(&self) -> Result<(), CheckoutError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            SequencerState::Succeeded => return Err(CheckoutError::AlreadyCompleted),
            s if s.is_busy() => return Err(CheckoutError::InProgress),
            _ => {}
        }
        *state = SequencerState::Validating;
        drop(state);
        self.emit(CheckoutEvent::StateChanged(SequencerState::Validating));
        Ok(())
    }

    /// Enter `persisting` once validation passed.
    pub fn persisting(&self) {
        self.transition(SequencerState::Persisting);
    }

    /// Enter `animating` once the order record is written.
    pub fn animating(&self) {
        self.transition(SequencerState::Animating);
    }

    /// Mark animation step `index` active.
    pub fn activate_step(&self, index: usize) {
        *self.step.lock().unwrap_or_else(PoisonError::into_inner) = Some(index);
        if let Some(&label) = PROCESSING_STEPS.get(index) {
            self.emit(CheckoutEvent::StepActivated { index, label });
        }
    }

    /// Enter the terminal `succeeded` state and reveal the credentials.
    pub fn succeed(&self, order_id: OrderId, account: AccountDetails) {
        self.transition(SequencerState::Succeeded);
        self.emit(CheckoutEvent::CredentialsRevealed { order_id, account });
    }

    /// Record a failed attempt: `failed`, then back to `idle` for a retry.
    ///
    /// Errors raised before the attempt entered the sequencer leave the
    /// state untouched.
    pub fn fail(&self, err: &CheckoutError) {
        if !err.entered_sequencer() {
            return;
        }
        *self.step.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.transition(SequencerState::Failed);
        self.transition(SequencerState::Idle);
    }

    fn transition(&self, next: SequencerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        tracing::debug!(state = ?next, "checkout state");
        self.emit(CheckoutEvent::StateChanged(next));
    }

    fn emit(&self, event: CheckoutEvent) {
        let _ = self.events.send(event);
    }
}
