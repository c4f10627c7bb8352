//! Mock checkout: a timer-driven state machine around a card form.
//!
//! No charge is ever made. Once processing starts the flow runs to completion;
//! there is no abort path.

pub mod checkout;
pub mod format;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub use checkout::{CardInput, CheckoutSnapshot, Checkouts};
pub use format::{format_card_number, format_cvc, format_expiry};

const MIN_CARD_DIGITS: usize = 16;
const MIN_EXPIRY_LEN: usize = 5;
const MIN_CVC_DIGITS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentState {
    Closed,
    FormOpen,
    Validating,
    Processing,
    Success,
}

#[derive(Debug, Clone)]
pub struct PaymentTimings {
    /// Simulated network latency before success.
    pub processing: Duration,
    /// How long the success view stays up before closing.
    pub close: Duration,
}

impl Default for PaymentTimings {
    fn default() -> Self {
        Self {
            processing: Duration::from_millis(2000),
            close: Duration::from_millis(2000),
        }
    }
}

/// First failing card field, checked in declaration order.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardError {
    #[error("Please enter a valid card number")]
    CardNumber,
    #[error("Please enter the cardholder name")]
    Name,
    #[error("Please enter a valid expiry date")]
    Expiry,
    #[error("Please enter a valid CVC")]
    Cvc,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error(transparent)]
    Card(#[from] CardError),

    #[error("payment form is not open (state: {0:?})")]
    NotOpen(PaymentState),

    #[error("payment dialog is already open")]
    AlreadyOpen,

    #[error("payment is already being processed")]
    InFlight,

    #[error("checkout '{0}' not found")]
    UnknownCheckout(String),
}

/// Card input, stored already formatted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardForm {
    pub card_number: String,
    pub name: String,
    pub expiry: String,
    pub cvc: String,
}

impl CardForm {
    pub fn set_card_number(&mut self, raw: &str) {
        self.card_number = format_card_number(raw);
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn set_expiry(&mut self, raw: &str) {
        self.expiry = format_expiry(raw);
    }

    pub fn set_cvc(&mut self, raw: &str) {
        self.cvc = format_cvc(raw);
    }

    pub fn validate(&self) -> Result<(), CardError> {
        if format::digits(&self.card_number).len() < MIN_CARD_DIGITS {
            return Err(CardError::CardNumber);
        }
        if self.name.trim().is_empty() {
            return Err(CardError::Name);
        }
        if self.expiry.len() < MIN_EXPIRY_LEN {
            return Err(CardError::Expiry);
        }
        if format::digits(&self.cvc).len() < MIN_CVC_DIGITS {
            return Err(CardError::Cvc);
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = CardForm::default();
    }
}

type Completion = Box<dyn FnOnce() + Send + 'static>;

struct Inner {
    form: CardForm,
    success: bool,
    on_complete: Option<Completion>,
    timer: Option<JoinHandle<()>>,
}

/// One payment dialog. Cheap to clone; clones share the same flow.
#[derive(Clone)]
pub struct PaymentFlow {
    inner: Arc<Mutex<Inner>>,
    state: Arc<watch::Sender<PaymentState>>,
    timings: PaymentTimings,
}

impl PaymentFlow {
    pub fn new(timings: PaymentTimings) -> Self {
        let (state, _) = watch::channel(PaymentState::Closed);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                form: CardForm::default(),
                success: false,
                on_complete: None,
                timer: None,
            })),
            state: Arc::new(state),
            timings,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> PaymentState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PaymentState> {
        self.state.subscribe()
    }

    pub fn form(&self) -> CardForm {
        self.lock().form.clone()
    }

    pub fn is_success(&self) -> bool {
        self.lock().success
    }

    /// Opens the dialog. `on_complete` runs once, after a successful payment
    /// has been shown and the dialog closed.
    pub fn open(&self, on_complete: impl FnOnce() + Send + 'static) -> Result<(), PaymentError> {
        let mut inner = self.lock();
        if self.state() != PaymentState::Closed {
            return Err(PaymentError::AlreadyOpen);
        }
        inner.form.clear();
        inner.success = false;
        inner.on_complete = Some(Box::new(on_complete));
        self.state.send_replace(PaymentState::FormOpen);
        Ok(())
    }

    /// Edits the form while it is open.
    pub fn edit(&self, f: impl FnOnce(&mut CardForm)) -> Result<CardForm, PaymentError> {
        let mut inner = self.lock();
        match self.state() {
            PaymentState::FormOpen => {
                f(&mut inner.form);
                Ok(inner.form.clone())
            }
            other => Err(PaymentError::NotOpen(other)),
        }
    }

    /// Dismisses the dialog without paying. Refused once processing started.
    pub fn close(&self) -> Result<(), PaymentError> {
        let mut inner = self.lock();
        match self.state() {
            PaymentState::Closed => Ok(()),
            PaymentState::FormOpen => {
                inner.on_complete = None;
                inner.form.clear();
                self.state.send_replace(PaymentState::Closed);
                tracing::debug!("Payment dialog dismissed");
                Ok(())
            }
            PaymentState::Validating | PaymentState::Processing | PaymentState::Success => {
                Err(PaymentError::InFlight)
            }
        }
    }

    /// Validates the form and, when it passes, starts processing.
    ///
    /// A failed check leaves the dialog open and returns the first failing
    /// field.
    pub fn submit(&self) -> Result<(), PaymentError> {
        let mut inner = self.lock();
        match self.state() {
            PaymentState::FormOpen => {}
            PaymentState::Processing | PaymentState::Success => return Err(PaymentError::InFlight),
            other => return Err(PaymentError::NotOpen(other)),
        }

        self.state.send_replace(PaymentState::Validating);
        if let Err(e) = inner.form.validate() {
            self.state.send_replace(PaymentState::FormOpen);
            tracing::debug!(error = %e, "Payment form rejected");
            return Err(e.into());
        }

        self.state.send_replace(PaymentState::Processing);
        tracing::info!("Processing mock payment");
        let flow = self.clone();
        inner.timer = Some(tokio::spawn(async move { flow.run_timers().await }));
        Ok(())
    }

    async fn run_timers(self) {
        tokio::time::sleep(self.timings.processing).await;
        {
            let mut inner = self.lock();
            inner.form.clear();
            inner.success = true;
            self.state.send_replace(PaymentState::Success);
        }
        tracing::info!("Mock payment succeeded");

        tokio::time::sleep(self.timings.close).await;
        let on_complete = {
            let mut inner = self.lock();
            inner.success = false;
            self.state.send_replace(PaymentState::Closed);
            inner.on_complete.take()
        };
        if let Some(callback) = on_complete {
            callback();
        }
    }

    /// Waits for a started payment to run to completion.
    pub async fn settled(&self) {
        let timer = self.lock().timer.take();
        if let Some(timer) = timer {
            if let Err(e) = timer.await {
                tracing::error!(error = %e, "Payment timer task failed");
            }
        }
    }
}
