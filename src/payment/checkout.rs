//! Checkout sessions: one payment flow per purchase of a service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use super::{CardForm, PaymentError, PaymentFlow, PaymentState, PaymentTimings};
use crate::model::Service;
use crate::store::Notifier;

/// Raw card field edits; each set field is formatted as typed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInput {
    pub card_number: Option<String>,
    pub name: Option<String>,
    pub expiry: Option<String>,
    pub cvc: Option<String>,
}

impl CardInput {
    fn apply(&self, form: &mut CardForm) {
        if let Some(raw) = &self.card_number {
            form.set_card_number(raw);
        }
        if let Some(name) = &self.name {
            form.set_name(name);
        }
        if let Some(raw) = &self.expiry {
            form.set_expiry(raw);
        }
        if let Some(raw) = &self.cvc {
            form.set_cvc(raw);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSnapshot {
    pub id: String,
    pub service_id: String,
    pub service_title: String,
    pub price: f64,
    pub state: PaymentState,
    pub success: bool,
    pub completed: bool,
    pub form: CardForm,
}

/// Open forms older than this are dropped on the next start.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Most checkouts kept at once; the oldest open form gives way beyond it.
pub const MAX_CHECKOUTS: usize = 256;

type Sessions = Arc<RwLock<HashMap<String, Checkout>>>;

#[derive(Clone)]
struct Checkout {
    service_id: String,
    service_title: String,
    price: f64,
    flow: PaymentFlow,
    completed: Arc<AtomicBool>,
    started_at: Instant,
}

impl Checkout {
    fn snapshot(&self, id: &str) -> CheckoutSnapshot {
        CheckoutSnapshot {
            id: id.to_string(),
            service_id: self.service_id.clone(),
            service_title: self.service_title.clone(),
            price: self.price,
            state: self.flow.state(),
            success: self.flow.is_success(),
            completed: self.completed.load(Ordering::SeqCst),
            form: self.flow.form(),
        }
    }

    /// Still waiting on the visitor; safe to drop.
    fn is_idle(&self) -> bool {
        matches!(self.flow.state(), PaymentState::FormOpen | PaymentState::Closed)
    }
}

/// Live checkouts. A checkout is forgotten when its payment completes, when
/// it is cancelled, or when its form sits open past [`IDLE_TIMEOUT`].
pub struct Checkouts {
    sessions: Sessions,
    timings: PaymentTimings,
    notifier: Notifier,
    max_checkouts: usize,
    idle_timeout: Duration,
}

impl Checkouts {
    pub fn new(timings: PaymentTimings, notifier: Notifier) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            timings,
            notifier,
            max_checkouts: MAX_CHECKOUTS,
            idle_timeout: IDLE_TIMEOUT,
        }
    }

    pub fn with_limits(mut self, max_checkouts: usize, idle_timeout: Duration) -> Self {
        self.max_checkouts = max_checkouts.max(1);
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with<T>(
        &self,
        id: &str,
        f: impl FnOnce(&Checkout) -> Result<T, PaymentError>,
    ) -> Result<T, PaymentError> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let checkout = sessions
            .get(id)
            .ok_or_else(|| PaymentError::UnknownCheckout(id.to_string()))?;
        f(checkout)
    }

    /// Drops expired forms, then the oldest open forms until there is room
    /// for one more. Checkouts being processed are never dropped.
    fn make_room(&self, sessions: &mut HashMap<String, Checkout>) {
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, c)| c.is_idle() && c.started_at.elapsed() >= self.idle_timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some(checkout) = sessions.remove(&id) {
                let _ = checkout.flow.close();
                tracing::debug!(checkout = %id, "Idle checkout expired");
            }
        }

        while sessions.len() >= self.max_checkouts {
            let oldest = sessions
                .iter()
                .filter(|(_, c)| c.is_idle())
                .min_by_key(|(_, c)| c.started_at)
                .map(|(id, _)| id.clone());
            let Some(id) = oldest else {
                break;
            };
            if let Some(checkout) = sessions.remove(&id) {
                let _ = checkout.flow.close();
                tracing::warn!(checkout = %id, "Too many checkouts, dropping the oldest open form");
            }
        }
    }

    /// Opens a payment dialog for `service`.
    pub fn start(&self, service: &Service) -> Result<CheckoutSnapshot, PaymentError> {
        let id = Uuid::new_v4().to_string();
        let flow = PaymentFlow::new(self.timings.clone());
        let completed = Arc::new(AtomicBool::new(false));

        let notifier = self.notifier.clone();
        let title = service.title.clone();
        let done = Arc::clone(&completed);
        let checkout_id = id.clone();
        // weak: the map owns the flow, which owns this callback
        let sessions = Arc::downgrade(&self.sessions);
        flow.open(move || {
            done.store(true, Ordering::SeqCst);
            if let Some(sessions) = sessions.upgrade() {
                sessions
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&checkout_id);
            }
            tracing::info!(checkout = %checkout_id, "Checkout completed");
            notifier.success(format!("Payment for {} completed successfully", title));
        })?;

        let checkout = Checkout {
            service_id: service.id.clone(),
            service_title: service.title.clone(),
            price: service.price,
            flow,
            completed,
            started_at: Instant::now(),
        };
        let snapshot = checkout.snapshot(&id);
        {
            let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
            self.make_room(&mut sessions);
            sessions.insert(id.clone(), checkout);
        }
        tracing::debug!(checkout = %id, service = %service.id, "Checkout started");
        Ok(snapshot)
    }

    pub fn get(&self, id: &str) -> Result<CheckoutSnapshot, PaymentError> {
        self.with(id, |checkout| Ok(checkout.snapshot(id)))
    }

    pub fn edit(&self, id: &str, input: &CardInput) -> Result<CheckoutSnapshot, PaymentError> {
        self.with(id, |checkout| {
            checkout.flow.edit(|form| input.apply(form))?;
            Ok(checkout.snapshot(id))
        })
    }

    pub fn submit(&self, id: &str) -> Result<CheckoutSnapshot, PaymentError> {
        self.with(id, |checkout| {
            checkout.flow.submit()?;
            Ok(checkout.snapshot(id))
        })
    }

    /// Dismisses the dialog and forgets the checkout. Finished checkouts are
    /// simply forgotten; one still processing is refused.
    pub fn cancel(&self, id: &str) -> Result<(), PaymentError> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let checkout = sessions
            .get(id)
            .ok_or_else(|| PaymentError::UnknownCheckout(id.to_string()))?;
        checkout.flow.close()?;
        sessions.remove(id);
        tracing::debug!(checkout = %id, "Checkout cancelled");
        Ok(())
    }

    /// Waits for a submitted checkout's timers to finish and returns its
    /// final state. A completed checkout is no longer listed afterwards.
    pub async fn settled(&self, id: &str) -> Result<CheckoutSnapshot, PaymentError> {
        let checkout = self.with(id, |checkout| Ok(checkout.clone()))?;
        checkout.flow.settled().await;
        Ok(checkout.snapshot(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::CardError;
    use crate::store::NoticeLevel;

    fn service() -> Service {
        Service {
            id: "s1".to_string(),
            title: "Site audit".to_string(),
            description: String::new(),
            icon: "search".to_string(),
            price: 250.0,
            featured: false,
            features: vec![],
            created_at: None,
        }
    }

    fn card() -> CardInput {
        CardInput {
            card_number: Some("4242424242424242".to_string()),
            name: Some("Ann".to_string()),
            expiry: Some("0130".to_string()),
            cvc: Some("999".to_string()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkout_completes_and_notifies_once() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let checkouts = Checkouts::new(PaymentTimings::default(), notifier);

        let started = checkouts.start(&service()).unwrap();
        assert_eq!(started.state, PaymentState::FormOpen);

        let edited = checkouts.edit(&started.id, &card()).unwrap();
        assert_eq!(edited.form.card_number, "4242 4242 4242 4242");
        assert_eq!(edited.form.expiry, "01/30");

        let submitted = checkouts.submit(&started.id).unwrap();
        assert_eq!(submitted.state, PaymentState::Processing);
        assert_eq!(checkouts.cancel(&started.id), Err(PaymentError::InFlight));

        let done = checkouts.settled(&started.id).await.unwrap();
        assert_eq!(done.state, PaymentState::Closed);
        assert!(done.completed);
        assert!(matches!(
            checkouts.get(&started.id),
            Err(PaymentError::UnknownCheckout(_))
        ));
        assert!(checkouts.is_empty());

        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Success);
        assert_eq!(notice.message, "Payment for Site audit completed successfully");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancel_forgets_open_checkout() {
        let checkouts = Checkouts::new(PaymentTimings::default(), Notifier::new());
        let started = checkouts.start(&service()).unwrap();

        checkouts.cancel(&started.id).unwrap();
        assert!(matches!(
            checkouts.get(&started.id),
            Err(PaymentError::UnknownCheckout(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_card_keeps_form_open() {
        let checkouts = Checkouts::new(PaymentTimings::default(), Notifier::new());
        let started = checkouts.start(&service()).unwrap();

        let err = checkouts.submit(&started.id).unwrap_err();
        assert_eq!(err, PaymentError::Card(CardError::CardNumber));
        assert_eq!(checkouts.get(&started.id).unwrap().state, PaymentState::FormOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_forms_expire_on_next_start() {
        let checkouts = Checkouts::new(PaymentTimings::default(), Notifier::new());
        let stale = checkouts.start(&service()).unwrap();

        tokio::time::advance(IDLE_TIMEOUT + Duration::from_secs(1)).await;
        let fresh = checkouts.start(&service()).unwrap();

        assert_eq!(checkouts.len(), 1);
        assert!(checkouts.get(&stale.id).is_err());
        assert!(checkouts.get(&fresh.id).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oldest_open_form_gives_way_but_processing_stays() {
        let checkouts = Checkouts::new(PaymentTimings::default(), Notifier::new())
            .with_limits(2, IDLE_TIMEOUT);

        let paying = checkouts.start(&service()).unwrap();
        checkouts.edit(&paying.id, &card()).unwrap();
        checkouts.submit(&paying.id).unwrap();
        tokio::time::advance(Duration::from_millis(1)).await;
        let older = checkouts.start(&service()).unwrap();
        tokio::time::advance(Duration::from_millis(1)).await;
        let newer = checkouts.start(&service()).unwrap();

        assert_eq!(checkouts.len(), 2);
        assert!(checkouts.get(&paying.id).is_ok());
        assert!(checkouts.get(&older.id).is_err());
        assert!(checkouts.get(&newer.id).is_ok());
    }
}
