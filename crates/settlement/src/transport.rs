//! Payment transport contract and a scripted double.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use cargolane_core::{BookingId, TransportError};

use crate::state::{BookingSettlementState, CheckoutSession, PaymentStatus, SyncResponse};

/// Backend calls the reconciler depends on.
#[async_trait]
pub trait PaymentTransport: Send + Sync {
    /// Ask the backend to reconcile the booking with the provider.
    async fn sync_payment(
        &self,
        booking: BookingId,
        session_ref: Option<&str>,
    ) -> Result<SyncResponse, TransportError>;

    async fn fetch_booking(
        &self,
        booking: BookingId,
    ) -> Result<BookingSettlementState, TransportError>;

    /// Open a new provider checkout for a booking whose payment was abandoned.
    async fn create_checkout(&self, booking: BookingId) -> Result<CheckoutSession, TransportError>;
}

#[derive(Debug)]
struct Script {
    sync_queue: VecDeque<Result<SyncResponse, TransportError>>,
    sync_standing: Result<SyncResponse, TransportError>,
    fetch_queue: VecDeque<Result<BookingSettlementState, TransportError>>,
    fetch_standing: Result<BookingSettlementState, TransportError>,
    checkout: Result<CheckoutSession, TransportError>,
    sync_refs: Vec<Option<String>>,
    fetch_calls: usize,
    checkout_calls: usize,
}

/// Scripted payment backend for one booking.
///
/// Unscripted, it never confirms payment: every sync answers `PENDING` and
/// every fetch returns a pending booking.
#[derive(Debug)]
pub struct ScriptedPaymentTransport {
    script: Mutex<Script>,
}

impl ScriptedPaymentTransport {
    pub fn new(booking: BookingId) -> Self {
        Self {
            script: Mutex::new(Script {
                sync_queue: VecDeque::new(),
                sync_standing: Ok(SyncResponse::new(PaymentStatus::Pending)),
                fetch_queue: VecDeque::new(),
                fetch_standing: Ok(BookingSettlementState::pending(booking)),
                checkout: Err(TransportError::Api(404, "no checkout scripted".to_string())),
                sync_refs: Vec::new(),
                fetch_calls: 0,
                checkout_calls: 0,
            }),
        }
    }

    pub fn with_sync(self, reply: Result<SyncResponse, TransportError>) -> Self {
        self.with(|s| s.sync_standing = reply);
        self
    }

    pub fn with_booking(self, reply: Result<BookingSettlementState, TransportError>) -> Self {
        self.with(|s| s.fetch_standing = reply);
        self
    }

    pub fn with_checkout(self, reply: Result<CheckoutSession, TransportError>) -> Self {
        self.with(|s| s.checkout = reply);
        self
    }

    pub fn enqueue_sync(&self, reply: Result<SyncResponse, TransportError>) {
        self.with(|s| s.sync_queue.push_back(reply));
    }

    pub fn enqueue_booking(&self, reply: Result<BookingSettlementState, TransportError>) {
        self.with(|s| s.fetch_queue.push_back(reply));
    }

    pub fn sync_calls(&self) -> usize {
        self.with(|s| s.sync_refs.len())
    }

    /// Session refs passed to each sync, in call order.
    pub fn sync_refs(&self) -> Vec<Option<String>> {
        self.with(|s| s.sync_refs.clone())
    }

    pub fn fetch_calls(&self) -> usize {
        self.with(|s| s.fetch_calls)
    }

    pub fn checkout_calls(&self) -> usize {
        self.with(|s| s.checkout_calls)
    }

    fn with<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut script)
    }
}

#[async_trait]
impl PaymentTransport for ScriptedPaymentTransport {
    async fn sync_payment(
        &self,
        _booking: BookingId,
        session_ref: Option<&str>,
    ) -> Result<SyncResponse, TransportError> {
        self.with(|s| {
            s.sync_refs.push(session_ref.map(str::to_string));
            s.sync_queue
                .pop_front()
                .unwrap_or_else(|| s.sync_standing.clone())
        })
    }

    async fn fetch_booking(
        &self,
        _booking: BookingId,
    ) -> Result<BookingSettlementState, TransportError> {
        self.with(|s| {
            s.fetch_calls += 1;
            s.fetch_queue
                .pop_front()
                .unwrap_or_else(|| s.fetch_standing.clone())
        })
    }

    async fn create_checkout(
        &self,
        _booking: BookingId,
    ) -> Result<CheckoutSession, TransportError> {
        self.with(|s| {
            s.checkout_calls += 1;
            s.checkout.clone()
        })
    }
}
