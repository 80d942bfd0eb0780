//! Settlement reconciler: bounded sync-then-poll after a payment redirect.
//!
//! ```text
//! Success ─► Syncing ─paid─► Confirmed
//!               │
//!               └─► Verifying(1..=max) ─paid─► ConfirmedAfterVerifying
//!                        │            ─provider failed─► Failed
//!                        └─budget spent─► Unconfirmed
//! Cancelled ─► Cancelled
//! (cancel token at any point) ─► Aborted
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use cargolane_core::{BookingId, TransportError};

use crate::redirect::RedirectSignal;
use crate::state::CheckoutSession;
use crate::transport::PaymentTransport;

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Polls after the initial sync.
    pub max_attempts: u32,
    /// Wait between polls. Not applied after the last one.
    pub retry_delay: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl ReconcilerConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SettlementOutcome {
    /// The first sync already reported the booking paid.
    Confirmed,
    ConfirmedAfterVerifying { attempts: u32 },
    /// The provider accepted the payment but the backend has not confirmed
    /// it within the budget. Shown as success.
    Unconfirmed { attempts: u32 },
    Cancelled,
    Failed { reason: String },
    /// The caller went away before an outcome was reached.
    Aborted,
}

impl SettlementOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SettlementOutcome::Confirmed
                | SettlementOutcome::ConfirmedAfterVerifying { .. }
                | SettlementOutcome::Unconfirmed { .. }
        )
    }

    /// Message for the viewer, when the bare outcome is not enough.
    pub fn note(&self) -> Option<&'static str> {
        match self {
            SettlementOutcome::Unconfirmed { .. } => Some(
                "Payment received. Confirmation is still processing and will appear on the booking shortly.",
            ),
            SettlementOutcome::Cancelled => Some("Payment was cancelled. You can retry checkout."),
            SettlementOutcome::Failed { .. } => {
                Some("The payment provider declined the payment. You can retry checkout.")
            }
            _ => None,
        }
    }
}

/// Progress published while a reconciliation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum SettlementPhase {
    Idle,
    Syncing,
    Verifying { attempt: u32, max_attempts: u32 },
    Done(SettlementOutcome),
}

/// Result of one poll.
enum Poll {
    Paid,
    Failed(String),
    NotYet,
}

pub struct SettlementReconciler {
    transport: Arc<dyn PaymentTransport>,
    config: ReconcilerConfig,
    phase: watch::Sender<SettlementPhase>,
}

impl SettlementReconciler {
    pub fn new(transport: Arc<dyn PaymentTransport>) -> Self {
        let (phase, _) = watch::channel(SettlementPhase::Idle);
        Self {
            transport,
            config: ReconcilerConfig::default(),
            phase,
        }
    }

    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Watch progress ("verifying… 2/5").
    pub fn subscribe(&self) -> watch::Receiver<SettlementPhase> {
        self.phase.subscribe()
    }

    pub fn phase(&self) -> SettlementPhase {
        self.phase.borrow().clone()
    }

    /// Drive one booking to a terminal outcome.
    ///
    /// Transport errors never escape: they count as "not confirmed yet" and
    /// are retried within the attempt budget.
    pub async fn run(
        &self,
        booking: BookingId,
        signal: RedirectSignal,
        cancel: &CancellationToken,
    ) -> SettlementOutcome {
        let outcome = self.drive(booking, signal, cancel).await;

        match &outcome {
            SettlementOutcome::Failed { reason } => {
                tracing::warn!(booking_id = %booking, reason = %reason, "settlement failed")
            }
            other => tracing::info!(
                booking_id = %booking,
                outcome = ?other,
                success = other.is_success(),
                "settlement finished"
            ),
        }
        self.phase.send_replace(SettlementPhase::Done(outcome.clone()));
        outcome
    }

    async fn drive(
        &self,
        booking: BookingId,
        signal: RedirectSignal,
        cancel: &CancellationToken,
    ) -> SettlementOutcome {
        let session_ref = match signal {
            RedirectSignal::Cancelled => return SettlementOutcome::Cancelled,
            RedirectSignal::Success { session_ref } => session_ref,
        };

        self.phase.send_replace(SettlementPhase::Syncing);
        let Some(synced) = until_cancelled(
            cancel,
            self.transport.sync_payment(booking, session_ref.as_deref()),
        )
        .await
        else {
            return SettlementOutcome::Aborted;
        };

        match synced {
            Ok(response) if response.payment_status.is_paid() => {
                return SettlementOutcome::Confirmed;
            }
            Ok(response) => tracing::debug!(
                booking_id = %booking,
                status = ?response.payment_status,
                "payment not confirmed by first sync; verifying"
            ),
            Err(err) => log_transport(booking, "sync", &err),
        }

        let max_attempts = self.config.max_attempts;
        for attempt in 1..=max_attempts {
            self.phase
                .send_replace(SettlementPhase::Verifying { attempt, max_attempts });

            let Some(poll) = until_cancelled(cancel, self.poll(booking)).await else {
                return SettlementOutcome::Aborted;
            };
            match poll {
                Poll::Paid => {
                    return SettlementOutcome::ConfirmedAfterVerifying { attempts: attempt };
                }
                Poll::Failed(reason) => return SettlementOutcome::Failed { reason },
                Poll::NotYet => {}
            }

            if attempt < max_attempts
                && until_cancelled(cancel, tokio::time::sleep(self.config.retry_delay))
                    .await
                    .is_none()
            {
                return SettlementOutcome::Aborted;
            }
        }

        SettlementOutcome::Unconfirmed {
            attempts: max_attempts,
        }
    }

    async fn poll(&self, booking: BookingId) -> Poll {
        match self.transport.sync_payment(booking, None).await {
            Ok(response) if response.payment_status.is_paid() => return Poll::Paid,
            Ok(_) => {}
            Err(err) => log_transport(booking, "sync", &err),
        }

        match self.transport.fetch_booking(booking).await {
            Ok(state) if state.is_paid() => Poll::Paid,
            Ok(state) => match state.provider_failure() {
                Some(status) => Poll::Failed(format!("payment {status} at provider")),
                None => Poll::NotYet,
            },
            Err(err) => {
                log_transport(booking, "fetch_booking", &err);
                Poll::NotYet
            }
        }
    }

    /// Ask for a fresh provider checkout after a cancelled or failed payment.
    pub async fn retry_checkout(
        &self,
        booking: BookingId,
    ) -> Result<CheckoutSession, TransportError> {
        let session = self.transport.create_checkout(booking).await?;
        tracing::info!(
            booking_id = %booking,
            session_ref = %session.session_ref,
            "checkout session created"
        );
        self.phase.send_replace(SettlementPhase::Idle);
        Ok(session)
    }
}

/// Race `fut` against cancellation. `None` if cancelled first.
async fn until_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

fn log_transport(booking: BookingId, call: &'static str, err: &TransportError) {
    tracing::warn!(
        booking_id = %booking,
        call,
        error = %err,
        transient = err.is_transient(),
        "settlement call failed; treating as unconfirmed"
    );
}
