//! Booking payment state as reported by the backend.

use serde::{Deserialize, Serialize};

use cargolane_core::{BookingId, PaymentId};

/// Booking-level payment status. Only the backend moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Unpaid,
    Refunded,
}

impl PaymentStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

/// Provider-side status of the payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderPaymentStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl ProviderPaymentStatus {
    /// The provider gave up on this attempt; polling will not change it.
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, ProviderPaymentStatus::Failed | ProviderPaymentStatus::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderPaymentStatus::Pending => "pending",
            ProviderPaymentStatus::Processing => "processing",
            ProviderPaymentStatus::Succeeded => "succeeded",
            ProviderPaymentStatus::Failed => "failed",
            ProviderPaymentStatus::Canceled => "canceled",
            ProviderPaymentStatus::Unknown => "unknown",
        }
    }
}

impl core::fmt::Display for ProviderPaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub status: ProviderPaymentStatus,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSettlementState {
    #[serde(alias = "id")]
    pub booking_id: BookingId,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment: Option<PaymentRecord>,
}

impl BookingSettlementState {
    /// A booking awaiting payment, with no provider attempt recorded.
    pub fn pending(booking_id: BookingId) -> Self {
        Self {
            booking_id,
            payment_status: PaymentStatus::Pending,
            payment: None,
        }
    }

    pub fn with_payment(mut self, payment: PaymentRecord) -> Self {
        self.payment = Some(payment);
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = status;
        self
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status.is_paid()
    }

    /// The provider status if it is a terminal failure.
    pub fn provider_failure(&self) -> Option<ProviderPaymentStatus> {
        self.payment
            .as_ref()
            .map(|p| p.status)
            .filter(ProviderPaymentStatus::is_terminal_failure)
    }
}

/// Answer to a `sync` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub payment_status: PaymentStatus,
}

impl SyncResponse {
    pub fn new(payment_status: PaymentStatus) -> Self {
        Self { payment_status }
    }
}

/// A fresh provider checkout the caller redirects to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    #[serde(rename = "sessionId")]
    pub session_ref: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_state_reads_backend_payload() {
        let booking = BookingId::new();
        let payment = PaymentId::new();
        let json = serde_json::json!({
            "id": booking,
            "paymentStatus": "PENDING",
            "payment": { "id": payment, "status": "requires_action", "amount": 120.5 },
            "origin": "Lagos",
        });

        let state: BookingSettlementState = serde_json::from_value(json).unwrap();
        assert_eq!(state.booking_id, booking);
        assert!(!state.is_paid());
        let record = state.payment.as_ref().unwrap();
        assert_eq!(record.status, ProviderPaymentStatus::Unknown);
        assert_eq!(state.provider_failure(), None);
    }

    #[test]
    fn failed_and_canceled_are_terminal() {
        let booking = BookingId::new();
        for status in [ProviderPaymentStatus::Failed, ProviderPaymentStatus::Canceled] {
            let state = BookingSettlementState::pending(booking).with_payment(PaymentRecord {
                id: PaymentId::new(),
                status,
                amount: 10.0,
            });
            assert_eq!(state.provider_failure(), Some(status));
        }
        assert!(!ProviderPaymentStatus::Processing.is_terminal_failure());
    }

    #[test]
    fn checkout_session_uses_session_id_on_the_wire() {
        let session: CheckoutSession = serde_json::from_str(
            r#"{"sessionId":"cs_test_1","url":"https://pay.example/cs_test_1"}"#,
        )
        .unwrap();
        assert_eq!(session.session_ref, "cs_test_1");
    }
}
