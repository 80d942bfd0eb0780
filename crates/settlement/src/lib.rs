//! `cargolane-settlement`: reconciling a booking after a payment redirect.
//!
//! The provider redirects back before the backend has necessarily seen the
//! payment. The reconciler asks the backend to `sync` with the provider, then
//! polls the booking a bounded number of times, and always ends in a concrete
//! [`SettlementOutcome`].

pub mod reconciler;
pub mod redirect;
pub mod state;
pub mod transport;

pub use reconciler::{ReconcilerConfig, SettlementOutcome, SettlementPhase, SettlementReconciler};
pub use redirect::{PAYMENT_PARAM, RedirectSignal, SESSION_ID_PARAM};
pub use state::{
    BookingSettlementState, CheckoutSession, PaymentRecord, PaymentStatus, ProviderPaymentStatus,
    SyncResponse,
};
pub use transport::{PaymentTransport, ScriptedPaymentTransport};
