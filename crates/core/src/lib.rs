//! `cargolane-core`: shared building blocks.
//!
//! Identifiers and error types used by every other crate in the workspace.
//! No infrastructure concerns live here.

pub mod error;
pub mod id;
pub mod transport;

pub use error::{DomainError, DomainResult};
pub use id::{BookingId, OrganizationId, PaymentId, UserId};
pub use transport::TransportError;
