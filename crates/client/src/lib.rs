//! `cargolane-client`: the backend seen over HTTP.
//!
//! [`ApiClient`] implements every collaborator contract used by the access
//! gate, the settlement reconciler and the permission resolver.

pub mod api;
pub mod config;

pub use api::ApiClient;
pub use config::{ClientConfig, ConfigError};
