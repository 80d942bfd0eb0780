//! Failures reported by network collaborators (status, payment, restrictions).

use thiserror::Error;

use crate::error::DomainError;

/// Error returned by any collaborator that talks to the backend.
///
/// The access gate and the settlement reconciler absorb these; they never
/// reach the view layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("client is offline")]
    Offline,
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("API error ({0}): {1}")]
    Api(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl TransportError {
    /// Whether retrying the same request later could succeed.
    ///
    /// 4xx responses other than 408/429 are deterministic rejections.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Offline | TransportError::Network(_) | TransportError::Timeout => true,
            TransportError::Api(status, _) => *status >= 500 || *status == 408 || *status == 429,
            TransportError::Parse(_) => false,
        }
    }

    /// The deterministic meaning of a rejection, for statuses that have one.
    pub fn as_domain(&self) -> Option<DomainError> {
        match self {
            TransportError::Api(401 | 403, _) => Some(DomainError::Unauthorized),
            TransportError::Api(404, _) => Some(DomainError::not_found()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient_client_errors_are_not() {
        assert!(TransportError::Api(503, String::new()).is_transient());
        assert!(TransportError::Api(429, String::new()).is_transient());
        assert!(!TransportError::Api(404, String::new()).is_transient());
        assert!(!TransportError::Parse("bad json".into()).is_transient());
        assert!(TransportError::Timeout.is_transient());
    }

    #[test]
    fn auth_and_missing_records_have_domain_meaning() {
        assert_eq!(
            TransportError::Api(401, "expired".into()).as_domain(),
            Some(DomainError::Unauthorized)
        );
        assert_eq!(
            TransportError::Api(404, String::new()).as_domain(),
            Some(DomainError::NotFound)
        );
        assert_eq!(TransportError::Api(500, String::new()).as_domain(), None);
        assert_eq!(TransportError::Offline.as_domain(), None);
    }
}
