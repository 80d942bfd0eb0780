//! Payment redirect signal carried in the return URL's query string.

use serde::Serialize;
use url::Url;

pub const PAYMENT_PARAM: &str = "payment";
pub const SESSION_ID_PARAM: &str = "session_id";

/// What the provider told us on the way back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "signal")]
pub enum RedirectSignal {
    Success { session_ref: Option<String> },
    Cancelled,
}

impl RedirectSignal {
    /// Read the signal from a query string without modifying anything.
    pub fn parse(query: &str) -> Option<Self> {
        let mut payment = None;
        let mut session_ref = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                PAYMENT_PARAM => payment = Some(value.into_owned()),
                SESSION_ID_PARAM if !value.is_empty() => session_ref = Some(value.into_owned()),
                _ => {}
            }
        }

        match payment?.as_str() {
            "success" => Some(RedirectSignal::Success { session_ref }),
            "cancelled" | "canceled" => Some(RedirectSignal::Cancelled),
            other => {
                tracing::debug!(value = other, "ignoring unrecognised payment redirect value");
                None
            }
        }
    }

    /// Read the signal and strip its parameters from `url`.
    ///
    /// A second call on the same URL returns `None`, so re-rendering the
    /// view cannot start a second reconciliation.
    pub fn take_from(url: &mut Url) -> Option<Self> {
        let query = url.query()?.to_string();
        let signal = Self::parse(&query);

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != PAYMENT_PARAM && k != SESSION_ID_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
        signal
    }
}
