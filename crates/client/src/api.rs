//! HTTP binding of the collaborator contracts.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

use cargolane_auth::{Principal, RestrictionRecord, RestrictionSource};
use cargolane_core::{BookingId, TransportError};
use cargolane_onboarding::{Scope, StatusSource, StepTree};
use cargolane_settlement::{BookingSettlementState, CheckoutSession, PaymentTransport, SyncResponse};

use crate::config::{ClientConfig, ConfigError};

/// Backend API client. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::Http(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The authenticated principal (`GET /auth/me`).
    pub async fn fetch_me(&self) -> Result<Principal, TransportError> {
        self.send(self.request(Method::GET, "/auth/me")).await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self.http.request(method, self.config.endpoint(path));
        match &self.config.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, TransportError> {
        let resp = req.send().await.map_err(map_reqwest_error)?;
        let status = resp.status();
        let url = resp.url().path().to_string();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), path = %url, "API request rejected");
            return Err(TransportError::Api(status.as_u16(), body));
        }

        let body = resp.text().await.map_err(map_reqwest_error)?;
        serde_json::from_str(&body).map_err(|e| TransportError::Parse(format!("{url}: {e}")))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_decode() {
        TransportError::Parse(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl StatusSource for ApiClient {
    async fn fetch_step_tree(&self, scope: Scope) -> Result<StepTree, TransportError> {
        let path = format!("/onboarding/status/{}", scope.as_str());
        self.send(self.request(Method::GET, &path)).await
    }
}

#[async_trait]
impl PaymentTransport for ApiClient {
    async fn sync_payment(
        &self,
        booking: BookingId,
        session_ref: Option<&str>,
    ) -> Result<SyncResponse, TransportError> {
        let path = format!("/payments/bookings/{booking}/sync");
        let body = SyncRequest {
            session_id: session_ref,
        };
        self.send(self.request(Method::POST, &path).json(&body)).await
    }

    async fn fetch_booking(
        &self,
        booking: BookingId,
    ) -> Result<BookingSettlementState, TransportError> {
        let path = format!("/bookings/{booking}");
        self.send(self.request(Method::GET, &path)).await
    }

    async fn create_checkout(&self, booking: BookingId) -> Result<CheckoutSession, TransportError> {
        let path = format!("/payments/bookings/{booking}/checkout");
        self.send(self.request(Method::POST, &path)).await
    }
}

#[async_trait]
impl RestrictionSource for ApiClient {
    async fn fetch_my_restrictions(&self) -> Result<RestrictionRecord, TransportError> {
        self.send(self.request(Method::GET, "/staff/me/restrictions")).await
    }
}
