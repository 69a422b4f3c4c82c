//! Station API client.
//!
//! Wraps the throttled transport with envelope-aware request handling:
//! non-200 responses are captured whole for diagnostics, and an `error`
//! object inside a 200 response is still a failure.

use crate::api::auth::CredentialProvider;
use crate::api::pagination::{MeasureQuery, MeasureSource};
use crate::api::protocol::{Envelope, MeasureGroup, Station, StationsBody};
use crate::api::transport::ThrottledTransport;
use crate::api::{ApiError, ApiResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

/// Default base URL of the upstream API.
pub const DEFAULT_BASE_URL: &str = "https://api.netatmo.net";

/// Client for the station and measurement endpoints.
pub struct StationClient {
    transport: Arc<ThrottledTransport>,
    credentials: Arc<dyn CredentialProvider>,
    base_url: String,
}

impl StationClient {
    /// Create a client against [`DEFAULT_BASE_URL`].
    pub fn new(
        transport: Arc<ThrottledTransport>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self::with_base_url(transport, credentials, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(
        transport: Arc<ThrottledTransport>,
        credentials: Arc<dyn CredentialProvider>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            credentials,
            base_url: base_url.into(),
        }
    }

    /// Discover all stations (and their modules) visible to the account.
    pub async fn get_stations(&self) -> ApiResult<Vec<Station>> {
        let body: StationsBody = self.get("/api/getstationsdata", &[]).await?;
        debug!(stations = body.stations.len(), "discovered stations");
        Ok(body.stations)
    }

    /// Issue an authenticated GET and unwrap the response envelope.
    async fn get<T>(&self, path: &str, params: &[(&str, String)]) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let bearer = self.credentials.bearer_token().await?;
        let request = self
            .transport
            .http()
            .get(&url)
            .query(params)
            .bearer_auth(bearer);

        let response = self.transport.execute(request).await?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if status.as_u16() != 200 {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let envelope: Envelope =
            serde_json::from_str(&text).map_err(|e| ApiError::Decode(format!("envelope: {e}")))?;

        if let Some(error) = envelope.error {
            return Err(ApiError::Upstream {
                code: error.code,
                message: error.message,
            });
        }

        let body = envelope
            .body
            .ok_or_else(|| ApiError::Decode("envelope has neither body nor error".to_string()))?;
        serde_json::from_value(body).map_err(|e| ApiError::Decode(format!("body: {e}")))
    }
}

#[async_trait]
impl MeasureSource for StationClient {
    async fn fetch_measure(&self, query: &MeasureQuery) -> ApiResult<Vec<MeasureGroup>> {
        let params = query.params();
        self.get("/api/getmeasure", &params).await
    }
}
