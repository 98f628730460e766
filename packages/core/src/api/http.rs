//! HTTP Dashboard API Client
//!
//! Production [`DashboardApi`](crate::api::DashboardApi) implementation:
//! posts the request envelope (API key + options) as JSON to the configured
//! backend function URL and decodes the response envelope.

use crate::api::{ApiError, DashboardApi, DashboardRequest, DashboardResponse};
use async_trait::async_trait;
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiEnvelope<'a> {
    api_key: &'a str,
    options: &'a DashboardRequest,
}

/// reqwest-backed client for the dashboard backend function.
pub struct HttpDashboardApi {
    client: reqwest::Client,
    function_url: String,
    api_key: String,
}

impl HttpDashboardApi {
    pub fn new(function_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            function_url: function_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl DashboardApi for HttpDashboardApi {
    async fn call(&self, request: DashboardRequest) -> Result<DashboardResponse, ApiError> {
        let envelope = ApiEnvelope {
            api_key: &self.api_key,
            options: &request,
        };
        let response = self
            .client
            .post(&self.function_url)
            .json(&envelope)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.json::<DashboardResponse>().await?)
    }
}
