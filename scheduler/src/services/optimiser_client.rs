//! HTTP client for the optimisation service.

use std::time::Duration;

use async_trait::async_trait;
use fieldline_optimiser::api::{OptimizationRequest, OptimizationResponse};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum OptimiserError {
    #[error("optimiser request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("optimiser rejected the request ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid optimisation request: {0}")]
    InvalidRequest(String),
}

/// The combinatorial step the route engine delegates to. Implemented by the
/// HTTP client and by the in-process fallback.
#[async_trait]
pub trait Optimiser: Send + Sync {
    async fn optimize(
        &self,
        request: &OptimizationRequest,
    ) -> Result<OptimizationResponse, OptimiserError>;
}

pub struct OptimiserClient {
    base_url: String,
    client: reqwest::Client,
}

impl OptimiserClient {
    /// `request_timeout` should comfortably exceed the solver's wall-clock
    /// limit so a slow solve is not cut off mid-flight.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client with static configuration");
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub async fn health(&self) -> Result<(), OptimiserError> {
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(OptimiserError::Rejected {
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

#[async_trait]
impl Optimiser for OptimiserClient {
    async fn optimize(
        &self,
        request: &OptimizationRequest,
    ) -> Result<OptimizationResponse, OptimiserError> {
        let url = format!(
            "{}/optimize-schedule",
            self.base_url.trim_end_matches('/')
        );
        debug!(items = request.items.len(), %url, "sending optimisation request");

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OptimiserError::Rejected {
                status,
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json::<OptimizationResponse>().await?)
    }
}
