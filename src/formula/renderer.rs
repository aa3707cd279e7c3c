//! Client for the external formula-to-image service.

use crate::config::FormulaConfig;
use crate::error::{RenderError, Result};

use anyhow::Context as _;

/// Converts one formula into the URL of a rendered image.
#[async_trait::async_trait]
pub trait FormulaRenderer: Send + Sync {
    async fn render(&self, formula: &str) -> Result<String>;
}

/// Renders formulas through `GET <endpoint>?latex_code=<formula>`.
///
/// The service answers with the image URL as the plain-text body.
pub struct HttpFormulaRenderer {
    endpoint: String,
    http_client: reqwest::Client,
}

impl HttpFormulaRenderer {
    pub fn new(config: &FormulaConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .with_context(|| "failed to build formula HTTP client")?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            http_client,
        })
    }
}

#[async_trait::async_trait]
impl FormulaRenderer for HttpFormulaRenderer {
    async fn render(&self, formula: &str) -> Result<String> {
        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[("latex_code", formula)])
            .send()
            .await
            .map_err(|error| RenderError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Status {
                status: status.as_u16(),
                formula: formula.to_string(),
            }
            .into());
        }

        let body = response
            .text()
            .await
            .map_err(|error| RenderError::Request(format!("failed to read body: {error}")))?;

        let url = body.trim();
        if url.is_empty() {
            return Err(RenderError::EmptyUrl {
                formula: formula.to_string(),
            }
            .into());
        }

        tracing::debug!(%formula, %url, "formula rendered");
        Ok(url.to_string())
    }
}
