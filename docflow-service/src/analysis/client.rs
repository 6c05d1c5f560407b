use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::wire::{AnalyzeOperation, RawAnalyzeResult};
use super::{
    AnalysisResult, DocumentAnalyzer, LAYOUT_MODEL, LayoutAnalysis, READ_MODEL, TextExtraction,
};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::storage::{PROBE_TIMEOUT, strip_query};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Form recognizer REST client
pub struct FormRecognizerClient {
    client: Client,
    endpoint: String,
    key: String,
    default_model: String,
    api_version: String,
    poll_interval: Duration,
    preflight_timeout: Duration,
}

impl std::fmt::Debug for FormRecognizerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormRecognizerClient")
            .field("endpoint", &self.endpoint)
            .field("default_model", &self.default_model)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl FormRecognizerClient {
    /// Create a client, failing when the endpoint or key is missing or the
    /// endpoint is not `https://`
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        let key = config.key.as_deref().map(str::trim).filter(|k| !k.is_empty());

        let (Some(endpoint), Some(key)) = (endpoint, key) else {
            return Err(AnalysisError::Configuration {
                message: "Form recognizer endpoint and key must both be set".to_string(),
            });
        };

        if !endpoint.starts_with("https://") {
            return Err(AnalysisError::Configuration {
                message: format!("Endpoint must start with https://, got {endpoint}"),
            });
        }

        let client = Self::with_endpoint(endpoint, key, config)?;

        info!(endpoint = %client.endpoint, model = %client.default_model, "Form recognizer client initialized");
        Ok(client)
    }

    /// Build a client without endpoint validation
    fn with_endpoint(
        endpoint: &str,
        key: &str,
        config: &AnalysisConfig,
    ) -> Result<Self, AnalysisError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AnalysisError::Configuration {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key: key.to_string(),
            default_model: config.default_model.clone(),
            api_version: config.api_version.clone(),
            poll_interval: config.poll_interval(),
            preflight_timeout: PROBE_TIMEOUT,
        })
    }

    /// Plain text of the document, whole and per page
    #[allow(dead_code)] // Narrower mode, not part of the upload pipeline
    pub async fn extract_text(&self, url: &str) -> Result<TextExtraction, AnalysisError> {
        self.run_model(READ_MODEL, url).await.map(TextExtraction::from)
    }

    /// Tables, paragraphs and page count of the document
    #[allow(dead_code)] // Narrower mode, not part of the upload pipeline
    pub async fn analyze_layout(&self, url: &str) -> Result<LayoutAnalysis, AnalysisError> {
        self.run_model(LAYOUT_MODEL, url)
            .await
            .map(LayoutAnalysis::from)
    }

    /// Check the document URL answers before spending an analysis call on it
    async fn preflight(&self, url: &str) -> Result<(), AnalysisError> {
        let response = self
            .client
            .head(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .timeout(self.preflight_timeout)
            .send()
            .await
            .map_err(|e| AnalysisError::Network {
                message: "Could not reach the document URL".to_string(),
                detail: e.without_url().to_string(),
                remediation: "Check network connectivity and that the URL is valid".to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Access {
                message: "Document URL is not accessible".to_string(),
                detail: format!(
                    "Status: {}, StatusText: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
                remediation: "Check that the URL is valid and publicly accessible".to_string(),
            });
        }

        Ok(())
    }

    /// Submit `url` to `model_id` and poll until the operation finishes
    async fn run_model(
        &self,
        model_id: &str,
        url: &str,
    ) -> Result<RawAnalyzeResult, AnalysisError> {
        let operation_location = self.submit(model_id, url).await?;
        debug!(model = model_id, document = %strip_query(url), "Analysis submitted");

        let result = self.poll(&operation_location, url).await?;
        debug!(model = model_id, pages = result.pages.len(), "Analysis finished");
        Ok(result)
    }

    async fn submit(&self, model_id: &str, url: &str) -> Result<String, AnalysisError> {
        let submit_url = format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.endpoint, model_id, self.api_version
        );

        let response = self
            .client
            .post(&submit_url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.key)
            .json(&serde_json::json!({ "urlSource": url }))
            .send()
            .await
            .map_err(|e| processing_error(url, "Analysis request failed", e.without_url().to_string()))?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(processing_error(
                url,
                "Analysis request was rejected",
                format!("Status: {}, Body: {}", status.as_u16(), body),
            ));
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                processing_error(
                    url,
                    "Analysis request was rejected",
                    "Response carried no Operation-Location header".to_string(),
                )
            })
    }

    async fn poll(
        &self,
        operation_location: &str,
        url: &str,
    ) -> Result<RawAnalyzeResult, AnalysisError> {
        loop {
            let response = self
                .client
                .get(operation_location)
                .header(SUBSCRIPTION_KEY_HEADER, &self.key)
                .send()
                .await
                .map_err(|e| {
                    processing_error(url, "Polling the analysis failed", e.without_url().to_string())
                })?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(processing_error(
                    url,
                    "Polling the analysis failed",
                    format!("Status: {}, Body: {}", status.as_u16(), body),
                ));
            }

            let retry_after = retry_after(response.headers());
            let operation: AnalyzeOperation = response.json().await.map_err(|e| {
                processing_error(url, "Analysis returned an unreadable response", e.to_string())
            })?;

            match operation.status.as_str() {
                "succeeded" => {
                    return operation.analyze_result.ok_or_else(|| {
                        processing_error(
                            url,
                            "Analysis returned no result",
                            "Operation succeeded without an analyzeResult".to_string(),
                        )
                    });
                }
                "failed" => {
                    let detail = operation
                        .error
                        .map(|e| e.detail())
                        .unwrap_or_else(|| "Operation failed without error detail".to_string());
                    warn!(document = %strip_query(url), detail = %detail, "Analysis failed remotely");
                    return Err(processing_error(url, "Document analysis failed", detail));
                }
                "notStarted" | "running" => {
                    tokio::time::sleep(retry_after.unwrap_or(self.poll_interval)).await
                }
                other => {
                    warn!(document = %strip_query(url), status = other, "Analysis ended unexpectedly");
                    return Err(processing_error(
                        url,
                        "Document analysis did not complete",
                        format!("Operation ended with status: {other}"),
                    ));
                }
            }
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for FormRecognizerClient {
    async fn analyze(
        &self,
        url: &str,
        model_id: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.preflight(url).await?;

        let model_id = model_id.unwrap_or(&self.default_model);
        self.run_model(model_id, url).await.map(AnalysisResult::from)
    }
}

fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn processing_error(url: &str, message: &str, detail: String) -> AnalysisError {
    AnalysisError::Processing {
        message: message.to_string(),
        document_url: strip_query(url).to_string(),
        detail,
        suggestions: vec![
            "Check that the document is in a supported format (PDF, JPEG, PNG, TIFF)".to_string(),
            "Make sure the document URL is publicly accessible".to_string(),
            "Check that the document is not corrupted or password protected".to_string(),
        ],
    }
}
