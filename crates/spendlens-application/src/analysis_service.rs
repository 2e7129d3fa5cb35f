//! Consumption analysis fetch.

use spendlens_core::analysis::{NormalizedAnalysis, normalize};
use spendlens_core::error::GatewayError;
use spendlens_core::gateway::Gateway;
use spendlens_core::transport::ApiRequest;

pub const ANALYZE_PATH: &str = "/api/v1/ai/analyze-consumer-data";

/// Requests an analysis and normalizes it for display.
#[derive(Clone)]
pub struct AnalysisService {
    gateway: Gateway,
}

impl AnalysisService {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Fetches and normalizes the analysis of the user's uploaded invoices.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(_))`: the analysis, validated and normalized
    /// - `Ok(None)`: the session ended or changed user while the request was
    ///   in flight; the result belongs to nobody and is discarded
    ///
    /// # Errors
    ///
    /// Gateway errors as-is. `InvalidShape` means the payload is unusable as
    /// a whole; nothing partial is returned.
    pub async fn fetch(&self) -> Result<Option<NormalizedAnalysis>, GatewayError> {
        let session = self.gateway.session();
        let epoch = session.epoch();

        let request = ApiRequest::post(ANALYZE_PATH)
            .json(&serde_json::json!({}))
            .map_err(|e| GatewayError::invalid_shape(e.to_string()))?;
        let response = self.gateway.send(request).await?;

        if session.epoch() != epoch || !session.is_authenticated() {
            tracing::debug!(epoch, "Discarding analysis fetched for a previous session");
            return Ok(None);
        }

        let raw: serde_json::Value = response.json()?;
        let normalized = normalize(&raw).inspect_err(|e| {
            tracing::warn!(error = %e, "Analysis response failed validation");
        })?;

        tracing::info!(
            categories = normalized.chart.categories.len(),
            total_items = normalized.chart.total_items,
            from_cache = normalized.result.from_cache,
            "Analysis received"
        );
        Ok(Some(normalized))
    }
}
