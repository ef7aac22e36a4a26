use crate::circuit_breaker::{create_outbound_circuit_breaker, OutboundBreaker};
use crate::errors::AppError;
use chrono::Utc;
use failsafe::futures::CircuitBreaker;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// `source` tag stamped on every outbound request.
pub const REQUEST_SOURCE: &str = "business-intelligence-visuals";

/// Outbound search trigger.
#[derive(Debug, Clone)]
pub struct SearchTrigger<'a> {
    pub query: &'a str,
    pub mode: &'a str,
    pub filters: &'a Map<String, Value>,
    pub session_id: &'a str,
}

/// Client for the Clay.com webhooks that start searches and enrichments.
///
/// Both calls go through one circuit breaker so a dead Clay endpoint fails
/// fast instead of holding request handlers for the full timeout.
#[derive(Clone)]
pub struct ClayClient {
    client: reqwest::Client,
    search_webhook_url: String,
    enrich_webhook_url: String,
    breaker: OutboundBreaker,
}

impl ClayClient {
    /// Creates a new `ClayClient`.
    ///
    /// # Arguments
    ///
    /// * `search_webhook_url` - Clay table webhook that runs a lead search.
    /// * `enrich_webhook_url` - Clay webhook that enriches selected companies.
    /// * `timeout` - Per-request timeout.
    pub fn new(
        search_webhook_url: String,
        enrich_webhook_url: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Clay client: {}", e))
            })?;

        Ok(Self {
            client,
            search_webhook_url,
            enrich_webhook_url,
            breaker: create_outbound_circuit_breaker(),
        })
    }

    pub fn from_config(config: &crate::config::Config) -> Result<Self, AppError> {
        Self::new(
            config.clay_search_webhook_url.clone(),
            config.clay_enrich_webhook_url.clone(),
            Duration::from_secs(config.outbound_timeout_secs),
        )
    }

    /// Outbound body for a search trigger.
    pub fn search_body(trigger: &SearchTrigger<'_>) -> Value {
        json!({
            "searchQuery": trigger.query,
            "searchMode": trigger.mode,
            "searchFilters": trigger.filters,
            "timestamp": Utc::now().to_rfc3339(),
            "source": REQUEST_SOURCE,
            "userId": "anonymous",
            "sessionId": trigger.session_id,
        })
    }

    /// Outbound body for an enrichment request.
    pub fn enrichment_body(companies: &[Value], original_query: &str, mode: &str) -> Value {
        json!({
            "type": "enrichment_request",
            "selectedCompanies": companies,
            "originalQuery": original_query,
            "mode": mode,
            "timestamp": Utc::now().to_rfc3339(),
            "source": REQUEST_SOURCE,
        })
    }

    /// Triggers a Clay search. Leads arrive later on the receive-companies webhook.
    pub async fn send_search(&self, trigger: &SearchTrigger<'_>) -> Result<(), AppError> {
        tracing::info!(
            "Triggering Clay search (session {}, mode {})",
            trigger.session_id,
            trigger.mode
        );
        let body = Self::search_body(trigger);
        self.post(&self.search_webhook_url, &body, "search").await
    }

    /// Sends the selected companies to Clay for full enrichment.
    pub async fn send_enrichment_request(
        &self,
        companies: &[Value],
        original_query: &str,
        mode: &str,
    ) -> Result<(), AppError> {
        tracing::info!("Sending {} companies to Clay for enrichment", companies.len());
        let body = Self::enrichment_body(companies, original_query, mode);
        self.post(&self.enrich_webhook_url, &body, "enrichment").await
    }

    async fn post(&self, url: &str, body: &Value, what: &str) -> Result<(), AppError> {
        let request = async {
            let response = self
                .client
                .post(url)
                .json(body)
                .send()
                .await
                .map_err(|e| {
                    AppError::ExternalApiError(format!("Clay {} request failed: {}", what, e))
                })?;

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AppError::ExternalApiError(format!(
                    "Clay {} webhook returned {}: {}",
                    what, status, error_text
                )));
            }
            Ok(())
        };

        match self.breaker.call(request).await {
            Ok(()) => {
                tracing::info!("✓ Clay {} webhook accepted the request", what);
                Ok(())
            }
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(AppError::ExternalApiError(format!(
                "Clay {} webhook circuit open, request not sent",
                what
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = ClayClient::new(
            "https://example.com/search".to_string(),
            "https://example.com/enrich".to_string(),
            Duration::from_secs(5),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_search_body_fields() {
        let mut filters = Map::new();
        filters.insert("industry".into(), json!("fintech"));
        let trigger = SearchTrigger {
            query: "payments vendors",
            mode: "rfp",
            filters: &filters,
            session_id: "abc",
        };
        let body = ClayClient::search_body(&trigger);
        assert_eq!(body["searchQuery"], "payments vendors");
        assert_eq!(body["searchMode"], "rfp");
        assert_eq!(body["searchFilters"]["industry"], "fintech");
        assert_eq!(body["source"], REQUEST_SOURCE);
        assert_eq!(body["userId"], "anonymous");
        assert_eq!(body["sessionId"], "abc");
        assert!(body["timestamp"].is_string());
    }

    #[test]
    fn test_enrichment_body_fields() {
        let companies = vec![json!({"Company_Name": "Acme"})];
        let body = ClayClient::enrichment_body(&companies, "crm", "competitor");
        assert_eq!(body["type"], "enrichment_request");
        assert_eq!(body["selectedCompanies"][0]["Company_Name"], "Acme");
        assert_eq!(body["originalQuery"], "crm");
        assert_eq!(body["mode"], "competitor");
    }
}
