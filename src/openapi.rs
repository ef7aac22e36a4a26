use crate::models::{
    CompaniesResponse, CompanyLead, CompetitorsResponse, EnrichSelectedRequest,
    EnrichSelectedResponse, EnrichedCompetitor, SearchAccepted, SearchMode, SearchRequest, Tier,
};
use crate::webhook_models::{EnrichmentWebhookResponse, LeadWebhookResponse};
use utoipa::OpenApi;

/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Company Intelligence API",
        description = "Collects company leads and enrichment results from Clay.com and serves them to the dashboard."
    ),
    paths(
        crate::handlers::health,
        crate::handlers::search,
        crate::handlers::search_info,
        crate::handlers::stream_companies,
        crate::handlers::enriched_competitors,
        crate::handlers::enrich_selected,
        crate::webhook_handler::receive_companies,
        crate::webhook_handler::receive_companies_info,
        crate::webhook_handler::clay_results,
        crate::webhook_handler::clay_results_main,
        crate::webhook_handler::clay_results_jobs,
    ),
    components(schemas(
        CompanyLead,
        EnrichedCompetitor,
        Tier,
        SearchMode,
        SearchRequest,
        SearchAccepted,
        EnrichSelectedRequest,
        EnrichSelectedResponse,
        CompaniesResponse,
        CompetitorsResponse,
        LeadWebhookResponse,
        EnrichmentWebhookResponse,
    )),
    tags(
        (name = "search", description = "Start a search session"),
        (name = "companies", description = "Read leads and enriched profiles"),
        (name = "webhooks", description = "Inbound Clay.com deliveries"),
        (name = "system", description = "Health")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/search",
            "/stream-companies",
            "/enriched-competitors",
            "/enrich-selected",
            "/webhook/receive-companies",
            "/webhook/clay-results",
            "/webhook/clay-results/main",
            "/webhook/clay-results/jobs",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
