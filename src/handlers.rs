use crate::clay_client::{ClayClient, SearchTrigger};
use crate::config::Config;
use crate::enrichment::extract_filters_from_query;
use crate::errors::{AppError, ResultExt};
use crate::events::{self, LeadEvent};
use crate::file_lock::LockSettings;
use crate::models::*;
use crate::replay_guard::ReplayGuard;
use crate::storage::{CompetitorStore, LeadStore};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use uuid::Uuid;

/// Interval between SSE keep-alive frames on `/stream-companies`.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Leads of the current search session.
    pub leads: LeadStore,
    /// Enriched competitor profiles.
    pub competitors: CompetitorStore,
    /// Client for the outbound Clay webhooks.
    pub clay: ClayClient,
    /// Recently applied webhook bodies, reset on each new search.
    pub replay_guard: ReplayGuard,
    /// Lead store changes pushed to SSE subscribers.
    pub events: broadcast::Sender<LeadEvent>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let settings = LockSettings::from_config(&config);
        let clay = ClayClient::from_config(&config)?;
        Ok(Self {
            leads: LeadStore::new(&config.storage_dir, settings),
            competitors: CompetitorStore::new(&config.storage_dir, settings),
            clay,
            replay_guard: ReplayGuard::default(),
            events: events::channel(),
            config,
        })
    }
}

/// Health check endpoint.
///
/// Returns the service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is healthy"))
)]
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "company-intel-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /search
///
/// Starts a new search session: clears the previous session's leads and
/// enriched profiles, then asks Clay to run the search. Clay failures are
/// logged but never surface to the caller, which starts polling right away.
#[utoipa::path(
    post,
    path = "/search",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search session started", body = SearchAccepted),
        (status = 400, description = "Malformed body or missing/invalid query and mode")
    )
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchAccepted>, AppError> {
    let Json(request) = payload?;
    let query = request
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());
    let mode = request.mode.as_deref().filter(|m| !m.is_empty());

    let (Some(query), Some(mode)) = (query, mode) else {
        return Err(AppError::BadRequest(
            "Missing required fields: query and mode".to_string(),
        ));
    };

    let mode: SearchMode = mode.parse().map_err(|_| {
        AppError::BadRequest(r#"Invalid mode. Must be "rfp" or "competitor""#.to_string())
    })?;
    let mode_name = match mode {
        SearchMode::Rfp => "rfp",
        SearchMode::Competitor => "competitor",
    };

    tracing::info!("POST /search - mode: {}, query: {}", mode_name, query);

    // New session: nothing from the previous search may leak into this one.
    state.leads.clear().await.context("starting search")?;
    state
        .competitors
        .clear()
        .await
        .context("starting search")?;
    state.replay_guard.reset();
    events::publish(&state.events, LeadEvent::Cleared);
    tracing::info!("Cleared previous companies for new search");

    let mut filters = extract_filters_from_query(query);
    if let Some(user_filters) = request.filters {
        filters.extend(user_filters);
    }

    let session_id = Uuid::new_v4().to_string();
    let trigger = SearchTrigger {
        query,
        mode: mode_name,
        filters: &filters,
        session_id: &session_id,
    };

    if let Err(e) = state.clay.send_search(&trigger).await {
        // Clay may still process the search; the caller polls either way.
        tracing::warn!("Clay search trigger failed for session {}: {}", session_id, e);
    }

    Ok(Json(SearchAccepted {
        success: true,
        message: "Search request initiated - companies will appear as they are found".to_string(),
        timestamp: Utc::now(),
        session_id,
    }))
}

/// GET /search
///
/// Usage document for the search endpoint.
#[utoipa::path(
    get,
    path = "/search",
    tag = "search",
    responses((status = 200, description = "Search API usage"))
)]
pub async fn search_info() -> Json<Value> {
    Json(json!({
        "message": "Company Search API",
        "endpoints": {
            "POST": "/search - Search for companies",
            "GET": "/search - API information"
        },
        "usage": {
            "method": "POST",
            "body": {
                "query": "string - Search query (e.g., \"Clay.com in workflow automation\")",
                "mode": "string - \"rfp\" or \"competitor\"",
                "filters": "object - Optional additional filters"
            }
        }
    }))
}

fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/event-stream"))
}

/// GET /stream-companies
///
/// Current leads as JSON, or a server-sent event stream when the client
/// sends `Accept: text/event-stream`.
#[utoipa::path(
    get,
    path = "/stream-companies",
    tag = "companies",
    responses(
        (status = 200, description = "Current leads (JSON) or lead event stream (SSE)", body = CompaniesResponse)
    )
)]
pub async fn stream_companies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if wants_event_stream(&headers) {
        return lead_event_stream(&state).await;
    }

    let companies = state.leads.get_all().await?;
    tracing::debug!("GET /stream-companies - {} companies", companies.len());

    Ok(Json(CompaniesResponse {
        success: true,
        count: companies.len(),
        companies,
        timestamp: Utc::now(),
    })
    .into_response())
}

async fn lead_event_stream(state: &AppState) -> Result<Response, AppError> {
    // Subscribe before the snapshot so no arrival falls between the two.
    let receiver = state.events.subscribe();
    let snapshot = state.leads.get_all().await?;
    tracing::info!("SSE client connected ({} companies so far)", snapshot.len());

    let initial = tokio_stream::once(Ok::<Event, Infallible>(
        LeadEvent::Initial(snapshot).to_sse(),
    ));
    let updates = BroadcastStream::new(receiver).filter_map(|message| match message {
        Ok(event) => Some(Ok(event.to_sse())),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!("SSE client lagged, skipped {} events", skipped);
            None
        }
    });

    let keep_alive = KeepAlive::new()
        .interval(KEEP_ALIVE_INTERVAL)
        .event(Event::default().data(r#"{"type":"keepalive"}"#));

    Ok(Sse::new(initial.chain(updates))
        .keep_alive(keep_alive)
        .into_response())
}

/// GET /enriched-competitors
#[utoipa::path(
    get,
    path = "/enriched-competitors",
    tag = "companies",
    responses((status = 200, description = "Enriched competitor profiles", body = CompetitorsResponse))
)]
pub async fn enriched_competitors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CompetitorsResponse>, AppError> {
    let competitors = state.competitors.get_all().await?;
    tracing::debug!("GET /enriched-competitors - {} competitors", competitors.len());

    Ok(Json(CompetitorsResponse {
        success: true,
        count: competitors.len(),
        competitors,
        timestamp: Utc::now(),
    }))
}

/// POST /enrich-selected
///
/// Forwards the companies the user picked to Clay for full enrichment.
/// Results come back later on the clay-results webhooks.
#[utoipa::path(
    post,
    path = "/enrich-selected",
    tag = "companies",
    request_body = EnrichSelectedRequest,
    responses(
        (status = 200, description = "Companies forwarded to Clay", body = EnrichSelectedResponse),
        (status = 400, description = "Malformed body or no companies selected"),
        (status = 502, description = "Clay rejected or could not be reached")
    )
)]
pub async fn enrich_selected(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EnrichSelectedRequest>, JsonRejection>,
) -> Result<Json<EnrichSelectedResponse>, AppError> {
    let Json(request) = payload?;
    let companies = request.companies.unwrap_or_default();
    if companies.is_empty() {
        return Err(AppError::BadRequest(
            "At least one company must be selected".to_string(),
        ));
    }

    let original_query = request.original_query.unwrap_or_default();
    let mode = request.mode.unwrap_or_default();
    tracing::info!(
        "POST /enrich-selected - {} companies, mode: {}",
        companies.len(),
        mode
    );

    state
        .clay
        .send_enrichment_request(&companies, &original_query, &mode)
        .await
        .context("forwarding selected companies")?;

    Ok(Json(EnrichSelectedResponse {
        success: true,
        message: "Selected companies sent for enrichment".to_string(),
        companies_sent: companies.len(),
        timestamp: Utc::now(),
    }))
}
