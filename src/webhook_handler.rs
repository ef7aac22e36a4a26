use crate::enrichment::{
    apply_jobs, clean_lead, competitor_from_main, has_job_fields, has_main_fields,
    jobs_from_record, record_company_name, LeadIssue,
};
use crate::errors::{AppError, ResultExt};
use crate::events::{self, LeadEvent};
use crate::handlers::AppState;
use crate::models::{EnrichedCompetitor, JobUpdate};
use crate::storage::UpsertOutcome;
use crate::webhook_models::{
    EnrichmentWebhookResponse, LeadPayload, LeadWebhookResponse, RecordPayload,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;

const LEADS_SCOPE: &str = "receive-companies";
const MAIN_SCOPE: &str = "clay-main";
const JOBS_SCOPE: &str = "clay-jobs";
const LEGACY_SCOPE: &str = "clay-legacy";

/// Lead delivery webhook (POST and PUT)
///
/// Receives candidate companies from Clay as they are found. Accepts a single
/// company object, a bare array, or `{"CompetitiveCompanies": [...]}`.
/// The delivery is all-or-nothing: one malformed entry rejects it with a
/// per-entry diagnostic list so Clay can surface the problem.
///
/// Authentication: X-Webhook-Token header must match WEBHOOK_SECRET when set.
#[utoipa::path(
    post,
    path = "/webhook/receive-companies",
    tag = "webhooks",
    responses(
        (status = 200, description = "Delivery stored (or ignored as duplicate)", body = LeadWebhookResponse),
        (status = 400, description = "Malformed delivery"),
        (status = 401, description = "Missing or invalid webhook token")
    )
)]
pub async fn receive_companies(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<LeadWebhookResponse>), AppError> {
    tracing::info!("Received company delivery from Clay ({} bytes)", body.len());

    // 1. Validate webhook secret (if configured)
    validate_webhook_secret(&state, &headers)?;

    // 2. Parse and clean every entry before touching the store
    let payload: LeadPayload = serde_json::from_slice(&body).map_err(|e| {
        AppError::InvalidPayload {
            message: "Invalid company data format".to_string(),
            details: vec![format!(
                "expected a company object, an array of companies, or {{\"CompetitiveCompanies\": [...]}}: {}",
                e
            )],
        }
    })?;
    let shape = payload.shape();
    let entries = payload.into_entries();
    if entries.is_empty() {
        return Err(AppError::BadRequest(
            "Delivery contains no companies".to_string(),
        ));
    }
    let received = entries.len();
    tracing::debug!("Lead delivery shape: {}, {} entries", shape, received);

    let mut leads = Vec::with_capacity(received);
    let mut issues: Vec<LeadIssue> = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match clean_lead(index, entry) {
            Ok(lead) => leads.push(lead),
            Err(issue) => issues.push(issue),
        }
    }
    if !issues.is_empty() {
        return Err(AppError::InvalidPayload {
            message: format!(
                "Invalid company data format: {} of {} entries rejected",
                issues.len(),
                received
            ),
            details: issues.iter().map(ToString::to_string).collect(),
        });
    }

    // 3. Clay retries deliveries it thinks failed; apply each body once
    if !state
        .replay_guard
        .check_and_remember(LEADS_SCOPE, &body)
        .await
    {
        let total = state.leads.count().await?;
        return Ok((
            StatusCode::OK,
            Json(LeadWebhookResponse {
                success: true,
                status: "duplicate".to_string(),
                message: "Delivery already received".to_string(),
                received,
                added: 0,
                duplicates: 0,
                total_companies: total,
                timestamp: Utc::now(),
            }),
        ));
    }

    // 4. Store and notify streams
    let (outcome, inserted) = match state.leads.add_many_returning(leads).await {
        Ok(result) => result,
        Err(e) => {
            state.replay_guard.forget(LEADS_SCOPE, &body).await;
            return Err(e).context("storing lead delivery");
        }
    };
    for lead in inserted {
        events::publish(&state.events, LeadEvent::NewCompany(lead));
    }

    tracing::info!(
        "Lead delivery complete: {} received, {} added, {} duplicates, {} total",
        received,
        outcome.added,
        outcome.duplicates,
        outcome.total
    );

    Ok((
        StatusCode::OK,
        Json(LeadWebhookResponse {
            success: true,
            status: "received".to_string(),
            message: format!(
                "{} {} received successfully",
                outcome.added,
                if outcome.added == 1 { "company" } else { "companies" }
            ),
            received,
            added: outcome.added,
            duplicates: outcome.duplicates,
            total_companies: outcome.total,
            timestamp: Utc::now(),
        }),
    ))
}

/// GET /webhook/receive-companies
///
/// Liveness document for configuring the Clay webhook.
#[utoipa::path(
    get,
    path = "/webhook/receive-companies",
    tag = "webhooks",
    responses((status = 200, description = "Webhook info and current lead count"))
)]
pub async fn receive_companies_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let count = state.leads.count().await?;
    Ok(Json(json!({
        "message": "Webhook endpoint is working",
        "methods": ["POST", "PUT", "GET"],
        "description": "This endpoint receives company data from Clay.com",
        "companiesReceived": count
    })))
}

/// Main enrichment webhook
///
/// Receives full company profiles (one record or an array) and upserts them,
/// merging into any profile already stored for the same company.
#[utoipa::path(
    post,
    path = "/webhook/clay-results/main",
    tag = "webhooks",
    responses(
        (status = 200, description = "Profiles stored", body = EnrichmentWebhookResponse),
        (status = 400, description = "Malformed delivery or missing Company_Name"),
        (status = 401, description = "Missing or invalid webhook token")
    )
)]
pub async fn clay_results_main(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<EnrichmentWebhookResponse>), AppError> {
    tracing::info!("Received main enrichment from Clay ({} bytes)", body.len());
    validate_webhook_secret(&state, &headers)?;

    let records = parse_records(&body)?;
    let competitors = main_competitors(&records)?;
    apply_main(&state, competitors, &body).await
}

/// Jobs enrichment webhook
///
/// Receives job postings per company. Postings may arrive before the main
/// profile; a placeholder profile is created and filled in later.
#[utoipa::path(
    post,
    path = "/webhook/clay-results/jobs",
    tag = "webhooks",
    responses(
        (status = 200, description = "Job postings stored", body = EnrichmentWebhookResponse),
        (status = 400, description = "Malformed delivery or missing Company_Name"),
        (status = 401, description = "Missing or invalid webhook token")
    )
)]
pub async fn clay_results_jobs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<EnrichmentWebhookResponse>), AppError> {
    tracing::info!("Received jobs enrichment from Clay ({} bytes)", body.len());
    validate_webhook_secret(&state, &headers)?;

    let records = parse_records(&body)?;
    let updates = job_updates(&records)?;
    apply_job_updates(&state, updates, &body).await
}

/// Legacy enrichment webhook
///
/// Older Clay tables post everything here, mixing record kinds in one batch.
/// Each record is routed on its own: job-only records go down the jobs path,
/// the rest down the main path with any job columns merged in.
#[utoipa::path(
    post,
    path = "/webhook/clay-results",
    tag = "webhooks",
    responses(
        (status = 200, description = "Delivery stored", body = EnrichmentWebhookResponse),
        (status = 400, description = "Malformed delivery or missing Company_Name"),
        (status = 401, description = "Missing or invalid webhook token")
    )
)]
pub async fn clay_results(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<EnrichmentWebhookResponse>), AppError> {
    tracing::info!("Received legacy Clay results ({} bytes)", body.len());
    validate_webhook_secret(&state, &headers)?;

    let records = parse_records(&body)?;
    let (profiles, updates) = split_legacy(&records)?;
    tracing::debug!(
        "Legacy delivery: {} profiles, {} job-only records",
        profiles.len(),
        updates.len()
    );
    apply_legacy(&state, profiles, updates, &body).await
}

fn parse_records(body: &[u8]) -> Result<Vec<Map<String, Value>>, AppError> {
    let payload: RecordPayload =
        serde_json::from_slice(body).map_err(|e| AppError::InvalidPayload {
            message: "Invalid enrichment data format".to_string(),
            details: vec![format!(
                "expected a record object or an array of records: {}",
                e
            )],
        })?;
    let records = payload.into_records();
    if records.is_empty() {
        return Err(AppError::BadRequest(
            "Delivery contains no records".to_string(),
        ));
    }
    Ok(records)
}

fn missing_name_error(missing: Vec<usize>, total: usize) -> AppError {
    AppError::InvalidPayload {
        message: format!(
            "Missing Company_Name in {} of {} records",
            missing.len(),
            total
        ),
        details: missing
            .into_iter()
            .map(|index| {
                LeadIssue {
                    index,
                    reason: "missing or empty Company_Name".to_string(),
                }
                .to_string()
            })
            .collect(),
    }
}

fn main_competitors(records: &[Map<String, Value>]) -> Result<Vec<EnrichedCompetitor>, AppError> {
    let mut competitors = Vec::with_capacity(records.len());
    let mut missing = Vec::new();
    for (index, record) in records.iter().enumerate() {
        match competitor_from_main(record) {
            Some(competitor) => competitors.push(competitor),
            None => missing.push(index),
        }
    }
    if missing.is_empty() {
        Ok(competitors)
    } else {
        Err(missing_name_error(missing, records.len()))
    }
}

fn job_updates(records: &[Map<String, Value>]) -> Result<Vec<JobUpdate>, AppError> {
    let mut updates = Vec::with_capacity(records.len());
    let mut missing = Vec::new();
    for (index, record) in records.iter().enumerate() {
        match jobs_from_record(record) {
            Some(update) => updates.push(update),
            None => missing.push(index),
        }
    }
    if missing.is_empty() {
        Ok(updates)
    } else {
        Err(missing_name_error(missing, records.len()))
    }
}

fn duplicate_enrichment_response() -> (StatusCode, Json<EnrichmentWebhookResponse>) {
    (
        StatusCode::OK,
        Json(EnrichmentWebhookResponse {
            success: true,
            status: "duplicate".to_string(),
            message: "Delivery already received".to_string(),
            company_names: Vec::new(),
            inserted: 0,
            merged: 0,
            job_count: None,
            timestamp: Utc::now(),
        }),
    )
}

#[derive(Debug, Default)]
struct Tally {
    names: Vec<String>,
    inserted: usize,
    merged: usize,
}

impl Tally {
    fn record(&mut self, name: String, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Merged => self.merged += 1,
        }
        self.names.push(name);
    }
}

async fn store_profiles(
    state: &AppState,
    profiles: Vec<EnrichedCompetitor>,
    tally: &mut Tally,
) -> Result<(), AppError> {
    for competitor in profiles {
        let name = competitor.company_name.clone();
        let outcome = state.competitors.upsert(competitor).await?;
        tracing::info!("✓ Stored main enrichment for {} ({:?})", name, outcome);
        tally.record(name, outcome);
    }
    Ok(())
}

async fn store_job_updates(
    state: &AppState,
    updates: Vec<JobUpdate>,
    tally: &mut Tally,
) -> Result<(), AppError> {
    for update in updates {
        let name = update.company_name.clone();
        let jobs = update.job_titles.len();
        let outcome = state.competitors.apply_jobs(update).await?;
        if outcome == UpsertOutcome::Inserted {
            tracing::info!(
                "Jobs for {} arrived before main enrichment, created placeholder",
                name
            );
        }
        tracing::info!("✓ Stored {} job postings for {}", jobs, name);
        tally.record(name, outcome);
    }
    Ok(())
}

fn received_response(
    tally: Tally,
    message: String,
    job_count: Option<usize>,
) -> (StatusCode, Json<EnrichmentWebhookResponse>) {
    (
        StatusCode::OK,
        Json(EnrichmentWebhookResponse {
            success: true,
            status: "received".to_string(),
            message,
            company_names: tally.names,
            inserted: tally.inserted,
            merged: tally.merged,
            job_count,
            timestamp: Utc::now(),
        }),
    )
}

async fn apply_main(
    state: &AppState,
    competitors: Vec<EnrichedCompetitor>,
    body: &[u8],
) -> Result<(StatusCode, Json<EnrichmentWebhookResponse>), AppError> {
    if !state.replay_guard.check_and_remember(MAIN_SCOPE, body).await {
        return Ok(duplicate_enrichment_response());
    }

    let mut tally = Tally::default();
    if let Err(e) = store_profiles(state, competitors, &mut tally).await {
        state.replay_guard.forget(MAIN_SCOPE, body).await;
        return Err(e).context("storing main enrichment");
    }

    let message = format!("Stored enrichment for {} companies", tally.names.len());
    Ok(received_response(tally, message, None))
}

async fn apply_job_updates(
    state: &AppState,
    updates: Vec<JobUpdate>,
    body: &[u8],
) -> Result<(StatusCode, Json<EnrichmentWebhookResponse>), AppError> {
    if !state.replay_guard.check_and_remember(JOBS_SCOPE, body).await {
        return Ok(duplicate_enrichment_response());
    }

    let job_count: usize = updates.iter().map(|u| u.job_titles.len()).sum();
    let mut tally = Tally::default();
    if let Err(e) = store_job_updates(state, updates, &mut tally).await {
        state.replay_guard.forget(JOBS_SCOPE, body).await;
        return Err(e).context("storing job postings");
    }

    let message = format!(
        "Stored {} job postings for {} companies",
        job_count,
        tally.names.len()
    );
    Ok(received_response(tally, message, Some(job_count)))
}

/// Legacy records split by what they carry. A record with both main and job
/// columns becomes one profile with its postings already merged in.
fn split_legacy(
    records: &[Map<String, Value>],
) -> Result<(Vec<EnrichedCompetitor>, Vec<JobUpdate>), AppError> {
    let missing: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record_company_name(record).is_none())
        .map(|(index, _)| index)
        .collect();
    if !missing.is_empty() {
        return Err(missing_name_error(missing, records.len()));
    }

    let mut profiles = Vec::new();
    let mut updates = Vec::new();
    for record in records {
        let jobs = if has_job_fields(record) {
            jobs_from_record(record)
        } else {
            None
        };
        match jobs {
            Some(update) if !has_main_fields(record) => updates.push(update),
            jobs => {
                if let Some(mut competitor) = competitor_from_main(record) {
                    if let Some(update) = jobs {
                        apply_jobs(&mut competitor, &update);
                    }
                    profiles.push(competitor);
                }
            }
        }
    }
    Ok((profiles, updates))
}

async fn apply_legacy(
    state: &AppState,
    profiles: Vec<EnrichedCompetitor>,
    updates: Vec<JobUpdate>,
    body: &[u8],
) -> Result<(StatusCode, Json<EnrichmentWebhookResponse>), AppError> {
    if !state.replay_guard.check_and_remember(LEGACY_SCOPE, body).await {
        return Ok(duplicate_enrichment_response());
    }

    let carries_jobs = !updates.is_empty() || profiles.iter().any(|p| p.job_count() > 0);
    let job_count: usize = updates.iter().map(|u| u.job_titles.len()).sum::<usize>()
        + profiles.iter().map(EnrichedCompetitor::job_count).sum::<usize>();

    let mut tally = Tally::default();
    let stored = match store_profiles(state, profiles, &mut tally).await {
        Ok(()) => store_job_updates(state, updates, &mut tally).await,
        Err(e) => Err(e),
    };
    if let Err(e) = stored {
        state.replay_guard.forget(LEGACY_SCOPE, body).await;
        return Err(e).context("storing legacy enrichment");
    }

    let message = format!("Stored enrichment for {} companies", tally.names.len());
    Ok(received_response(
        tally,
        message,
        carries_jobs.then_some(job_count),
    ))
}

/// Validate webhook secret from X-Webhook-Token header
fn validate_webhook_secret(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    // If no secret is configured, skip validation (warn was already logged at startup)
    let Some(ref expected_secret) = state.config.webhook_secret else {
        return Ok(());
    };

    let token = headers
        .get("X-Webhook-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing X-Webhook-Token header".to_string()))?;

    if !constant_time_compare(token, expected_secret) {
        tracing::warn!("Invalid webhook token received");
        return Err(AppError::Unauthorized("Invalid webhook token".to_string()));
    }

    Ok(())
}

/// Constant-time string comparison; only the length leaks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret", "secret"));
        assert!(!constant_time_compare("secret", "secreT"));
        assert!(!constant_time_compare("secret", "secret2"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_parse_records_rejects_scalars_and_empty_arrays() {
        assert!(matches!(
            parse_records(b"42"),
            Err(AppError::InvalidPayload { .. })
        ));
        assert!(matches!(
            parse_records(b"not json"),
            Err(AppError::InvalidPayload { .. })
        ));
        assert!(matches!(parse_records(b"[]"), Err(AppError::BadRequest(_))));
        assert_eq!(parse_records(br#"{"Company_Name":"Acme"}"#).unwrap().len(), 1);
    }

    #[test]
    fn test_main_competitors_reports_every_missing_name() {
        let records = parse_records(
            br#"[{"Company_Name":"Acme"},{"industry":"SaaS"},{"Company_Name":"  "}]"#,
        )
        .unwrap();
        match main_competitors(&records) {
            Err(AppError::InvalidPayload { details, .. }) => {
                assert_eq!(
                    details,
                    vec![
                        "entry 1: missing or empty Company_Name".to_string(),
                        "entry 2: missing or empty Company_Name".to_string(),
                    ]
                );
            }
            other => panic!("expected InvalidPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_job_updates_pads_arrays() {
        let records = parse_records(
            br#"{"Company_Name":"Acme","Job_Titles":"Engineer\nDesigner","Job_URLs":"https://a.example/1"}"#,
        )
        .unwrap();
        let updates = job_updates(&records).unwrap();
        assert_eq!(updates[0].job_titles.len(), 2);
        assert_eq!(updates[0].job_urls.len(), 2);
        assert_eq!(updates[0].job_descriptions.len(), 2);
    }

    #[test]
    fn test_split_legacy_routes_each_record() {
        let records = parse_records(
            br#"[
                {"Company_Name":"Acme","jobTitles":["Engineer"]},
                {"Company_Name":"Globex","employeeCount":12},
                {"Company_Name":"Initech","employeeCount":500,"Job_Titles":"Eng"}
            ]"#,
        )
        .unwrap();
        let (profiles, updates) = split_legacy(&records).unwrap();

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].company_name, "Acme");

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].company_name, "Globex");
        assert_eq!(profiles[0].employee_count, 12);
        assert_eq!(profiles[1].company_name, "Initech");
        assert_eq!(profiles[1].employee_count, 500);
        assert_eq!(profiles[1].job_titles, vec!["Eng"]);
    }

    #[test]
    fn test_split_legacy_rejects_missing_names() {
        let records =
            parse_records(br#"[{"Company_Name":"Acme"},{"jobTitles":["Engineer"]}]"#).unwrap();
        match split_legacy(&records) {
            Err(AppError::InvalidPayload { details, .. }) => {
                assert_eq!(details, vec!["entry 1: missing or empty Company_Name".to_string()]);
            }
            other => panic!("expected InvalidPayload, got {:?}", other),
        }
    }
}
