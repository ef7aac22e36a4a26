use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Lead delivery from Clay - wrapped bulk, bare array, or single legacy object.
///
/// Variant order matters for the untagged match: the wrapped form is tried
/// first so `{"CompetitiveCompanies": [...]}` is never read as a single lead.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LeadPayload {
    Wrapped {
        #[serde(rename = "CompetitiveCompanies")]
        companies: Vec<RawLead>,
    },
    Batch(Vec<RawLead>),
    Single(RawLead),
}

impl LeadPayload {
    /// Convert to a vec of entries for uniform processing
    pub fn into_entries(self) -> Vec<RawLead> {
        match self {
            LeadPayload::Wrapped { companies } => companies,
            LeadPayload::Batch(entries) => entries,
            LeadPayload::Single(entry) => vec![entry],
        }
    }

    pub fn shape(&self) -> &'static str {
        match self {
            LeadPayload::Wrapped { .. } => "wrapped",
            LeadPayload::Batch(_) => "batch",
            LeadPayload::Single(_) => "single",
        }
    }
}

/// Lead entry as Clay sends it. Values stay untyped until cleanup because
/// Clay columns are occasionally numbers, nulls or placeholder strings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawLead {
    #[serde(rename = "Company_Name", default)]
    pub company_name: Option<Value>,
    #[serde(default)]
    pub search_query: Option<Value>,
    #[serde(default)]
    pub why_relevant: Option<Value>,
    #[serde(default)]
    pub niche_focus: Option<Value>,
    #[serde(default)]
    pub source: Option<Value>,
    #[serde(rename = "linkedinURL", default)]
    pub linkedin_url: Option<Value>,

    /// Any additional Clay columns
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Enrichment delivery (main or jobs) - one record or many.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordPayload {
    Batch(Vec<Map<String, Value>>),
    Single(Map<String, Value>),
}

impl RecordPayload {
    pub fn into_records(self) -> Vec<Map<String, Value>> {
        match self {
            RecordPayload::Batch(records) => records,
            RecordPayload::Single(record) => vec![record],
        }
    }
}

/// Response sent back to Clay for lead deliveries
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeadWebhookResponse {
    pub success: bool,
    pub status: String,
    pub message: String,
    pub received: usize,
    pub added: usize,
    pub duplicates: usize,
    pub total_companies: usize,
    pub timestamp: DateTime<Utc>,
}

/// Response sent back to Clay for main/jobs enrichment deliveries
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentWebhookResponse {
    pub success: bool,
    pub status: String,
    pub message: String,
    pub company_names: Vec<String>,
    pub inserted: usize,
    pub merged: usize,
    /// Total job postings in this delivery (jobs webhook only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_count: Option<usize>,
    pub timestamp: DateTime<Utc>,
}
