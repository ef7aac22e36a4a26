use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use utoipa::ToSchema;

// ============ Stored Records ============

/// Unenriched candidate company returned by the initial search.
///
/// Wire names follow the Clay table columns the front end already consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CompanyLead {
    #[serde(rename = "Company_Name")]
    pub company_name: String,
    pub search_query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_relevant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niche_focus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "linkedinURL", default)]
    pub linkedin_url: Option<String>,
}

/// Coarse size bucket, ordered from smallest to largest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Startup,
    Emerging,
    Growth,
    Enterprise,
}

impl Tier {
    /// Tier implied by headcount alone.
    pub fn from_headcount(employee_count: u64) -> Self {
        match employee_count {
            n if n >= 1000 => Tier::Enterprise,
            n if n >= 100 => Tier::Growth,
            n if n >= 10 => Tier::Emerging,
            _ => Tier::Startup,
        }
    }

    /// Tier implied by annual revenue (USD) alone.
    pub fn from_revenue(revenue: u64) -> Self {
        match revenue {
            r if r > 100_000_000 => Tier::Enterprise,
            r if r > 50_000_000 => Tier::Growth,
            r if r > 10_000_000 => Tier::Emerging,
            _ => Tier::Startup,
        }
    }

    /// The higher of the headcount and revenue tiers.
    pub fn derive(employee_count: u64, revenue: u64) -> Self {
        Self::from_headcount(employee_count).max(Self::from_revenue(revenue))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Startup => "startup",
            Tier::Emerging => "emerging",
            Tier::Growth => "growth",
            Tier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "startup" => Ok(Tier::Startup),
            "emerging" => Ok(Tier::Emerging),
            "growth" => Ok(Tier::Growth),
            "enterprise" => Ok(Tier::Enterprise),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

/// Fully enriched company profile assembled from Clay's main and jobs webhooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedCompetitor {
    /// Unique per process, roughly the creation time in epoch milliseconds;
    /// kept stable across merges.
    pub id: i64,
    pub company_name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub linkedin_company_url: String,
    #[serde(default)]
    pub total_funding_raised: String,
    #[serde(default)]
    pub employee_count: u64,
    #[serde(rename = "percentEmployeeGrowthOverLast6Months", default)]
    pub percent_employee_growth_over_last_6_months: f64,
    #[serde(default)]
    pub product_features: Vec<String>,
    #[serde(default)]
    pub pricing_plan_summary_result: Vec<String>,
    #[serde(default)]
    pub customer_names: Vec<String>,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sales_contact_email: String,
    #[serde(default)]
    pub enterprise_sales_rep_linkedin_url: String,
    #[serde(default)]
    pub job_titles: Vec<String>,
    #[serde(default)]
    pub job_urls: Vec<String>,
    #[serde(default)]
    pub job_descriptions: Vec<String>,
    #[serde(default)]
    pub integrations_list: Vec<String>,
    #[serde(default)]
    pub company_revenue: u64,
    #[serde(default)]
    pub products_and_services_result: Vec<String>,
    #[serde(default)]
    pub product_roadmap: String,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub original_search_query: String,
    pub enrichment_timestamp: DateTime<Utc>,
    #[serde(default)]
    pub enrichment_source: String,
}

static LAST_PROFILE_ID: AtomicI64 = AtomicI64::new(0);

/// Profile id: creation time in epoch milliseconds, bumped past the last id
/// handed out so profiles mapped in the same millisecond stay distinct.
pub fn next_profile_id(now_millis: i64) -> i64 {
    let mut last = LAST_PROFILE_ID.load(Ordering::Relaxed);
    loop {
        let next = now_millis.max(last + 1);
        match LAST_PROFILE_ID.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

impl EnrichedCompetitor {
    /// Empty profile for `company_name`; every other field starts blank.
    pub fn empty(company_name: impl Into<String>, source: &str) -> Self {
        let now = Utc::now();
        Self {
            id: next_profile_id(now.timestamp_millis()),
            company_name: company_name.into(),
            domain: String::new(),
            linkedin_company_url: String::new(),
            total_funding_raised: String::new(),
            employee_count: 0,
            percent_employee_growth_over_last_6_months: 0.0,
            product_features: Vec::new(),
            pricing_plan_summary_result: Vec::new(),
            customer_names: Vec::new(),
            industry: String::new(),
            description: String::new(),
            sales_contact_email: String::new(),
            enterprise_sales_rep_linkedin_url: String::new(),
            job_titles: Vec::new(),
            job_urls: Vec::new(),
            job_descriptions: Vec::new(),
            integrations_list: Vec::new(),
            company_revenue: 0,
            products_and_services_result: Vec::new(),
            product_roadmap: String::new(),
            tier: Tier::Startup,
            original_search_query: String::new(),
            enrichment_timestamp: now,
            enrichment_source: source.to_string(),
        }
    }

    pub fn job_count(&self) -> usize {
        self.job_titles
            .len()
            .max(self.job_urls.len())
            .max(self.job_descriptions.len())
    }
}

/// Job postings for one company, delivered separately from the main enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub company_name: String,
    pub job_titles: Vec<String>,
    pub job_urls: Vec<String>,
    pub job_descriptions: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

// ============ API Request / Response Models ============

/// What the user is searching for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Vendors answering a request for proposal.
    Rfp,
    /// Competitors of a given company.
    Competitor,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rfp" => Ok(SearchMode::Rfp),
            "competitor" => Ok(SearchMode::Competitor),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Body of `POST /search`.
///
/// Fields are optional so that missing values produce the documented 400
/// messages; a body that does not deserialize at all is a plain bad request.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub filters: Option<serde_json::Map<String, Value>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchAccepted {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// Body of `POST /enrich-selected`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrichSelectedRequest {
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub companies: Option<Vec<Value>>,
    #[serde(default)]
    pub original_query: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrichSelectedResponse {
    pub success: bool,
    pub message: String,
    pub companies_sent: usize,
    pub timestamp: DateTime<Utc>,
}

/// Polling response of `GET /stream-companies`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CompaniesResponse {
    pub success: bool,
    pub companies: Vec<CompanyLead>,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Response of `GET /enriched-competitors`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CompetitorsResponse {
    pub success: bool,
    pub competitors: Vec<EnrichedCompetitor>,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_profile_ids_unique_within_same_millisecond() {
        let profiles: Vec<_> = (0..500)
            .map(|i| EnrichedCompetitor::empty(format!("Company {}", i), "test"))
            .collect();
        let ids: HashSet<i64> = profiles.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), profiles.len());

        let fixed = next_profile_id(1);
        assert!(next_profile_id(1) > fixed);
    }

    #[test]
    fn test_tier_from_headcount_thresholds() {
        assert_eq!(Tier::from_headcount(0), Tier::Startup);
        assert_eq!(Tier::from_headcount(9), Tier::Startup);
        assert_eq!(Tier::from_headcount(10), Tier::Emerging);
        assert_eq!(Tier::from_headcount(100), Tier::Growth);
        assert_eq!(Tier::from_headcount(999), Tier::Growth);
        assert_eq!(Tier::from_headcount(1000), Tier::Enterprise);
    }

    #[test]
    fn test_tier_derive_takes_higher_signal() {
        assert_eq!(Tier::derive(5, 0), Tier::Startup);
        assert_eq!(Tier::derive(5, 60_000_000), Tier::Growth);
        assert_eq!(Tier::derive(1500, 1_000), Tier::Enterprise);
        assert_eq!(Tier::derive(50, 200_000_000), Tier::Enterprise);
    }

    #[test]
    fn test_tier_parse_and_display() {
        assert_eq!("Enterprise".parse::<Tier>(), Ok(Tier::Enterprise));
        assert_eq!(" growth ".parse::<Tier>(), Ok(Tier::Growth));
        assert!("huge".parse::<Tier>().is_err());
        assert_eq!(Tier::Emerging.to_string(), "emerging");
    }

    #[test]
    fn test_lead_wire_names() {
        let lead = CompanyLead {
            company_name: "Acme".into(),
            search_query: "crm".into(),
            why_relevant: None,
            niche_focus: Some("SMB".into()),
            source: None,
            linkedin_url: None,
        };
        let json = serde_json::to_value(&lead).unwrap();
        assert_eq!(json["Company_Name"], "Acme");
        assert_eq!(json["niche_focus"], "SMB");
        assert!(json.get("why_relevant").is_none());
        assert!(json["linkedinURL"].is_null());
    }

    #[test]
    fn test_competitor_wire_names() {
        let competitor = EnrichedCompetitor::empty("Acme", "test");
        let json = serde_json::to_value(&competitor).unwrap();
        assert_eq!(json["companyName"], "Acme");
        assert!(json.get("percentEmployeeGrowthOverLast6Months").is_some());
        assert!(json.get("enterpriseSalesRepLinkedinUrl").is_some());
        assert_eq!(json["tier"], "startup");
    }
}
