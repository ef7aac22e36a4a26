//! Field cleanup, mapping and merge rules shared by the webhook handlers.
//!
//! Clay delivers the same logical column under several names (snake case
//! table columns, camelCase formula outputs) and as strings, numbers or
//! arrays. Everything here normalizes that into `CompanyLead` and
//! `EnrichedCompetitor` values; nothing here touches storage.
use crate::models::{CompanyLead, EnrichedCompetitor, JobUpdate, Tier};
use crate::webhook_models::RawLead;
use chrono::Utc;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

pub const MAIN_ENRICHMENT_SOURCE: &str = "clay_main_enrichment";
pub const JOBS_ENRICHMENT_SOURCE: &str = "clay_jobs_enrichment";

/// Delimiters tried in order for generic list columns.
pub const LIST_DELIMITERS: [char; 4] = [',', '\n', ';', '|'];
/// Job columns contain commas inside titles, so newlines win.
pub const JOB_DELIMITERS: [char; 4] = ['\n', '|', ';', ','];

/// Values Clay writes when a column could not be filled.
const PLACEHOLDERS: [&str; 8] = [
    "null", "undefined", "n/a", "na", "none", "-", "--", "[]",
];

static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\*\s|-\s|\*\*)\s*(.*)$").expect("valid bullet regex"));

// ============ Scalar cleanup ============

/// Trim a string and reject empty or placeholder values.
pub fn clean_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_ascii_lowercase();
    if PLACEHOLDERS.contains(&lowered.as_str()) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Clean a JSON value into text. Numbers and booleans are stringified,
/// arrays and objects are not text.
pub fn clean_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_text(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First non-empty text among `keys` in a Clay record.
pub fn first_text(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(clean_value)
}

/// First value among `keys` that is present and not null.
fn first_value<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|v| !v.is_null())
}

/// Parse an integer column. Accepts `1200`, `1,200`, `$5,000,000` and
/// decimal strings (truncated); anything else is zero.
pub fn parse_integer(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, ',' | '$' | ' ' | '_'))
                .collect();
            let digits: String = cleaned
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite() && *f > 0.0)
                .map(|f| f as u64)
                .unwrap_or(0)
        }
        _ => 0,
    }
}

/// Parse a percentage column such as `12.5`, `12.5%` or `-3`.
pub fn parse_float(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite()).unwrap_or(0.0)
}

// ============ List parsing ============

/// Split a list column. Arrays are kept as-is (cleaned); strings are split on
/// the first of `delimiters` they contain, otherwise they are a single item.
pub fn parse_list(value: &Value, delimiters: &[char]) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(clean_value).collect(),
        Value::String(s) => split_text(s, delimiters),
        Value::Number(_) | Value::Bool(_) => clean_value(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

pub fn split_text(text: &str, delimiters: &[char]) -> Vec<String> {
    if clean_text(text).is_none() {
        return Vec::new();
    }
    match delimiters.iter().find(|d| text.contains(**d)) {
        Some(delimiter) => text.split(*delimiter).filter_map(clean_text).collect(),
        None => clean_text(text).into_iter().collect(),
    }
}

/// Bullet bodies of lines starting with `* `, `- ` or `**`.
pub fn extract_bullets(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            BULLET_RE
                .captures(line.trim())
                .and_then(|caps| caps.get(1))
                .and_then(|m| clean_text(&m.as_str().replace("**", "")))
        })
        .collect()
}

/// Feature and pricing columns are usually markdown bullet lists written by an
/// LLM step; fall back to delimiter splitting when there are no bullets.
pub fn parse_bulleted_list(value: &Value) -> Vec<String> {
    if let Value::String(text) = value {
        let bullets = extract_bullets(text);
        if !bullets.is_empty() {
            return bullets;
        }
    }
    parse_list(value, &LIST_DELIMITERS)
}

fn list_field(record: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    first_value(record, keys)
        .map(|v| parse_list(v, &LIST_DELIMITERS))
        .unwrap_or_default()
}

fn bulleted_field(record: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    first_value(record, keys)
        .map(parse_bulleted_list)
        .unwrap_or_default()
}

/// Split a job column keeping every position, so the title, URL and
/// description of one posting land in the same row. Blank or placeholder
/// cells become `""`; trailing blanks are dropped.
pub fn parse_job_column(value: &Value) -> Vec<String> {
    let cell = |raw: &str| clean_text(raw).unwrap_or_default();
    let mut cells: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .map(|v| clean_value(v).unwrap_or_default())
            .collect(),
        Value::String(text) if clean_text(text).is_some() => {
            match JOB_DELIMITERS.iter().find(|d| text.contains(**d)) {
                Some(delimiter) => text.split(*delimiter).map(cell).collect(),
                None => vec![cell(text.as_str())],
            }
        }
        Value::Number(_) | Value::Bool(_) => clean_value(value).into_iter().collect(),
        _ => Vec::new(),
    };
    while cells.last().is_some_and(String::is_empty) {
        cells.pop();
    }
    cells
}

/// Pad `items` with empty strings up to `len`.
pub fn pad_to(mut items: Vec<String>, len: usize) -> Vec<String> {
    items.resize(len.max(items.len()), String::new());
    items
}

// ============ Record mapping ============

/// Why a lead entry was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadIssue {
    pub index: usize,
    pub reason: String,
}

impl std::fmt::Display for LeadIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entry {}: {}", self.index, self.reason)
    }
}

/// Clean one raw lead. `Company_Name` and `search_query` are required.
pub fn clean_lead(index: usize, raw: &RawLead) -> Result<CompanyLead, LeadIssue> {
    let field = |v: &Option<Value>| v.as_ref().and_then(clean_value);

    let company_name = field(&raw.company_name);
    let search_query = field(&raw.search_query);

    let missing: Vec<&str> = [
        ("Company_Name", company_name.is_none()),
        ("search_query", search_query.is_none()),
    ]
    .iter()
    .filter(|(_, is_missing)| *is_missing)
    .map(|(name, _)| *name)
    .collect();

    match (company_name, search_query) {
        (Some(company_name), Some(search_query)) => Ok(CompanyLead {
            company_name,
            search_query,
            why_relevant: field(&raw.why_relevant),
            niche_focus: field(&raw.niche_focus),
            source: field(&raw.source),
            linkedin_url: field(&raw.linkedin_url),
        }),
        _ => Err(LeadIssue {
            index,
            reason: format!("missing or empty {}", missing.join(", ")),
        }),
    }
}

const NAME_KEYS: [&str; 3] = ["Company_Name", "companyName", "Company Name"];
const JOB_TITLE_KEYS: [&str; 3] = ["Job_Titles", "jobTitles", "Job_Title"];
const JOB_URL_KEYS: [&str; 3] = ["Job_URLs", "jobUrls", "Job_URL"];
const JOB_DESCRIPTION_KEYS: [&str; 3] = ["Job_Descriptions", "jobDescriptions", "Job_Description"];

fn is_job_key(key: &str) -> bool {
    JOB_TITLE_KEYS
        .iter()
        .chain(&JOB_URL_KEYS)
        .chain(&JOB_DESCRIPTION_KEYS)
        .any(|k| *k == key)
}

/// Company name of a main/jobs enrichment record.
pub fn record_company_name(record: &Map<String, Value>) -> Option<String> {
    first_text(record, &NAME_KEYS)
}

/// True when the record carries job posting columns.
pub fn has_job_fields(record: &Map<String, Value>) -> bool {
    record.keys().any(|key| is_job_key(key))
}

/// True when the record carries anything besides the name and job columns.
pub fn has_main_fields(record: &Map<String, Value>) -> bool {
    record
        .keys()
        .any(|key| !NAME_KEYS.contains(&key.as_str()) && !is_job_key(key))
}

/// Map a main enrichment record onto an `EnrichedCompetitor`.
///
/// Returns `None` when the record has no company name.
pub fn competitor_from_main(record: &Map<String, Value>) -> Option<EnrichedCompetitor> {
    let company_name = record_company_name(record)?;
    let text = |keys: &[&str]| first_text(record, keys).unwrap_or_default();

    let mut competitor = EnrichedCompetitor::empty(company_name, MAIN_ENRICHMENT_SOURCE);
    competitor.domain = text(&["Source", "domain", "Domain"]);
    competitor.linkedin_company_url = text(&["linkedinCompanyUrl", "LinkedIn_Company_URL"]);
    competitor.total_funding_raised = text(&["totalFundingRaised", "Total_Funding_Raised"]);
    competitor.employee_count = first_value(record, &["employeeCount", "Employee_Count"])
        .map(parse_integer)
        .unwrap_or(0);
    competitor.percent_employee_growth_over_last_6_months = first_value(
        record,
        &["percentEmployeeGrowthOverLast6Months", "Employee_Growth"],
    )
    .map(parse_float)
    .unwrap_or(0.0);
    competitor.product_features = bulleted_field(record, &["productFeatures", "Product_Features"]);
    competitor.pricing_plan_summary_result =
        bulleted_field(record, &["pricingPlanSummaryResult", "Pricing_Plans"]);
    competitor.customer_names = list_field(record, &["customerNames", "Customer_Names"]);
    competitor.industry =
        first_text(record, &["industry", "Industry"]).unwrap_or_else(|| "Unknown".to_string());
    competitor.description = text(&["description", "Description"]);
    competitor.sales_contact_email = text(&["salesContactEmail", "Sales_Contact_Email"]);
    competitor.enterprise_sales_rep_linkedin_url =
        text(&["enterpriseSalesRepLinkedinUrl", "Sales_Rep_LinkedIn"]);
    competitor.integrations_list = list_field(record, &["integrationsList", "Integrations"]);
    competitor.company_revenue = first_value(record, &["companyRevenue", "Company_Revenue"])
        .map(parse_integer)
        .unwrap_or(0);
    competitor.products_and_services_result =
        list_field(record, &["productsAndServicesResult", "Products_Services"]);
    competitor.product_roadmap = text(&["productRoadmap", "Product_Roadmap"]);
    competitor.tier = first_text(record, &["tier", "Tier"])
        .and_then(|t| t.parse::<Tier>().ok())
        .unwrap_or_else(|| Tier::derive(competitor.employee_count, competitor.company_revenue));
    competitor.original_search_query = text(&["Search Query", "originalSearchQuery", "search_query"]);

    Some(competitor)
}

/// Map a jobs record onto a `JobUpdate` with equal-length job arrays.
pub fn jobs_from_record(record: &Map<String, Value>) -> Option<JobUpdate> {
    let company_name = record_company_name(record)?;
    let jobs = |keys: &[&str]| {
        first_value(record, keys)
            .map(parse_job_column)
            .unwrap_or_default()
    };

    let titles = jobs(&JOB_TITLE_KEYS);
    let urls = jobs(&JOB_URL_KEYS);
    let descriptions = jobs(&JOB_DESCRIPTION_KEYS);

    let len = titles.len().max(urls.len()).max(descriptions.len());
    Some(JobUpdate {
        company_name,
        job_titles: pad_to(titles, len),
        job_urls: pad_to(urls, len),
        job_descriptions: pad_to(descriptions, len),
        updated_at: Utc::now(),
    })
}

/// Placeholder profile created when job postings arrive before the main
/// enrichment for that company.
pub fn competitor_from_jobs(update: &JobUpdate) -> EnrichedCompetitor {
    let mut competitor = EnrichedCompetitor::empty(&update.company_name, JOBS_ENRICHMENT_SOURCE);
    competitor.enrichment_timestamp = update.updated_at;
    apply_jobs(&mut competitor, update);
    competitor
}

// ============ Merge rules ============

/// Store key for a company: trimmed, case-insensitive.
pub fn company_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn merge_text(existing: &mut String, incoming: String) {
    if !incoming.trim().is_empty() {
        *existing = incoming;
    }
}

fn merge_count(existing: &mut u64, incoming: u64) {
    if incoming != 0 {
        *existing = incoming;
    }
}

/// Append the items of `incoming` not already present, keeping order.
pub fn union_into(existing: &mut Vec<String>, incoming: Vec<String>) {
    let mut seen: HashSet<String> = existing.iter().cloned().collect();
    for item in incoming {
        if seen.insert(item.clone()) {
            existing.push(item);
        }
    }
}

fn job_triples(titles: &[String], urls: &[String], descriptions: &[String]) -> Vec<(String, String, String)> {
    let len = titles.len().max(urls.len()).max(descriptions.len());
    let at = |v: &[String], i: usize| v.get(i).cloned().unwrap_or_default();
    (0..len)
        .map(|i| (at(titles, i), at(urls, i), at(descriptions, i)))
        .collect()
}

fn merge_jobs(
    target: &mut EnrichedCompetitor,
    titles: &[String],
    urls: &[String],
    descriptions: &[String],
) {
    let mut jobs = job_triples(&target.job_titles, &target.job_urls, &target.job_descriptions);
    let mut seen: HashSet<(String, String, String)> = jobs.iter().cloned().collect();
    for job in job_triples(titles, urls, descriptions) {
        if seen.insert(job.clone()) {
            jobs.push(job);
        }
    }

    target.job_titles = jobs.iter().map(|j| j.0.clone()).collect();
    target.job_urls = jobs.iter().map(|j| j.1.clone()).collect();
    target.job_descriptions = jobs.into_iter().map(|j| j.2).collect();
}

/// Union job postings into a profile, keeping the three arrays aligned.
pub fn apply_jobs(target: &mut EnrichedCompetitor, update: &JobUpdate) {
    merge_jobs(
        target,
        &update.job_titles,
        &update.job_urls,
        &update.job_descriptions,
    );
    if update.updated_at > target.enrichment_timestamp {
        target.enrichment_timestamp = update.updated_at;
    }
}

/// Merge `incoming` into `existing` for the same company.
///
/// Non-empty text and non-zero numbers from `incoming` win, lists are unioned,
/// tier keeps the higher bucket, `id` stays that of the first delivery and the
/// timestamp moves forward only.
pub fn merge_competitor(existing: &mut EnrichedCompetitor, incoming: EnrichedCompetitor) {
    merge_text(&mut existing.domain, incoming.domain);
    merge_text(&mut existing.linkedin_company_url, incoming.linkedin_company_url);
    merge_text(&mut existing.total_funding_raised, incoming.total_funding_raised);
    merge_count(&mut existing.employee_count, incoming.employee_count);
    if incoming.percent_employee_growth_over_last_6_months != 0.0 {
        existing.percent_employee_growth_over_last_6_months =
            incoming.percent_employee_growth_over_last_6_months;
    }
    union_into(&mut existing.product_features, incoming.product_features);
    union_into(
        &mut existing.pricing_plan_summary_result,
        incoming.pricing_plan_summary_result,
    );
    union_into(&mut existing.customer_names, incoming.customer_names);
    if incoming.industry != "Unknown" || existing.industry.is_empty() {
        merge_text(&mut existing.industry, incoming.industry);
    }
    merge_text(&mut existing.description, incoming.description);
    merge_text(&mut existing.sales_contact_email, incoming.sales_contact_email);
    merge_text(
        &mut existing.enterprise_sales_rep_linkedin_url,
        incoming.enterprise_sales_rep_linkedin_url,
    );
    merge_jobs(
        existing,
        &incoming.job_titles,
        &incoming.job_urls,
        &incoming.job_descriptions,
    );
    union_into(&mut existing.integrations_list, incoming.integrations_list);
    merge_count(&mut existing.company_revenue, incoming.company_revenue);
    union_into(
        &mut existing.products_and_services_result,
        incoming.products_and_services_result,
    );
    merge_text(&mut existing.product_roadmap, incoming.product_roadmap);
    existing.tier = existing.tier.max(incoming.tier);
    merge_text(&mut existing.original_search_query, incoming.original_search_query);
    if incoming.enrichment_timestamp > existing.enrichment_timestamp {
        existing.enrichment_timestamp = incoming.enrichment_timestamp;
    }
    if incoming.enrichment_source == MAIN_ENRICHMENT_SOURCE
        || existing.enrichment_source.is_empty()
    {
        existing.enrichment_source = incoming.enrichment_source;
    }
}

// ============ Search query filters ============

static INDUSTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)in the (\w+(?:\s+\w+)*?) industry").expect("valid industry regex")
});
static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:HQed|headquartered|based) in ([^,.;]+)").expect("valid location regex")
});
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:,\d+)*)\+?\s*(?:people|employees)").expect("valid size regex")
});

/// Filters implied by the free-text query ("in the fintech industry",
/// "HQed in Berlin", "500 employees").
pub fn extract_filters_from_query(query: &str) -> Map<String, Value> {
    let mut filters = Map::new();
    let capture = |re: &Regex| {
        re.captures(query)
            .and_then(|c| c.get(1))
            .and_then(|m| clean_text(m.as_str()))
    };

    if let Some(industry) = capture(&INDUSTRY_RE) {
        filters.insert("industry".to_string(), Value::String(industry));
    }
    if let Some(location) = capture(&LOCATION_RE) {
        filters.insert("location".to_string(), Value::String(location));
    }
    if let Some(size) = capture(&SIZE_RE) {
        filters.insert("companySize".to_string(), Value::String(size));
    }
    filters
}
