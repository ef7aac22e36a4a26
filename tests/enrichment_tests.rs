/// Unit tests for enrichment logic
/// Tests Clay field mapping, list parsing, and merge rules
use company_intel_api::enrichment::{
    apply_jobs, clean_lead, competitor_from_jobs, competitor_from_main, extract_bullets,
    extract_filters_from_query, has_job_fields, jobs_from_record, merge_competitor, parse_float,
    parse_integer, parse_list, JOBS_ENRICHMENT_SOURCE, JOB_DELIMITERS, LIST_DELIMITERS,
    MAIN_ENRICHMENT_SOURCE,
};
use company_intel_api::models::Tier;
use company_intel_api::webhook_models::{LeadPayload, RawLead};
use serde_json::{json, Map, Value};

fn record(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("test record must be an object")
}

#[cfg(test)]
mod lead_cleanup_tests {
    use super::*;

    fn raw(value: Value) -> RawLead {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_clean_lead_trims_and_drops_placeholders() {
        let lead = clean_lead(
            0,
            &raw(json!({
                "Company_Name": "  Acme Corp ",
                "search_query": "crm for dentists",
                "why_relevant": "N/A",
                "niche_focus": "  dental clinics ",
                "linkedinURL": "null"
            })),
        )
        .unwrap();

        assert_eq!(lead.company_name, "Acme Corp");
        assert_eq!(lead.niche_focus.as_deref(), Some("dental clinics"));
        assert!(lead.why_relevant.is_none());
        assert!(lead.linkedin_url.is_none());
    }

    #[test]
    fn test_clean_lead_reports_all_missing_fields() {
        let issue = clean_lead(3, &raw(json!({"Company_Name": "", "search_query": "  "}))).unwrap_err();
        assert_eq!(issue.index, 3);
        assert_eq!(
            issue.to_string(),
            "entry 3: missing or empty Company_Name, search_query"
        );
    }

    #[test]
    fn test_numeric_company_name_is_accepted() {
        let lead = clean_lead(0, &raw(json!({"Company_Name": 3, "search_query": "m"}))).unwrap();
        assert_eq!(lead.company_name, "3");
    }

    #[test]
    fn test_wrapped_payload_keeps_entry_order() {
        let payload: LeadPayload = serde_json::from_value(json!({
            "CompetitiveCompanies": [
                {"Company_Name": "B", "search_query": "q"},
                {"Company_Name": "A", "search_query": "q"}
            ]
        }))
        .unwrap();
        let names: Vec<_> = payload
            .into_entries()
            .iter()
            .enumerate()
            .map(|(i, e)| clean_lead(i, e).unwrap().company_name)
            .collect();
        assert_eq!(names, vec!["B", "A"]);
    }
}

#[cfg(test)]
mod parsing_tests {
    use super::*;

    #[test]
    fn test_generic_list_delimiter_priority() {
        assert_eq!(
            parse_list(&json!("Slack; Zoom, Teams"), &LIST_DELIMITERS),
            vec!["Slack; Zoom", "Teams"]
        );
        assert_eq!(
            parse_list(&json!("Slack; Zoom | Teams"), &LIST_DELIMITERS),
            vec!["Slack", "Zoom | Teams"]
        );
        assert_eq!(
            parse_list(&json!(["Slack", " ", "Zoom"]), &LIST_DELIMITERS),
            vec!["Slack", "Zoom"]
        );
    }

    #[test]
    fn test_job_list_prefers_newlines() {
        assert_eq!(
            parse_list(
                &json!("Engineer, Backend\nDesigner, Product"),
                &JOB_DELIMITERS
            ),
            vec!["Engineer, Backend", "Designer, Product"]
        );
        assert_eq!(
            parse_list(&json!("Engineer | Designer"), &JOB_DELIMITERS),
            vec!["Engineer", "Designer"]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(parse_integer(&json!("1,200")), 1200);
        assert_eq!(parse_integer(&json!("$5,000,000")), 5_000_000);
        assert_eq!(parse_integer(&json!(42)), 42);
        assert_eq!(parse_integer(&json!("about fifty")), 0);
        assert_eq!(parse_integer(&json!(null)), 0);
        assert_eq!(parse_float(&json!("12.5%")), 12.5);
        assert_eq!(parse_float(&json!("-3")), -3.0);
        assert_eq!(parse_float(&json!("n/a")), 0.0);
    }

    #[test]
    fn test_bullets() {
        let text = "Plans:\n* Starter: $10/mo\n- Pro: $50/mo\n**Enterprise**: custom\nnot a bullet";
        assert_eq!(
            extract_bullets(text),
            vec!["Starter: $10/mo", "Pro: $50/mo", "Enterprise: custom"]
        );
    }

    #[test]
    fn test_query_filters() {
        let filters = extract_filters_from_query(
            "CRM vendors in the healthcare industry headquartered in Austin, with 500 employees",
        );
        assert_eq!(filters["industry"], "healthcare");
        assert_eq!(filters["location"], "Austin");
        assert_eq!(filters["companySize"], "500");

        assert!(extract_filters_from_query("just some words").is_empty());
    }
}

#[cfg(test)]
mod mapping_tests {
    use super::*;

    #[test]
    fn test_main_record_mapping_with_aliases() {
        let competitor = competitor_from_main(&record(json!({
            "Company_Name": "Acme",
            "Source": "acme.io",
            "Employee_Count": "1,250",
            "Employee_Growth": "8.5%",
            "Company_Revenue": "$20,000,000",
            "Product_Features": "* SSO\n* Audit log",
            "customerNames": ["Globex", "Initech"],
            "Integrations": "Slack, Jira",
            "description": "Workflow automation"
        })))
        .unwrap();

        assert_eq!(competitor.company_name, "Acme");
        assert_eq!(competitor.domain, "acme.io");
        assert_eq!(competitor.employee_count, 1250);
        assert_eq!(competitor.percent_employee_growth_over_last_6_months, 8.5);
        assert_eq!(competitor.company_revenue, 20_000_000);
        assert_eq!(competitor.product_features, vec!["SSO", "Audit log"]);
        assert_eq!(competitor.customer_names, vec!["Globex", "Initech"]);
        assert_eq!(competitor.integrations_list, vec!["Slack", "Jira"]);
        assert_eq!(competitor.industry, "Unknown");
        assert_eq!(competitor.tier, Tier::Enterprise);
        assert_eq!(competitor.enrichment_source, MAIN_ENRICHMENT_SOURCE);
    }

    #[test]
    fn test_explicit_tier_wins_when_valid() {
        let explicit = competitor_from_main(&record(json!({
            "Company_Name": "Acme", "employeeCount": 5, "tier": "Growth"
        })))
        .unwrap();
        assert_eq!(explicit.tier, Tier::Growth);

        let bogus = competitor_from_main(&record(json!({
            "Company_Name": "Acme", "employeeCount": 150, "tier": "huge"
        })))
        .unwrap();
        assert_eq!(bogus.tier, Tier::Growth);
    }

    #[test]
    fn test_main_record_without_name_is_rejected() {
        assert!(competitor_from_main(&record(json!({"Source": "acme.io"}))).is_none());
        assert!(competitor_from_main(&record(json!({"Company_Name": "N/A"}))).is_none());
    }

    #[test]
    fn test_jobs_record_mapping() {
        let jobs = record(json!({
            "Company_Name": "Acme",
            "jobTitles": ["Engineer", "Designer", "PM"],
            "Job_URLs": "https://acme.io/1\nhttps://acme.io/2"
        }));
        assert!(has_job_fields(&jobs));
        let update = jobs_from_record(&jobs).unwrap();
        assert_eq!(update.job_titles.len(), 3);
        assert_eq!(update.job_urls, vec!["https://acme.io/1", "https://acme.io/2", ""]);
        assert_eq!(update.job_descriptions, vec!["", "", ""]);

        assert!(!has_job_fields(&record(json!({"Company_Name": "Acme"}))));
    }

    #[test]
    fn test_blank_job_url_stays_in_its_row() {
        let update = jobs_from_record(&record(json!({
            "Company_Name": "Acme",
            "jobTitles": ["Eng", "PM"],
            "jobUrls": ["", "https://x/pm"]
        })))
        .unwrap();
        assert_eq!(update.job_titles, vec!["Eng", "PM"]);
        assert_eq!(update.job_urls, vec!["", "https://x/pm"]);
        assert_eq!(update.job_descriptions, vec!["", ""]);
    }
}

#[cfg(test)]
mod merge_tests {
    use super::*;

    fn main_acme() -> company_intel_api::models::EnrichedCompetitor {
        competitor_from_main(&record(json!({
            "Company_Name": "Acme",
            "industry": "Fintech",
            "employeeCount": 40,
            "productFeatures": "Payments, Invoicing"
        })))
        .unwrap()
    }

    fn jobs_acme() -> company_intel_api::models::JobUpdate {
        jobs_from_record(&record(json!({
            "Company_Name": "Acme",
            "Job_Titles": "Engineer\nDesigner",
            "Job_URLs": "https://acme.io/1\nhttps://acme.io/2"
        })))
        .unwrap()
    }

    #[test]
    fn test_merge_keeps_known_values_and_unions_lists() {
        let mut existing = main_acme();
        let id = existing.id;
        let incoming = competitor_from_main(&record(json!({
            "Company_Name": "Acme",
            "employeeCount": 0,
            "productFeatures": "Invoicing, Payroll",
            "companyRevenue": 200000000
        })))
        .unwrap();

        merge_competitor(&mut existing, incoming);

        assert_eq!(existing.id, id);
        assert_eq!(existing.industry, "Fintech");
        assert_eq!(existing.employee_count, 40);
        assert_eq!(existing.company_revenue, 200_000_000);
        assert_eq!(existing.product_features, vec!["Payments", "Invoicing", "Payroll"]);
        assert_eq!(existing.tier, Tier::Enterprise);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut once = main_acme();
        let copy = once.clone();
        merge_competitor(&mut once, copy.clone());
        assert_eq!(once, copy);
    }

    #[test]
    fn test_jobs_before_main_equals_main_before_jobs() {
        // main, then jobs
        let mut main_first = main_acme();
        apply_jobs(&mut main_first, &jobs_acme());

        // jobs, then main
        let mut jobs_first = competitor_from_jobs(&jobs_acme());
        assert_eq!(jobs_first.enrichment_source, JOBS_ENRICHMENT_SOURCE);
        merge_competitor(&mut jobs_first, main_acme());

        assert_eq!(main_first.industry, jobs_first.industry);
        assert_eq!(main_first.employee_count, jobs_first.employee_count);
        assert_eq!(main_first.product_features, jobs_first.product_features);
        assert_eq!(main_first.job_titles, jobs_first.job_titles);
        assert_eq!(main_first.job_urls, jobs_first.job_urls);
        assert_eq!(main_first.job_descriptions, jobs_first.job_descriptions);
        assert_eq!(main_first.tier, jobs_first.tier);
        assert_eq!(jobs_first.enrichment_source, MAIN_ENRICHMENT_SOURCE);
    }

    #[test]
    fn test_repeated_job_delivery_adds_nothing() {
        let mut competitor = main_acme();
        apply_jobs(&mut competitor, &jobs_acme());
        apply_jobs(&mut competitor, &jobs_acme());
        assert_eq!(competitor.job_count(), 2);
    }
}
