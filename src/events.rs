use crate::models::CompanyLead;
use axum::response::sse::Event;
use serde_json::json;
use tokio::sync::broadcast;

/// Capacity of the lead event channel; slow SSE clients skip missed events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Change to the lead store pushed to `/stream-companies` subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum LeadEvent {
    /// Snapshot sent once when a client connects.
    Initial(Vec<CompanyLead>),
    NewCompany(CompanyLead),
    /// A new search started; the client should drop what it has.
    Cleared,
}

impl LeadEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LeadEvent::Initial(_) => "initial",
            LeadEvent::NewCompany(_) => "new_company",
            LeadEvent::Cleared => "cleared",
        }
    }

    /// SSE frame: `event: <name>` with a JSON data line carrying the same `type`.
    pub fn to_sse(&self) -> Event {
        let data = match self {
            LeadEvent::Initial(companies) => json!({
                "type": self.name(),
                "companies": companies,
                "count": companies.len(),
            }),
            LeadEvent::NewCompany(company) => json!({
                "type": self.name(),
                "company": company,
            }),
            LeadEvent::Cleared => json!({ "type": self.name() }),
        };
        Event::default().event(self.name()).data(data.to_string())
    }
}

pub fn channel() -> broadcast::Sender<LeadEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

/// Publish to connected streams. Having no subscribers is normal.
pub fn publish(sender: &broadcast::Sender<LeadEvent>, event: LeadEvent) {
    let name = event.name();
    match sender.send(event) {
        Ok(receivers) => tracing::debug!("Published {} to {} stream(s)", name, receivers),
        Err(_) => tracing::trace!("No stream subscribers for {}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(name: &str) -> CompanyLead {
        CompanyLead {
            company_name: name.to_string(),
            search_query: "crm".to_string(),
            why_relevant: None,
            niche_focus: None,
            source: None,
            linkedin_url: None,
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(LeadEvent::Initial(vec![]).name(), "initial");
        assert_eq!(LeadEvent::NewCompany(lead("Acme")).name(), "new_company");
        assert_eq!(LeadEvent::Cleared.name(), "cleared");
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let sender = channel();
        let mut rx = sender.subscribe();
        publish(&sender, LeadEvent::NewCompany(lead("Acme")));
        assert_eq!(rx.recv().await.unwrap(), LeadEvent::NewCompany(lead("Acme")));
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let sender = channel();
        publish(&sender, LeadEvent::Cleared);
    }
}
