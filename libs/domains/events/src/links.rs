use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{EventFilter, EventInterest, Task};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Link {
    pub href: String,
}

/// Relation name to link
pub type Links = BTreeMap<String, Link>;

/// Builds hypermedia links, prefixed with the public base URL (empty yields
/// relative hrefs).
#[derive(Debug, Clone, Default)]
pub struct LinkBuilder {
    base_url: String,
}

impl LinkBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn href(&self, path: &str) -> Link {
        Link {
            href: format!("{}{}", self.base_url, path),
        }
    }

    pub fn event_location(&self, id: Uuid) -> String {
        self.href(&format!("/events/{id}")).href
    }

    pub fn task_location(&self, id: Uuid) -> String {
        self.href(&format!("/events/tasks/{id}")).href
    }

    pub fn event(&self, id: Uuid) -> Links {
        Links::from([
            ("self".to_string(), self.href(&format!("/events/{id}"))),
            (
                "interests".to_string(),
                self.href(&format!("/events/{id}/interests")),
            ),
            ("collection".to_string(), self.href("/events")),
        ])
    }

    /// `next` only when more matches remain, `prev` only when `skip > 0`.
    pub fn page(&self, filter: &EventFilter, total: u64) -> Links {
        let mut links = Links::new();
        links.insert("self".to_string(), self.page_link(filter, filter.skip));

        if filter.skip.saturating_add(filter.limit) < total {
            links.insert(
                "next".to_string(),
                self.page_link(filter, filter.skip + filter.limit),
            );
        }
        if filter.skip > 0 {
            links.insert(
                "prev".to_string(),
                self.page_link(filter, filter.skip.saturating_sub(filter.limit)),
            );
        }
        links
    }

    pub fn task(&self, task: &Task) -> Links {
        let mut links = Links::from([(
            "self".to_string(),
            self.href(&format!("/events/tasks/{}", task.id)),
        )]);
        if let Some(event_id) = task.event_id() {
            links.insert(
                "event".to_string(),
                self.href(&format!("/events/{event_id}")),
            );
        }
        links
    }

    pub fn interest(&self, interest: &EventInterest) -> Links {
        Links::from([
            (
                "self".to_string(),
                self.href(&format!(
                    "/events/{}/interests/{}",
                    interest.event_id, interest.interest_id
                )),
            ),
            (
                "event".to_string(),
                self.href(&format!("/events/{}", interest.event_id)),
            ),
        ])
    }

    fn page_link(&self, filter: &EventFilter, skip: u64) -> Link {
        let mut params: Vec<(&str, String)> = Vec::new();

        if let Some(interest_id) = filter.interest_id {
            params.push(("interest_id", interest_id.to_string()));
        }
        if let Some(created_by) = &filter.created_by {
            params.push(("created_by", created_by.clone()));
        }
        if let Some(search) = &filter.search {
            params.push(("search", search.clone()));
        }
        if let Some(after) = filter.starts_after {
            params.push((
                "starts_after",
                after.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ));
        }
        if let Some(before) = filter.ends_before {
            params.push((
                "ends_before",
                before.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ));
        }
        params.push(("skip", skip.to_string()));
        params.push(("limit", filter.limit.to_string()));

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        self.href(&format!("/events?{query}"))
    }
}
