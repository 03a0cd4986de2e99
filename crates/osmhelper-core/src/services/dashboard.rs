use serde::Serialize;

use crate::api::{ApiClient, RateLimitSnapshot};
use crate::auth::SessionData;
use crate::constants::DEFAULT_GROUP_NAME;
use crate::models::Section;
use crate::settings::SettingsStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionSummary {
    pub id: String,
    pub name: String,
    pub section_type: String,
    pub friendly_type: &'static str,
    pub current_term_id: Option<String>,
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub group_name: String,
    pub sections: Vec<SectionSummary>,
    pub rate_limit: Option<RateLimitSnapshot>,
}

pub fn summarize_sections(sections: &[Section], settings: &SettingsStore) -> Vec<SectionSummary> {
    sections
        .iter()
        .map(|section| SectionSummary {
            id: section.id.clone(),
            name: section.name.clone(),
            section_type: section.section_type.clone(),
            friendly_type: section.friendly_type(),
            current_term_id: section.current_term_id.clone(),
            capacity: settings.capacity(&section.id, &section.section_type),
        })
        .collect()
}

/// Sections with capacities, the group name and the token's rate-limit state.
pub async fn load_dashboard(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
    settings: &SettingsStore,
) -> Dashboard {
    let sections = client.fetch_sections(token, session).await;

    let known_group = session
        .and_then(|s| s.group_name.clone())
        .or_else(|| sections.iter().find_map(|s| s.group_name.clone()));
    let group_name = match (known_group, sections.first()) {
        (Some(name), _) => name,
        (None, Some(first)) => client.fetch_group_name(token, &first.id, session).await,
        (None, None) => DEFAULT_GROUP_NAME.to_string(),
    };

    Dashboard {
        group_name,
        sections: summarize_sections(&sections, settings),
        rate_limit: client.rate_limit_snapshot(token),
    }
}
