//! Group roster: members merged across sections, with checks for young
//! leaders, leaders and youth members registered in several sections.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::auth::SessionData;
use crate::concurrency::limit;
use crate::constants::DEFAULT_GROUP_NAME;
use crate::models::member::{is_young_leader_patrol, LEADERS_PATROL};
use crate::models::{Member, Section};
use crate::utils::dates::age_in_years;

use super::{fetch_individual, fetch_member_list};

/// Member lists change slowly.
const LIST_TTL: Duration = Duration::from_secs(90);
const INDIVIDUAL_TTL: Duration = Duration::from_secs(5 * 60);
const INDIVIDUAL_CONCURRENCY: usize = 4;

/// Young leaders are expected in Explorers plus the section they help.
const YOUNG_LEADER_SECTIONS: usize = 2;
const ADULT_AGE: f64 = 18.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionMembership {
    pub name: String,
    pub section_type: String,
    pub patrol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterMember {
    pub scout_id: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    /// Fractional years; `None` without a date of birth.
    pub age: Option<f64>,
    pub sections: Vec<SectionMembership>,
}

impl RosterMember {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Members without a date of birth count as youth.
    pub fn is_youth(&self) -> bool {
        self.age.map_or(true, |age| age < ADULT_AGE)
    }

    fn has_patrol(&self, matches: impl Fn(&str) -> bool) -> bool {
        self.sections.iter().any(|s| matches(&s.patrol))
    }

    fn in_section_type(&self, section_type: &str) -> bool {
        self.sections.iter().any(|s| s.section_type == section_type)
    }

    fn section_names(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A young leader or leader, with what looks wrong about their registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedMember {
    pub first_name: String,
    pub last_name: String,
    pub sections: String,
    /// Empty when nothing is wrong.
    pub issue: String,
}

impl FlaggedMember {
    fn new(member: &RosterMember, issues: Vec<String>) -> Self {
        Self {
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            sections: member.section_names(),
            issue: issues.join("; "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Roster {
    pub group_name: String,
    /// Everyone, sorted by full name.
    pub members: Vec<RosterMember>,
    pub youth_duplicates: Vec<RosterMember>,
    pub young_leaders: Vec<FlaggedMember>,
    pub leaders: Vec<FlaggedMember>,
    /// Sections whose member list could not be loaded.
    pub skipped_sections: Vec<String>,
}

pub fn young_leader_issues(member: &RosterMember) -> Vec<String> {
    let mut issues = Vec::new();
    if !member.in_section_type("explorers") {
        issues.push("Not in Explorers".to_string());
    }
    if member.sections.len() != YOUNG_LEADER_SECTIONS {
        issues.push(format!(
            "In {} sections instead of {}",
            member.sections.len(),
            YOUNG_LEADER_SECTIONS
        ));
    }
    issues
}

pub fn leader_issues(member: &RosterMember) -> Vec<String> {
    if member.in_section_type("adults") {
        Vec::new()
    } else {
        vec!["Not in Adults".to_string()]
    }
}

/// Merge per-section member lists by scout id and derive the checks.
pub fn build_roster(
    group_name: String,
    sections: Vec<(&Section, Vec<Member>)>,
    skipped_sections: Vec<String>,
    today: NaiveDate,
) -> Roster {
    let mut merged: HashMap<String, RosterMember> = HashMap::new();
    for (section, members) in sections {
        for member in members {
            let entry = merged.entry(member.scout_id.clone()).or_insert_with(|| RosterMember {
                scout_id: member.scout_id.clone(),
                first_name: member.first_name.clone(),
                last_name: member.last_name.clone(),
                dob: member.dob,
                age: member.dob.map(|dob| age_in_years(dob, today)),
                sections: Vec::new(),
            });
            if entry.dob.is_none() && member.dob.is_some() {
                entry.dob = member.dob;
                entry.age = member.dob.map(|dob| age_in_years(dob, today));
            }
            entry.sections.push(SectionMembership {
                name: section.name.clone(),
                section_type: section.section_type.clone(),
                patrol: member.patrol.clone().unwrap_or_else(|| "None".to_string()),
            });
        }
    }

    let mut members: Vec<RosterMember> = merged.into_values().collect();
    members.sort_by(|a, b| {
        a.full_name()
            .to_lowercase()
            .cmp(&b.full_name().to_lowercase())
            .then_with(|| a.scout_id.cmp(&b.scout_id))
    });

    let mut young_leaders = Vec::new();
    let mut leaders = Vec::new();
    let mut seen_young_leaders = HashSet::new();
    let mut seen_leaders = HashSet::new();
    for member in &members {
        if member.has_patrol(is_young_leader_patrol) && seen_young_leaders.insert(member.full_name()) {
            young_leaders.push(FlaggedMember::new(member, young_leader_issues(member)));
        }
        if member.has_patrol(|p| p == LEADERS_PATROL) && seen_leaders.insert(member.full_name()) {
            leaders.push(FlaggedMember::new(member, leader_issues(member)));
        }
    }

    let youth_duplicates = members
        .iter()
        .filter(|m| m.is_youth() && m.sections.len() > 1 && !m.has_patrol(is_young_leader_patrol))
        .cloned()
        .collect();

    Roster {
        group_name,
        members,
        youth_duplicates,
        young_leaders,
        leaders,
        skipped_sections,
    }
}

/// Fill in dob and patrol for members whose list row lacks them. A failed
/// lookup keeps the list data.
async fn complete_members(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
    section: &Section,
    members: &mut [Member],
) {
    let limiter = limit(INDIVIDUAL_CONCURRENCY);
    let pending: Vec<usize> = (0..members.len()).filter(|&i| members[i].needs_individual()).collect();
    let records = limiter
        .run_all(pending.iter().map(|&i| {
            fetch_individual(
                client,
                token,
                session,
                &section.id,
                &members[i].scout_id,
                Some(section.term_param()),
                Some(INDIVIDUAL_TTL),
            )
        }))
        .await;

    for (i, record) in pending.into_iter().zip(records) {
        match record {
            Ok(record) => members[i].merge_individual(&record),
            Err(e) => warn!(scout_id = %members[i].scout_id, error = %e, "Individual fetch skipped"),
        }
    }
}

/// Load every member-bearing section and build the roster. Sections whose
/// list fails are skipped and named in `skipped_sections`.
pub async fn load_roster(client: &ApiClient, token: &str, session: Option<&SessionData>) -> Result<Roster> {
    let today = Local::now().date_naive();
    let sections = client.fetch_sections(token, session).await;

    let group_name = match sections.first() {
        Some(first) => client.fetch_group_name(token, &first.id, session).await,
        None => DEFAULT_GROUP_NAME.to_string(),
    };

    let mut loaded = Vec::new();
    let mut skipped = Vec::new();
    for section in sections.iter().filter(|s| s.is_member_section()) {
        let rows = match fetch_member_list(client, token, session, section, None, "patrol", Some(LIST_TTL)).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(section = %section.name, error = %e, "Member list failed, skipping section");
                skipped.push(section.name.clone());
                continue;
            }
        };
        let mut members: Vec<Member> = rows.iter().filter_map(Member::from_value).collect();
        complete_members(client, token, session, section, &mut members).await;
        debug!(section = %section.name, count = members.len(), "Loaded section members");
        loaded.push((section, members));
    }

    Ok(build_roster(group_name, loaded, skipped, today))
}
