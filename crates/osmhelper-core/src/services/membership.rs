//! Membership dashboard: head counts per section grouped by section type,
//! capacity and free spaces, and waiting applicants bucketed by age.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::SessionData;
use crate::concurrency::limit;
use crate::constants::{AgeBand, SECTION_TYPE_ORDER};
use crate::models::{ApplicantDetails, Member, Section, NO_TERM};
use crate::settings::{AgeCutoffs, Placement, SettingsStore};
use crate::utils::dates::age_in_years;
use crate::utils::format::initials;

use super::{fetch_individual, fetch_member_list};

/// Section types left out of the head counts.
const EXCLUDED_TYPES: [&str; 2] = ["explorers", "adults"];

const APPLICANT_CONCURRENCY: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionCounts {
    pub name: String,
    pub members: u32,
    pub leaders: u32,
    pub young_leaders: u32,
    pub leader_initials: Vec<String>,
    pub young_leader_initials: Vec<String>,
    pub capacity: Option<u32>,
    /// Capacity minus members; negative when over capacity.
    pub spaces: Option<i64>,
}

/// Count members, leaders and young leaders in one section's member list.
pub fn count_section(name: &str, members: &[Member], capacity: Option<u32>) -> SectionCounts {
    let mut counts = SectionCounts {
        name: name.to_string(),
        members: 0,
        leaders: 0,
        young_leaders: 0,
        leader_initials: Vec::new(),
        young_leader_initials: Vec::new(),
        capacity,
        spaces: None,
    };

    for member in members {
        let member_initials = initials(&member.first_name, &member.last_name);
        if member.is_leader() {
            counts.leaders += 1;
            if !member_initials.is_empty() {
                counts.leader_initials.push(member_initials);
            }
        } else if member.is_young_leader() {
            counts.young_leaders += 1;
            if !member_initials.is_empty() {
                counts.young_leader_initials.push(member_initials);
            }
        } else {
            counts.members += 1;
        }
    }

    counts.leader_initials.sort();
    counts.young_leader_initials.sort();
    counts.spaces = capacity.map(|c| i64::from(c) - i64::from(counts.members));
    counts
}

/// Waiting applicants per placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WaitingCounts {
    pub too_young: u32,
    pub squirrels: u32,
    pub beavers: u32,
    pub cubs: u32,
    pub scouts: u32,
    pub explorers: u32,
}

impl WaitingCounts {
    pub fn add(&mut self, placement: Placement) {
        let slot = match placement {
            Placement::TooYoung => &mut self.too_young,
            Placement::Band(AgeBand::Squirrels) => &mut self.squirrels,
            Placement::Band(AgeBand::Beavers) => &mut self.beavers,
            Placement::Band(AgeBand::Cubs) => &mut self.cubs,
            Placement::Band(AgeBand::Scouts) => &mut self.scouts,
            Placement::Band(AgeBand::Explorers) => &mut self.explorers,
        };
        *slot += 1;
    }

    /// Applicants of joining age for a friendly section type.
    pub fn for_friendly_type(&self, friendly: &str) -> u32 {
        match friendly {
            "Squirrels" => self.squirrels,
            "Beavers" => self.beavers,
            "Cubs" => self.cubs,
            "Scouts" => self.scouts,
            "Explorers" => self.explorers,
            _ => 0,
        }
    }

    pub fn total(&self) -> u32 {
        self.too_young + self.squirrels + self.beavers + self.cubs + self.scouts + self.explorers
    }
}

/// Bucket applicant ages (fractional years) against the cutoffs.
pub fn bucket_ages(ages: impl IntoIterator<Item = f64>, cutoffs: &AgeCutoffs) -> WaitingCounts {
    let mut counts = WaitingCounts::default();
    for age in ages {
        counts.add(cutoffs.placement(age));
    }
    counts
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeGroup {
    pub friendly_type: String,
    pub sections: Vec<SectionCounts>,
    pub members: u32,
    pub leaders: u32,
    pub young_leaders: u32,
    pub capacity: u32,
    pub spaces: i64,
    pub waiting: u32,
}

impl TypeGroup {
    fn new(friendly_type: &str) -> Self {
        Self {
            friendly_type: friendly_type.to_string(),
            sections: Vec::new(),
            members: 0,
            leaders: 0,
            young_leaders: 0,
            capacity: 0,
            spaces: 0,
            waiting: 0,
        }
    }

    fn push(&mut self, counts: SectionCounts) {
        self.members += counts.members;
        self.leaders += counts.leaders;
        self.young_leaders += counts.young_leaders;
        self.capacity += counts.capacity.unwrap_or(0);
        self.spaces += counts.spaces.unwrap_or(0);
        self.sections.push(counts);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembershipDashboard {
    pub groups: Vec<TypeGroup>,
    pub total_members: u32,
    pub total_leaders: u32,
    pub total_young_leaders: u32,
    pub total_capacity: u32,
    pub total_spaces: i64,
    pub waiting: WaitingCounts,
    pub total_waiting: u32,
    pub of_age_waiting: u32,
}

/// Group section counts by friendly type: known types in display order,
/// anything else after them in first-seen order.
pub fn group_by_type(counts: Vec<(&'static str, SectionCounts)>, waiting: WaitingCounts) -> MembershipDashboard {
    let mut groups: Vec<TypeGroup> = Vec::new();
    for (friendly, section) in counts {
        match groups.iter_mut().find(|g| g.friendly_type == friendly) {
            Some(group) => group.push(section),
            None => {
                let mut group = TypeGroup::new(friendly);
                group.waiting = waiting.for_friendly_type(friendly);
                group.push(section);
                groups.push(group);
            }
        }
    }
    groups.sort_by_key(|g| {
        SECTION_TYPE_ORDER
            .iter()
            .position(|t| *t == g.friendly_type)
            .unwrap_or(SECTION_TYPE_ORDER.len())
    });

    MembershipDashboard {
        total_members: groups.iter().map(|g| g.members).sum(),
        total_leaders: groups.iter().map(|g| g.leaders).sum(),
        total_young_leaders: groups.iter().map(|g| g.young_leaders).sum(),
        total_capacity: groups.iter().map(|g| g.capacity).sum(),
        total_spaces: groups.iter().map(|g| g.spaces).sum(),
        groups,
        waiting,
        total_waiting: waiting.total(),
        of_age_waiting: waiting.total() - waiting.too_young,
    }
}

async fn count_waiting(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
    waiting_section: &Section,
    cutoffs: &AgeCutoffs,
    today: NaiveDate,
) -> Result<WaitingCounts, ApiError> {
    let rows = fetch_member_list(client, token, session, waiting_section, Some(NO_TERM), "dob", None).await?;
    let applicants: Vec<Member> = rows.iter().filter_map(Member::from_value).collect();

    let limiter = limit(APPLICANT_CONCURRENCY);
    let records = limiter
        .run_all(applicants.iter().map(|applicant| {
            fetch_individual(client, token, session, &waiting_section.id, &applicant.scout_id, None, None)
        }))
        .await;

    let mut ages = Vec::with_capacity(records.len());
    for (applicant, record) in applicants.iter().zip(records) {
        match record {
            Ok(record) => {
                if let Some(dob) = ApplicantDetails::from_record(&record).dob {
                    ages.push(age_in_years(dob, today));
                }
            }
            Err(e) => warn!(scout_id = %applicant.scout_id, error = %e, "Skipping applicant without a record"),
        }
    }
    Ok(bucket_ages(ages, cutoffs))
}

/// Head counts for every youth section plus the waiting-list breakdown.
///
/// A failing member list fails the whole dashboard; a failing waiting list
/// only zeroes the waiting counts.
pub async fn load_membership_dashboard(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
    settings: &SettingsStore,
) -> Result<MembershipDashboard> {
    let today = Local::now().date_naive();
    let sections = client.fetch_sections(token, session).await;

    let waiting = match sections.iter().find(|s| s.is_waiting_list()) {
        Some(waiting_section) => {
            count_waiting(client, token, session, waiting_section, &settings.cutoffs(), today)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Waiting list fetch failed, reporting no applicants");
                    WaitingCounts::default()
                })
        }
        None => WaitingCounts::default(),
    };

    let mut counts = Vec::new();
    for section in sections
        .iter()
        .filter(|s| !EXCLUDED_TYPES.contains(&s.section_type.as_str()) && !s.is_waiting_list())
    {
        let rows = fetch_member_list(client, token, session, section, None, "patrol", None)
            .await
            .with_context(|| format!("Failed to load members for {}", section.name))?;
        let members: Vec<Member> = rows.iter().filter_map(Member::from_value).collect();
        debug!(section = %section.name, count = members.len(), "Counted section members");

        let capacity = settings.capacity(&section.id, &section.section_type);
        counts.push((section.friendly_type(), count_section(&section.name, &members, capacity)));
    }

    Ok(group_by_type(counts, waiting))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{json_response, MockTransport};
    use crate::services::fixtures::{test_client, with_sections, TOKEN};
    use chrono::Months;
    use reqwest::Method;
    use serde_json::{json, Value};

    fn members(rows: Value) -> Vec<Member> {
        rows.as_array().unwrap().iter().filter_map(Member::from_value).collect()
    }

    #[test]
    fn test_count_section() {
        let rows = members(json!([
            {"scoutid": 1, "firstname": "amy", "lastname": "brown", "patrol": "Leaders"},
            {"scoutid": 2, "firstname": "Cal", "lastname": "Able", "patrol": "Leaders"},
            {"scoutid": 3, "firstname": "Dee", "lastname": "Eve", "patrol": "Young Leaders (YLs)"},
            {"scoutid": 4, "firstname": "Fay", "lastname": "Gee", "patrol": "Red"},
            {"scoutid": 5, "firstname": "Hal", "lastname": "Ivy"}
        ]));
        let counts = count_section("Cubs A", &rows, Some(30));
        assert_eq!((counts.members, counts.leaders, counts.young_leaders), (2, 2, 1));
        assert_eq!(counts.leader_initials, vec!["AB", "CA"]);
        assert_eq!(counts.young_leader_initials, vec!["DE"]);
        assert_eq!(counts.spaces, Some(28));

        let unknown_capacity = count_section("Other", &rows, None);
        assert_eq!(unknown_capacity.spaces, None);
    }

    #[test]
    fn test_bucket_ages_with_overrides() {
        let mut cutoffs = AgeCutoffs::default();
        let counts = bucket_ages([3.0, 4.5, 6.0, 8.0, 12.0, 14.0, 15.0], &cutoffs);
        assert_eq!(counts.too_young, 1);
        assert_eq!(counts.squirrels, 1);
        assert_eq!(counts.beavers, 1);
        assert_eq!(counts.cubs, 1);
        assert_eq!(counts.scouts, 1);
        assert_eq!(counts.explorers, 2);
        assert_eq!(counts.total(), 7);

        cutoffs.set(AgeBand::Squirrels, 3.0);
        assert_eq!(bucket_ages([3.0], &cutoffs).squirrels, 1);
    }

    #[test]
    fn test_group_by_type_orders_and_totals() {
        let cubs = count_section("Cubs A", &[], Some(30));
        let cubs_b = count_section("Cubs B", &[], Some(20));
        let beavers = count_section("Beavers", &[], Some(24));
        let other = count_section("Odd", &[], None);
        let waiting = WaitingCounts {
            too_young: 2,
            cubs: 3,
            ..Default::default()
        };

        let dashboard = group_by_type(
            vec![("Other", other), ("Cubs", cubs), ("Beavers", beavers), ("Cubs", cubs_b)],
            waiting,
        );
        let order: Vec<&str> = dashboard.groups.iter().map(|g| g.friendly_type.as_str()).collect();
        assert_eq!(order, vec!["Beavers", "Cubs", "Other"]);
        assert_eq!(dashboard.groups[1].sections.len(), 2);
        assert_eq!(dashboard.groups[1].capacity, 50);
        assert_eq!(dashboard.groups[1].waiting, 3);
        assert_eq!(dashboard.total_capacity, 74);
        assert_eq!(dashboard.total_spaces, 74);
        assert_eq!(dashboard.total_waiting, 5);
        assert_eq!(dashboard.of_age_waiting, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_membership_dashboard() {
        let transport = MockTransport::new();
        with_sections(
            &transport,
            json!([
                {"section_id": 1, "section_name": "Cubs", "section_type": "cubs", "current_term_id": 5},
                {"section_id": 2, "section_name": "Explorers", "section_type": "explorers"},
                {"section_id": 3, "section_name": "Waiting List", "section_type": "waiting"}
            ]),
        );
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("action", "getListOfMembers"), ("sectionid", "1"), ("termid", "5")],
            json_response(200, json!({"items": [
                {"scoutid": 10, "firstname": "A", "lastname": "B", "patrol": "Leaders"},
                {"scoutid": 11, "firstname": "C", "lastname": "D", "patrol": "Six 1"}
            ]})),
        );
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("action", "getListOfMembers"), ("sectionid", "3")],
            json_response(200, json!({"items": [{"scoutid": 20}, {"scoutid": 21}]})),
        );
        let eight_years_ago = Local::now().date_naive() - Months::new(8 * 12);
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("action", "getIndividual"), ("scoutid", "20")],
            json_response(200, json!({"data": {"dob": eight_years_ago.to_string()}})),
        );
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("action", "getIndividual"), ("scoutid", "21")],
            json_response(200, json!({"data": {"dob": "2024-01-01"}})),
        );
        let client = test_client(&transport);

        let dashboard = load_membership_dashboard(&client, TOKEN, None, &SettingsStore::new())
            .await
            .unwrap();
        assert_eq!(dashboard.groups.len(), 1);
        assert_eq!(dashboard.groups[0].friendly_type, "Cubs");
        assert_eq!(dashboard.total_members, 1);
        assert_eq!(dashboard.total_leaders, 1);
        assert_eq!(dashboard.total_spaces, 29);
        assert_eq!(dashboard.waiting.cubs, 1);
        assert_eq!(dashboard.groups[0].waiting, 1);
        assert_eq!(dashboard.total_waiting, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_failure_degrades_to_zero() {
        let transport = MockTransport::new();
        with_sections(
            &transport,
            json!([
                {"section_id": 1, "section_name": "Beavers", "section_type": "beavers"},
                {"section_id": 3, "section_name": "Waiting", "section_type": "waiting"}
            ]),
        );
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("sectionid", "1")],
            json_response(200, json!({"items": []})),
        );
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("sectionid", "3")],
            json_response(403, json!({"error": "no access"})),
        );
        let client = test_client(&transport);

        let dashboard = load_membership_dashboard(&client, TOKEN, None, &SettingsStore::new())
            .await
            .unwrap();
        assert_eq!(dashboard.waiting, WaitingCounts::default());
        assert_eq!(dashboard.groups[0].spaces, 24);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_applicant_keeps_other_counts() {
        let transport = MockTransport::new();
        with_sections(&transport, json!([{"section_id": 3, "section_name": "Waiting", "section_type": "waiting"}]));
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("action", "getListOfMembers"), ("sectionid", "3")],
            json_response(200, json!({"items": [{"scoutid": 20}, {"scoutid": 21}, {"scoutid": 22}]})),
        );
        let eight_years_ago = Local::now().date_naive() - Months::new(8 * 12);
        for scout_id in ["20", "22"] {
            transport.on(
                Method::GET,
                "/ext/members/contact/",
                &[("action", "getIndividual"), ("scoutid", scout_id)],
                json_response(200, json!({"data": {"dob": eight_years_ago.to_string()}})),
            );
        }
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("action", "getIndividual"), ("scoutid", "21")],
            json_response(403, json!({"error": "no access"})),
        );
        let client = test_client(&transport);

        let dashboard = load_membership_dashboard(&client, TOKEN, None, &SettingsStore::new())
            .await
            .unwrap();
        assert_eq!(dashboard.waiting.cubs, 2);
        assert_eq!(dashboard.total_waiting, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_member_list_failure_fails_dashboard() {
        let transport = MockTransport::new();
        with_sections(&transport, json!([{"section_id": 1, "section_name": "Cubs", "section_type": "cubs"}]));
        transport.on(Method::GET, "/ext/members/contact/", &[], json_response(404, json!({})));
        let client = test_client(&transport);

        let err = load_membership_dashboard(&client, TOKEN, None, &SettingsStore::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Cubs"));
    }
}
