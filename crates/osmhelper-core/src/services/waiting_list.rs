//! Waiting list ranking.
//!
//! Applicants are scored on age, willingness of a parent to help and time on
//! the list:
//!
//! ```text
//! score = age_years * 3 + (20 if willing) + days_on_list / 30
//! ```

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::warn;

use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::auth::SessionData;
use crate::concurrency::limit;
use crate::models::{ApplicantDetails, ApplicantNotes, Member, Section, NO_TERM};
use crate::settings::{AgeCutoffs, SettingsStore};
use crate::utils::dates::{age_in_months, days_between, format_short};
use crate::utils::format::format_age;

use super::{fetch_individual, fetch_member_list, CUSTOM_DATA_PATH};

const APPLICANT_CONCURRENCY: usize = 5;
const WILLING_BONUS: f64 = 20.0;
const UNKNOWN: &str = "Unknown";
const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Applicant {
    pub scout_id: String,
    pub first_name: String,
    pub last_name: String,
    /// `"7 y 3 m"`, or "Unknown".
    pub age: String,
    pub age_months: Option<i64>,
    pub days_on_list: Option<i64>,
    pub willing_to_help: String,
    pub leaders_notes: String,
    pub joining_comments: String,
    pub place_accepted: String,
    /// `dd/mm/yy`, empty when not set.
    pub target_join_date: String,
    pub ideal_section: String,
    /// Negative infinity for applicants whose details could not be loaded.
    pub score: f64,
    pub rank: usize,
}

impl Applicant {
    pub fn score_display(&self) -> String {
        if self.score.is_finite() {
            format!("{:.1}", self.score)
        } else {
            NOT_AVAILABLE.to_string()
        }
    }
}

pub fn score(age_years: f64, willing: bool, days_on_list: i64) -> f64 {
    let bonus = if willing { WILLING_BONUS } else { 0.0 };
    age_years * 3.0 + bonus + days_on_list as f64 / 30.0
}

/// Score an applicant from their individual record and custom data notes.
pub fn assess(
    row: &Member,
    details: &ApplicantDetails,
    notes: ApplicantNotes,
    cutoffs: &AgeCutoffs,
    today: NaiveDate,
) -> Applicant {
    let age_months = details.dob.and_then(|dob| age_in_months(dob, today));
    let age_years = age_months.map(|months| months as f64 / 12.0);
    let days_on_list = details.joined.map_or(0, |joined| days_between(joined, today));

    Applicant {
        scout_id: row.scout_id.clone(),
        first_name: row.first_name.clone(),
        last_name: row.last_name.clone(),
        age: age_months.map_or_else(|| UNKNOWN.to_string(), format_age),
        age_months,
        days_on_list: Some(days_on_list),
        willing_to_help: details.willing_to_help.clone(),
        leaders_notes: notes.leaders_notes,
        joining_comments: notes.joining_comments,
        place_accepted: notes.place_accepted,
        target_join_date: details.target_join_date.map(format_short).unwrap_or_default(),
        ideal_section: age_years
            .map(|age| cutoffs.placement(age).display_name().to_string())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        score: score(age_years.unwrap_or(0.0), details.is_willing(), days_on_list),
        rank: 0,
    }
}

/// Placeholder for an applicant whose details failed to load; ranks last.
pub fn unassessed(row: &Member) -> Applicant {
    Applicant {
        scout_id: row.scout_id.clone(),
        first_name: row.first_name.clone(),
        last_name: row.last_name.clone(),
        age: UNKNOWN.to_string(),
        age_months: None,
        days_on_list: None,
        willing_to_help: NOT_AVAILABLE.to_string(),
        leaders_notes: NOT_AVAILABLE.to_string(),
        joining_comments: NOT_AVAILABLE.to_string(),
        place_accepted: NOT_AVAILABLE.to_string(),
        target_join_date: String::new(),
        ideal_section: UNKNOWN.to_string(),
        score: f64::NEG_INFINITY,
        rank: 0,
    }
}

/// Sort by score, highest first, and number from 1.
pub fn rank(applicants: &mut [Applicant]) {
    applicants.sort_by(|a, b| b.score.total_cmp(&a.score));
    for (i, applicant) in applicants.iter_mut().enumerate() {
        applicant.rank = i + 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaitingList {
    pub section_id: String,
    pub section_name: String,
    pub applicants: Vec<Applicant>,
}

async fn load_applicant(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
    section: &Section,
    row: &Member,
    cutoffs: &AgeCutoffs,
    today: NaiveDate,
) -> Result<Applicant, ApiError> {
    let record = fetch_individual(client, token, session, &section.id, &row.scout_id, Some(NO_TERM), None).await?;
    let custom = client
        .get(
            token,
            CUSTOM_DATA_PATH,
            RequestOptions::new()
                .param("action", "getData")
                .param("section_id", &section.id)
                .param("associated_id", &row.scout_id)
                .param("associated_type", "member")
                .param("context", "members")
                .session(session),
        )
        .await?;
    Ok(assess(
        row,
        &ApplicantDetails::from_record(&record),
        ApplicantNotes::from_custom_data(&custom),
        cutoffs,
        today,
    ))
}

/// Rank everyone in the waiting-list section.
pub async fn load_waiting_list(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
    settings: &SettingsStore,
) -> Result<WaitingList> {
    let today = Local::now().date_naive();
    let cutoffs = settings.cutoffs();
    let sections = client.fetch_sections(token, session).await;
    let section = sections
        .iter()
        .find(|s| s.is_waiting_list())
        .ok_or_else(|| anyhow!("No waiting list section found"))?;

    let rows = fetch_member_list(client, token, session, section, Some(NO_TERM), "dob", None).await?;
    let applicants: Vec<Member> = rows.iter().filter_map(Member::from_value).collect();

    let limiter = limit(APPLICANT_CONCURRENCY);
    let results = limiter
        .run_all(
            applicants
                .iter()
                .map(|row| load_applicant(client, token, session, section, row, &cutoffs, today)),
        )
        .await;

    let mut ranked: Vec<Applicant> = applicants
        .iter()
        .zip(results)
        .map(|(row, result)| {
            result.unwrap_or_else(|e| {
                warn!(scout_id = %row.scout_id, error = %e, "Applicant details skipped");
                unassessed(row)
            })
        })
        .collect();
    rank(&mut ranked);

    Ok(WaitingList {
        section_id: section.id.clone(),
        section_name: section.name.clone(),
        applicants: ranked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{json_response, MockTransport};
    use crate::services::fixtures::{test_client, with_sections, TOKEN};
    use reqwest::Method;
    use serde_json::json;

    fn row(id: &str) -> Member {
        Member::from_value(&json!({"scoutid": id, "firstname": "F", "lastname": id})).unwrap()
    }

    #[test]
    fn test_score() {
        assert_eq!(score(8.0, false, 0), 24.0);
        assert_eq!(score(8.0, true, 90), 47.0);
    }

    #[test]
    fn test_assess() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let details = ApplicantDetails {
            dob: NaiveDate::from_ymd_opt(2017, 3, 1),
            joined: NaiveDate::from_ymd_opt(2024, 3, 3),
            target_join_date: NaiveDate::from_ymd_opt(2024, 9, 5),
            willing_to_help: "Y".to_string(),
        };
        let applicant = assess(&row("1"), &details, ApplicantNotes::default(), &AgeCutoffs::default(), today);

        assert_eq!(applicant.age, "7 y 3 m");
        assert_eq!(applicant.age_months, Some(87));
        assert_eq!(applicant.days_on_list, Some(90));
        assert_eq!(applicant.ideal_section, "Beavers");
        assert_eq!(applicant.target_join_date, "05/09/24");
        assert!((applicant.score - (87.0 / 12.0 * 3.0 + 20.0 + 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_assess_without_dob() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let details = ApplicantDetails::from_record(&json!({}));
        let applicant = assess(&row("1"), &details, ApplicantNotes::default(), &AgeCutoffs::default(), today);
        assert_eq!(applicant.age, "Unknown");
        assert_eq!(applicant.ideal_section, "Unknown");
        assert_eq!(applicant.days_on_list, Some(0));
        assert_eq!(applicant.score, 0.0);
    }

    #[test]
    fn test_rank_puts_unassessed_last() {
        let mut applicants = vec![unassessed(&row("a")), unassessed(&row("b")), unassessed(&row("c"))];
        applicants[1].score = 10.0;
        applicants[2].score = 30.0;
        rank(&mut applicants);

        let order: Vec<(&str, usize)> = applicants.iter().map(|a| (a.scout_id.as_str(), a.rank)).collect();
        assert_eq!(order, vec![("c", 1), ("b", 2), ("a", 3)]);
        assert_eq!(applicants[2].score_display(), "N/A");
        assert_eq!(applicants[0].score_display(), "30.0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_waiting_list() {
        let transport = MockTransport::new();
        with_sections(
            &transport,
            json!([
                {"section_id": 1, "section_name": "Cubs", "section_type": "cubs"},
                {"section_id": 9, "section_name": "Waiting List", "section_type": "waiting"}
            ]),
        );
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("action", "getListOfMembers"), ("sectionid", "9")],
            json_response(200, json!({"items": [
                {"scoutid": 1, "firstname": "Old", "lastname": "Er"},
                {"scoutid": 2, "firstname": "Bro", "lastname": "Ken"},
                {"scoutid": 3, "firstname": "Will", "lastname": "Ing"}
            ]})),
        );
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("action", "getIndividual"), ("scoutid", "1")],
            json_response(200, json!({"data": {"dob": "2014-01-01", "joined": "2023-01-01"}})),
        );
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("action", "getIndividual"), ("scoutid", "2")],
            json_response(500, json!({})),
        );
        transport.on(
            Method::GET,
            "/ext/members/contact/",
            &[("action", "getIndividual"), ("scoutid", "3")],
            json_response(200, json!({"data": {"dob": "2014-01-01", "joined": "2023-01-01", "customfields": {"customfield_123": "Y"}}})),
        );
        transport.on(Method::GET, "/ext/customdata/", &[], json_response(200, json!({"data": []})));
        transport.on(
            Method::GET,
            "/ext/customdata/",
            &[("associated_id", "3")],
            json_response(200, json!({"data": [{"identifier": "customisable_data", "columns": [
                {"varname": "cf_notes", "value": "Keen"}
            ]}]})),
        );
        let client = test_client(&transport);

        let list = load_waiting_list(&client, TOKEN, None, &SettingsStore::new()).await.unwrap();
        assert_eq!(list.section_id, "9");
        let order: Vec<&str> = list.applicants.iter().map(|a| a.first_name.as_str()).collect();
        assert_eq!(order, vec!["Will", "Old", "Bro"]);
        assert_eq!(list.applicants[0].leaders_notes, "Keen");
        assert_eq!(list.applicants[0].rank, 1);
        assert_eq!(list.applicants[2].ideal_section, "Unknown");
        assert_eq!(list.applicants[2].rank, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_waiting_section() {
        let transport = MockTransport::new();
        with_sections(&transport, json!([{"section_id": 1, "section_name": "Cubs", "section_type": "cubs"}]));
        let client = test_client(&transport);

        let err = load_waiting_list(&client, TOKEN, None, &SettingsStore::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "No waiting list section found");
    }
}
