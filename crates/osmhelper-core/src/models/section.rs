//! Sections and terms as reported by `/oauth/resource`.
//!
//! The resource payload has come back in several shapes (a bare array,
//! nested under `data`, or as `roles` records with different field names),
//! so normalization accepts all of them and reports `None` for anything else.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::friendly_section_type;
use crate::utils::dates::parse_date;
use crate::utils::json::{first_array, str_at, str_field};

/// Term id OSM accepts when no term is known.
pub const NO_TERM: &str = "-1";

const SECTION_LIST_PATHS: [&[&str]; 7] = [
    &[],
    &["sections"],
    &["roles"],
    &["items"],
    &["data", "sections"],
    &["data", "roles"],
    &["data", "items"],
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: String,
    pub name: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl Term {
    fn from_value(raw: &Value) -> Option<Self> {
        Some(Self {
            id: str_field(raw, &["term_id", "termid", "id"])?,
            name: str_field(raw, &["name", "term_name"]),
            start: str_field(raw, &["startdate", "start_date", "start"]).and_then(|s| parse_date(&s)),
            end: str_field(raw, &["enddate", "end_date", "end"]).and_then(|s| parse_date(&s)),
        })
    }

    /// Whether `day` falls within the term, both ends inclusive.
    pub fn covers(&self, day: NaiveDate) -> bool {
        matches!((self.start, self.end), (Some(start), Some(end)) if start <= day && day <= end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub section_type: String,
    pub current_term_id: Option<String>,
    pub group_name: Option<String>,
    #[serde(default)]
    pub terms: Vec<Term>,
}

impl Section {
    /// Normalize one raw section record; records without an id are dropped.
    pub fn from_value(raw: &Value, today: NaiveDate) -> Option<Self> {
        let id = str_field(raw, &["section_id", "sectionid", "id"])?;
        let terms: Vec<Term> = raw
            .get("terms")
            .and_then(Value::as_array)
            .map(|terms| terms.iter().filter_map(Term::from_value).collect())
            .unwrap_or_default();

        let current_term_id = terms
            .iter()
            .find(|term| term.covers(today))
            .or_else(|| terms.last())
            .map(|term| term.id.clone())
            .or_else(|| str_field(raw, &["current_term_id", "currentterm"]));

        Some(Self {
            id,
            name: str_field(raw, &["section_name", "sectionname", "name"]).unwrap_or_default(),
            section_type: str_field(raw, &["section_type", "type", "section"])
                .unwrap_or_else(|| "unknown".to_string()),
            current_term_id,
            group_name: str_field(raw, &["group_name", "groupname"]),
            terms,
        })
    }

    /// Term id for member queries, `-1` when none is known.
    pub fn term_param(&self) -> &str {
        self.current_term_id.as_deref().unwrap_or(NO_TERM)
    }

    pub fn friendly_type(&self) -> &'static str {
        friendly_section_type(&self.section_type)
    }

    pub fn is_waiting_list(&self) -> bool {
        self.section_type == "waiting" || self.name.to_lowercase().contains("waiting")
    }

    /// Sections whose member lists hold real members (not applicants).
    pub fn is_member_section(&self) -> bool {
        !matches!(self.section_type.as_str(), "waiting" | "unknown")
    }
}

/// Normalize the section list out of a resource payload.
///
/// Returns `None` when no recognizable section list is present.
pub fn normalize_sections(resource: &Value, today: NaiveDate) -> Option<Vec<Section>> {
    let raw = first_array(resource, &SECTION_LIST_PATHS).or_else(|| resource.get("data")?.as_array())?;
    Some(raw.iter().filter_map(|s| Section::from_value(s, today)).collect())
}

/// Identity details of the signed-in user from `/oauth/resource`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub group_name: Option<String>,
}

impl UserProfile {
    pub fn from_resource(resource: &Value) -> Self {
        let data = resource.get("data").filter(|d| d.is_object()).unwrap_or(resource);
        let group_name = first_array(data, &[&["sections"], &["roles"]])
            .and_then(|sections| sections.first())
            .and_then(|first| str_field(first, &["group_name", "groupname"]));
        Self {
            user_id: str_field(data, &["user_id", "userid", "member_id"]),
            email: str_at(data, &["email"]),
            full_name: str_field(data, &["full_name", "fullname", "name"]),
            group_name,
        }
    }
}
