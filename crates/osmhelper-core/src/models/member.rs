//! Member records from `/ext/members/contact/`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::dates::parse_date;
use crate::utils::json::{first_array, str_at, str_field};

/// Patrol OSM uses for adult leaders within a section.
pub const LEADERS_PATROL: &str = "Leaders";

/// Patrol name prefix for young leaders ("Young Leaders", "Young Leaders (YLs)").
pub const YOUNG_LEADERS_PATROL: &str = "Young Leaders";

/// Custom field holding the "willing to help" flag on applicant records.
const WILLING_FIELD: &str = "customfield_123";

/// Member rows from a `getListOfMembers` response.
pub fn member_rows(body: &Value) -> Vec<Value> {
    first_array(body, &[&["items"], &["data", "items"], &["data", "data"], &["data"], &[]])
        .cloned()
        .unwrap_or_default()
}

/// The record part of a `getIndividual` response.
pub fn individual_record(body: &Value) -> &Value {
    body.get("data").filter(|d| d.is_object()).unwrap_or(body)
}

pub fn is_young_leader_patrol(patrol: &str) -> bool {
    patrol.starts_with(YOUNG_LEADERS_PATROL)
}

/// A member row, optionally completed from the individual record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub scout_id: String,
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub patrol: Option<String>,
}

impl Member {
    /// Parse a member list row; rows without a scout id are dropped.
    pub fn from_value(raw: &Value) -> Option<Self> {
        Some(Self {
            scout_id: str_field(raw, &["scoutid", "member_id", "id"])?,
            first_name: str_field(raw, &["firstname", "first_name"]).unwrap_or_default(),
            last_name: str_field(raw, &["lastname", "last_name"]).unwrap_or_default(),
            dob: str_field(raw, &["dob", "date_of_birth"]).and_then(|s| parse_date(&s)),
            patrol: str_field(raw, &["patrol", "patrol_name"]),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Whether the list row lacks details only the individual record has.
    pub fn needs_individual(&self) -> bool {
        self.dob.is_none() || self.patrol.is_none()
    }

    /// Fill gaps from a `getIndividual` record; list values win when present.
    pub fn merge_individual(&mut self, record: &Value) {
        if let Some(other) = Member::from_value(&with_scout_id(record, &self.scout_id)) {
            if self.first_name.is_empty() {
                self.first_name = other.first_name;
            }
            if self.last_name.is_empty() {
                self.last_name = other.last_name;
            }
            self.dob = self.dob.or(other.dob);
            if self.patrol.is_none() {
                self.patrol = other.patrol;
            }
        }
    }

    pub fn is_leader(&self) -> bool {
        self.patrol.as_deref() == Some(LEADERS_PATROL)
    }

    pub fn is_young_leader(&self) -> bool {
        self.patrol.as_deref().is_some_and(is_young_leader_patrol)
    }
}

fn with_scout_id(record: &Value, scout_id: &str) -> Value {
    let mut record = record.clone();
    if let Value::Object(map) = &mut record {
        map.entry("scoutid").or_insert_with(|| Value::String(scout_id.to_string()));
    }
    record
}

/// Applicant details from a waiting-list `getIndividual` record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantDetails {
    pub dob: Option<NaiveDate>,
    pub joined: Option<NaiveDate>,
    pub target_join_date: Option<NaiveDate>,
    pub willing_to_help: String,
}

impl ApplicantDetails {
    pub fn from_record(record: &Value) -> Self {
        Self {
            dob: str_field(record, &["dob"]).and_then(|s| parse_date(&s)),
            joined: str_field(record, &["joined", "applicationdate", "started"]).and_then(|s| parse_date(&s)),
            target_join_date: str_field(record, &["startedsection"]).and_then(|s| parse_date(&s)),
            willing_to_help: str_at(record, &["customfields", WILLING_FIELD]).unwrap_or_else(|| "N".to_string()),
        }
    }

    pub fn is_willing(&self) -> bool {
        self.willing_to_help == "Y"
    }
}

/// Leader-entered notes held in the `customisable_data` custom data group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantNotes {
    pub leaders_notes: String,
    pub joining_comments: String,
    pub place_accepted: String,
}

impl ApplicantNotes {
    pub fn from_custom_data(body: &Value) -> Self {
        let mut notes = Self::default();
        let columns = first_array(body, &[&["data"], &[]])
            .and_then(|groups| {
                groups
                    .iter()
                    .find(|g| g.get("identifier").and_then(Value::as_str) == Some("customisable_data"))
            })
            .and_then(|group| group.get("columns"))
            .and_then(Value::as_array);

        for column in columns.into_iter().flatten() {
            let value = str_field(column, &["value"]).unwrap_or_default();
            match column.get("varname").and_then(Value::as_str) {
                Some("cf_notes") => notes.leaders_notes = value,
                Some("cf_joining_comments") => notes.joining_comments = value,
                Some("cf_place_accepted_") => notes.place_accepted = value,
                _ => {}
            }
        }
        notes
    }
}
