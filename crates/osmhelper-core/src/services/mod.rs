//! Aggregation routines built on `ApiClient`.
//!
//! Each routine fetches what one view needs and folds it into a
//! serializable summary. The folding steps are plain functions so they can be
//! tested without a client.

pub mod bank_transfers;
pub mod dashboard;
pub mod equipment;
pub mod membership;
pub mod roster;
pub mod waiting_list;

use std::time::Duration;

use serde_json::Value;

use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::auth::SessionData;
use crate::models::{individual_record, member_rows, Section, NO_TERM};

pub use bank_transfers::{load_bank_transfers, BankTransfers};
pub use dashboard::{load_dashboard, Dashboard};
pub use equipment::{list_equipment, save_item, SaveMode};
pub use membership::{load_membership_dashboard, MembershipDashboard};
pub use roster::{load_roster, Roster};
pub use waiting_list::{load_waiting_list, WaitingList};

pub(crate) const MEMBERS_PATH: &str = "/ext/members/contact/";
pub(crate) const CUSTOM_DATA_PATH: &str = "/ext/customdata/";

/// `getListOfMembers` for one section. `term_id` of `None` uses the
/// section's current term.
pub(crate) async fn fetch_member_list(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
    section: &Section,
    term_id: Option<&str>,
    sort: &str,
    ttl: Option<Duration>,
) -> Result<Vec<Value>, ApiError> {
    let mut options = RequestOptions::new()
        .param("action", "getListOfMembers")
        .param("sectionid", &section.id)
        .param("termid", term_id.unwrap_or_else(|| section.term_param()))
        .param("section", &section.section_type)
        .param("sort", sort)
        .session(session);
    if let Some(ttl) = ttl {
        options = options.ttl(ttl);
    }
    let body = client.get(token, MEMBERS_PATH, options).await?;
    Ok(member_rows(&body))
}

/// `getIndividual` record for one member.
pub(crate) async fn fetch_individual(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
    section_id: &str,
    scout_id: &str,
    term_id: Option<&str>,
    ttl: Option<Duration>,
) -> Result<Value, ApiError> {
    let mut options = RequestOptions::new()
        .param("action", "getIndividual")
        .param("sectionid", section_id)
        .param("scoutid", scout_id)
        .param("termid", term_id.unwrap_or(NO_TERM))
        .param("context", "members")
        .session(session);
    if let Some(ttl) = ttl {
        options = options.ttl(ttl);
    }
    let body = client.get(token, MEMBERS_PATH, options).await?;
    Ok(individual_record(&body).clone())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use reqwest::Method;
    use serde_json::{json, Value};

    use crate::api::testing::{json_response, MockTransport};
    use crate::api::ApiClient;
    use crate::config::ClientSettings;

    pub const TOKEN: &str = "tok";

    pub fn test_client(transport: &Arc<MockTransport>) -> ApiClient {
        ApiClient::with_transport(transport.clone(), &ClientSettings::default())
    }

    /// Serve `sections` from the resource endpoint.
    pub fn with_sections(transport: &MockTransport, sections: Value) {
        transport.on(
            Method::GET,
            "/oauth/resource",
            &[],
            json_response(200, json!({"data": {"sections": sections}})),
        );
    }
}
