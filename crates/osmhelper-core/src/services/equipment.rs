//! Quartermaster equipment: listing items across lists and saving rows.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::api::{ApiClient, RequestOptions};
use crate::auth::SessionData;
use crate::concurrency::limit;
use crate::models::{EquipmentChanges, EquipmentItem, EquipmentList, Section};

const QUARTERMASTER_PATH: &str = "/ext/quartermaster/";
const LIST_CONCURRENCY: usize = 3;

/// The section whose quartermaster lists hold the group's equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquipmentSection {
    pub section_id: String,
    pub section_type: String,
}

/// First adults section, else the first section of any type.
pub fn resolve_equipment_section(sections: &[Section]) -> Option<EquipmentSection> {
    sections
        .iter()
        .find(|s| s.section_type == "adults")
        .or_else(|| sections.first())
        .map(|s| EquipmentSection {
            section_id: s.id.clone(),
            section_type: s.section_type.clone(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveMode {
    Add,
    Update { row_id: String },
}

/// Form body for `saveItemRowDetails`, or `None` when an update has nothing to write.
pub fn save_payload(
    section: &EquipmentSection,
    list_id: &str,
    mode: &SaveMode,
    changes: &EquipmentChanges,
) -> Option<Vec<(String, String)>> {
    let mut payload = vec![
        ("listid".to_string(), list_id.to_string()),
        ("section".to_string(), section.section_type.clone()),
        ("sectionid".to_string(), section.section_id.clone()),
    ];
    let fields = match mode {
        SaveMode::Add => changes.form_fields(false),
        SaveMode::Update { row_id } => {
            payload.push(("itemrowidentifier".to_string(), row_id.clone()));
            let fields = changes.form_fields(true);
            if fields.is_empty() {
                return None;
            }
            fields
        }
    };
    payload.extend(fields);
    Some(payload)
}

fn list_options(section: &EquipmentSection, session: Option<&SessionData>) -> RequestOptions {
    RequestOptions::new()
        .param("action", "getListOfLists")
        .param("section", &section.section_type)
        .param("sectionid", &section.section_id)
        .session(session)
}

fn items_options(section: &EquipmentSection, list_id: &str, session: Option<&SessionData>) -> RequestOptions {
    RequestOptions::new()
        .param("action", "getItemsInList")
        .param("section", &section.section_type)
        .param("sectionid", &section.section_id)
        .param("listid", list_id)
        .session(session)
}

async fn equipment_section(client: &ApiClient, token: &str, session: Option<&SessionData>) -> Result<EquipmentSection> {
    let sections = client.fetch_sections(token, session).await;
    resolve_equipment_section(&sections)
        .ok_or_else(|| anyhow!("No suitable section found for equipment. Check your OSM permissions."))
}

/// Quartermaster lists of the equipment section.
pub async fn list_equipment_lists(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
) -> Result<(EquipmentSection, Vec<EquipmentList>)> {
    let section = equipment_section(client, token, session).await?;
    let body = client
        .get(token, QUARTERMASTER_PATH, list_options(&section, session))
        .await
        .context("Failed to load equipment lists")?;
    Ok((section, EquipmentList::from_response(&body)))
}

/// Every item across all quartermaster lists.
pub async fn list_equipment(client: &ApiClient, token: &str, session: Option<&SessionData>) -> Result<Vec<EquipmentItem>> {
    let (section, lists) = list_equipment_lists(client, token, session).await?;

    let limiter = limit(LIST_CONCURRENCY);
    let bodies = limiter
        .run_all(
            lists
                .iter()
                .map(|list| client.get(token, QUARTERMASTER_PATH, items_options(&section, &list.id, session))),
        )
        .await;

    let mut items = Vec::new();
    for (list, body) in lists.iter().zip(bodies) {
        let body = body.with_context(|| format!("Failed to load equipment list {}", list.name))?;
        let list_items = EquipmentItem::from_list_response(&body, list);
        debug!(list = %list.name, count = list_items.len(), "Loaded equipment list");
        items.extend(list_items);
    }
    Ok(items)
}

/// One item by list and row id.
pub async fn find_item(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
    list_id: &str,
    row_id: &str,
) -> Result<Option<EquipmentItem>> {
    let (section, lists) = list_equipment_lists(client, token, session).await?;
    let list = lists
        .into_iter()
        .find(|l| l.id == list_id)
        .unwrap_or_else(|| EquipmentList {
            id: list_id.to_string(),
            name: format!("List {}", list_id),
        });
    let body = client
        .get(token, QUARTERMASTER_PATH, items_options(&section, list_id, session))
        .await
        .with_context(|| format!("Failed to load equipment list {}", list.name))?;
    Ok(EquipmentItem::from_list_response(&body, &list)
        .into_iter()
        .find(|item| item.row_id == row_id))
}

/// Add or update an item. Returns `false` when an update had no non-blank
/// fields and nothing was sent.
pub async fn save_item(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
    list_id: &str,
    mode: SaveMode,
    changes: &EquipmentChanges,
) -> Result<bool> {
    let section = equipment_section(client, token, session).await?;
    let Some(payload) = save_payload(&section, list_id, &mode, changes) else {
        debug!(list_id, "No equipment fields changed, nothing to save");
        return Ok(false);
    };

    client
        .post(
            token,
            QUARTERMASTER_PATH,
            RequestOptions::new()
                .param("action", "saveItemRowDetails")
                .form(payload),
        )
        .await
        .context("Failed to save equipment item")?;

    client.invalidate(QUARTERMASTER_PATH, &items_options(&section, list_id, session));
    info!(list_id, mode = ?mode, "Saved equipment item");
    Ok(true)
}
