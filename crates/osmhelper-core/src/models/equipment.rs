//! Quartermaster lists and items.
//!
//! Item columns are addressed by numeric column id: `_1`..`_9` in
//! `getItemsInList` rows and in the `saveItemRowDetails` form, plain
//! `"1"`..`"9"` in the older `getList` row map.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::json::{first_array, str_field};

/// Named quartermaster columns, in column id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentField {
    Name,
    Description,
    Location,
    Notes,
    Condition,
    Quantity,
    Broken,
    PurchaseDate,
    RenewalPrice,
}

impl EquipmentField {
    pub const ALL: [EquipmentField; 9] = [
        EquipmentField::Name,
        EquipmentField::Description,
        EquipmentField::Location,
        EquipmentField::Notes,
        EquipmentField::Condition,
        EquipmentField::Quantity,
        EquipmentField::Broken,
        EquipmentField::PurchaseDate,
        EquipmentField::RenewalPrice,
    ];

    pub fn column_id(&self) -> u8 {
        match self {
            EquipmentField::Name => 1,
            EquipmentField::Description => 2,
            EquipmentField::Location => 3,
            EquipmentField::Notes => 4,
            EquipmentField::Condition => 5,
            EquipmentField::Quantity => 6,
            EquipmentField::Broken => 7,
            EquipmentField::PurchaseDate => 8,
            EquipmentField::RenewalPrice => 9,
        }
    }

    /// Form field name used by `saveItemRowDetails`.
    pub fn form_key(&self) -> String {
        format!("_{}", self.column_id())
    }

    /// Parse a field name as used in forms and on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        let field = match name {
            "name" | "item_name" => EquipmentField::Name,
            "description" => EquipmentField::Description,
            "location" => EquipmentField::Location,
            "notes" => EquipmentField::Notes,
            "condition" => EquipmentField::Condition,
            "quantity" => EquipmentField::Quantity,
            "broken" => EquipmentField::Broken,
            "purchase_date" | "purchaseDate" => EquipmentField::PurchaseDate,
            "renewal_price" | "renewalPrice" => EquipmentField::RenewalPrice,
            _ => return None,
        };
        Some(field)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentList {
    pub id: String,
    pub name: String,
}

impl EquipmentList {
    /// Lists from a `getListOfLists` response; entries without an id are dropped.
    pub fn from_response(body: &Value) -> Vec<Self> {
        first_array(body, &[&["data"], &["items"], &[]])
            .map(|lists| {
                lists
                    .iter()
                    .filter_map(|raw| {
                        let id = str_field(raw, &["listid", "id"])?;
                        let name = str_field(raw, &["name"]).unwrap_or_else(|| format!("List {}", id));
                        Some(Self { id, name })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentItem {
    pub row_id: String,
    pub list_id: String,
    pub list_name: String,
    pub name: String,
    pub description: String,
    pub location: String,
    pub notes: String,
    pub condition: String,
    pub quantity: String,
    pub broken: String,
    pub purchase_date: String,
    pub renewal_price: String,
}

impl EquipmentItem {
    fn from_columns(row_id: String, list: &EquipmentList, column: impl Fn(u8) -> String) -> Self {
        Self {
            row_id,
            list_id: list.id.clone(),
            list_name: list.name.clone(),
            name: column(1),
            description: column(2),
            location: column(3),
            notes: column(4),
            condition: column(5),
            quantity: column(6),
            broken: column(7),
            purchase_date: column(8),
            renewal_price: column(9),
        }
    }

    /// Items from a list response, accepting both `data.items` rows and the
    /// `data.rows` map keyed by row id.
    pub fn from_list_response(body: &Value, list: &EquipmentList) -> Vec<Self> {
        if let Some(rows) = first_array(body, &[&["data", "items"], &["items"]]) {
            return rows
                .iter()
                .filter_map(|row| {
                    let row_id = str_field(row, &["rowid", "row_id", "id"])?;
                    Some(Self::from_columns(row_id, list, |c| {
                        str_field(row, &[&format!("_{}", c)]).unwrap_or_default()
                    }))
                })
                .collect();
        }

        body.get("data")
            .and_then(|d| d.get("rows"))
            .and_then(Value::as_object)
            .map(|rows| {
                rows.iter()
                    .map(|(row_id, row)| {
                        Self::from_columns(row_id.clone(), list, |c| {
                            str_field(row, &[&c.to_string()]).unwrap_or_default()
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn field(&self, field: EquipmentField) -> &str {
        match field {
            EquipmentField::Name => &self.name,
            EquipmentField::Description => &self.description,
            EquipmentField::Location => &self.location,
            EquipmentField::Notes => &self.notes,
            EquipmentField::Condition => &self.condition,
            EquipmentField::Quantity => &self.quantity,
            EquipmentField::Broken => &self.broken,
            EquipmentField::PurchaseDate => &self.purchase_date,
            EquipmentField::RenewalPrice => &self.renewal_price,
        }
    }
}

/// Field values to write for one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentChanges {
    pub values: Vec<(EquipmentField, String)>,
}

impl EquipmentChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: EquipmentField, value: impl Into<String>) -> Self {
        self.values.retain(|(f, _)| *f != field);
        self.values.push((field, value.into()));
        self
    }

    /// Column fields for the form body. Updates leave out blank values so
    /// they do not wipe existing data.
    pub fn form_fields(&self, skip_blank: bool) -> Vec<(String, String)> {
        self.values
            .iter()
            .filter(|(_, value)| !(skip_blank && value.trim().is_empty()))
            .map(|(field, value)| (field.form_key(), value.clone()))
            .collect()
    }
}
