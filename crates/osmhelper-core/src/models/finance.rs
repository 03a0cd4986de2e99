//! Bank accounts and transactions from the v3 finances API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::format::format_pence;
use crate::utils::json::{f64_field, first_array, str_field, truthy};

/// Rows of a finances response: `data` when it is an array, else the body itself.
pub fn finance_rows(body: &Value) -> &[Value] {
    first_array(body, &[&["data"], &["data", "data"], &[]])
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: String,
    pub name: String,
}

impl BankAccount {
    pub fn from_value(raw: &Value) -> Option<Self> {
        let id = str_field(raw, &["id", "bank_account_id"])?;
        let name = str_field(raw, &["name"]).unwrap_or_else(|| format!("Account {}", id));
        Some(Self { id, name })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankTransfer {
    pub account_name: String,
    pub date: String,
    pub reference: String,
    /// Pounds with two decimals.
    pub amount: String,
}

impl BankTransfer {
    /// A transfer from a transaction row, `None` for anything not flagged `is_transfer`.
    pub fn from_transaction(raw: &Value, account_name: &str) -> Option<Self> {
        if !truthy(raw.get("is_transfer")) {
            return None;
        }
        Some(Self {
            account_name: account_name.to_string(),
            date: str_field(raw, &["date"]).unwrap_or_default(),
            reference: str_field(raw, &["reference"]).unwrap_or_else(|| "N/A".to_string()),
            amount: format_pence(f64_field(raw, &["amount"]).unwrap_or(0.0)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finance_rows() {
        assert_eq!(finance_rows(&json!({"data": [1, 2]})).len(), 2);
        assert_eq!(finance_rows(&json!([1])).len(), 1);
        assert!(finance_rows(&json!({"data": {"x": 1}})).is_empty());
    }

    #[test]
    fn test_bank_account() {
        let account = BankAccount::from_value(&json!({"id": 5})).unwrap();
        assert_eq!(account.name, "Account 5");
        assert!(BankAccount::from_value(&json!({"name": "No id"})).is_none());
    }

    #[test]
    fn test_transfer_from_transaction() {
        let row = json!({"is_transfer": true, "date": "2024-03-01", "reference": "Camp fees", "amount": 12550});
        let transfer = BankTransfer::from_transaction(&row, "Main").unwrap();
        assert_eq!(transfer.amount, "125.50");
        assert_eq!(transfer.reference, "Camp fees");

        let no_ref = json!({"is_transfer": 1, "date": "2024-03-02", "amount": "-500"});
        let transfer = BankTransfer::from_transaction(&no_ref, "Main").unwrap();
        assert_eq!(transfer.reference, "N/A");
        assert_eq!(transfer.amount, "-5.00");

        assert!(BankTransfer::from_transaction(&json!({"is_transfer": false, "amount": 1}), "Main").is_none());
        assert!(BankTransfer::from_transaction(&json!({"amount": 1}), "Main").is_none());
    }
}
