//! Bank transfers across every account of the section with finance access.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError, RateLimitSnapshot, RequestOptions};
use crate::auth::SessionData;
use crate::concurrency::limit;
use crate::models::{finance_rows, BankAccount, BankTransfer, Section};

/// Permission probes are re-checked every couple of minutes.
const PROBE_TTL: Duration = Duration::from_secs(2 * 60);
const ACCOUNTS_TTL: Duration = Duration::from_secs(60);
/// Short window to smooth reloads of paged pulls.
const TRANSACTIONS_TTL: Duration = Duration::from_secs(15);
const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 50;
const ACCOUNT_CONCURRENCY: usize = 3;

fn accounts_path(section_id: &str) -> String {
    format!("/v3/finances/accounting/bank_accounts/section/{}", section_id)
}

fn transactions_path(account_id: &str) -> String {
    format!("/v3/finances/accounting/bank_accounts/{}/transactions", account_id)
}

/// Section ids to probe for finance access: adults sections first.
pub fn finance_candidates(sections: &[Section]) -> Vec<String> {
    let (adults, others): (Vec<&Section>, Vec<&Section>) =
        sections.iter().partition(|s| s.section_type == "adults");
    adults.into_iter().chain(others).map(|s| s.id.clone()).collect()
}

/// Newest first, then by account name.
pub fn sort_transfers(transfers: &mut [BankTransfer]) {
    transfers.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.account_name.cmp(&b.account_name)));
}

#[derive(Debug, Clone, Serialize)]
pub struct BankTransfers {
    pub section_id: String,
    pub transfers: Vec<BankTransfer>,
    pub rate_limit: Option<RateLimitSnapshot>,
}

/// First section whose bank accounts the token can read.
pub async fn resolve_finance_section(client: &ApiClient, token: &str, session: Option<&SessionData>) -> Result<String> {
    let sections = client.fetch_sections(token, session).await;
    for section_id in finance_candidates(&sections) {
        let probe = client
            .get(
                token,
                &accounts_path(&section_id),
                RequestOptions::new().ttl(PROBE_TTL).session(session),
            )
            .await;
        match probe {
            Ok(_) => return Ok(section_id),
            Err(e) => debug!(section_id = %section_id, error = %e, "No finance access for section"),
        }
    }
    Err(anyhow!("Could not find a section with finance access"))
}

/// Page through an account's transactions and keep the transfers.
pub async fn fetch_account_transfers(
    client: &ApiClient,
    token: &str,
    session: Option<&SessionData>,
    account: &BankAccount,
) -> Result<Vec<BankTransfer>, ApiError> {
    let path = transactions_path(&account.id);
    let mut transfers = Vec::new();

    for page in 1..=MAX_PAGES {
        let body = client
            .get(
                token,
                &path,
                RequestOptions::new()
                    .param("page", page)
                    .param("per_page", PER_PAGE)
                    .param("expense_cardholder_id", 0)
                    .param("mode", "all")
                    .ttl(TRANSACTIONS_TTL)
                    .session(session),
            )
            .await?;
        let rows = finance_rows(&body);
        transfers.extend(rows.iter().filter_map(|row| BankTransfer::from_transaction(row, &account.name)));
        if rows.len() < PER_PAGE {
            return Ok(transfers);
        }
    }

    warn!(account = %account.name, pages = MAX_PAGES, "Stopped paging transactions at the page limit");
    Ok(transfers)
}

/// All transfers for the finance section, newest first.
pub async fn load_bank_transfers(client: &ApiClient, token: &str, session: Option<&SessionData>) -> Result<BankTransfers> {
    let section_id = resolve_finance_section(client, token, session).await?;

    let body = client
        .get(
            token,
            &accounts_path(&section_id),
            RequestOptions::new().ttl(ACCOUNTS_TTL).session(session),
        )
        .await
        .context("Failed to load bank accounts")?;
    let accounts: Vec<BankAccount> = finance_rows(&body).iter().filter_map(BankAccount::from_value).collect();
    debug!(section_id = %section_id, accounts = accounts.len(), "Loaded bank accounts");

    let limiter = limit(ACCOUNT_CONCURRENCY);
    let results = limiter
        .run_all(accounts.iter().map(|account| fetch_account_transfers(client, token, session, account)))
        .await;

    let mut transfers = Vec::new();
    for (account, result) in accounts.iter().zip(results) {
        transfers.extend(result.with_context(|| format!("Failed to load transactions for {}", account.name))?);
    }
    sort_transfers(&mut transfers);

    Ok(BankTransfers {
        section_id,
        transfers,
        rate_limit: client.rate_limit_snapshot(token),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{json_response, MockTransport};
    use crate::services::fixtures::{test_client, with_sections, TOKEN};
    use chrono::NaiveDate;
    use reqwest::Method;
    use serde_json::{json, Value};

    #[test]
    fn test_finance_candidates_adults_first() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let sections: Vec<Section> = [
            json!({"section_id": 1, "section_type": "cubs"}),
            json!({"section_id": 2, "section_type": "adults"}),
            json!({"section_id": 3, "section_type": "scouts"}),
        ]
        .iter()
        .filter_map(|raw| Section::from_value(raw, today))
        .collect();
        assert_eq!(finance_candidates(&sections), vec!["2", "1", "3"]);
    }

    #[test]
    fn test_sort_transfers() {
        let transfer = |account: &str, date: &str| BankTransfer {
            account_name: account.to_string(),
            date: date.to_string(),
            reference: "N/A".to_string(),
            amount: "1.00".to_string(),
        };
        let mut transfers = vec![
            transfer("B", "2024-01-01"),
            transfer("B", "2024-02-01"),
            transfer("A", "2024-01-01"),
        ];
        sort_transfers(&mut transfers);
        let order: Vec<(&str, &str)> = transfers
            .iter()
            .map(|t| (t.account_name.as_str(), t.date.as_str()))
            .collect();
        assert_eq!(order, vec![("B", "2024-02-01"), ("A", "2024-01-01"), ("B", "2024-01-01")]);
    }

    fn page(count: usize, transfer_every: usize) -> Value {
        let rows: Vec<Value> = (0..count)
            .map(|i| json!({"is_transfer": i % transfer_every == 0, "date": format!("2024-01-{:02}", i % 28 + 1), "amount": 100}))
            .collect();
        json!({"data": rows})
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_bank_transfers_probes_and_pages() {
        let transport = MockTransport::new();
        with_sections(
            &transport,
            json!([
                {"section_id": 1, "section_name": "Cubs", "section_type": "cubs"},
                {"section_id": 2, "section_name": "Adults", "section_type": "adults"}
            ]),
        );
        transport.on(
            Method::GET,
            &accounts_path("2"),
            &[],
            json_response(403, json!({"error": "no finance access"})),
        );
        transport.on(
            Method::GET,
            &accounts_path("1"),
            &[],
            json_response(200, json!({"data": [{"id": 7, "name": "Main"}, {"id": 8}]})),
        );
        transport.on(
            Method::GET,
            &transactions_path("7"),
            &[("page", "1")],
            json_response(200, page(100, 10)),
        );
        transport.on(
            Method::GET,
            &transactions_path("7"),
            &[("page", "2")],
            json_response(200, page(5, 1)),
        );
        transport.on(
            Method::GET,
            &transactions_path("8"),
            &[("page", "1")],
            json_response(200, json!({"data": []})),
        );
        let client = test_client(&transport);

        let result = load_bank_transfers(&client, TOKEN, None).await.unwrap();
        assert_eq!(result.section_id, "1");
        assert_eq!(result.transfers.len(), 15);
        assert!(result.transfers.iter().all(|t| t.account_name == "Main" && t.amount == "1.00"));
        assert!(result.transfers.windows(2).all(|w| w[0].date >= w[1].date));

        assert_eq!(transport.call_count(&transactions_path("7")), 2);
        assert_eq!(transport.call_count(&transactions_path("8")), 1);
        let first_page = transport
            .calls()
            .into_iter()
            .find(|c| c.path == transactions_path("7"))
            .unwrap();
        assert_eq!(first_page.param("per_page"), Some("100"));
        assert_eq!(first_page.param("mode"), Some("all"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_finance_access() {
        let transport = MockTransport::new();
        with_sections(&transport, json!([{"section_id": 1, "section_type": "cubs"}]));
        let client = test_client(&transport);

        let err = load_bank_transfers(&client, TOKEN, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Could not find a section with finance access");
    }
}
