//! osmhelper - command-line access to Online Scout Manager section data.
//!
//! Each command prints pretty JSON on stdout. Logs go to stderr and are
//! controlled with `RUST_LOG` (e.g. `RUST_LOG=osmhelper_core=debug`).

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use osmhelper_core::auth::{self, OAuthClient, SessionData};
use osmhelper_core::services;
use osmhelper_core::settings::SettingsStore;
use osmhelper_core::{ApiClient, Config};

const TOKEN_ENV: &str = "OSM_ACCESS_TOKEN";

const USAGE: &str = "\
Usage: osmhelper <command>

Commands:
  auth-url          Print the OSM sign-in URL
  exchange <code>   Sign in with an authorization code and print the session
  sections          List the sections the token can see
  dashboard         Sections with capacities and the group name
  rate              Show the token's current rate-limit state
  membership        Member and waiting counts by section type
  roster            Young leader and leader training roster
  waiting-list      Ranked waiting list
  equipment         Every quartermaster item
  bank-transfers    Bank transfers across all accounts

Commands other than auth-url and exchange read the access token from OSM_ACCESS_TOKEN.";

/// Logs go through a non-blocking stderr writer; the guard flushes on drop.
fn init_tracing() -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn access_token() -> Result<String> {
    std::env::var(TOKEN_ENV)
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| anyhow!("{} is not set. Run `osmhelper auth-url` to sign in.", TOKEN_ENV))
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        println!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::from_env().context("Invalid configuration")?;
    info!(command, api_base = %config.api_base, "osmhelper starting");

    match command {
        "auth-url" => {
            let oauth = OAuthClient::new(&config)?;
            println!("{}", oauth.authorize_url(None)?);
            return Ok(());
        }
        "exchange" => {
            let code = args.get(1).ok_or_else(|| anyhow!("Usage: osmhelper exchange <code>"))?;
            let oauth = OAuthClient::new(&config)?;
            let client = ApiClient::new(&config.client_settings())?;
            let session = auth::sign_in(&oauth, &client, code).await?;
            return print_json(&session);
        }
        _ => {}
    }

    let token = access_token()?;
    let client = ApiClient::new(&config.client_settings())?;
    let session = SessionData::new(token.clone());
    let session = Some(&session);
    let settings = SettingsStore::new();

    match command {
        "sections" => print_json(&client.fetch_sections(&token, session).await),
        "rate" => {
            // A cheap call to populate the rate-limit headers.
            client.fetch_resource(&token, session).await?;
            print_json(&client.rate_limit_snapshot(&token))
        }
        "dashboard" => print_json(&services::load_dashboard(&client, &token, session, &settings).await),
        "membership" => print_json(&services::load_membership_dashboard(&client, &token, session, &settings).await?),
        "roster" => print_json(&services::load_roster(&client, &token, session).await?),
        "waiting-list" => print_json(&services::load_waiting_list(&client, &token, session, &settings).await?),
        "equipment" => print_json(&services::list_equipment(&client, &token, session).await?),
        "bank-transfers" => print_json(&services::load_bank_transfers(&client, &token, session).await?),
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}
