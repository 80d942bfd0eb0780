//! `cargolane` operator binary: run the gate, the reconciler or a permission
//! check against a live backend and print the result as JSON.

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use cargolane_auth::{Action, Principal, Role, explain_permission, load_restrictions};
use cargolane_client::config::SESSION_DB_ENV;
use cargolane_client::{ApiClient, ClientConfig};
use cargolane_core::{BookingId, DomainError};
use cargolane_onboarding::{AccessGate, AccessRequirement, EmailCheckPolicy, GateConfig};
use cargolane_session::{LocalSessionCache, SqliteStore};
use cargolane_settlement::{RedirectSignal, SettlementOutcome, SettlementReconciler};

#[derive(Parser)]
#[command(name = "cargolane")]
#[command(about = "Cargolane access and settlement checks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide whether the current principal may open a view
    Gate {
        /// Path of the view, e.g. /company/dashboard
        path: String,
        /// Roles allowed on the view (any role when omitted)
        roles: Vec<Role>,
        /// View does not require a verified email
        #[arg(long)]
        no_email: bool,
        /// View does not require completed onboarding
        #[arg(long)]
        no_onboarding: bool,
        /// A fresh "unverified" answer overrides a cached "verified" flag
        #[arg(long)]
        strict_email: bool,
    },

    /// Reconcile a booking after a payment redirect
    Settle {
        booking: BookingId,
        /// Full return URL including the payment query parameters
        redirect_url: Url,
        /// Open a new checkout if the payment was cancelled or failed
        #[arg(long)]
        retry: bool,
    },

    /// Explain whether the current principal may perform an action
    Can {
        /// Action name, e.g. acceptBooking
        action: String,
    },

    /// Forget the cached session
    Logout,
}

#[derive(Serialize)]
struct SettleReport {
    outcome: SettlementOutcome,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'static str>,
    cleaned_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkout_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cargolane_observability::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Gate {
            path,
            roles,
            no_email,
            no_onboarding,
            strict_email,
        } => {
            let client = client()?;
            let cache = session_cache().await?;
            let principal = current_principal(&client, &cache).await;

            let mut requirement = AccessRequirement::for_roles(roles);
            if no_email {
                requirement = requirement.without_email_verification();
            }
            if no_onboarding {
                requirement = requirement.without_onboarding();
            }
            let policy = if strict_email {
                EmailCheckPolicy::Strict
            } else {
                EmailCheckPolicy::TrustCacheOnError
            };

            let gate = AccessGate::new(Arc::new(client), cache)
                .with_config(GateConfig::default().with_email_policy(policy));
            let decision = gate.check(principal.as_ref(), &requirement, &path).await;
            print_json(&decision)
        }

        Command::Settle {
            booking,
            mut redirect_url,
            retry,
        } => {
            let Some(signal) = RedirectSignal::take_from(&mut redirect_url) else {
                bail!("{redirect_url} carries no payment redirect signal");
            };

            let reconciler = SettlementReconciler::new(Arc::new(client()?));
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let outcome = reconciler.run(booking, signal, &cancel).await;

            let checkout_url = match &outcome {
                SettlementOutcome::Cancelled | SettlementOutcome::Failed { .. } if retry => {
                    let session = reconciler
                        .retry_checkout(booking)
                        .await
                        .context("failed to open a new checkout")?;
                    Some(session.url)
                }
                _ => None,
            };

            print_json(&SettleReport {
                success: outcome.is_success(),
                note: outcome.note(),
                outcome,
                cleaned_url: redirect_url.to_string(),
                checkout_url,
            })
        }

        Command::Can { action } => {
            let client = client()?;
            let principal = match client.fetch_me().await {
                Ok(principal) => principal,
                Err(err) => match err.as_domain() {
                    Some(domain) => bail!("cannot check permissions: {domain}"),
                    None => return Err(err).context("failed to fetch the current principal"),
                },
            };
            let restrictions = load_restrictions(&principal, &client).await;
            let explanation =
                explain_permission(&principal, &Action::new(action), restrictions.as_ref());
            print_json(&explanation)
        }

        Command::Logout => {
            session_cache().await?.clear().await;
            Ok(())
        }
    }
}

fn client() -> anyhow::Result<ApiClient> {
    let config = ClientConfig::from_env().context("invalid client configuration")?;
    Ok(ApiClient::new(config)?)
}

async fn session_cache() -> anyhow::Result<LocalSessionCache> {
    let store = match std::env::var(SESSION_DB_ENV) {
        Ok(path) if !path.trim().is_empty() => SqliteStore::open(path.trim()).await?,
        _ => SqliteStore::open_default().await?,
    };
    Ok(LocalSessionCache::new(Arc::new(store)))
}

/// The backend's view of the principal, or the cached one when the backend
/// is unreachable. `None` means signed out.
async fn current_principal(client: &ApiClient, cache: &LocalSessionCache) -> Option<Principal> {
    match client.fetch_me().await {
        Ok(principal) => {
            cache.remember_principal(&principal).await;
            Some(principal)
        }
        Err(err) if err.is_transient() => {
            tracing::warn!(error = %err, "principal fetch failed; using cached session");
            cache.load().await.map(|snapshot| snapshot.principal)
        }
        Err(err) => {
            match err.as_domain() {
                Some(DomainError::Unauthorized) => tracing::info!("not signed in"),
                _ => tracing::warn!(error = %err, "principal fetch rejected"),
            }
            None
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
