// ============================================================================
// Subscription Manager
// ============================================================================
//
// Operator job that creates or renews the mailbox subscription feeding the
// webhook. Run once, or periodically with --interval-minutes.
//
// ============================================================================

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mailhook_config::Config;
use mailhook_server::context::{build_http_client, build_token_cache};
use mailhook_server::subscription::{Subscription, SubscriptionManager};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "subscription-manager", about = "Create or renew the mailbox webhook subscription")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Repeat the operation every N minutes instead of running once
    #[arg(long, global = true)]
    interval_minutes: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new subscription
    Create,
    /// Renew an existing subscription, creating one if it no longer exists
    Renew {
        #[arg(long, env = "SUBSCRIPTION_ID")]
        subscription_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.rust_log.clone()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Some(mailbox) = config.graph.mailbox.clone() else {
        bail!("TARGET_MAILBOX must be set");
    };
    let Some(notification_url) = config.subscription.notification_url.clone() else {
        bail!("NOTIFICATION_URL must be set");
    };

    let http = build_http_client(&config.http)?;
    let tokens = build_token_cache(http.clone(), &config.graph);
    let manager = SubscriptionManager::new(
        http,
        config.graph.api_base.clone(),
        tokens,
        &config.subscription,
    );

    // Renewals reuse the id of the subscription created or renewed last
    let mut existing_id = match &cli.command {
        Command::Create => None,
        Command::Renew { subscription_id } => subscription_id
            .clone()
            .or_else(|| config.subscription.subscription_id.clone()),
    };
    if matches!(cli.command, Command::Renew { .. }) && existing_id.is_none() {
        bail!("renew needs --subscription-id or SUBSCRIPTION_ID");
    }

    loop {
        let subscription = run_once(&manager, &mailbox, &notification_url, existing_id.as_deref())
            .await?;
        existing_id = Some(subscription.id);

        let Some(minutes) = cli.interval_minutes.filter(|m| *m > 0) else {
            return Ok(());
        };
        info!("Next renewal in {} minutes", minutes);
        tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
    }
}

async fn run_once(
    manager: &SubscriptionManager,
    mailbox: &str,
    notification_url: &str,
    existing_id: Option<&str>,
) -> Result<Subscription> {
    let subscription = manager
        .create_or_renew(mailbox, notification_url, existing_id)
        .await
        .context("Subscription request failed")?;

    info!(
        subscription_id = %subscription.id,
        resource = %subscription.resource,
        expiration = %subscription.expiration,
        "Subscription active"
    );
    println!("{} {}", subscription.id, subscription.expiration.to_rfc3339());
    Ok(subscription)
}
