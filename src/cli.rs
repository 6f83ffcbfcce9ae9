use clap::{Parser, Subcommand};

use crate::adapters::PostgresStore;
use crate::config::Config;
use crate::domain::account::format_major_units;
use crate::ports::LedgerStore;

#[derive(Parser)]
#[command(name = "pix-gateway")]
#[command(about = "PIX Gateway - deposits, withdrawals and provider reconciliation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Transaction inspection commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Show a ledger entry by its external reference
    Show {
        #[arg(value_name = "EXTERNAL_REFERENCE")]
        external_reference: String,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_tx_show(store: &PostgresStore, external_reference: &str) -> anyhow::Result<()> {
    let Some(tx) = store.find_by_external_reference(external_reference).await? else {
        tracing::warn!("Transaction {} not found", external_reference);
        anyhow::bail!("Transaction {} not found", external_reference)
    };

    println!("Transaction {}", tx.external_reference);
    println!("  Id:              {}", tx.id);
    println!("  Account:         {}", tx.account_id);
    println!("  Kind:            {}", tx.kind);
    println!("  Amount:          {} ({} cents)", format_major_units(tx.amount_minor), tx.amount_minor);
    println!("  Status:          {}", tx.status);
    println!(
        "  Provider status: {}",
        tx.provider_status.as_deref().unwrap_or("-")
    );
    println!("  Created:         {}", tx.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Status updated:  {}", tx.status_updated_at.format("%Y-%m-%d %H:%M:%S"));

    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = crate::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;
    println!("✓ Database migrations completed");

    Ok(())
}

pub fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Provider URL: {}", config.provider_base_url);
    println!("  Provider Key: {}", mask_secret(&config.provider_secret_key));
    println!("  Notification URL: {}", config.notification_url());
    println!(
        "  Webhook Signatures: {}",
        if config.webhook_secret.is_some() { "required" } else { "disabled" }
    );

    crate::startup::validate_env_vars(config)?;

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}
