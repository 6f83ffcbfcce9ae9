use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pix_gateway::adapters::PostgresStore;
use pix_gateway::cli::{Cli, Commands, DbCommands, TxCommands};
use pix_gateway::config::{Config, LogFormat};
use pix_gateway::provider::PixProviderClient;
use pix_gateway::{cli, create_app, db, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::from_env()?;

    // Setup logging
    let json = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Config => cli::handle_config_validate(&config),
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Tx(TxCommands::Show { external_reference }) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_tx_show(&PostgresStore::new(pool), &external_reference).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    startup::validate_env_vars(&config)?;

    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let report = startup::validate_environment(&config, &pool).await?;
    if !report.is_valid() {
        report.print();
        anyhow::bail!("Startup validation failed");
    }

    let provider = PixProviderClient::new(&config.provider_config());
    tracing::info!(
        "Payment provider client initialized with URL: {}",
        config.provider_base_url
    );

    let state = AppState::new(
        PostgresStore::new(pool),
        Arc::new(provider),
        config.notification_url(),
        config.webhook_secret.clone(),
    );
    if state.webhook_secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET not set, provider callbacks are accepted unsigned");
    }

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
