mod cli;

use clap::Parser;
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_core::config::Config;
use ledger_core::db;
use ledger_core::domain::fee::FeePolicy;
use ledger_core::services::audit::AuditSink;
use ledger_core::services::gate::CapabilityGate;
use ledger_core::services::ledger::LedgerService;
use ledger_core::services::oracle::PriceOracle;
use ledger_core::services::reaper::Reaper;
use ledger_core::services::webhook::WebhookDispatcher;
use ledger_core::{create_app, AppState};

use cli::{Cli, Commands, DbCommands, ReaperCommands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => {
            let pool = db::create_pool(&config).await?;
            run_migrations(&pool).await?;
            Ok(())
        }
        Commands::Reaper(ReaperCommands::SweepOnce) => {
            let pool = db::create_pool(&config).await?;
            let reaper = build_reaper(pool, &config);
            let stats = reaper.sweep_once().await?;
            tracing::info!(
                expired = stats.expired,
                skipped = stats.skipped,
                alerted = stats.alerted,
                "sweep finished"
            );
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    run_migrations(&pool).await?;

    let gate = CapabilityGate::new(pool.clone());
    let audit = AuditSink::new(pool.clone());
    let webhooks = WebhookDispatcher::new(pool.clone());
    let ledger = LedgerService::new(
        pool.clone(),
        gate.clone(),
        webhooks,
        audit.clone(),
        config.lock_timeout_ms,
    );
    let oracle = PriceOracle::new(config.price_url.clone(), config.price_fallback_rate);
    let fee_policy = FeePolicy {
        default_percent: config.default_fee_percent,
    };

    let reaper = Reaper::new(pool.clone(), ledger.clone(), audit.clone(), &config);
    tokio::spawn(reaper.run());

    let state = AppState {
        db: pool,
        ledger,
        gate,
        oracle,
        audit,
        fee_policy,
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {addr}");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

fn build_reaper(pool: sqlx::PgPool, config: &Config) -> Reaper {
    let gate = CapabilityGate::new(pool.clone());
    let audit = AuditSink::new(pool.clone());
    let webhooks = WebhookDispatcher::new(pool.clone());
    let ledger = LedgerService::new(
        pool.clone(),
        gate,
        webhooks,
        audit.clone(),
        config.lock_timeout_ms,
    );
    Reaper::new(pool, ledger, audit, config)
}

async fn run_migrations(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(pool).await?;
    tracing::info!("database migrations completed");
    Ok(())
}
