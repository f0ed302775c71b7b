//! Repodoc - AI-powered repository documentation and chat service
//!
//! Main entry point: loads and validates configuration, spawns the
//! background reaper, and serves the HTTP API.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use repodoc::config::Config;
use repodoc::reaper::{self, ReaperConfig};
use repodoc::server::{build_router, AppState};

/// Repodoc - repository documentation service
#[derive(Parser, Debug, Clone)]
#[command(name = "repodoc")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    config: String,

    /// Override the listen address from config
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    config.validate()?;

    let addr: SocketAddr = config.server.listen.parse()?;
    let state = AppState::from_config(config)?;

    let reaper_config = ReaperConfig {
        interval: state.config.cleanup_interval(),
        max_sessions: state.config.limits.max_sessions,
        memory_warn_bytes: state.config.limits.memory_warn_bytes,
    };
    tokio::spawn(reaper::run_reaper(
        state.store.clone(),
        state.limiter.clone(),
        reaper_config,
    ));
    tracing::info!(
        "Started background cleanup task (interval: {} minutes)",
        state.config.limits.cleanup_interval_minutes
    );
    tracing::info!(
        "Rate limits: {} req/{}s per client, {} req/{}s global",
        state.config.limits.rate_limit_requests,
        state.config.limits.rate_limit_window_secs,
        state.config.limits.global_rate_limit,
        state.config.limits.rate_limit_window_secs
    );

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("repodoc=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
