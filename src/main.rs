//! Tag Arena Sim - Authoritative simulation core for a 3D tag arena
//!
//! This is the entry point for the simulation host. It boots:
//! - Configuration and structured logging
//! - The session registry shared with collaborator front-ends
//! - A game session whose tick loop runs as its own task
//!
//! Rendering, audio, input capture, and network transport are external
//! collaborators; they attach through the session's input and snapshot
//! channels.

mod app;
mod config;
mod game;
mod protocol;
mod util;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::app::AppState;
use crate::config::Config;
use crate::game::arena::ArenaConfig;
use crate::game::session::SessionOptions;
use crate::game::tag::TagRules;
use crate::game::GameSession;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting Tag Arena Sim");

    // Create application state
    let state = AppState::new(config.clone());

    // Boot the initial session
    let session_id = Uuid::new_v4();
    let seed = config.arena_seed.unwrap_or_else(rand::random);
    let options = SessionOptions {
        default_round_secs: config.round_duration_secs,
        bot_count: config.bot_count,
        force_bot_it: config.force_bot_it,
        arena: ArenaConfig {
            obstacle_count: config.obstacle_count,
            ..ArenaConfig::default()
        },
        rules: TagRules::default(),
    };

    let (session, handle) = GameSession::new(session_id, seed, options);
    state.sessions.insert(handle);

    let registry = state.sessions.clone();
    let session_task = tokio::spawn(async move {
        session.run().await;
        registry.remove(&session_id);
        info!(session_id = %session_id, "session removed from registry");
    });

    info!(session_id = %session_id, seed, "session ready for collaborators");

    // Periodic registry stats for operators
    let stats_registry = state.sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            info!(
                sessions = stats_registry.active_sessions(),
                entities = stats_registry.total_entities(),
                "registry stats"
            );
        }
    });

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
        _ = session_task => {
            info!("Session task finished");
        }
    }

    info!("Simulation host shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
