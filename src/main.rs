//! Grid Brawl - two-player grid fighting game
//!
//! Runs one round in the terminal:
//! - key codes or JSON intents are read line by line from stdin
//! - views and audio cues are reported through tracing
//! - the round result is printed as JSON when a combatant runs out of health

use std::sync::Arc;

use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grid_brawl::config::Config;
use grid_brawl::game::GameMatch;
use grid_brawl::input::{InputSource, KeyBindings};
use grid_brawl::render::{TraceAudio, TraceRenderer};
use grid_brawl::session;
use grid_brawl::util::rate_limit::IntentThrottle;

/// Pixels per grid cell handed to the renderer
const CELL_SIZE: u32 = 16;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting Grid Brawl");
    info!(
        "Arena {}x{}, {} vs {}",
        config.arena_width, config.arena_height, config.player_one, config.player_two
    );

    let game = GameMatch::new(
        &config,
        Arc::new(TraceRenderer::new(CELL_SIZE)),
        Arc::new(TraceAudio),
    )?;
    let input = InputSource::new(
        KeyBindings::standard(),
        IntentThrottle::new(config.attacks_per_second),
        game.bus(),
    );

    tokio::select! {
        result = session::play(&game, input, BufReader::new(tokio::io::stdin())) => {
            match result {
                Some(result) => println!("{}", serde_json::to_string(&result)?),
                None => warn!("Match ended without a result"),
            }
        }
        _ = shutdown_signal() => {}
    }

    game.shutdown();
    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
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
