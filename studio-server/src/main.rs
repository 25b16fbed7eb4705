//! Gesture Studio - gesture echo and image generation over HTTP.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gesture_studio::engine::{loader_from_config, EngineLoader};
use gesture_studio::{build_router, AppState, Config, FeatureGate};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    println!("gesture-studio {}", VERSION);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        print_version();
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Check config.toml and STUDIO__SECTION__KEY environment variables.",
            e
        )
    })?;

    let feature_gate = FeatureGate::from_env(config.features.image_generation);
    tracing::info!(
        "Starting gesture-studio {} (image generation {})",
        VERSION,
        if feature_gate.is_enabled() { "enabled" } else { "disabled" }
    );

    // The model itself is loaded lazily on the first generation request
    let loader = loader_from_config(&config.engine, &config.generation)?;
    tracing::info!(
        "Engine: {:?}, model={}, steps={}, seed={}",
        config.engine.kind,
        loader.model_name(),
        config.generation.steps,
        config.generation.seed
    );

    let state = Arc::new(AppState::build(config.clone(), feature_gate, loader).await?);
    tracing::info!("Serving artifacts from {}", config.artifacts.dir);

    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.api.host, config.api.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
