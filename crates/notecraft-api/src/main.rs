//! NoteCraft API server binary

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use notecraft_api::config::{Config, ProviderSettings};
use notecraft_api::supabase::SupabaseFactory;
use notecraft_api::{create_router, AppState};
use notecraft_core::ClientFactory;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "notecraft-api")]
#[command(about = "Personal notes API backed by a Supabase project")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 3000, env = "NOTECRAFT_PORT")]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0", env = "NOTECRAFT_BIND")]
    bind: String,

    /// Path to config directory
    #[arg(long, default_value = "./config", env = "NOTECRAFT_CONFIG_PATH")]
    config_path: String,

    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    /// Supabase anonymous (public) key
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    supabase_anon_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notecraft_api=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config_path)?;

    let settings = ProviderSettings::from_parts(
        cli.supabase_url.as_deref(),
        cli.supabase_anon_key.as_deref(),
    )?;
    let factory: Option<Arc<dyn ClientFactory>> = match settings {
        Some(settings) => {
            tracing::info!("Provider: {}", settings.url);
            let timeout = Duration::from_secs(config.request_timeout_secs);
            Some(Arc::new(SupabaseFactory::new(settings, timeout)?))
        }
        None => {
            tracing::error!(
                "SUPABASE_URL or SUPABASE_ANON_KEY not set; /api requests will fail until configured"
            );
            None
        }
    };

    let state = Arc::new(AppState::new(config, factory));
    let app = create_router(state);

    // Parse bind address
    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;

    tracing::info!("Starting notecraft-api on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("NoteCraft API shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
