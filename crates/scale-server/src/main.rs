use anyhow::Result;
use clap::Parser;
use domain::driver::DriverType;
use infrastructure::ServerConfig;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scale_server::{api, setup_app_state};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config directory
    #[arg(long, default_value = "config")]
    config_dir: String,

    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override scale driver (RS232 | Simulator)
    #[arg(long)]
    driver: Option<DriverType>,
}

async fn run() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,scale_server=debug,application=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    info!("⚖️ Scale Server Starting...");

    // 1. Load Configuration
    let mut config = ServerConfig::load(&args.config_dir)?;
    if let Some(port) = args.http_port {
        config.http.port = port;
    }
    if let Some(driver) = args.driver {
        config.scale.driver = driver;
    }
    info!(
        driver = config.scale.driver.as_str(),
        baud_rate = config.scale.baud_rate,
        poll_interval_ms = config.scale.poll_interval_ms,
        "✅ Configuration loaded"
    );

    // 2. Initialize State
    let state = setup_app_state(&config);

    // 3. Optional startup connection, no retries
    if config.scale.auto_connect {
        match config.scale.port.as_deref() {
            Some(path) => {
                if let Err(e) = state.session.open(config.scale.connection_for(path)).await {
                    warn!(port = %path, error = %e, "Auto-connect failed");
                }
            }
            None => warn!("auto_connect is set but no scale port is configured"),
        }
    }

    // 4. Start API Server
    let app = api::create_router(state.clone());
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.http.port));
    info!("🚀 API Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.session.close().await?;
    info!("👋 Good bye!");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Shutting down..."),
        Err(err) => {
            warn!(error = %err, "Unable to listen for shutdown signal");
            std::future::pending::<()>().await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("\n❌ CRITICAL ERROR: {:?}", e);
        std::process::exit(1);
    }
}
