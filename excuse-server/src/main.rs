use std::sync::Arc;

use clap::Parser;
use excuse_core::{CompletionBackend, CompletionConfig, ExcuseConfig};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use excuse_server::http::{start_http_server, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "excuse.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match ExcuseConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Open DB and ensure schema
    let pool = match excuse_core::db::open(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to open database {}: {}", config.database.url, e);
            std::process::exit(1);
        }
    };

    if args.health {
        match excuse_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ SQLite connected: {}", v),
            Err(e) => {
                println!("❌ SQLite check failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ Excuse DB health check passed");
        return Ok(());
    }

    let api_key = std::env::var("GOOGLE_API_KEY").ok();
    let backend: Arc<dyn CompletionBackend> =
        match excuse_core::create_backend(CompletionConfig::new(api_key, &config.completion)) {
            Ok(b) => Arc::from(b),
            Err(e) => {
                eprintln!("Failed to create completion backend: {}", e);
                std::process::exit(1);
            }
        };

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    let http_config = config.http.clone();
    let state = Arc::new(HttpState::new(pool, backend, config));
    start_http_server(state, http_config, tx.subscribe()).await?;

    Ok(())
}
