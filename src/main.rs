use anyhow::{Context, Result};
use clap::Parser;
use linguacall::{create_router, AppState, CallServices, Config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linguacall")]
#[command(about = "Practice-call service for language learners")]
struct Args {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/linguacall")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("linguacall=info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Linguacall v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let state = AppState::new(CallServices::from_config(&cfg));
    let app = create_router(state.clone());

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    state.shutdown_all().await;
    Ok(())
}
