use pharmacy_api::{build_app, config::Config};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let bind_addr = config.bind_addr.clone();

    let app = build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Running at {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
