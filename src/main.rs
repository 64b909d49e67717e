use tracing_subscriber::EnvFilter;

use wardchat::api::{server, ApiContext};
use wardchat::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    if config.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; query endpoints will return errors");
    }
    tracing::info!(
        db = %config.database_path.display(),
        reference_db = %config.reference_db_path.display(),
        generation_model = %config.generation_model,
        detection_model = %config.detection_model,
        "Starting {} {}",
        wardchat::config::APP_NAME,
        wardchat::config::APP_VERSION,
    );

    let bind_addr = config.bind_addr;
    let ctx = ApiContext::from_config(config)?;
    let mut api = server::start(ctx, bind_addr).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    api.shutdown();

    Ok(())
}
