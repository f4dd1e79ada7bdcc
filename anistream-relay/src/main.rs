use anistream_relay::api::{ApiServer, AppState};
use anistream_relay::{RelayConfig, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Logging first so configuration warnings are visible.
    let log_dir = RelayConfig::log_dir_from_env();
    let _logging = logging::init_logging(log_dir.as_deref())?;

    let config = RelayConfig::from_env_or_default();
    let state = AppState::new(config.fetch.clone(), &config.server.route_prefix)?;
    let server = ApiServer::new(config.server.clone(), state);

    let cancel_token = server.cancel_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl-C"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        cancel_token.cancel();
    });

    server.run().await?;
    tracing::info!("anistream-relay stopped");
    Ok(())
}
