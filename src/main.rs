use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use api_shared::auth::ENV_API_KEY;
use rms_core::{CoreConfig, MappingService};
use snowstorm_client::SnowstormClient;

/// Main entry point for the RMS application
///
/// Serves the REST API (with Swagger UI at `/swagger-ui`) in front of the configured
/// Snowstorm terminology server.
///
/// # Environment Variables
/// - `RMS_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `RMS_TERMINOLOGY_URL`: Snowstorm root URL (required)
/// - `RMS_MODULE_ID`: local edition module id (required)
/// - `RMS_BRANCH`, `RMS_INTERNATIONAL_MODULE_ID`, `RMS_POLL_INTERVAL_MS`,
///   `RMS_POLL_DEADLINE_MS`, `RMS_HTTP_TIMEOUT_MS`: see `rms_core::config`
/// - `API_KEY`: key required in `x-api-key` on mutating requests (unset disables the check)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is missing or invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rms=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("snowstorm_client=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("RMS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let cfg = Arc::new(CoreConfig::from_lookup(|name| std::env::var(name).ok())?);
    let api_key = std::env::var(ENV_API_KEY).ok().filter(|key| !key.is_empty());
    if api_key.is_none() {
        tracing::warn!("{ENV_API_KEY} is not set; mutating endpoints are unauthenticated");
    }

    let client = Arc::new(SnowstormClient::from_config(&cfg)?);
    let service = MappingService::new(cfg.clone(), client.clone(), Some(client));

    tracing::info!(
        terminology = cfg.terminology_url(),
        branch = %cfg.branch(),
        module = %cfg.module_id(),
        "++ Starting RMS REST on {}",
        rest_addr
    );

    let app = api_rest::router(AppState {
        cfg,
        service,
        api_key,
    });

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("-- Shutting down RMS REST");
        })
        .await?;

    Ok(())
}
