use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use nutrilog_core::{CoreConfig, JournalService, JsonFileStore};

/// Main entry point for the Nutrilog application
///
/// Opens the journal (loading the stored snapshot, migrating a legacy consultation history
/// into an empty journal, normalising patient names) and serves the REST API.
///
/// # Environment Variables
/// - `NUTRILOG_DATA_DIR`: Directory for journal storage (default: "journal_data")
/// - `NUTRILOG_DOCTOR_NAME`: Practitioner recorded on new events (default: "Nutricionista")
/// - `NUTRILOG_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nutrilog_run=info".parse()?)
                .add_directive("nutrilog_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = CoreConfig::from_values(
        std::env::var("NUTRILOG_DATA_DIR").ok(),
        std::env::var("NUTRILOG_DOCTOR_NAME").ok(),
    )?;
    let rest_addr =
        std::env::var("NUTRILOG_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("++ Opening journal in {}", cfg.data_dir().display());
    let service = JournalService::open(&cfg, Arc::new(JsonFileStore::from_config(&cfg)))?;

    let status = service.persistence_status()?;
    if let Some(err) = &status.last_error {
        tracing::warn!("Journal storage problem at startup: {}", err);
    }

    let app = api_rest::router(AppState::new(Arc::new(service)));

    tracing::info!("++ Starting Nutrilog REST on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
