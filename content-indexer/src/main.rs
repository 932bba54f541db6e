use content_indexer::{logging, Dependencies, IndexingError, Settings};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;
    logging::init(settings.log_format);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting content indexer");

    let mut dependencies = Dependencies::new(&settings).await?;
    if let Err(e) = dependencies.orchestrator.run().await {
        error!(error = %e, "Content indexer stopped with an error");
        return Err(e.into());
    }

    info!("Content indexer stopped");
    Ok(())
}
