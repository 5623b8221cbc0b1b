use mycalc::{
    api::start_server,
    config::Settings,
    execution::ExecutionEngine,
    operations::create_default_registry,
    pricing::RetryingPriceClient,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load()?;

    info!("MyCalc - API Server");
    info!("Port: {}", settings.api_port);
    info!("Quote endpoint: {}", settings.price_api.base_url);

    // Create components
    let prices = Arc::new(RetryingPriceClient::from_settings(&settings.price_api)?);
    let operations = create_default_registry(prices)?;
    info!(operation_count = operations.len(), "Registered operations");

    let engine = ExecutionEngine::new(operations);

    // Start API server
    start_server(engine, settings.api_port).await?;

    Ok(())
}
