use mycalc::{
    config::Settings,
    console::Console,
    execution::ExecutionEngine,
    operations::create_default_registry,
    pricing::RetryingPriceClient,
};
use std::sync::Arc;
use tokio::io::{stdin, stdout, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing (stderr keeps the menu on stdout readable)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("MyCalc starting up");

    let settings = Settings::load()?;
    let prices = Arc::new(RetryingPriceClient::from_settings(&settings.price_api)?);
    let operations = create_default_registry(prices)?;
    info!(operation_count = operations.len(), "Registered operations");

    let engine = ExecutionEngine::new(operations);
    let mut console = Console::new(BufReader::new(stdin()), stdout(), engine);

    let outcome = console.run().await;
    if let Err(e) = &outcome {
        error!(error = %e, "Fatal error in main loop");
    }

    info!("MyCalc shutting down");
    outcome.map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
}
