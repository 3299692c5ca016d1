pub mod cli;
pub mod config;
pub mod errors;
pub mod model_client;
pub mod telemetry;
pub mod tools;

pub async fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    cli::dispatch::run().await
}
