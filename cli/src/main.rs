mod cli;
mod config;
mod errors;
mod model_client;
mod telemetry;
mod tools;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    cli::dispatch::run().await
}
