use imc::app;
use imc::config::AppConfig;

/// Main entry point for the web application
///
/// Reads the `IMC_*` settings from the environment and serves the calculator
/// until the process is stopped. Log verbosity follows `RUST_LOG`, `info` by
/// default.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    log::info!(
        "calculation backend at {}, identity provider at {}",
        config.api_url,
        config.auth_url
    );

    app::run(config).await
}
