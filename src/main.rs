use std::process::ExitCode;

use dotenvy::dotenv;
use tracing::{error, info};

use barber_ai::cli::{parse_args, run};
use barber_ai::config::{Config, LogSettings};
use barber_ai::utils::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    let _guards = init_logging(&LogSettings::from_env());
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid configuration: {err:#}");
            return ExitCode::from(2);
        }
    };
    info!(
        "Starting barber-ai (model {}, safety {:?})",
        config.gemini_image_model, config.gemini_safety_settings
    );

    match run(command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("barber-ai failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}
