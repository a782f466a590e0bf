use colorizer::configuration::Settings;
use colorizer::controller::Controller;
use colorizer::error_handling::types::ConfigError;
use colorizer::logging;
use log::{error, info};

#[tokio::main]
async fn main() {
    logging::init(&logging::log_file_path());

    println!(
        "
==============================================================================
           colorizer v{} - black and white image colorization API
==============================================================================
",
        env!("CARGO_PKG_VERSION")
    );

    info!("Importing configuration");

    let settings = match Settings::load() {
        Ok(settings) => settings,
        // Covers --help and --version as well as malformed arguments
        Err(ConfigError::ArgumentError(e)) => e.exit(),
        Err(e) => {
            error!("Unable to import configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration imported successfully");

    let controller = Controller::new(settings).unwrap_or_else(|e| {
        error!("Unable to create a controller instance: {}, exiting...", e);
        std::process::exit(1);
    });

    if let Err(e) = controller.run().await {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }

    controller.shutdown();
}
