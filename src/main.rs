use session_auth::configuration::get_configuration;
use session_auth::startup::Application;
use session_auth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    tracing::info!(backend = ?configuration.database.backend, "Building application");

    let application = Application::build(&configuration).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;

    tracing::info!(port = application.port(), "Server started successfully");

    application.run_until_stopped().await
}
