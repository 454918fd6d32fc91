use std::process::ExitCode;

use tracing::{error, info, warn};

use filevault::file::FileStorage;
use filevault::web::WebServer;
use filevault::Config;

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = filevault::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        filevault::logging::init_console_only(&config.logging.level);
    }

    info!("filevault {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    match run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config) -> filevault::Result<()> {
    let storage = filevault::open_storage(&config.database).await?;
    let blobs = FileStorage::new(&config.files.storage_path)?;
    info!("File storage at {}", config.files.storage_path);

    if config.server.cors_origins.is_empty() {
        warn!("No CORS origins configured; allowing any origin");
    }

    let server = WebServer::new(config, storage, blobs)?;
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );
    server.run().await?;
    Ok(())
}
