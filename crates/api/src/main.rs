use api::{build_app, init_state};
use config::{ApiConfig, LoggingConfig};

/// Environment variable naming an explicit configuration file
const CONFIG_PATH_ENV: &str = "GPT_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => ApiConfig::load_from_file(&path),
        Err(_) => ApiConfig::load(),
    };
    let config = loaded.unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        eprintln!("Application cannot start without a valid configuration file.");
        std::process::exit(1);
    });

    init_tracing(&config.logging);

    let app_state = init_state(&config).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to create the conversation model");
        std::process::exit(1);
    });
    let app = build_app(app_state);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;

    tracing::info!(address = %bind_address, "Server started successfully");
    tracing::info!("Endpoints:");
    tracing::info!("  - GET  /gpt/get_conversation_cash");
    tracing::info!("  - POST /gpt/send_message");
    tracing::info!("  - GET  /gpt/get_openai_key");
    tracing::info!("  - POST /gpt/set_openai_key");
    tracing::info!("  - POST /gpt/clear_conversation");
    tracing::info!("  - GET  /gpt/models");

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(logging_config: &LoggingConfig) {
    let filter = logging_config.filter_directive();

    match logging_config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .compact()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .init();
        }
    }
}
