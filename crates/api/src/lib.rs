pub mod models;
pub mod routes;

use crate::routes::{
    gpt::{
        clear_conversation, get_conversation, get_openai_key, list_models, send_message,
        set_openai_key,
    },
    health::health_check,
};
use axum::{
    routing::{get, post},
    Router,
};
use config::ApiConfig;
use generative_models::{ConversationSession, ModelRegistry, RegistryError};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// State shared by every handler: one registry and one conversation for all clients
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub conversation: Arc<ConversationSession>,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, conversation: Arc<ConversationSession>) -> Self {
        Self {
            registry,
            conversation,
        }
    }
}

/// Build the default registry from configuration and open the shared conversation
/// with its configured model
pub async fn init_state(config: &ApiConfig) -> Result<AppState, RegistryError> {
    let registry = Arc::new(ModelRegistry::with_defaults(&config.models));
    let model = registry.get(&config.conversation.model).await?;
    info!(
        model = %config.conversation.model,
        log_dir = %config.conversation.log_dir,
        "Conversation ready"
    );
    let conversation = Arc::new(ConversationSession::new(model, &config.conversation));
    Ok(AppState::new(registry, conversation))
}

pub fn build_gpt_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/get_conversation_cash", get(get_conversation))
        .route("/send_message", post(send_message))
        .route("/get_openai_key", get(get_openai_key))
        .route("/set_openai_key", post(set_openai_key))
        .route("/clear_conversation", post(clear_conversation))
        .route("/models", get(list_models))
        .with_state(app_state)
}

pub fn build_app(app_state: AppState) -> Router {
    Router::new()
        .nest("/gpt", build_gpt_routes(app_state))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
}
