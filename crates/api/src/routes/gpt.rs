use crate::models::{ModelEntry, ModelListResponse, SendMessageRequest};
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json as ResponseJson, Response},
};
use generative_models::{ConversationError, ErrorBody, Message, SendResult};
use tracing::{debug, error, warn};

fn error_response(status: StatusCode, description: impl Into<String>) -> Response {
    (
        status,
        ResponseJson(ErrorBody {
            error_type: "Other error".to_string(),
            description: description.into(),
        }),
    )
        .into_response()
}

/// Current conversation history
pub async fn get_conversation(State(app_state): State<AppState>) -> ResponseJson<Vec<Message>> {
    ResponseJson(app_state.conversation.read().await)
}

/// Send a message to the shared conversation.
///
/// The body is parsed as JSON whatever the declared content type is.
/// 200 carries the assistant reply, 400 a classified error.
pub async fn send_message(State(app_state): State<AppState>, body: String) -> Response {
    let request: SendMessageRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejected malformed message body");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request data");
        }
    };

    match app_state
        .conversation
        .send(request.role, &request.content)
        .await
    {
        Ok(outcome) => match outcome.result {
            SendResult::Message(message) => (StatusCode::OK, ResponseJson(message)).into_response(),
            SendResult::Error(body) => {
                warn!(error_type = %body.error_type, "Message was not answered");
                (StatusCode::BAD_REQUEST, ResponseJson(body)).into_response()
            }
        },
        Err(ConversationError::InvalidParams(reason)) => {
            error_response(StatusCode::BAD_REQUEST, reason)
        }
        Err(e) => {
            error!(error = %e, "Failed to update conversation");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

pub async fn get_openai_key(State(app_state): State<AppState>) -> String {
    app_state.conversation.credential().await.unwrap_or_default()
}

/// Replace the credential; the body is the raw key
pub async fn set_openai_key(State(app_state): State<AppState>, body: String) -> &'static str {
    app_state.conversation.set_credential(body.trim()).await;
    "Ok"
}

pub async fn clear_conversation(State(app_state): State<AppState>) -> Response {
    match app_state.conversation.clear().await {
        Ok(()) => "Ok".into_response(),
        Err(e) => {
            error!(error = %e, "Failed to clear conversation");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Registered models with their capabilities
pub async fn list_models(State(app_state): State<AppState>) -> ResponseJson<ModelListResponse> {
    let mut models = Vec::new();
    for name in app_state.registry.list_names() {
        let entry = match app_state.registry.capabilities(&name).await {
            Ok(capabilities) => ModelEntry {
                name,
                capabilities: Some(capabilities),
                error: None,
            },
            Err(e) => ModelEntry {
                name,
                capabilities: None,
                error: Some(e.to_string()),
            },
        };
        models.push(entry);
    }
    ResponseJson(ModelListResponse { models })
}
