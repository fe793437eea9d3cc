use generative_models::ModelCapabilities;
use inference_providers::MessageRole;
use serde::{Deserialize, Serialize};

/// Body of `POST /gpt/send_message`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub role: MessageRole,
    pub content: String,
}

/// Entry of `GET /gpt/models`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    /// Missing when the model couldn't be created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<ModelCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub models: Vec<ModelEntry>,
}
