//! Shared conversation with a chat model
//!
//! The history is kept in memory and rewritten in full to the current log segment
//! after every append. When the provider reports a total token usage at or above
//! the configured maximum, the oldest messages are dropped and a new segment starts.

mod errors;

pub use errors::ConversationError;

use crate::completion::{CompletionFailure, GenerationParams};
use crate::models::GenerativeModel;
use chrono::Local;
use config::ConversationConfig;
use inference_providers::{ChatMessage, MessageRole};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        ChatMessage::new(message.role, message.content.clone())
    }
}

/// Classified failure reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error_type: String,
    pub description: String,
}

impl From<&CompletionFailure> for ErrorBody {
    fn from(failure: &CompletionFailure) -> Self {
        Self {
            error_type: failure.error_type().to_string(),
            description: failure.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SendResult {
    Message(Message),
    Error(ErrorBody),
}

/// Outcome of [`ConversationSession::send`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendOutcome {
    pub success: bool,
    pub result: SendResult,
}

/// Drop the oldest `round(len * cut_percent / 100)` entries, rounding half to even
pub fn truncate<T: Clone>(history: &[T], cut_percent: f64) -> Vec<T> {
    let to_remove = (history.len() as f64 * cut_percent / 100.0).round_ties_even();
    let to_remove = (to_remove.max(0.0) as usize).min(history.len());
    history[to_remove..].to_vec()
}

struct ConversationState {
    messages: Vec<Message>,
    log_file: PathBuf,
}

pub struct ConversationSession {
    model: Arc<dyn GenerativeModel>,
    credential: RwLock<Option<String>>,
    /// Held for a whole exchange so sends don't interleave
    send_lock: Mutex<()>,
    /// Held only while history is touched, never across a model call
    state: Mutex<ConversationState>,
    log_dir: PathBuf,
    max_tokens: u32,
    cut_percentage: f64,
}

impl ConversationSession {
    pub fn new(model: Arc<dyn GenerativeModel>, config: &ConversationConfig) -> Self {
        let log_dir = PathBuf::from(&config.log_dir);
        let log_file = next_log_file(&log_dir, None);
        Self {
            model,
            credential: RwLock::new(config.api_key.clone()),
            send_lock: Mutex::new(()),
            state: Mutex::new(ConversationState {
                messages: Vec::new(),
                log_file,
            }),
            log_dir,
            max_tokens: config.max_tokens,
            cut_percentage: config.cut_percentage,
        }
    }

    pub fn model(&self) -> &Arc<dyn GenerativeModel> {
        &self.model
    }

    /// Append a message, ask the model for the reply and append that too.
    ///
    /// A failed completion is a regular outcome with `success == false`; the sent
    /// message stays in the history. `Err` is reserved for invalid input and log
    /// persistence failures.
    pub async fn send(
        &self,
        role: MessageRole,
        content: &str,
    ) -> Result<SendOutcome, ConversationError> {
        if content.trim().is_empty() {
            return Err(ConversationError::InvalidParams(
                "message content must not be empty".to_string(),
            ));
        }

        let _exchange = self.send_lock.lock().await;
        let dialogue: Vec<ChatMessage> = {
            let mut state = self.state.lock().await;
            state.messages.push(Message::new(role, content));
            self.persist(&state).await?;
            state.messages.iter().map(ChatMessage::from).collect()
        };

        let mut params = GenerationParams::new();
        params.api_key = self.credential.read().await.clone();

        let result = self.model.send_chat_message(&dialogue, &params, None).await;
        let total_tokens = result.total_tokens();
        let completion = match result.into_result() {
            Ok(completion) => completion,
            Err(failure) => {
                return Ok(SendOutcome {
                    success: false,
                    result: SendResult::Error(ErrorBody::from(&failure)),
                });
            }
        };

        let reply = Message::new(MessageRole::Assistant, completion);
        let mut state = self.state.lock().await;
        state.messages.push(reply.clone());
        self.persist(&state).await?;

        if let Some(total_tokens) = total_tokens {
            if total_tokens >= self.max_tokens {
                self.cut(&mut state, total_tokens);
            }
        }

        Ok(SendOutcome {
            success: true,
            result: SendResult::Message(reply),
        })
    }

    /// Current history, oldest first
    pub async fn read(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }

    pub async fn credential(&self) -> Option<String> {
        self.credential.read().await.clone()
    }

    pub async fn set_credential(&self, value: impl Into<String>) {
        *self.credential.write().await = Some(value.into());
    }

    /// Save the current segment, start a new one and forget the history
    pub async fn clear(&self) -> Result<(), ConversationError> {
        let mut state = self.state.lock().await;
        self.persist(&state).await?;
        state.log_file = next_log_file(&self.log_dir, Some(&state.log_file));
        state.messages.clear();
        info!(log_file = %state.log_file.display(), "Conversation cleared");
        Ok(())
    }

    /// Log segment the history is currently written to
    pub async fn log_file(&self) -> PathBuf {
        self.state.lock().await.log_file.clone()
    }

    fn cut(&self, state: &mut ConversationState, total_tokens: u32) {
        let before = state.messages.len();
        state.messages = truncate(&state.messages, self.cut_percentage);
        state.log_file = next_log_file(&self.log_dir, Some(&state.log_file));
        info!(
            total_tokens,
            max_tokens = self.max_tokens,
            removed = before - state.messages.len(),
            log_file = %state.log_file.display(),
            "Conversation truncated"
        );
    }

    async fn persist(&self, state: &ConversationState) -> Result<(), ConversationError> {
        let body = serde_json::to_vec(&state.messages)?;
        tokio::fs::create_dir_all(&self.log_dir).await?;
        tokio::fs::write(&state.log_file, body).await?;
        debug!(
            messages = state.messages.len(),
            log_file = %state.log_file.display(),
            "Conversation saved"
        );
        Ok(())
    }
}

/// `log {YYYYmmddHHMMSS}.json` in `dir`, suffixed when that name is already taken
fn next_log_file(dir: &Path, current: Option<&Path>) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d%H%M%S");
    let mut candidate = dir.join(format!("log {stamp}.json"));
    let mut attempt = 1;
    while candidate.exists() || Some(candidate.as_path()) == current {
        candidate = dir.join(format!("log {stamp} ({attempt}).json"));
        attempt += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatModel;
    use config::ModelSettings;
    use inference_providers::mock::{RecordedRequest, ResponseTemplate};
    use inference_providers::{CompletionError, MockProvider};
    use tempfile::TempDir;

    struct Fixture {
        session: ConversationSession,
        provider: Arc<MockProvider>,
        _dir: TempDir,
    }

    async fn fixture(template: ResponseTemplate, max_tokens: u32, cut_percentage: f64) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(MockProvider::new());
        provider.set_default_response(template).await;
        let model = ChatModel::with_provider(
            "GPT 3.5",
            ModelSettings::new("gpt-3.5-turbo", 4096, 0.0),
            provider.clone(),
        )
        .unwrap();
        let config = ConversationConfig {
            model: "GPT 3.5".to_string(),
            api_key: Some("sk-config".to_string()),
            max_tokens,
            cut_percentage,
            log_dir: dir.path().join("log").to_string_lossy().into_owned(),
        };
        Fixture {
            session: ConversationSession::new(Arc::new(model), &config),
            provider,
            _dir: dir,
        }
    }

    async fn saved(path: &Path) -> Vec<Message> {
        let body = tokio::fs::read(path).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_truncate_rounds_half_to_even() {
        let history: Vec<u32> = (0..10).collect();
        assert_eq!(truncate(&history, 30.0), (3..10).collect::<Vec<_>>());
        assert_eq!(truncate(&history, 0.0), history);
        assert!(truncate(&history, 100.0).is_empty());

        // 2.5 rounds down, 1.5 rounds up
        assert_eq!(truncate(&[1, 2, 3, 4, 5], 50.0), vec![3, 4, 5]);
        assert_eq!(truncate(&[1, 2, 3], 50.0), vec![3]);
        assert!(truncate::<u32>(&[], 50.0).is_empty());
    }

    #[test]
    fn test_log_file_name_format() {
        let dir = tempfile::tempdir().unwrap();
        let name = next_log_file(dir.path(), None);
        let file_name = name.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with("log "));
        assert!(file_name.ends_with(".json"));
        assert_eq!(file_name.len(), "log YYYYmmddHHMMSS.json".len());

        let next = next_log_file(dir.path(), Some(&name));
        assert_ne!(next, name);
    }

    #[tokio::test]
    async fn test_send_appends_and_persists() {
        let f = fixture(ResponseTemplate::new("Hello! How can I help?"), 3500, 30.0).await;

        let outcome = f.session.send(MessageRole::User, "Hi").await.unwrap();
        assert!(outcome.success);
        assert_eq!(
            outcome.result,
            SendResult::Message(Message::new(MessageRole::Assistant, "Hello! How can I help?"))
        );

        let history = f.session.read().await;
        assert_eq!(
            history,
            vec![
                Message::new(MessageRole::User, "Hi"),
                Message::new(MessageRole::Assistant, "Hello! How can I help?"),
            ]
        );
        assert_eq!(saved(&f.session.log_file().await).await, history);
    }

    #[tokio::test]
    async fn test_whole_history_is_sent_with_credential() {
        let f = fixture(ResponseTemplate::new("ok"), 3500, 30.0).await;
        f.session.send(MessageRole::System, "Be brief").await.unwrap();
        f.session.set_credential("sk-runtime").await;
        f.session.send(MessageRole::User, "Hi").await.unwrap();

        let requests = f.provider.requests().await;
        let RecordedRequest::Chat(first) = &requests[0] else {
            panic!("expected a chat request");
        };
        assert_eq!(first.api_key.as_deref(), Some("sk-config"));

        let RecordedRequest::Chat(second) = &requests[1] else {
            panic!("expected a chat request");
        };
        assert_eq!(second.messages.len(), 3);
        assert_eq!(second.messages[0].role, MessageRole::System);
        assert_eq!(second.api_key.as_deref(), Some("sk-runtime"));
        assert_eq!(f.session.credential().await.as_deref(), Some("sk-runtime"));
    }

    #[tokio::test]
    async fn test_failed_send_keeps_user_message() {
        let f = fixture(
            ResponseTemplate::error(CompletionError::HttpError {
                status_code: 401,
                message: "Incorrect API key provided".to_string(),
            }),
            3500,
            30.0,
        )
        .await;

        let outcome = f.session.send(MessageRole::User, "Hi").await.unwrap();
        assert!(!outcome.success);
        let SendResult::Error(body) = outcome.result else {
            panic!("expected an error body");
        };
        assert_eq!(body.error_type, "Provider error");
        assert!(body.description.contains("Incorrect API key"));

        let history = f.session.read().await;
        assert_eq!(history, vec![Message::new(MessageRole::User, "Hi")]);
        assert_eq!(saved(&f.session.log_file().await).await, history);
    }

    #[tokio::test]
    async fn test_transport_failure_is_other_error() {
        let f = fixture(
            ResponseTemplate::error(CompletionError::CompletionError("timed out".to_string())),
            3500,
            30.0,
        )
        .await;
        let outcome = f.session.send(MessageRole::User, "Hi").await.unwrap();
        let SendResult::Error(body) = outcome.result else {
            panic!("expected an error body");
        };
        assert_eq!(body.error_type, "Other error");
    }

    #[tokio::test]
    async fn test_usage_over_threshold_truncates_and_rotates() {
        let f = fixture(ResponseTemplate::new("reply").with_total_tokens(120), 100, 50.0).await;
        let first_log = f.session.log_file().await;

        f.session.send(MessageRole::User, "one").await.unwrap();

        // 2 messages, half of them removed
        assert_eq!(
            f.session.read().await,
            vec![Message::new(MessageRole::Assistant, "reply")]
        );
        let second_log = f.session.log_file().await;
        assert_ne!(second_log, first_log);
        assert_eq!(saved(&first_log).await.len(), 2);

        f.session.send(MessageRole::User, "two").await.unwrap();
        // 3 messages, 1.5 rounds to 2
        assert_eq!(
            f.session.read().await,
            vec![Message::new(MessageRole::Assistant, "reply")]
        );
        assert_eq!(saved(&second_log).await.len(), 3);
    }

    #[tokio::test]
    async fn test_usage_below_threshold_keeps_history() {
        let f = fixture(ResponseTemplate::new("reply").with_total_tokens(99), 100, 50.0).await;
        let log = f.session.log_file().await;
        f.session.send(MessageRole::User, "one").await.unwrap();
        assert_eq!(f.session.read().await.len(), 2);
        assert_eq!(f.session.log_file().await, log);
    }

    #[tokio::test]
    async fn test_clear_saves_and_starts_new_segment() {
        let f = fixture(ResponseTemplate::new("reply"), 3500, 30.0).await;
        f.session.send(MessageRole::User, "Hi").await.unwrap();
        let old_log = f.session.log_file().await;

        f.session.clear().await.unwrap();

        assert!(f.session.read().await.is_empty());
        assert_ne!(f.session.log_file().await, old_log);
        assert_eq!(saved(&old_log).await.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_content_is_rejected() {
        let f = fixture(ResponseTemplate::new("reply"), 3500, 30.0).await;
        let err = f.session.send(MessageRole::User, "  ").await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidParams(_)));
        assert_eq!(f.provider.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_sends_are_serialized() {
        let f = fixture(
            ResponseTemplate::new("reply").with_delay(std::time::Duration::from_millis(10)),
            3500,
            30.0,
        )
        .await;
        let session = Arc::new(f.session);

        let a = tokio::spawn({
            let session = session.clone();
            async move { session.send(MessageRole::User, "first").await }
        });
        let b = tokio::spawn({
            let session = session.clone();
            async move { session.send(MessageRole::User, "second").await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let roles: Vec<MessageRole> = session.read().await.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant
            ]
        );
    }

    #[tokio::test]
    async fn test_history_is_readable_while_reply_is_pending() {
        let f = fixture(
            ResponseTemplate::new("reply").with_delay(std::time::Duration::from_millis(500)),
            3500,
            30.0,
        )
        .await;
        let session = Arc::new(f.session);

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.send(MessageRole::User, "hi").await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let history = tokio::time::timeout(std::time::Duration::from_millis(200), session.read())
            .await
            .expect("history must not wait for the model");
        assert_eq!(history, vec![Message::new(MessageRole::User, "hi")]);
        tokio::time::timeout(std::time::Duration::from_millis(200), session.log_file())
            .await
            .expect("log file must not wait for the model");

        assert!(pending.await.unwrap().unwrap().success);
        assert_eq!(session.read().await.len(), 2);
    }

    #[test]
    fn test_error_body_uses_failure_classification() {
        let failures = [
            CompletionFailure::Sizing("instruction too long".to_string()),
            CompletionFailure::Convergence {
                initial_tokens: 10,
                produced_tokens: 12,
            },
            CompletionFailure::Provider {
                status_code: 429,
                message: "Rate limit reached".to_string(),
            },
            CompletionFailure::Transport("timed out".to_string()),
        ];
        for failure in &failures {
            let body = ErrorBody::from(failure);
            assert_eq!(body.error_type, failure.error_type());
            assert_eq!(body.description, failure.to_string());
        }
        assert_eq!(ErrorBody::from(&failures[1]).error_type, "Convergence error");
    }
}
