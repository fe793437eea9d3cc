use crate::models::{ChatModel, GenerativeModel, ModelCapabilities, ModelError, TextModel};
use config::ModelsConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Builds the model registered under a name
pub type ModelConstructor =
    Box<dyn Fn() -> Result<Arc<dyn GenerativeModel>, ModelError> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Model '{0}' is not registered")]
    NotRegistered(String),
    #[error("Failed to create model '{name}': {source}")]
    Construction {
        name: String,
        #[source]
        source: ModelError,
    },
}

struct RegistryEntry {
    constructor: ModelConstructor,
    instance: OnceCell<Arc<dyn GenerativeModel>>,
}

/// Registry of model constructors. Each name is built lazily on first lookup and
/// the same instance is handed out for the rest of the registry's lifetime.
pub struct ModelRegistry {
    entries: HashMap<String, RegistryEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry with the chat model under "GPT 3.5" and the text model under "GPT 2",
    /// both configured from `models`
    pub fn with_defaults(models: &ModelsConfig) -> Self {
        let mut registry = Self::new();

        let config = models.clone();
        registry.register(ChatModel::DEFAULT_NAME, move || {
            let settings = config.settings_for(ChatModel::DEFAULT_NAME)?;
            Ok(Arc::new(ChatModel::new(ChatModel::DEFAULT_NAME, settings)?) as Arc<dyn GenerativeModel>)
        });

        let config = models.clone();
        registry.register(TextModel::DEFAULT_NAME, move || {
            let settings = config.settings_for(TextModel::DEFAULT_NAME)?;
            Ok(Arc::new(TextModel::new(TextModel::DEFAULT_NAME, settings)?) as Arc<dyn GenerativeModel>)
        });

        registry
    }

    /// Register a constructor; a previous registration under the same name is replaced
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Result<Arc<dyn GenerativeModel>, ModelError> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.into(),
            RegistryEntry {
                constructor: Box::new(constructor),
                instance: OnceCell::new(),
            },
        );
    }

    /// The model registered under `name`, created on first use
    pub async fn get(&self, name: &str) -> Result<Arc<dyn GenerativeModel>, RegistryError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| RegistryError::NotRegistered(name.to_string()))?;

        entry
            .instance
            .get_or_try_init(|| async {
                let model = (entry.constructor)().map_err(|source| RegistryError::Construction {
                    name: name.to_string(),
                    source,
                })?;
                info!(model = %name, "Model instance created");
                Ok(model)
            })
            .await
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn capabilities(&self, name: &str) -> Result<ModelCapabilities, RegistryError> {
        Ok(self.get(name).await?.capabilities())
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
