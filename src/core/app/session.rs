use std::collections::HashMap;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::core::capabilities::{ModelCapabilities, ModelCatalog};
use crate::core::config::Config;
use crate::core::history::{ConversationHistory, HistoryStore};
use crate::core::keyring::ApiKeyStore;
use crate::core::persona::PersonaManager;
use crate::core::providers::{ProviderCatalog, ProviderProfile, DEFAULT_PROVIDER};
use crate::core::sessions::{title_from, ChatSession, UNTITLED_CHAT};
use crate::core::speech::VoiceSettings;
use crate::core::stream_controller::StreamController;
use crate::utils::logging::TranscriptLog;

/// Where one request is sent and the key it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub base_url: String,
    pub api_key: String,
}

pub fn missing_key_notice(provider: &ProviderProfile) -> String {
    format!("{} API key not set in Settings.", provider.display_name)
}

/// Everything about the conversation that is not presentation: connection
/// settings, the active model, history, and the in-flight request.
pub struct SessionContext {
    pub client: Client,
    pub providers: ProviderCatalog,
    /// Keys by provider id, for this run
    pub api_keys: HashMap<String, String>,
    pub key_store: ApiKeyStore,
    pub personas: PersonaManager,
    pub model: String,
    pub image_model: String,
    pub capabilities: ModelCapabilities,
    pub catalog: ModelCatalog,
    pub voice: VoiceSettings,
    pub history: ConversationHistory,
    pub controller: StreamController,
    pub stream_cancel_token: Option<CancellationToken>,
    pub current_stream_id: u64,
    /// Image URL of a generated-image result waiting for finalize.
    pub pending_image_url: Option<String>,
    pub chat: Option<ChatSession>,
    pub transcript_log: TranscriptLog,
}

impl SessionContext {
    pub fn from_config(
        config: &Config,
        model: Option<String>,
        api_keys: HashMap<String, String>,
        key_store: ApiKeyStore,
        transcript_log: TranscriptLog,
    ) -> Self {
        let catalog = ModelCatalog::new(&config.models);
        let personas = PersonaManager::from_config(config);
        let model = model
            .or_else(|| personas.active().and_then(|p| p.model.clone()))
            .unwrap_or_else(|| config.effective_default_model().to_string());
        let capabilities = catalog.resolve(&model);
        Self {
            client: Client::new(),
            providers: ProviderCatalog::new(config),
            api_keys,
            key_store,
            personas,
            model,
            image_model: config.effective_image_model().to_string(),
            capabilities,
            catalog,
            voice: VoiceSettings {
                model: config.effective_speech_model().to_string(),
                voice: config.effective_tts_voice().to_string(),
                format: config.effective_tts_format().to_string(),
                instructions: config.effective_tts_instructions().map(str::to_string),
            },
            history: ConversationHistory::new(),
            controller: StreamController::new(),
            stream_cancel_token: None,
            current_stream_id: 0,
            pending_image_url: None,
            chat: None,
            transcript_log,
        }
    }

    /// Switches the model and re-resolves its capabilities.
    pub fn select_model(&mut self, model: &str) -> ModelCapabilities {
        self.model = model.to_string();
        self.capabilities = self.catalog.resolve(model);
        self.capabilities
    }

    pub fn model_label(&self) -> &str {
        self.catalog.display_name(&self.model)
    }

    /// The provider serving `model`.
    pub fn provider_for(&self, model: &str) -> ProviderProfile {
        self.providers
            .find_or_default(self.catalog.provider_for(model))
    }

    pub fn api_key_for(&self, provider: &str) -> Option<&str> {
        self.api_keys.get(provider).map(String::as_str)
    }

    pub fn set_api_key(&mut self, provider: &str, key: String) {
        self.api_keys.insert(provider.to_string(), key);
    }

    /// Where a request for `model` goes. The error is the notice to show
    /// when its provider has no key.
    pub fn endpoint_for(&self, model: &str) -> Result<Endpoint, String> {
        self.endpoint_of(self.provider_for(model))
    }

    /// Speech always goes to the default provider.
    pub fn speech_endpoint(&self) -> Result<Endpoint, String> {
        self.endpoint_of(self.providers.find_or_default(DEFAULT_PROVIDER))
    }

    fn endpoint_of(&self, provider: ProviderProfile) -> Result<Endpoint, String> {
        match self.api_key_for(&provider.id) {
            Some(key) => Ok(Endpoint {
                base_url: provider.base_url,
                api_key: key.to_string(),
            }),
            None => Err(missing_key_notice(&provider)),
        }
    }

    /// Starts tracking a new request and returns its id and token.
    pub fn begin_stream(&mut self) -> (u64, CancellationToken) {
        self.cancel_current_stream();
        self.current_stream_id = self.current_stream_id.wrapping_add(1);
        let token = CancellationToken::new();
        self.stream_cancel_token = Some(token.clone());
        self.pending_image_url = None;
        (self.current_stream_id, token)
    }

    pub fn cancel_current_stream(&mut self) {
        if let Some(token) = self.stream_cancel_token.take() {
            token.cancel();
        }
    }

    /// The active chat document, created on first use.
    pub fn chat_mut(&mut self) -> Option<&mut ChatSession> {
        if self.chat.is_none() {
            match ChatSession::new(&self.model) {
                Ok(chat) => self.chat = Some(chat),
                Err(err) => {
                    tracing::warn!(error = %err, "could not start a chat document");
                    return None;
                }
            }
        }
        self.chat.as_mut()
    }

    pub fn active_chat_id(&self) -> Option<&str> {
        self.chat.as_ref().map(|chat| chat.id.as_str())
    }

    /// Copies history into the chat document and titles it from the first
    /// user message.
    pub fn sync_chat(&mut self) -> Option<&ChatSession> {
        let records = self.history.records().to_vec();
        let model = self.model.clone();
        let chat = self.chat_mut()?;
        if chat.title == UNTITLED_CHAT {
            if let Some(first) = records.iter().find(|r| r.role.is_user()) {
                chat.title = title_from(&first.content);
            }
        }
        chat.messages = records;
        chat.model = model;
        chat.updated_at = chrono::Utc::now();
        self.chat.as_ref()
    }
}
