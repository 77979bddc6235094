//! Per-model capability descriptors.
//!
//! Capabilities come from the catalog embedded from `builtin_models.toml`,
//! overridden by `[[models]]` entries in the user config. They are resolved
//! once when a model is selected and stored on the session; nothing else
//! inspects model names to decide what the input area offers.

use serde::{Deserialize, Serialize};

use crate::core::providers::DEFAULT_PROVIDER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub supports_images: bool,
    pub supports_web_search: bool,
    pub supports_image_generation: bool,
    /// False for endpoints that only return a whole completion.
    pub supports_streaming: bool,
}

impl Default for ModelCapabilities {
    fn default() -> Self {
        Self {
            supports_images: false,
            supports_web_search: false,
            supports_image_generation: false,
            supports_streaming: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Provider id; models without one are served by the default provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default)]
    pub supports_images: bool,
    #[serde(default)]
    pub supports_web_search: bool,
    #[serde(default)]
    pub supports_image_generation: bool,
    #[serde(default = "default_true")]
    pub supports_streaming: bool,
}

impl ModelProfile {
    pub fn capabilities(&self) -> ModelCapabilities {
        ModelCapabilities {
            supports_images: self.supports_images,
            supports_web_search: self.supports_web_search,
            supports_image_generation: self.supports_image_generation,
            supports_streaming: self.supports_streaming,
        }
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    pub fn provider_id(&self) -> &str {
        self.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }
}

#[derive(Debug, Deserialize)]
struct BuiltinModelsConfig {
    models: Vec<ModelProfile>,
}

/// Load built-in model profiles from the embedded catalog.
pub fn load_builtin_models() -> Vec<ModelProfile> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_models.toml");
    let config: BuiltinModelsConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_models.toml");
    config.models
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    profiles: Vec<ModelProfile>,
}

impl ModelCatalog {
    /// Builds the catalog from the built-in list with `overrides` layered on
    /// top. An override replaces a built-in entry with the same id
    /// (case-insensitive) and otherwise extends the list.
    pub fn new(overrides: &[ModelProfile]) -> Self {
        let mut profiles = load_builtin_models();
        for custom in overrides {
            match profiles
                .iter_mut()
                .find(|p| p.id.eq_ignore_ascii_case(&custom.id))
            {
                Some(existing) => *existing = custom.clone(),
                None => profiles.push(custom.clone()),
            }
        }
        Self { profiles }
    }

    pub fn profiles(&self) -> &[ModelProfile] {
        &self.profiles
    }

    pub fn find(&self, model: &str) -> Option<&ModelProfile> {
        self.profiles
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(model))
    }

    /// Unknown models get no extras.
    pub fn resolve(&self, model: &str) -> ModelCapabilities {
        self.find(model)
            .map(ModelProfile::capabilities)
            .unwrap_or_default()
    }

    pub fn display_name<'a>(&'a self, model: &'a str) -> &'a str {
        self.find(model).map(ModelProfile::label).unwrap_or(model)
    }

    pub fn provider_for(&self, model: &str) -> &str {
        self.find(model)
            .map(ModelProfile::provider_id)
            .unwrap_or(DEFAULT_PROVIDER)
    }
}
