//! OpenAI-compatible providers and where their keys come from.
//!
//! The built-in list lives next to the model catalog in
//! `builtin_models.toml`. Config `[[providers]]` entries replace or extend
//! it, and the top-level `base-url` setting moves the default provider.

use serde::{Deserialize, Serialize};

use crate::core::config::Config;

pub const DEFAULT_PROVIDER: &str = "openai";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    /// Environment variables checked, in order, when the keyring has no key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BuiltinProvidersConfig {
    providers: Vec<ProviderProfile>,
}

/// Load built-in providers from the embedded catalog.
pub fn load_builtin_providers() -> Vec<ProviderProfile> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_models.toml");
    let config: BuiltinProvidersConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_models.toml");
    config.providers
}

#[derive(Debug, Clone)]
pub struct ProviderCatalog {
    providers: Vec<ProviderProfile>,
}

impl ProviderCatalog {
    pub fn new(config: &Config) -> Self {
        let mut providers = load_builtin_providers();
        if let Some(base_url) = config.base_url.as_deref() {
            if let Some(default) = providers.iter_mut().find(|p| p.id == DEFAULT_PROVIDER) {
                default.base_url = base_url.to_string();
            }
        }
        for custom in &config.providers {
            match providers
                .iter_mut()
                .find(|p| p.id.eq_ignore_ascii_case(&custom.id))
            {
                Some(existing) => *existing = custom.clone(),
                None => providers.push(custom.clone()),
            }
        }
        Self { providers }
    }

    pub fn providers(&self) -> &[ProviderProfile] {
        &self.providers
    }

    pub fn find(&self, id: &str) -> Option<&ProviderProfile> {
        self.providers
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(id))
    }

    /// The provider for `id`, or the default one when `id` is unknown.
    pub fn find_or_default(&self, id: &str) -> ProviderProfile {
        self.find(id)
            .or_else(|| self.find(DEFAULT_PROVIDER))
            .cloned()
            .unwrap_or_else(|| ProviderProfile {
                id: DEFAULT_PROVIDER.to_string(),
                display_name: "OpenAI".to_string(),
                base_url: crate::utils::url::DEFAULT_BASE_URL.to_string(),
                env_vars: Vec::new(),
            })
    }
}
