use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::capabilities::ModelProfile;
use crate::core::persona::Persona;
use crate::core::providers::ProviderProfile;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// OpenAI-compatible API root, e.g. "https://api.openai.com/v1"
    pub base_url: Option<String>,
    /// Model selected when a chat starts
    pub default_model: Option<String>,
    /// Model used for image generation requests
    pub image_model: Option<String>,
    /// Text-to-speech model used by Listen and `murmur say`
    pub speech_model: Option<String>,
    pub tts_voice: Option<String>,
    /// Audio container requested from the speech endpoint ("mp3", "wav", ...)
    pub tts_format: Option<String>,
    /// Free-form delivery instructions passed to the speech model
    pub tts_instructions: Option<String>,
    /// Player command and arguments; the audio file path is appended
    pub audio_player: Option<Vec<String>>,
    /// Enable markdown rendering of finalized responses
    pub markdown: Option<bool>,
    /// Enable syntax highlighting for fenced code blocks when markdown is enabled
    pub syntax: Option<bool>,
    /// Catalog overrides: capabilities for models missing from or wrong in
    /// the built-in list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelProfile>,
    /// Additional OpenAI-compatible endpoints, or replacements for built-in ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderProfile>,
    /// Named system instructions that can be switched on from the sidebar
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub personas: Vec<Persona>,
    /// Persona active when a chat starts
    pub default_persona: Option<String>,
}

/// Get a user-friendly display string for a path, using `~` for the home
/// directory on Unix-like systems.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
