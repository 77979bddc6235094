use serde::{Deserialize, Serialize};

use crate::core::config::Config;

/// A named set of system instructions, optionally pinned to a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub instructions: String,
    /// Model switched to while the persona is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Manages persona state and operations
#[derive(Debug, Clone, Default)]
pub struct PersonaManager {
    personas: Vec<Persona>,
    active: Option<Persona>,
}

impl PersonaManager {
    /// Loads the configured personas and activates `default-persona` when it
    /// names one of them.
    pub fn from_config(config: &Config) -> Self {
        let mut manager = Self {
            personas: config.personas.clone(),
            active: None,
        };
        if let Some(id) = config.default_persona.as_deref() {
            if manager.activate(id).is_err() {
                tracing::warn!(persona = id, "default persona not found");
            }
        }
        manager
    }

    pub fn list(&self) -> &[Persona] {
        &self.personas
    }

    pub fn find(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    pub fn activate(&mut self, id: &str) -> Result<&Persona, String> {
        match self.find(id).cloned() {
            Some(persona) => Ok(self.active.insert(persona)),
            None => {
                let available: Vec<&str> = self.personas.iter().map(|p| p.id.as_str()).collect();
                Err(format!(
                    "Persona '{}' not found. Available personas: {}",
                    id,
                    available.join(", ")
                ))
            }
        }
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&Persona> {
        self.active.as_ref()
    }

    /// Instructions to send ahead of the conversation, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        self.active
            .as_ref()
            .map(|p| p.instructions.trim())
            .filter(|text| !text.is_empty())
    }
}
