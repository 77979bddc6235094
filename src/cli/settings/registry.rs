//! Registry of setting handlers.

use std::collections::HashMap;

use super::handlers::{
    base_url_handler, default_model_handler, image_model_handler, markdown_handler,
    speech_model_handler, syntax_handler, tts_format_handler, tts_instructions_handler,
    tts_voice_handler, AudioPlayerHandler,
};
use super::SettingHandler;

/// Registry of all available setting handlers.
pub struct SettingRegistry {
    handlers: HashMap<&'static str, Box<dyn SettingHandler>>,
    /// Keys in display order for `murmur config` output.
    display_order: Vec<&'static str>,
}

impl SettingRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            handlers: HashMap::new(),
            display_order: Vec::new(),
        };

        registry.register(Box::new(base_url_handler()));
        registry.register(Box::new(default_model_handler()));
        registry.register(Box::new(image_model_handler()));
        registry.register(Box::new(speech_model_handler()));
        registry.register(Box::new(tts_voice_handler()));
        registry.register(Box::new(tts_format_handler()));
        registry.register(Box::new(tts_instructions_handler()));
        registry.register(Box::new(AudioPlayerHandler));
        registry.register(Box::new(markdown_handler()));
        registry.register(Box::new(syntax_handler()));

        registry
    }

    fn register(&mut self, handler: Box<dyn SettingHandler>) {
        let key = handler.key();
        self.display_order.push(key);
        self.handlers.insert(key, handler);
    }

    pub fn get(&self, key: &str) -> Option<&dyn SettingHandler> {
        self.handlers.get(key).map(|h| h.as_ref())
    }

    pub fn keys_display_order(&self) -> &[&'static str] {
        &self.display_order
    }
}

impl Default for SettingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_is_reachable() {
        let registry = SettingRegistry::new();
        for key in registry.keys_display_order() {
            assert_eq!(registry.get(key).map(|h| h.key()), Some(*key));
        }
        assert!(registry.get("theme").is_none());
    }
}
