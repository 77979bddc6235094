//! Setting handlers, one per configuration key.

use crate::cli::settings::error::SettingError;
use crate::cli::settings::helpers::{format_bool, mutate_config, parse_bool, truncate_with_ellipsis};
use crate::cli::settings::SettingHandler;
use crate::core::config::data::Config;
use crate::core::config::defaults::{
    DEFAULT_IMAGE_MODEL, DEFAULT_MODEL, DEFAULT_SPEECH_MODEL, DEFAULT_TTS_FORMAT,
    DEFAULT_TTS_VOICE,
};
use crate::utils::url::DEFAULT_BASE_URL;

/// Data-driven handler for free-text settings.
pub struct TextHandler {
    key: &'static str,
    hint: &'static str,
    example: &'static str,
    default_display: &'static str,
    get: fn(&Config) -> Option<&str>,
    set_field: fn(&mut Config, Option<String>),
}

impl SettingHandler for TextHandler {
    fn key(&self) -> &'static str {
        self.key
    }

    fn set(&self, args: &[String]) -> Result<String, SettingError> {
        let value = args.join(" ");
        let value = value.trim();
        if value.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: self.hint,
                example: self.example,
            });
        }

        let display = truncate_with_ellipsis(value, 50);
        let value = value.to_string();
        let set_field = self.set_field;
        mutate_config(move |config| {
            set_field(config, Some(value));
            Ok(())
        })?;

        Ok(format!("✅ Set {} to: {display}", self.key))
    }

    fn unset(&self) -> Result<String, SettingError> {
        let set_field = self.set_field;
        mutate_config(move |config| {
            set_field(config, None);
            Ok(())
        })?;
        Ok(format!(
            "✅ Unset {} (will use default: {})",
            self.key, self.default_display
        ))
    }

    fn format(&self, config: &Config) -> String {
        match (self.get)(config) {
            Some(value) => format!("  {}: {}", self.key, truncate_with_ellipsis(value, 50)),
            None => format!("  {}: (unset, default: {})", self.key, self.default_display),
        }
    }
}

/// Data-driven handler for boolean (on/off) settings.
pub struct BooleanHandler {
    key: &'static str,
    hint: &'static str,
    example: &'static str,
    default_display: &'static str,
    get: fn(&Config) -> Option<bool>,
    set_field: fn(&mut Config, Option<bool>),
}

impl SettingHandler for BooleanHandler {
    fn key(&self) -> &'static str {
        self.key
    }

    fn set(&self, args: &[String]) -> Result<String, SettingError> {
        if args.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: self.hint,
                example: self.example,
            });
        }

        let input = args.join(" ");
        let value = parse_bool(&input).ok_or(SettingError::InvalidBoolean(input))?;
        let set_field = self.set_field;
        mutate_config(move |config| {
            set_field(config, Some(value));
            Ok(())
        })?;

        Ok(format!("✅ Set {} to: {}", self.key, format_bool(value)))
    }

    fn unset(&self) -> Result<String, SettingError> {
        let set_field = self.set_field;
        mutate_config(move |config| {
            set_field(config, None);
            Ok(())
        })?;
        Ok(format!(
            "✅ Unset {} (will use default: {})",
            self.key, self.default_display
        ))
    }

    fn format(&self, config: &Config) -> String {
        match (self.get)(config) {
            Some(value) => format!("  {}: {}", self.key, format_bool(value)),
            None => format!("  {}: (unset, default: {})", self.key, self.default_display),
        }
    }
}

/// Handler for `audio-player`: a command followed by its arguments.
pub struct AudioPlayerHandler;

impl SettingHandler for AudioPlayerHandler {
    fn key(&self) -> &'static str {
        "audio-player"
    }

    fn set(&self, args: &[String]) -> Result<String, SettingError> {
        let command: Vec<String> = args
            .iter()
            .flat_map(|arg| arg.split_whitespace())
            .map(str::to_string)
            .collect();
        if command.is_empty() {
            return Err(SettingError::MissingArgs {
                hint: "To set the audio player, give the command and its arguments:",
                example: "murmur set audio-player mpv --no-video",
            });
        }

        let display = command.join(" ");
        mutate_config(move |config| {
            config.audio_player = Some(command);
            Ok(())
        })?;
        Ok(format!("✅ Set audio-player to: {display}"))
    }

    fn unset(&self) -> Result<String, SettingError> {
        mutate_config(|config| {
            config.audio_player = None;
            Ok(())
        })?;
        Ok("✅ Unset audio-player (will detect a player on PATH)".to_string())
    }

    fn format(&self, config: &Config) -> String {
        match config.audio_player.as_ref().filter(|c| !c.is_empty()) {
            Some(command) => format!("  audio-player: {}", command.join(" ")),
            None => "  audio-player: (unset, detected on PATH)".to_string(),
        }
    }
}

pub fn base_url_handler() -> TextHandler {
    TextHandler {
        key: "base-url",
        hint: "To set the API base URL, provide the URL:",
        example: "murmur set base-url https://api.openai.com/v1",
        default_display: DEFAULT_BASE_URL,
        get: |c| c.base_url.as_deref(),
        set_field: |c, v| c.base_url = v,
    }
}

pub fn default_model_handler() -> TextHandler {
    TextHandler {
        key: "default-model",
        hint: "To set the default model, provide its id:",
        example: "murmur set default-model gpt-4o",
        default_display: DEFAULT_MODEL,
        get: |c| c.default_model.as_deref(),
        set_field: |c, v| c.default_model = v,
    }
}

pub fn image_model_handler() -> TextHandler {
    TextHandler {
        key: "image-model",
        hint: "To set the image generation model, provide its id:",
        example: "murmur set image-model dall-e-3",
        default_display: DEFAULT_IMAGE_MODEL,
        get: |c| c.image_model.as_deref(),
        set_field: |c, v| c.image_model = v,
    }
}

pub fn speech_model_handler() -> TextHandler {
    TextHandler {
        key: "speech-model",
        hint: "To set the text-to-speech model, provide its id:",
        example: "murmur set speech-model gpt-4o-mini-tts",
        default_display: DEFAULT_SPEECH_MODEL,
        get: |c| c.speech_model.as_deref(),
        set_field: |c, v| c.speech_model = v,
    }
}

pub fn tts_voice_handler() -> TextHandler {
    TextHandler {
        key: "tts-voice",
        hint: "To set the voice, provide its name:",
        example: "murmur set tts-voice nova",
        default_display: DEFAULT_TTS_VOICE,
        get: |c| c.tts_voice.as_deref(),
        set_field: |c, v| c.tts_voice = v,
    }
}

pub fn tts_format_handler() -> TextHandler {
    TextHandler {
        key: "tts-format",
        hint: "To set the audio format, provide it:",
        example: "murmur set tts-format wav",
        default_display: DEFAULT_TTS_FORMAT,
        get: |c| c.tts_format.as_deref(),
        set_field: |c, v| c.tts_format = v,
    }
}

pub fn tts_instructions_handler() -> TextHandler {
    TextHandler {
        key: "tts-instructions",
        hint: "To set voice instructions, provide the text:",
        example: "murmur set tts-instructions \"Speak calmly and slowly\"",
        default_display: "none",
        get: |c| c.tts_instructions.as_deref(),
        set_field: |c, v| c.tts_instructions = v,
    }
}

pub fn markdown_handler() -> BooleanHandler {
    BooleanHandler {
        key: "markdown",
        hint: "To set markdown rendering, specify on or off:",
        example: "murmur set markdown off",
        default_display: "on",
        get: |c| c.markdown,
        set_field: |c, v| c.markdown = v,
    }
}

pub fn syntax_handler() -> BooleanHandler {
    BooleanHandler {
        key: "syntax",
        hint: "To set syntax highlighting, specify on or off:",
        example: "murmur set syntax off",
        default_display: "on",
        get: |c| c.syntax,
        set_field: |c, v| c.syntax = v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn words(input: &[&str]) -> Vec<String> {
        input.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn text_settings_round_trip_through_the_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let _guard = Config::test_config_guard();
        Config::set_test_config_path(path.clone());

        let handler = tts_instructions_handler();
        let message = handler.set(&words(&["Speak", "calmly"])).unwrap();
        assert_eq!(message, "✅ Set tts-instructions to: Speak calmly");
        let saved = Config::load_from_path(&path).unwrap();
        assert_eq!(saved.tts_instructions.as_deref(), Some("Speak calmly"));
        assert_eq!(handler.format(&saved), "  tts-instructions: Speak calmly");

        handler.unset().unwrap();
        let saved = Config::load_from_path(&path).unwrap();
        assert_eq!(saved.tts_instructions, None);
        assert_eq!(
            handler.format(&saved),
            "  tts-instructions: (unset, default: none)"
        );

        Config::clear_test_config_override();
    }

    #[test]
    fn boolean_settings_reject_garbage() {
        let handler = markdown_handler();
        assert!(matches!(
            handler.set(&words(&["sometimes"])),
            Err(SettingError::InvalidBoolean(_))
        ));
        assert!(matches!(
            handler.set(&[]),
            Err(SettingError::MissingArgs { .. })
        ));
    }

    #[test]
    fn audio_player_splits_command_words() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let _guard = Config::test_config_guard();
        Config::set_test_config_path(path.clone());

        AudioPlayerHandler
            .set(&words(&["ffplay -nodisp", "-autoexit"]))
            .unwrap();
        let saved = Config::load_from_path(&path).unwrap();
        assert_eq!(
            saved.audio_player,
            Some(words(&["ffplay", "-nodisp", "-autoexit"]))
        );

        Config::clear_test_config_override();
    }
}
