use crate::core::config::data::Config;
use crate::utils::url::DEFAULT_BASE_URL;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
pub const DEFAULT_SPEECH_MODEL: &str = "gpt-4o-mini-tts";
pub const DEFAULT_TTS_VOICE: &str = "onyx";
pub const DEFAULT_TTS_FORMAT: &str = "mp3";

/// Candidate players tried in order when `audio-player` is unset. Each is
/// run with the audio file path appended.
const PLAYER_CANDIDATES: &[&[&str]] = &[
    &["mpv", "--no-video", "--really-quiet"],
    &["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet"],
    &["afplay"],
    &["paplay"],
];

impl Config {
    pub fn effective_base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn effective_default_model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn effective_image_model(&self) -> &str {
        self.image_model.as_deref().unwrap_or(DEFAULT_IMAGE_MODEL)
    }

    pub fn effective_speech_model(&self) -> &str {
        self.speech_model.as_deref().unwrap_or(DEFAULT_SPEECH_MODEL)
    }

    pub fn effective_tts_voice(&self) -> &str {
        self.tts_voice.as_deref().unwrap_or(DEFAULT_TTS_VOICE)
    }

    pub fn effective_tts_format(&self) -> &str {
        self.tts_format.as_deref().unwrap_or(DEFAULT_TTS_FORMAT)
    }

    pub fn effective_tts_instructions(&self) -> Option<&str> {
        self.tts_instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn markdown_enabled(&self) -> bool {
        self.markdown.unwrap_or(true)
    }

    pub fn syntax_enabled(&self) -> bool {
        self.syntax.unwrap_or(true)
    }

    /// The configured player, or the first known player found on `PATH`.
    pub fn resolve_audio_player(&self) -> Vec<String> {
        self.resolve_audio_player_with(which)
    }

    pub(crate) fn resolve_audio_player_with<F>(&self, exists: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        if let Some(command) = self.audio_player.as_ref().filter(|c| !c.is_empty()) {
            return command.clone();
        }
        PLAYER_CANDIDATES
            .iter()
            .find(|candidate| exists(candidate[0]))
            .map(|candidate| candidate.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default()
    }
}

fn which(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file() || (cfg!(windows) && candidate.with_extension("exe").is_file())
    })
}
