//! Text-to-speech for the Listen affordance and `murmur say`.

use std::fmt;

use async_trait::async_trait;

use crate::api::SpeechRequest;
use crate::core::dispatch::format_api_error;
use crate::utils::url::api_url;

#[derive(Debug)]
pub enum SpeechError {
    EmptyInput,
    Http(reqwest::Error),
    Api { status: u16, body: String },
}

impl fmt::Display for SpeechError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechError::EmptyInput => f.write_str("Nothing to read aloud"),
            SpeechError::Http(err) => write!(f, "Speech request failed: {err}"),
            SpeechError::Api { status, body } => {
                let formatted = format_api_error(body);
                let headline = crate::core::dispatch::error_headline(&formatted);
                write!(f, "Speech request failed ({status}): {headline}")
            }
        }
    }
}

impl std::error::Error for SpeechError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SpeechError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        SpeechError::Http(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSettings {
    pub model: String,
    pub voice: String,
    pub format: String,
    pub instructions: Option<String>,
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> Result<Vec<u8>, SpeechError>;
}

pub struct OpenAiSpeech {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiSpeech {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

pub fn speech_request(text: &str, voice: &VoiceSettings) -> Result<SpeechRequest, SpeechError> {
    let input = text.trim();
    if input.is_empty() {
        return Err(SpeechError::EmptyInput);
    }
    Ok(SpeechRequest {
        model: voice.model.clone(),
        input: input.to_string(),
        voice: voice.voice.clone(),
        response_format: voice.format.clone(),
        instructions: voice.instructions.clone(),
    })
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str, voice: &VoiceSettings) -> Result<Vec<u8>, SpeechError> {
        let request = speech_request(text, voice)?;
        let response = self
            .client
            .post(api_url(&self.base_url, "audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(SpeechError::Api { status, body });
        }

        Ok(response.bytes().await?.to_vec())
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::FakeSpeech;
    use super::*;

    fn voice() -> VoiceSettings {
        VoiceSettings {
            model: "gpt-4o-mini-tts".into(),
            voice: "onyx".into(),
            format: "mp3".into(),
            instructions: Some("Speak slowly.".into()),
        }
    }

    #[test]
    fn request_carries_voice_settings() {
        let request = speech_request("  Hello there \n", &voice()).unwrap();
        assert_eq!(request.input, "Hello there");
        assert_eq!(request.voice, "onyx");
        assert_eq!(request.response_format, "mp3");
        assert_eq!(request.instructions.as_deref(), Some("Speak slowly."));
    }

    #[test]
    fn empty_text_is_rejected_before_any_request() {
        assert!(matches!(
            speech_request(" \n\t", &voice()),
            Err(SpeechError::EmptyInput)
        ));
    }

    #[test]
    fn api_errors_show_the_provider_summary() {
        let err = SpeechError::Api {
            status: 429,
            body: r#"{"error":{"message":"rate limited"}}"#.into(),
        };
        assert_eq!(
            err.to_string(),
            "Speech request failed (429): API Error: rate limited"
        );
    }

    #[tokio::test]
    async fn fake_synthesizer_records_requests() {
        let fake = FakeSpeech::default();
        let audio = fake.synthesize("read me", &voice()).await.unwrap();
        assert!(!audio.is_empty());
        assert_eq!(fake.requests.lock().unwrap().as_slice(), ["read me"]);

        let failing = FakeSpeech {
            fail: true,
            ..Default::default()
        };
        assert!(failing.synthesize("x", &voice()).await.is_err());
    }
}
