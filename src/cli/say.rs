//! TUI-less "say" command: one prompt, the answer on stdout, and optionally
//! the answer read aloud.

use std::error::Error;
use std::io::{self, Write};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::ChatMessage;
use crate::core::affordances::{AudioPlayer, PlaybackEvent, ProcessPlayer};
use crate::core::config::data::Config;
use crate::core::dispatch::{
    error_headline, DispatchMode, DispatchOutcome, DispatchParams, RequestDispatcher,
    StreamMessage,
};
use crate::core::capabilities::ModelCatalog;
use crate::core::keyring::ApiKeyStore;
use crate::core::message::MessageRecord;
use crate::core::persona::PersonaManager;
use crate::core::providers::{ProviderCatalog, ProviderProfile, DEFAULT_PROVIDER};
use crate::core::speech::{OpenAiSpeech, SpeechSynthesizer, VoiceSettings};

pub async fn run_say(
    prompt: Vec<String>,
    model: Option<String>,
    listen: bool,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("Usage: murmur say <prompt>".into());
    }

    let config = Config::load()?;
    let personas = PersonaManager::from_config(&config);
    let model = model
        .or_else(|| personas.active().and_then(|p| p.model.clone()))
        .unwrap_or_else(|| config.effective_default_model().to_string());
    let catalog = ModelCatalog::new(&config.models);
    let providers = ProviderCatalog::new(&config);
    let provider = providers.find_or_default(catalog.provider_for(&model));
    let store = ApiKeyStore::default();
    let Some((api_key, source)) = store.resolve(&provider)? else {
        return Err(missing_key_hint(&provider).into());
    };
    debug!(provider = %provider.id, %source, "api key resolved");

    let client = reqwest::Client::new();
    let system = personas.system_prompt().map(ChatMessage::system);
    let messages = system
        .into_iter()
        .chain([ChatMessage::from_record(&MessageRecord::user(prompt))])
        .collect();

    let (dispatcher, mut rx) = RequestDispatcher::new();
    dispatcher.dispatch(DispatchParams {
        client: client.clone(),
        base_url: provider.base_url.clone(),
        api_key,
        model: model.clone(),
        messages,
        mode: DispatchMode::Chat {
            web_search: false,
            stream: catalog.resolve(&model).supports_streaming,
        },
        cancel_token: CancellationToken::new(),
        stream_id: 0,
    });

    let mut full_response = String::new();
    while let Some((message, _)) = rx.recv().await {
        match message {
            StreamMessage::Chunk(content) => {
                full_response.push_str(&content);
                print!("{content}");
                io::stdout().flush()?;
            }
            StreamMessage::Complete(DispatchOutcome::Complete(content)) => {
                print!("{content}");
                full_response.push_str(&content);
            }
            StreamMessage::Complete(DispatchOutcome::Image { url, .. }) => {
                print!("{url}");
            }
            StreamMessage::Error(err) => {
                println!();
                return Err(error_headline(&err).to_string().into());
            }
            StreamMessage::End => break,
        }
    }
    println!();

    if listen && !full_response.trim().is_empty() {
        let voice = VoiceSettings {
            model: config.effective_speech_model().to_string(),
            voice: config.effective_tts_voice().to_string(),
            format: config.effective_tts_format().to_string(),
            instructions: config.effective_tts_instructions().map(str::to_string),
        };
        let speech = providers.find_or_default(DEFAULT_PROVIDER);
        let Some((speech_key, _)) = store.resolve(&speech)? else {
            return Err(missing_key_hint(&speech).into());
        };
        let audio = OpenAiSpeech::new(client, speech.base_url, speech_key)
            .synthesize(&full_response, &voice)
            .await?;
        play_to_end(config.resolve_audio_player(), audio, &voice.format).await?;
    }

    Ok(())
}

fn missing_key_hint(provider: &ProviderProfile) -> String {
    let mut hint = format!(
        "No {} API key found. Run 'murmur key set --provider {}'",
        provider.display_name, provider.id
    );
    match provider.env_vars.first() {
        Some(var) => hint.push_str(&format!(" or export {var}.")),
        None => hint.push('.'),
    }
    hint
}

/// Plays `audio` and waits until the player exits.
async fn play_to_end(
    command: Vec<String>,
    audio: Vec<u8>,
    format: &str,
) -> Result<(), Box<dyn Error>> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let player = ProcessPlayer::new(command, events_tx);
    let _stream = player.start(0, audio, format)?;
    match events_rx.recv().await {
        Some(PlaybackEvent::Failed { error, .. }) => Err(error.into()),
        Some(PlaybackEvent::Finished { .. }) | None => Ok(()),
    }
}
