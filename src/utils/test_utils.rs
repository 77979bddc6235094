use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::affordances::test_support::FakePlayer;
use crate::core::app::{
    apply_action, App, AppAction, AppActionContext, AppCommand, AppInitConfig,
};
use crate::core::config::Config;
use crate::core::keyring::ApiKeyStore;
use crate::core::message::MessageRecord;
use crate::core::sessions::ChatSessionStore;

pub const TEST_MODEL: &str = "gpt-4o";

pub fn test_context() -> AppActionContext {
    AppActionContext {
        term_width: 100,
        term_height: 30,
    }
}

/// An app with a key, no keyring, no chat store, and a recording player.
pub fn create_test_app() -> App {
    create_test_app_with(FakePlayer::default(), None, None)
}

pub fn create_test_app_with(
    player: FakePlayer,
    chats: Option<ChatSessionStore>,
    transcript_file: Option<PathBuf>,
) -> App {
    let init = AppInitConfig {
        model: Some(TEST_MODEL.to_string()),
        transcript_file,
        api_keys: HashMap::from([("openai".to_string(), "test-key".to_string())]),
        key_store: ApiKeyStore::new(false),
        chats,
        player: Arc::new(player),
    };
    App::new(init, &Config::default())
}

pub fn act(app: &mut App, action: AppAction) -> Option<AppCommand> {
    apply_action(app, action, test_context())
}

/// Types `text`, submits it, and returns the id of the stream it started.
pub fn submit(app: &mut App, text: &str) -> u64 {
    app.ui.set_input_text(text);
    match act(app, AppAction::SubmitMessage) {
        Some(AppCommand::SpawnStream(params)) => params.stream_id,
        _ => panic!("submit did not start a stream"),
    }
}

/// Runs a whole text response through the action layer.
pub fn stream_response(app: &mut App, stream_id: u64, chunks: &[&str]) {
    for chunk in chunks {
        act(
            app,
            AppAction::AppendResponseChunk {
                content: chunk.to_string(),
                stream_id,
            },
        );
    }
    act(app, AppAction::StreamCompleted { stream_id });
}

/// One user turn answered with `answer`.
pub fn complete_turn(app: &mut App, prompt: &str, answer: &str) {
    let stream_id = submit(app, prompt);
    stream_response(app, stream_id, &[answer]);
}

pub fn records(app: &App) -> Vec<MessageRecord> {
    use crate::core::history::HistoryStore;
    app.session.history.records().to_vec()
}
