use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::affordances::{AudioPlayer, ListenState, PlaybackCoordinator};
use crate::core::config::Config;
use crate::core::history::HistoryStore;
use crate::core::keyring::ApiKeyStore;
use crate::core::sessions::ChatSessionStore;
use crate::ui::layout::ScreenLayout;
use crate::ui::notifications::NotificationKind;
use crate::ui::sidebar::ChatListItem;
use crate::ui::theme::Theme;
use crate::ui::transcript::EntryId;
use crate::utils::logging::TranscriptLog;

pub mod actions;
pub mod session;
pub mod ui_state;

pub use actions::{
    apply_action, apply_actions, AppAction, AppActionContext, AppActionDispatcher,
    AppActionEnvelope, AppCommand, FieldEdit, SpeechJob,
};
pub use session::SessionContext;
pub use ui_state::{UiFocus, UiMode, UiState};

const MIN_TRANSCRIPT_WIDTH: u16 = 10;
const MIN_TRANSCRIPT_HEIGHT: u16 = 3;

/// Startup parameters gathered by the CLI.
pub struct AppInitConfig {
    pub model: Option<String>,
    pub transcript_file: Option<PathBuf>,
    /// Resolved keys by provider id
    pub api_keys: HashMap<String, String>,
    pub key_store: ApiKeyStore,
    pub chats: Option<ChatSessionStore>,
    pub player: Arc<dyn AudioPlayer>,
}

pub struct App {
    pub session: SessionContext,
    pub ui: UiState,
    pub playback: PlaybackCoordinator,
    pub chats: Option<ChatSessionStore>,
}

impl App {
    pub fn new(init: AppInitConfig, config: &Config) -> Self {
        let session = SessionContext::from_config(
            config,
            init.model,
            init.api_keys,
            init.key_store,
            TranscriptLog::new(init.transcript_file),
        );
        let mut app = App {
            session,
            ui: UiState::from_config(Theme::default(), config),
            playback: PlaybackCoordinator::new(init.player),
            chats: init.chats,
        };
        app.refresh_sidebar();
        app
    }

    pub fn is_current_stream(&self, stream_id: u64) -> bool {
        stream_id == self.session.current_stream_id
    }

    pub fn notify(&mut self, kind: NotificationKind, message: impl Into<String>) {
        self.ui.notifications.push(kind, message);
    }

    pub fn notify_for(&mut self, kind: NotificationKind, message: impl Into<String>, lifetime: Duration) {
        self.ui.notifications.push_for(kind, message, lifetime);
    }

    pub fn listen_state(&self, entry: EntryId) -> ListenState {
        self.playback.listen_state(entry)
    }

    /// Reloads the chat list from disk.
    pub fn refresh_sidebar(&mut self) {
        let Some(store) = &self.chats else {
            return;
        };
        match store.list() {
            Ok(sessions) => {
                let items = sessions.iter().map(ChatListItem::from).collect();
                self.ui.sidebar.set_items(items);
            }
            Err(err) => tracing::warn!(error = %err, "could not list saved chats"),
        }
    }

    /// Writes the active chat to disk if it has anything in it.
    pub fn persist_chat(&mut self) {
        if self.session.history.records().is_empty() {
            return;
        }
        let Some(chat) = self.session.sync_chat().cloned() else {
            return;
        };
        let Some(store) = &self.chats else {
            return;
        };
        if let Err(err) = store.save(&chat) {
            tracing::warn!(chat = %chat.id, error = %err, "could not save chat");
            self.notify(NotificationKind::Error, format!("Could not save chat: {err}"));
            return;
        }
        self.refresh_sidebar();
        self.ui.sidebar.select_id(&chat.id);
    }

    /// The transcript can only host a response when a few rows of it fit on
    /// screen.
    pub fn sync_terminal_size(&mut self, term_width: u16, term_height: u16) {
        let (width, height) = ScreenLayout::transcript_size(
            term_width,
            term_height,
            self.ui.sidebar.visible,
            self.ui.input_line_count(),
        );
        self.ui
            .transcript
            .set_available(width >= MIN_TRANSCRIPT_WIDTH && height >= MIN_TRANSCRIPT_HEIGHT);
    }

    /// Total wrapped transcript lines and viewport height for a terminal of
    /// the given size.
    pub fn transcript_metrics(&self, term_width: u16, term_height: u16) -> (usize, u16) {
        let (width, height) = ScreenLayout::transcript_size(
            term_width,
            term_height,
            self.ui.sidebar.visible,
            self.ui.input_line_count(),
        );
        let lines = self
            .ui
            .transcript
            .build_lines(&self.ui.theme, width, |id| self.listen_state(id));
        (lines.len(), height)
    }
}
