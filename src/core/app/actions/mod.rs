mod affordances;
mod chats;
mod input;
mod personas;
mod streaming;

use tokio::sync::mpsc;

use super::App;
use crate::core::attachments::AttachmentKind;
use crate::core::dispatch::{DispatchOutcome, DispatchParams};
use crate::core::speech::VoiceSettings;
use crate::ui::notifications::NotificationKind;

/// One keystroke's worth of editing inside a modal text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    Char(char),
    Paste(String),
    Backspace,
    Next,
    Previous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    AppendResponseChunk {
        content: String,
        stream_id: u64,
    },
    ResponseReceived {
        outcome: DispatchOutcome,
        stream_id: u64,
    },
    StreamErrored {
        message: String,
        stream_id: u64,
    },
    StreamCompleted {
        stream_id: u64,
    },
    CancelStreaming,
    SubmitMessage,
    RegenerateResponse,
    CopyResponse,
    ListenResponse,
    SelectPreviousResponse,
    SelectNextResponse,
    SpeechReady {
        request_id: u64,
        audio: Vec<u8>,
    },
    SpeechFailed {
        request_id: u64,
        error: String,
    },
    PlaybackFinished {
        playback_id: u64,
    },
    PlaybackFailed {
        playback_id: u64,
        error: String,
    },
    Notify {
        kind: NotificationKind,
        message: String,
    },
    DismissNotification,
    ExpireNotifications,
    InsertIntoInput {
        text: String,
    },
    UseExamplePrompt {
        number: char,
    },
    ScrollTranscript {
        lines: i32,
    },
    ToggleWebSearch,
    ToggleImageGeneration,
    ToggleTranscriptLog,
    ToggleSidebar,
    ToggleFocus,
    OpenFilePrompt {
        kind: AttachmentKind,
    },
    EditFilePrompt {
        edit: FieldEdit,
    },
    CompleteFilePrompt,
    ClearAttachments,
    OpenSettings,
    EditSettings {
        edit: FieldEdit,
    },
    SubmitSettings,
    CancelOverlay,
    Quit,
    NewChat,
    LoadChat {
        id: String,
    },
    LoadSelectedChat,
    SidebarMoveUp,
    SidebarMoveDown,
    RequestDeleteChat,
    ToggleDialogFocus,
    ConfirmDialog,
    OpenPersonaPicker,
    PersonaPickerUp,
    PersonaPickerDown,
    ConfirmPersona,
    /// `None` switches personas off.
    ActivatePersona {
        id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppActionContext {
    pub term_width: u16,
    pub term_height: u16,
}

pub struct AppActionEnvelope {
    pub action: AppAction,
    pub context: AppActionContext,
}

#[derive(Clone)]
pub struct AppActionDispatcher {
    tx: mpsc::UnboundedSender<AppActionEnvelope>,
}

impl AppActionDispatcher {
    pub fn new(tx: mpsc::UnboundedSender<AppActionEnvelope>) -> Self {
        Self { tx }
    }

    pub fn dispatch_many<I>(&self, actions: I, ctx: AppActionContext)
    where
        I: IntoIterator<Item = AppAction>,
    {
        for action in actions.into_iter() {
            let _ = self.tx.send(AppActionEnvelope {
                action,
                context: ctx,
            });
        }
    }
}

/// A speech request for the event loop to run off the UI task.
#[derive(Clone)]
pub struct SpeechJob {
    pub request_id: u64,
    pub text: String,
    pub voice: VoiceSettings,
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
}

pub enum AppCommand {
    SpawnStream(DispatchParams),
    SynthesizeSpeech(SpeechJob),
    CopyToClipboard(String),
}

pub fn apply_actions(
    app: &mut App,
    envelopes: impl IntoIterator<Item = AppActionEnvelope>,
) -> Vec<AppCommand> {
    let mut commands = Vec::new();
    for envelope in envelopes {
        if let Some(cmd) = apply_action(app, envelope.action, envelope.context) {
            commands.push(cmd);
        }
    }
    commands
}

pub fn apply_action(app: &mut App, action: AppAction, ctx: AppActionContext) -> Option<AppCommand> {
    match action {
        AppAction::AppendResponseChunk { .. }
        | AppAction::ResponseReceived { .. }
        | AppAction::StreamErrored { .. }
        | AppAction::StreamCompleted { .. }
        | AppAction::CancelStreaming
        | AppAction::SubmitMessage
        | AppAction::RegenerateResponse => streaming::handle_streaming_action(app, action, ctx),

        AppAction::CopyResponse
        | AppAction::ListenResponse
        | AppAction::SelectPreviousResponse
        | AppAction::SelectNextResponse
        | AppAction::SpeechReady { .. }
        | AppAction::SpeechFailed { .. }
        | AppAction::PlaybackFinished { .. }
        | AppAction::PlaybackFailed { .. } => {
            affordances::handle_affordance_action(app, action, ctx)
        }

        AppAction::Notify { .. }
        | AppAction::DismissNotification
        | AppAction::ExpireNotifications
        | AppAction::InsertIntoInput { .. }
        | AppAction::UseExamplePrompt { .. }
        | AppAction::ScrollTranscript { .. }
        | AppAction::ToggleWebSearch
        | AppAction::ToggleImageGeneration
        | AppAction::ToggleTranscriptLog
        | AppAction::ToggleSidebar
        | AppAction::ToggleFocus
        | AppAction::OpenFilePrompt { .. }
        | AppAction::EditFilePrompt { .. }
        | AppAction::CompleteFilePrompt
        | AppAction::ClearAttachments
        | AppAction::OpenSettings
        | AppAction::EditSettings { .. }
        | AppAction::SubmitSettings
        | AppAction::CancelOverlay
        | AppAction::Quit => input::handle_input_action(app, action, ctx),

        AppAction::NewChat
        | AppAction::LoadChat { .. }
        | AppAction::LoadSelectedChat
        | AppAction::SidebarMoveUp
        | AppAction::SidebarMoveDown
        | AppAction::RequestDeleteChat
        | AppAction::ToggleDialogFocus
        | AppAction::ConfirmDialog => chats::handle_chat_action(app, action, ctx),

        AppAction::OpenPersonaPicker
        | AppAction::PersonaPickerUp
        | AppAction::PersonaPickerDown
        | AppAction::ConfirmPersona
        | AppAction::ActivatePersona { .. } => personas::handle_persona_action(app, action, ctx),
    }
}
