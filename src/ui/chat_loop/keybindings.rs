//! Maps terminal key and mouse events to app actions.
//!
//! Resolution depends only on a small [`KeyContext`] snapshot of the app, so
//! the table can be tested without a terminal or a running loop.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::core::app::{App, AppAction, FieldEdit, UiFocus, UiMode};
use crate::core::attachments::AttachmentKind;
use crate::ui::layout::ScreenLayout;

const MOUSE_SCROLL_LINES: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Typing,
    FilePrompt,
    Settings,
    Confirm,
    PersonaPicker,
}

/// What the key table needs to know about the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyContext {
    pub mode: KeyMode,
    pub focus: UiFocus,
    pub streaming: bool,
    pub has_notification: bool,
    pub page_height: u16,
}

impl KeyContext {
    pub fn from_app(app: &App, term_width: u16, term_height: u16) -> Self {
        let mode = match app.ui.mode {
            UiMode::Typing => KeyMode::Typing,
            UiMode::FilePrompt { .. } => KeyMode::FilePrompt,
            UiMode::Settings(_) => KeyMode::Settings,
            UiMode::Confirm(_) => KeyMode::Confirm,
            UiMode::PersonaPicker(_) => KeyMode::PersonaPicker,
        };
        let (_, page_height) = ScreenLayout::transcript_size(
            term_width,
            term_height,
            app.ui.sidebar.visible,
            app.ui.input_line_count(),
        );
        Self {
            mode,
            focus: app.ui.focus,
            streaming: app.session.controller.is_streaming(),
            has_notification: !app.ui.notifications.is_empty(),
            page_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult {
    Action(AppAction),
    /// Hand the key to the input textarea.
    TextInput,
    NotHandled,
}

pub fn map_key(ctx: &KeyContext, key: &KeyEvent) -> KeyResult {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('c')) {
        return KeyResult::Action(AppAction::Quit);
    }

    match ctx.mode {
        KeyMode::Confirm => map_confirm_key(key),
        KeyMode::PersonaPicker => map_picker_key(key),
        KeyMode::Settings => map_field_key(key, |edit| AppAction::EditSettings { edit })
            .unwrap_or_else(|| match key.code {
                KeyCode::Enter => KeyResult::Action(AppAction::SubmitSettings),
                KeyCode::Esc => KeyResult::Action(AppAction::CancelOverlay),
                _ => KeyResult::NotHandled,
            }),
        KeyMode::FilePrompt => map_field_key(key, |edit| AppAction::EditFilePrompt { edit })
            .unwrap_or_else(|| match key.code {
                KeyCode::Enter => KeyResult::Action(AppAction::CompleteFilePrompt),
                KeyCode::Esc => KeyResult::Action(AppAction::CancelOverlay),
                _ => KeyResult::NotHandled,
            }),
        KeyMode::Typing => {
            if let Some(action) = map_global_key(ctx, key) {
                return KeyResult::Action(action);
            }
            match ctx.focus {
                UiFocus::Sidebar => map_sidebar_key(key),
                UiFocus::Input => map_input_key(key),
            }
        }
    }
}

fn map_confirm_key(key: &KeyEvent) -> KeyResult {
    let action = match key.code {
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Left | KeyCode::Right => {
            AppAction::ToggleDialogFocus
        }
        KeyCode::Enter => AppAction::ConfirmDialog,
        KeyCode::Esc => AppAction::CancelOverlay,
        _ => return KeyResult::NotHandled,
    };
    KeyResult::Action(action)
}

fn map_picker_key(key: &KeyEvent) -> KeyResult {
    let action = match key.code {
        KeyCode::Up | KeyCode::Char('k') => AppAction::PersonaPickerUp,
        KeyCode::Down | KeyCode::Char('j') => AppAction::PersonaPickerDown,
        KeyCode::Enter => AppAction::ConfirmPersona,
        KeyCode::Esc => AppAction::CancelOverlay,
        _ => return KeyResult::NotHandled,
    };
    KeyResult::Action(action)
}

/// Editing keys shared by the modal text fields.
fn map_field_key(key: &KeyEvent, wrap: impl Fn(FieldEdit) -> AppAction) -> Option<KeyResult> {
    let edit = match key.code {
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => FieldEdit::Char(ch),
        KeyCode::Backspace => FieldEdit::Backspace,
        KeyCode::Tab | KeyCode::Down => FieldEdit::Next,
        KeyCode::BackTab | KeyCode::Up => FieldEdit::Previous,
        _ => return None,
    };
    Some(KeyResult::Action(wrap(edit)))
}

/// Shortcuts available in the main view regardless of focus.
fn map_global_key(ctx: &KeyContext, key: &KeyEvent) -> Option<AppAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);
    let page = i32::from(ctx.page_height.max(1));

    let action = match key.code {
        KeyCode::Esc if ctx.streaming => AppAction::CancelStreaming,
        KeyCode::Esc if ctx.has_notification => AppAction::DismissNotification,
        KeyCode::Tab => AppAction::ToggleFocus,
        KeyCode::PageUp => AppAction::ScrollTranscript { lines: -page },
        KeyCode::PageDown => AppAction::ScrollTranscript { lines: page },
        KeyCode::Up if alt => AppAction::SelectPreviousResponse,
        KeyCode::Down if alt => AppAction::SelectNextResponse,
        KeyCode::Char(ch) if ctrl => match ch.to_ascii_lowercase() {
            'y' => AppAction::CopyResponse,
            'r' => AppAction::RegenerateResponse,
            'p' => AppAction::ListenResponse,
            'n' => AppAction::NewChat,
            's' => AppAction::OpenSettings,
            'e' => AppAction::OpenPersonaPicker,
            'o' => AppAction::OpenFilePrompt {
                kind: AttachmentKind::File,
            },
            'i' => AppAction::OpenFilePrompt {
                kind: AttachmentKind::Image,
            },
            'w' => AppAction::ToggleWebSearch,
            'g' => AppAction::ToggleImageGeneration,
            'l' => AppAction::ToggleTranscriptLog,
            'b' => AppAction::ToggleSidebar,
            'x' => AppAction::ClearAttachments,
            _ => return None,
        },
        _ => return None,
    };
    Some(action)
}

fn map_sidebar_key(key: &KeyEvent) -> KeyResult {
    let action = match key.code {
        KeyCode::Up | KeyCode::Char('k') => AppAction::SidebarMoveUp,
        KeyCode::Down | KeyCode::Char('j') => AppAction::SidebarMoveDown,
        KeyCode::Enter => AppAction::LoadSelectedChat,
        KeyCode::Char('d') | KeyCode::Delete => AppAction::RequestDeleteChat,
        KeyCode::Char('n') => AppAction::NewChat,
        KeyCode::Esc => AppAction::ToggleFocus,
        _ => return KeyResult::NotHandled,
    };
    KeyResult::Action(action)
}

fn map_input_key(key: &KeyEvent) -> KeyResult {
    let newline = key
        .modifiers
        .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT);
    match key.code {
        KeyCode::Enter if newline => KeyResult::TextInput,
        KeyCode::Enter => KeyResult::Action(AppAction::SubmitMessage),
        KeyCode::Char(number @ '1'..='9') if key.modifiers.is_empty() => {
            KeyResult::Action(AppAction::UseExamplePrompt { number })
        }
        KeyCode::Esc => KeyResult::NotHandled,
        _ if key.modifiers.contains(KeyModifiers::CONTROL) => KeyResult::NotHandled,
        _ => KeyResult::TextInput,
    }
}

pub fn map_mouse(event: &MouseEvent) -> Option<AppAction> {
    match event.kind {
        MouseEventKind::ScrollUp => Some(AppAction::ScrollTranscript {
            lines: -MOUSE_SCROLL_LINES,
        }),
        MouseEventKind::ScrollDown => Some(AppAction::ScrollTranscript {
            lines: MOUSE_SCROLL_LINES,
        }),
        _ => None,
    }
}

/// Normalizes pasted text: unified newlines, tabs as spaces, and no control
/// characters.
pub(crate) fn sanitize_pasted_text(text: &str) -> String {
    let without_crlf = text.replace("\r\n", "\n");
    let without_cr = without_crlf.replace('\r', "\n");
    let expanded_tabs = without_cr.replace('\t', "    ");
    expanded_tabs
        .chars()
        .filter(|&c| c == '\n' || !c.is_control())
        .collect()
}
