use ratatui::style::{Modifier, Style};
use tui_textarea::{CursorMove, TextArea};

use crate::core::attachments::{AttachmentKind, PendingAttachments};
use crate::core::config::Config;
use crate::ui::dialog::ConfirmDialog;
use crate::ui::notifications::NotificationCenter;
use crate::ui::personas::PersonaPicker;
use crate::ui::render::MarkdownRenderer;
use crate::ui::settings::SettingsForm;
use crate::ui::sidebar::SidebarState;
use crate::ui::theme::Theme;
use crate::ui::transcript::Transcript;

/// Current UI interaction mode.
#[derive(Debug, Clone)]
pub enum UiMode {
    /// Composing a message in the input area.
    Typing,

    /// Reading a path for an attachment; `path` is what has been typed so
    /// far.
    FilePrompt { kind: AttachmentKind, path: String },

    Settings(SettingsForm),

    Confirm(ConfirmDialog),

    PersonaPicker(PersonaPicker),
}

/// Which pane receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiFocus {
    Input,
    Sidebar,
}

pub struct UiState {
    pub transcript: Transcript,
    pub renderer: MarkdownRenderer,
    pub theme: Theme,
    textarea: TextArea<'static>,
    pub mode: UiMode,
    pub focus: UiFocus,
    pub notifications: NotificationCenter,
    pub sidebar: SidebarState,
    pub attachments: PendingAttachments,
    pub web_search: bool,
    pub image_generation: bool,
    pub exit_requested: bool,
}

impl UiState {
    pub fn from_config(theme: Theme, config: &Config) -> Self {
        let renderer = MarkdownRenderer::new(theme.clone(), config.syntax_enabled())
            .with_markdown(config.markdown_enabled());
        let mut ui = Self {
            transcript: Transcript::new(),
            renderer,
            theme,
            textarea: TextArea::default(),
            mode: UiMode::Typing,
            focus: UiFocus::Input,
            notifications: NotificationCenter::new(),
            sidebar: SidebarState::new(),
            attachments: PendingAttachments::new(),
            web_search: false,
            image_generation: false,
            exit_requested: false,
        };
        ui.configure_textarea();
        ui
    }

    pub(crate) fn configure_textarea(&mut self) {
        let textarea_style = self
            .theme
            .input_text_style
            .patch(Style::default().bg(self.theme.background_color));
        self.textarea.set_style(textarea_style);
        self.textarea
            .set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));
        self.textarea.set_cursor_line_style(Style::default());
    }

    pub fn textarea(&self) -> &TextArea<'static> {
        &self.textarea
    }

    pub fn input_text(&self) -> String {
        self.textarea.lines().join("\n")
    }

    pub fn input_is_empty(&self) -> bool {
        self.textarea.lines().iter().all(|line| line.is_empty())
    }

    pub fn input_line_count(&self) -> u16 {
        self.textarea.lines().len().max(1) as u16
    }

    pub fn set_input_text(&mut self, text: &str) {
        let lines: Vec<String> = if text.is_empty() {
            Vec::new()
        } else {
            text.split('\n').map(str::to_string).collect()
        };
        self.textarea = TextArea::from(lines);
        self.textarea.move_cursor(CursorMove::Bottom);
        self.textarea.move_cursor(CursorMove::End);
        self.configure_textarea();
    }

    pub fn clear_input(&mut self) {
        self.set_input_text("");
    }

    pub fn apply_textarea_edit<F>(&mut self, f: F)
    where
        F: FnOnce(&mut TextArea<'static>),
    {
        f(&mut self.textarea);
    }

    pub fn is_typing(&self) -> bool {
        matches!(self.mode, UiMode::Typing)
    }

    pub fn has_overlay(&self) -> bool {
        matches!(
            self.mode,
            UiMode::Settings(_) | UiMode::Confirm(_) | UiMode::PersonaPicker(_)
        )
    }

    /// Sidebar focus only makes sense while it is shown.
    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            UiFocus::Input if self.sidebar.visible => UiFocus::Sidebar,
            _ => UiFocus::Input,
        };
    }
}
