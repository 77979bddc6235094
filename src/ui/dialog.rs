//! Modal yes/no confirmation.

use ratatui::layout::{Alignment, Rect};
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::ui::layout::centered_rect;
use crate::ui::theme::Theme;

/// What confirming the dialog does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteChat { id: String, title: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmDialog {
    pub title: String,
    pub message: String,
    pub action: ConfirmAction,
    /// Which button has focus. Cancel is focused first.
    pub confirm_focused: bool,
}

impl ConfirmDialog {
    pub fn delete_chat(id: &str, title: &str) -> Self {
        Self {
            title: "Delete chat".to_string(),
            message: format!("Are you sure you want to delete the chat \"{title}\"?"),
            action: ConfirmAction::DeleteChat {
                id: id.to_string(),
                title: title.to_string(),
            },
            confirm_focused: false,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.confirm_focused = !self.confirm_focused;
    }
}

pub fn render_dialog(f: &mut Frame, area: Rect, dialog: &ConfirmDialog, theme: &Theme) {
    let rect = centered_rect(area, 56, 7);
    let button = |label: &str, focused: bool| {
        let style = if focused {
            theme.affordance_active_style.add_modifier(Modifier::REVERSED)
        } else {
            theme.affordance_style
        };
        Span::styled(format!(" {label} "), style)
    };
    let body = vec![
        Line::from(dialog.message.as_str()),
        Line::default(),
        Line::from(vec![
            button("Cancel", !dialog.confirm_focused),
            Span::raw("   "),
            button("OK", dialog.confirm_focused),
        ])
        .alignment(Alignment::Center),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.dialog_border_style)
        .title(Span::styled(dialog.title.as_str(), theme.dialog_border_style));
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(body).block(block).wrap(Wrap { trim: true }),
        rect,
    );
}
