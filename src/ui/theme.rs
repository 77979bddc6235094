use ratatui::style::{Color, Modifier, Style};

use crate::ui::notifications::NotificationKind;

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    // Overall background color to paint the full frame
    pub background_color: Color,

    // Transcript
    pub user_prefix_style: Style,
    pub user_text_style: Style,
    pub assistant_text_style: Style,
    pub streaming_text_style: Style,
    pub attachment_style: Style,
    pub selection_marker_style: Style,

    // Affordance bar
    pub affordance_style: Style,
    pub affordance_active_style: Style,

    // Chrome
    pub title_style: Style,
    pub capability_on_style: Style,
    pub capability_off_style: Style,
    pub streaming_indicator_style: Style,
    pub input_border_style: Style,
    pub input_title_style: Style,
    pub input_text_style: Style,
    pub sidebar_border_style: Style,
    pub sidebar_item_style: Style,
    pub sidebar_active_style: Style,
    pub sidebar_empty_style: Style,
    pub dialog_border_style: Style,
    pub welcome_title_style: Style,
    pub welcome_prompt_style: Style,

    // Markdown
    pub md_codeblock_bg: Option<Color>,
    pub md_inline_code: Style,
    pub md_link: Style,
    pub md_blockquote: Style,
    pub md_list_marker: Style,
    pub md_rule: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark_default()
    }
}

impl Theme {
    pub fn dark_default() -> Self {
        Theme {
            background_color: Color::Reset,

            user_prefix_style: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            user_text_style: Style::default().fg(Color::Cyan),
            assistant_text_style: Style::default().fg(Color::White),
            streaming_text_style: Style::default().fg(Color::Gray),
            attachment_style: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            selection_marker_style: Style::default().fg(Color::Yellow),

            affordance_style: Style::default().fg(Color::DarkGray),
            affordance_active_style: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),

            title_style: Style::default().fg(Color::Gray),
            capability_on_style: Style::default().fg(Color::Green),
            capability_off_style: Style::default().fg(Color::DarkGray),
            streaming_indicator_style: Style::default().fg(Color::White),
            input_border_style: Style::default().fg(Color::Gray),
            input_title_style: Style::default().fg(Color::Gray),
            input_text_style: Style::default().fg(Color::White),
            sidebar_border_style: Style::default().fg(Color::DarkGray),
            sidebar_item_style: Style::default().fg(Color::Gray),
            sidebar_active_style: Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            sidebar_empty_style: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            dialog_border_style: Style::default().fg(Color::Yellow),
            welcome_title_style: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            welcome_prompt_style: Style::default().fg(Color::Gray),

            md_codeblock_bg: Some(Color::Rgb(30, 30, 36)),
            md_inline_code: Style::default().fg(Color::LightYellow),
            md_link: Style::default()
                .fg(Color::LightBlue)
                .add_modifier(Modifier::UNDERLINED),
            md_blockquote: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
            md_list_marker: Style::default().fg(Color::Cyan),
            md_rule: Style::default().fg(Color::DarkGray),
        }
    }

    pub fn md_heading_style(&self, level: u8) -> Style {
        let base = self.assistant_text_style.add_modifier(Modifier::BOLD);
        match level {
            1 => base.fg(Color::LightCyan).add_modifier(Modifier::UNDERLINED),
            2 => base.fg(Color::LightCyan),
            _ => base,
        }
    }

    pub fn md_codeblock_text_style(&self) -> Style {
        let style = Style::default().fg(Color::Gray);
        match self.md_codeblock_bg {
            Some(bg) => style.bg(bg),
            None => style,
        }
    }

    pub fn notification_style(&self, kind: NotificationKind) -> Style {
        let color = match kind {
            NotificationKind::Info => Color::Cyan,
            NotificationKind::Success => Color::Green,
            NotificationKind::Warning => Color::Yellow,
            NotificationKind::Error => Color::Red,
        };
        Style::default().fg(color)
    }
}
