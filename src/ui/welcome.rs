use ratatui::layout::{Alignment, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

use crate::ui::theme::Theme;

pub const EXAMPLE_PROMPTS: [&str; 4] = [
    "Explain how rainbows form, step by step",
    "Write a short poem about a lighthouse keeper",
    "What are good habits for writing maintainable code?",
    "Plan a three-day trip to Lisbon on a budget",
];

/// The prompt bound to a number key, if any.
pub fn example_prompt(number: char) -> Option<&'static str> {
    let index = number.to_digit(10)?.checked_sub(1)? as usize;
    EXAMPLE_PROMPTS.get(index).copied()
}

pub fn render_welcome(f: &mut Frame, area: Rect, model_label: &str, theme: &Theme) {
    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled("murmur", theme.welcome_title_style)),
        Line::from(Span::styled(
            format!("Chatting with {model_label}"),
            theme.title_style,
        )),
        Line::default(),
        Line::from(Span::styled(
            "Try one of these (press its number):",
            theme.welcome_prompt_style,
        )),
        Line::default(),
    ];
    for (i, prompt) in EXAMPLE_PROMPTS.iter().enumerate() {
        lines.push(Line::from(vec![
            Span::styled(format!("{}. ", i + 1), theme.md_list_marker),
            Span::styled(*prompt, theme.welcome_prompt_style),
        ]));
    }
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        area,
    );
}
