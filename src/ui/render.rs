//! Turning raw model text into something the transcript can draw.
//!
//! Streaming and final rendering are deliberately different: while a
//! response streams in, each increment is only escaped and appended, so
//! half-open markdown constructs never flicker through intermediate layouts.
//! Once the response completes, the whole text is parsed as markdown in one
//! pass.

use ratatui::text::Line;

use crate::ui::markdown::{push_visible, render_markdown};
use crate::ui::theme::Theme;

/// Fully structured output of a final parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedMarkup {
    pub lines: Vec<Line<'static>>,
}

impl RenderedMarkup {
    pub fn plain(text: &str) -> Self {
        Self {
            lines: text.lines().map(|l| Line::raw(l.to_string())).collect(),
        }
    }

    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

pub trait ContentRenderer {
    /// Neutralizes one raw increment for incremental display. Must not
    /// interpret markup: the result is shown verbatim.
    fn escape_for_streaming(&self, text: &str) -> String;

    /// Parses the complete raw text of a response into its final form.
    fn parse_to_final_markup(&self, raw: &str) -> RenderedMarkup;
}

#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    theme: Theme,
    markdown_enabled: bool,
    syntax_enabled: bool,
}

impl MarkdownRenderer {
    pub fn new(theme: Theme, syntax_enabled: bool) -> Self {
        Self {
            theme,
            markdown_enabled: true,
            syntax_enabled,
        }
    }

    /// Renders final text without markdown interpretation, still escaped.
    pub fn with_markdown(mut self, enabled: bool) -> Self {
        self.markdown_enabled = enabled;
        self
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }
}

impl ContentRenderer for MarkdownRenderer {
    fn escape_for_streaming(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch == '\r' {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
                continue;
            }
            push_visible(&mut out, ch);
        }
        out
    }

    fn parse_to_final_markup(&self, raw: &str) -> RenderedMarkup {
        if !self.markdown_enabled {
            let escaped = self.escape_for_streaming(raw);
            return RenderedMarkup::plain(&escaped);
        }
        RenderedMarkup {
            lines: render_markdown(raw, &self.theme, self.syntax_enabled),
        }
    }
}
