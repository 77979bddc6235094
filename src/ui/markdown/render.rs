use super::code::{flush_code_block, language_hint, push_code_text};
use super::sanitize_inline;
use super::table::TableBuffer;
use crate::ui::theme::Theme;
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

const RULE_WIDTH: usize = 40;

#[derive(Clone, Debug)]
enum ListKind {
    Unordered,
    Ordered(u64),
}

/// Parses `content` as CommonMark (with GFM tables, task lists and
/// strikethrough) into styled, unwrapped lines.
pub fn render_markdown(content: &str, theme: &Theme, syntax_enabled: bool) -> Vec<Line<'static>> {
    MarkdownWriter::new(theme, syntax_enabled).render(content)
}

struct MarkdownWriter<'a> {
    theme: &'a Theme,
    syntax_enabled: bool,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    list_stack: Vec<ListKind>,
    list_indent_stack: Vec<usize>,
    pending_indent: Option<usize>,
    quote_depth: usize,
    code_lang: Option<String>,
    code_buffer: Vec<String>,
    table: Option<TableBuffer>,
    link_targets: Vec<String>,
}

impl<'a> MarkdownWriter<'a> {
    fn new(theme: &'a Theme, syntax_enabled: bool) -> Self {
        Self {
            theme,
            syntax_enabled,
            lines: Vec::new(),
            current: Vec::new(),
            style_stack: vec![theme.assistant_text_style],
            list_stack: Vec::new(),
            list_indent_stack: Vec::new(),
            pending_indent: None,
            quote_depth: 0,
            code_lang: None,
            code_buffer: Vec::new(),
            table: None,
            link_targets: Vec::new(),
        }
    }

    fn render(mut self, content: &str) -> Vec<Line<'static>> {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);
        let mut parser = Parser::new_ext(content, options).peekable();

        while let Some(event) = parser.next() {
            match event {
                Event::Start(tag) => self.start_tag(tag),
                Event::End(TagEnd::Paragraph) => {
                    self.flush_line();
                    let next_is_block = matches!(
                        parser.peek(),
                        Some(Event::Start(
                            Tag::Paragraph
                                | Tag::CodeBlock(_)
                                | Tag::BlockQuote(_)
                                | Tag::Heading { .. }
                        ))
                    );
                    if self.list_stack.is_empty() || next_is_block {
                        self.push_empty_line();
                    }
                }
                Event::End(tag_end) => self.end_tag(tag_end),
                Event::Text(text) => {
                    if self.code_lang.is_some() {
                        push_code_text(&mut self.code_buffer, &text);
                    } else {
                        let span = Span::styled(sanitize_inline(&text), self.current_style());
                        self.push_span(span);
                    }
                }
                Event::Code(code) => {
                    let span = Span::styled(sanitize_inline(&code), self.theme.md_inline_code);
                    self.push_span(span);
                }
                Event::SoftBreak | Event::HardBreak => {
                    self.flush_line();
                    if !self.list_stack.is_empty() {
                        self.pending_indent = Some(self.list_indent());
                    }
                }
                Event::Rule => {
                    self.flush_line();
                    self.lines.push(Line::from(Span::styled(
                        "─".repeat(RULE_WIDTH),
                        self.theme.md_rule,
                    )));
                    self.push_empty_line();
                }
                Event::TaskListMarker(checked) => {
                    let marker = if checked { "[x] " } else { "[ ] " };
                    self.push_span(Span::styled(marker, self.theme.md_list_marker));
                }
                Event::Html(html) | Event::InlineHtml(html) => {
                    // Raw HTML is shown as typed rather than interpreted.
                    let text = sanitize_inline(html.trim_end_matches('\n'));
                    if !text.is_empty() {
                        let span = Span::styled(text, self.current_style());
                        self.push_span(span);
                    }
                }
                _ => {}
            }
        }

        self.flush_line();
        while self
            .lines
            .last()
            .is_some_and(|line| line.spans.iter().all(|s| s.content.is_empty()))
        {
            self.lines.pop();
        }
        self.lines
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.pending_indent.is_none() && !self.list_stack.is_empty() {
                    self.pending_indent = Some(self.list_indent());
                }
            }
            Tag::Heading { level, .. } => {
                self.flush_line();
                self.style_stack.push(self.theme.md_heading_style(level as u8));
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth += 1;
                self.style_stack.push(self.theme.md_blockquote);
            }
            Tag::List(start) => {
                if !self.list_stack.is_empty() {
                    self.flush_line();
                }
                self.list_stack.push(match start {
                    Some(n) => ListKind::Ordered(n),
                    None => ListKind::Unordered,
                });
                self.list_indent_stack.push(0);
            }
            Tag::Item => {
                self.flush_line();
                let marker = match self.list_stack.last_mut() {
                    Some(ListKind::Ordered(n)) => {
                        let cur = *n;
                        *n += 1;
                        format!("{cur}. ")
                    }
                    _ => "- ".to_string(),
                };
                let parent_indent: usize = self
                    .list_indent_stack
                    .iter()
                    .take(self.list_indent_stack.len().saturating_sub(1))
                    .sum();
                if let Some(indent) = self.list_indent_stack.last_mut() {
                    *indent = marker.width();
                }
                self.pending_indent = Some(parent_indent);
                self.push_span(Span::styled(marker, self.theme.md_list_marker));
            }
            Tag::CodeBlock(kind) => {
                self.flush_line();
                self.code_lang = Some(language_hint(&kind));
                self.code_buffer.clear();
            }
            Tag::Emphasis => self.push_modifier(Modifier::ITALIC),
            Tag::Strong => self.push_modifier(Modifier::BOLD),
            Tag::Strikethrough => self.push_modifier(Modifier::CROSSED_OUT),
            Tag::Link { dest_url, .. } => {
                self.style_stack.push(self.theme.md_link);
                self.link_targets.push(dest_url.to_string());
            }
            Tag::Image { dest_url, .. } => {
                self.style_stack.push(self.theme.md_link);
                self.link_targets.push(dest_url.to_string());
                self.push_span(Span::styled("[image: ", self.theme.md_link));
            }
            Tag::Table(_) => {
                self.flush_line();
                self.table = Some(TableBuffer::new());
            }
            Tag::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.start_header();
                }
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.start_cell();
                }
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag_end: TagEnd) {
        match tag_end {
            TagEnd::Heading(_) => {
                self.flush_line();
                self.push_empty_line();
                self.style_stack.pop();
            }
            TagEnd::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.style_stack.pop();
            }
            TagEnd::List(_) => {
                self.flush_line();
                self.list_stack.pop();
                self.list_indent_stack.pop();
                self.pending_indent = None;
                if self.list_stack.is_empty() {
                    self.push_empty_line();
                }
            }
            TagEnd::Item => {
                self.flush_line();
                self.pending_indent = None;
            }
            TagEnd::CodeBlock => {
                let lang = self.code_lang.take().unwrap_or_default();
                let indent = self.list_indent();
                flush_code_block(
                    &mut self.code_buffer,
                    self.syntax_enabled,
                    &lang,
                    self.theme,
                    indent,
                    &mut self.lines,
                );
                self.push_empty_line();
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.style_stack.pop();
            }
            TagEnd::Link => {
                self.style_stack.pop();
                if let Some(url) = self.link_targets.pop() {
                    self.push_link_target(url, false);
                }
            }
            TagEnd::Image => {
                self.style_stack.pop();
                let url = self.link_targets.pop().unwrap_or_default();
                self.push_link_target(url, true);
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    let lines = table.render(self.theme.md_rule);
                    self.lines.extend(lines);
                    self.push_empty_line();
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.end_header();
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    table.end_row();
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    table.end_cell();
                }
            }
            _ => {}
        }
    }

    fn push_link_target(&mut self, url: String, image: bool) {
        // Inline data URLs are megabytes of base64; show only the scheme.
        let shown = if url.starts_with("data:") {
            url.split(',').next().unwrap_or("data:").to_string()
        } else {
            sanitize_inline(&url)
        };
        let suffix = match (image, shown.is_empty()) {
            (true, true) => "]".to_string(),
            (true, false) => format!("] ({shown})"),
            (false, _) => {
                let text_matches = self
                    .current
                    .last()
                    .is_some_and(|span| span.content.as_ref() == shown);
                if text_matches || shown.is_empty() {
                    return;
                }
                format!(" ({shown})")
            }
        };
        self.push_span(Span::styled(suffix, self.theme.md_link));
    }

    fn push_modifier(&mut self, modifier: Modifier) {
        let style = self.current_style().add_modifier(modifier);
        self.style_stack.push(style);
    }

    fn current_style(&self) -> Style {
        self.style_stack
            .last()
            .copied()
            .unwrap_or(self.theme.assistant_text_style)
    }

    fn list_indent(&self) -> usize {
        self.list_indent_stack.iter().sum()
    }

    fn push_span(&mut self, span: Span<'static>) {
        if let Some(table) = self.table.as_mut() {
            table.add_span(span);
            return;
        }
        if self.current.is_empty() {
            if self.quote_depth > 0 {
                self.current.push(Span::styled(
                    "│ ".repeat(self.quote_depth),
                    self.theme.md_blockquote,
                ));
            }
            if let Some(indent) = self.pending_indent.take() {
                if indent > 0 {
                    self.current.push(Span::raw(" ".repeat(indent)));
                }
            }
        }
        self.current.push(span);
    }

    fn flush_line(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    fn push_empty_line(&mut self) {
        let last_is_empty = self
            .lines
            .last()
            .is_some_and(|line| line.spans.is_empty());
        if !self.lines.is_empty() && !last_is_empty {
            self.lines.push(Line::default());
        }
    }
}
