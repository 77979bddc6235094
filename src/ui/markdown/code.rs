use crate::ui::theme::Theme;
use pulldown_cmark::CodeBlockKind;
use ratatui::text::{Line, Span};

pub(super) fn language_hint(kind: &CodeBlockKind<'_>) -> String {
    match kind {
        CodeBlockKind::Indented => String::new(),
        CodeBlockKind::Fenced(info) => info.split_ascii_whitespace().next().unwrap_or("").into(),
    }
}

pub(super) fn push_code_text(buffer: &mut Vec<String>, text: &str) {
    for l in text.lines() {
        buffer.push(super::sanitize_inline(l));
    }
}

fn plain_lines(buffer: &[String], theme: &Theme) -> Vec<Line<'static>> {
    let style = theme.md_codeblock_text_style();
    buffer
        .iter()
        .map(|line| Line::from(vec![Span::styled(line.clone(), style)]))
        .collect()
}

/// Drains the buffered code block into `lines`, highlighted when enabled and
/// indented to sit under the enclosing list item.
pub(super) fn flush_code_block(
    buffer: &mut Vec<String>,
    syntax_enabled: bool,
    lang: &str,
    theme: &Theme,
    indent: usize,
    lines: &mut Vec<Line<'static>>,
) {
    if buffer.is_empty() {
        return;
    }

    let produced = if syntax_enabled {
        crate::utils::syntax::highlight_code_block(lang, &buffer.join("\n"), theme)
            .unwrap_or_else(|| plain_lines(buffer, theme))
    } else {
        plain_lines(buffer, theme)
    };

    for mut line in produced {
        if indent > 0 {
            line.spans.insert(0, Span::raw(" ".repeat(indent)));
        }
        lines.push(line);
    }
    buffer.clear();
}
