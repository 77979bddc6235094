use ratatui::style::Style;
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthChar;

/// Scroll and wrap arithmetic for the transcript viewport.
pub struct ScrollCalculator;

impl ScrollCalculator {
    /// Word-wraps `lines` to `width` columns, keeping span styles. Words longer
    /// than the width are broken; a space that would overflow becomes the line
    /// break. Pre-wrapping lets the viewport know its exact height before
    /// drawing.
    pub fn prewrap_lines(lines: &[Line<'_>], width: u16) -> Vec<Line<'static>> {
        let width = width as usize;
        let mut out = Vec::with_capacity(lines.len());
        for line in lines {
            if width == 0 {
                out.push(owned_line(line));
                continue;
            }
            let mut wrapper = LineWrapper::new(width);
            for span in &line.spans {
                for ch in span.content.chars() {
                    wrapper.push_char(ch, span.style);
                }
            }
            out.extend(wrapper.finish());
        }
        out
    }

    pub fn max_scroll_offset(total_lines: usize, viewport_height: u16) -> u16 {
        let overflow = total_lines.saturating_sub(viewport_height as usize);
        overflow.min(u16::MAX as usize) as u16
    }

    pub fn clamp_offset(offset: u16, total_lines: usize, viewport_height: u16) -> u16 {
        offset.min(Self::max_scroll_offset(total_lines, viewport_height))
    }
}

fn owned_line(line: &Line<'_>) -> Line<'static> {
    let spans: Vec<Span<'static>> = line
        .spans
        .iter()
        .map(|s| Span::styled(s.content.to_string(), s.style))
        .collect();
    Line::from(spans).style(line.style)
}

struct LineWrapper {
    width: usize,
    out: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    current_width: usize,
    word: Vec<(char, usize, Style)>,
    word_width: usize,
}

impl LineWrapper {
    fn new(width: usize) -> Self {
        Self {
            width,
            out: Vec::new(),
            current: Vec::new(),
            current_width: 0,
            word: Vec::new(),
            word_width: 0,
        }
    }

    fn push_char(&mut self, ch: char, style: Style) {
        if ch == ' ' {
            self.place_word();
            if self.current_width < self.width {
                self.append(" ", style, 1);
            } else {
                self.break_line();
            }
            return;
        }
        let w = ch.width().unwrap_or(0);
        self.word.push((ch, w, style));
        self.word_width += w;
    }

    fn place_word(&mut self) {
        if self.word.is_empty() {
            return;
        }
        if self.current_width > 0 && self.current_width + self.word_width > self.width {
            self.break_line();
        }
        let word = std::mem::take(&mut self.word);
        self.word_width = 0;
        let mut buf = [0u8; 4];
        for (ch, w, style) in word {
            if self.current_width > 0 && self.current_width + w > self.width {
                self.break_line();
            }
            self.append(ch.encode_utf8(&mut buf), style, w);
        }
    }

    fn append(&mut self, text: &str, style: Style, w: usize) {
        match self.current.last_mut() {
            Some(last) if last.style == style => last.content.to_mut().push_str(text),
            _ => self.current.push(Span::styled(text.to_string(), style)),
        }
        self.current_width += w;
    }

    fn break_line(&mut self) {
        self.out.push(Line::from(std::mem::take(&mut self.current)));
        self.current_width = 0;
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.place_word();
        if !self.current.is_empty() || self.out.is_empty() {
            self.break_line();
        }
        self.out
    }
}
