use ratatui::style::Style;
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

type TableCell = Vec<Span<'static>>;

/// Collects markdown table events and lays the table out with box-drawing
/// borders at natural column widths. Wrapping long rows is left to the
/// transcript, which wraps every rendered line to the viewport.
pub(super) struct TableBuffer {
    rows: Vec<Vec<TableCell>>,
    current_row: Vec<TableCell>,
    current_cell: TableCell,
    header_rows: usize,
    in_header: bool,
}

impl TableBuffer {
    pub(super) fn new() -> Self {
        Self {
            rows: Vec::new(),
            current_row: Vec::new(),
            current_cell: Vec::new(),
            header_rows: 0,
            in_header: false,
        }
    }

    pub(super) fn start_header(&mut self) {
        self.in_header = true;
    }

    pub(super) fn end_header(&mut self) {
        self.in_header = false;
        if !self.current_row.is_empty() {
            self.rows.push(std::mem::take(&mut self.current_row));
            self.header_rows += 1;
        }
    }

    pub(super) fn end_row(&mut self) {
        if !self.current_row.is_empty() {
            self.rows.push(std::mem::take(&mut self.current_row));
        }
    }

    pub(super) fn start_cell(&mut self) {
        self.current_cell.clear();
    }

    pub(super) fn end_cell(&mut self) {
        self.current_row.push(std::mem::take(&mut self.current_cell));
    }

    pub(super) fn add_span(&mut self, span: Span<'static>) {
        self.current_cell.push(span);
    }

    pub(super) fn render(self, border_style: Style) -> Vec<Line<'static>> {
        if self.rows.is_empty() {
            return Vec::new();
        }

        let columns = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell_width(cell));
            }
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 3);
        lines.push(border_line("┌", "┬", "┐", &widths, border_style));
        for (index, row) in self.rows.iter().enumerate() {
            let mut spans = vec![Span::styled("│", border_style)];
            for (i, width) in widths.iter().enumerate() {
                spans.push(Span::raw(" "));
                let cell = row.get(i);
                if let Some(cell) = cell {
                    spans.extend(cell.iter().cloned());
                }
                let used = cell.map(|c| cell_width(c)).unwrap_or(0);
                spans.push(Span::raw(" ".repeat(width.saturating_sub(used) + 1)));
                spans.push(Span::styled("│", border_style));
            }
            lines.push(Line::from(spans));

            if index + 1 == self.header_rows && self.rows.len() > self.header_rows {
                lines.push(border_line("├", "┼", "┤", &widths, border_style));
            }
        }
        lines.push(border_line("└", "┴", "┘", &widths, border_style));
        lines
    }
}

fn cell_width(cell: &[Span<'static>]) -> usize {
    cell.iter()
        .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
        .sum()
}

fn border_line(
    left: &str,
    middle: &str,
    right: &str,
    widths: &[usize],
    style: Style,
) -> Line<'static> {
    let mut s = String::from(left);
    for (i, width) in widths.iter().enumerate() {
        s.push_str(&"─".repeat(width + 2));
        s.push_str(if i + 1 == widths.len() { right } else { middle });
    }
    Line::from(Span::styled(s, style))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn columns_pad_to_widest_cell() {
        let mut table = TableBuffer::new();
        table.start_header();
        for header in ["Name", "Qty"] {
            table.start_cell();
            table.add_span(Span::raw(header));
            table.end_cell();
        }
        table.end_header();
        for value in ["Apples", "3"] {
            table.start_cell();
            table.add_span(Span::raw(value));
            table.end_cell();
        }
        table.end_row();

        let lines: Vec<String> = table.render(Style::default()).iter().map(line_text).collect();
        assert_eq!(
            lines,
            vec![
                "┌────────┬─────┐",
                "│ Name   │ Qty │",
                "├────────┼─────┤",
                "│ Apples │ 3   │",
                "└────────┴─────┘",
            ]
        );
    }
}
