use ratatui::layout::{Constraint, Direction, Layout, Rect};

const SIDEBAR_WIDTH: u16 = 30;
/// Below this width the sidebar is hidden even when toggled on.
const SIDEBAR_MIN_TOTAL_WIDTH: u16 = 80;

/// Areas of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenLayout {
    pub title: Rect,
    pub transcript: Rect,
    pub input: Rect,
    pub sidebar: Option<Rect>,
}

impl ScreenLayout {
    /// `input_lines` is the number of text rows the input box needs; borders
    /// are added here.
    pub fn compute(area: Rect, show_sidebar: bool, input_lines: u16) -> Self {
        let (sidebar, main) = if show_sidebar && area.width >= SIDEBAR_MIN_TOTAL_WIDTH {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(0)])
                .split(area);
            (Some(columns[0]), columns[1])
        } else {
            (None, area)
        };

        let max_input = main.height.saturating_sub(4).max(1);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(input_lines.clamp(1, max_input) + 2),
            ])
            .split(main);

        Self {
            title: rows[0],
            transcript: rows[1],
            input: rows[2],
            sidebar,
        }
    }

    /// The transcript viewport for a terminal of the given size.
    pub fn transcript_size(width: u16, height: u16, show_sidebar: bool, input_lines: u16) -> (u16, u16) {
        let layout = Self::compute(Rect::new(0, 0, width, height), show_sidebar, input_lines);
        (layout.transcript.width, layout.transcript.height)
    }
}

/// A `width` x `height` box centered in `area`, shrunk to fit.
pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidebar_only_on_wide_terminals() {
        let wide = ScreenLayout::compute(Rect::new(0, 0, 120, 40), true, 1);
        assert_eq!(wide.sidebar.map(|r| r.width), Some(SIDEBAR_WIDTH));
        assert_eq!(wide.transcript.width, 90);
        assert_eq!(wide.input.height, 3);

        let narrow = ScreenLayout::compute(Rect::new(0, 0, 60, 40), true, 1);
        assert!(narrow.sidebar.is_none());
        assert_eq!(narrow.transcript.width, 60);
    }

    #[test]
    fn rows_fill_the_height() {
        let layout = ScreenLayout::compute(Rect::new(0, 0, 80, 24), false, 3);
        assert_eq!(layout.title.height, 1);
        assert_eq!(layout.input.height, 5);
        assert_eq!(layout.transcript.height, 24 - 1 - 5);
        assert_eq!(ScreenLayout::transcript_size(80, 24, false, 3), (80, 18));
    }

    #[test]
    fn centered_rect_fits_inside() {
        let rect = centered_rect(Rect::new(0, 0, 40, 10), 60, 7);
        assert_eq!(rect, Rect::new(0, 1, 40, 7));
    }
}
