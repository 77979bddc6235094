//! Transient toasts drawn over the top-right corner of the screen.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::ui::theme::Theme;

pub const DEFAULT_LIFETIME: Duration = Duration::from_millis(3000);
const MAX_VISIBLE: usize = 4;
const MAX_TOAST_WIDTH: u16 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    fn label(self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "ok",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    shown_at: Instant,
    lifetime: Duration,
}

impl Notification {
    fn expires_at(&self) -> Instant {
        self.shown_at + self.lifetime
    }
}

/// Newest first. Only the four newest are kept; older ones are dropped as
/// new ones arrive.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    toasts: VecDeque<Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: NotificationKind, message: impl Into<String>) {
        self.push_for(kind, message, DEFAULT_LIFETIME);
    }

    pub fn push_for(&mut self, kind: NotificationKind, message: impl Into<String>, lifetime: Duration) {
        self.push_at(kind, message, lifetime, Instant::now());
    }

    pub(crate) fn push_at(
        &mut self,
        kind: NotificationKind,
        message: impl Into<String>,
        lifetime: Duration,
        now: Instant,
    ) {
        self.toasts.push_front(Notification {
            kind,
            message: message.into(),
            shown_at: now,
            lifetime,
        });
        self.toasts.truncate(MAX_VISIBLE);
    }

    pub fn visible(&self) -> impl Iterator<Item = &Notification> {
        self.toasts.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.toasts.front()
    }

    /// Drops expired toasts. Returns true when anything disappeared.
    pub fn expire(&mut self, now: Instant) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.expires_at() > now);
        self.toasts.len() != before
    }

    /// Esc closes the newest toast.
    pub fn dismiss_latest(&mut self) -> bool {
        self.toasts.pop_front().is_some()
    }

    pub fn clear(&mut self) {
        self.toasts.clear();
    }
}

pub fn render_notifications(f: &mut Frame, area: Rect, center: &NotificationCenter, theme: &Theme) {
    let mut y = area.y + 1;
    for toast in center.visible() {
        let text_width = UnicodeWidthStr::width(toast.message.as_str()) as u16;
        let width = (text_width + 4)
            .min(MAX_TOAST_WIDTH)
            .min(area.width.saturating_sub(2));
        if width < 8 {
            return;
        }
        let inner_width = width.saturating_sub(2).max(1);
        let height = text_width.div_ceil(inner_width).max(1) + 2;
        if y + height > area.y + area.height {
            return;
        }
        let rect = Rect {
            x: area.x + area.width - width - 1,
            y,
            width,
            height,
        };
        let style = theme.notification_style(toast.kind);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(style)
            .title(Span::styled(toast.kind.label(), style));
        f.render_widget(Clear, rect);
        f.render_widget(
            Paragraph::new(Line::from(toast.message.as_str()))
                .block(block)
                .wrap(Wrap { trim: true }),
            rect,
        );
        y += height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_first_and_capped_at_four() {
        let mut center = NotificationCenter::new();
        let now = Instant::now();
        for i in 0..6 {
            center.push_at(NotificationKind::Info, format!("n{i}"), DEFAULT_LIFETIME, now);
        }
        let messages: Vec<&str> = center.visible().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec!["n5", "n4", "n3", "n2"]);
    }

    #[test]
    fn toasts_expire_after_their_lifetime() {
        let mut center = NotificationCenter::new();
        let now = Instant::now();
        center.push_at(NotificationKind::Info, "short", Duration::from_millis(1500), now);
        center.push_at(NotificationKind::Error, "default", DEFAULT_LIFETIME, now);

        assert!(!center.expire(now + Duration::from_millis(1000)));
        assert!(center.expire(now + Duration::from_millis(2000)));
        assert_eq!(center.latest().map(|t| t.message.as_str()), Some("default"));
        assert!(center.expire(now + Duration::from_millis(3000)));
        assert!(center.is_empty());
    }

    #[test]
    fn dismiss_removes_newest() {
        let mut center = NotificationCenter::new();
        center.push(NotificationKind::Info, "old");
        center.push(NotificationKind::Warning, "new");
        assert!(center.dismiss_latest());
        assert_eq!(center.latest().map(|t| t.message.as_str()), Some("old"));
        center.clear();
        assert!(!center.dismiss_latest());
    }
}
