//! Saved-chat list.

use chrono::{DateTime, Utc};
use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};
use ratatui::Frame;

use crate::core::sessions::ChatSession;
use crate::ui::theme::Theme;

pub const EMPTY_SIDEBAR_TEXT: &str = "No conversations yet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatListItem {
    pub id: String,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&ChatSession> for ChatListItem {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            updated_at: session.updated_at,
        }
    }
}

#[derive(Debug, Default)]
pub struct SidebarState {
    items: Vec<ChatListItem>,
    selected: usize,
    pub visible: bool,
}

impl SidebarState {
    pub fn new() -> Self {
        Self {
            visible: true,
            ..Default::default()
        }
    }

    pub fn items(&self) -> &[ChatListItem] {
        &self.items
    }

    /// Replaces the list, keeping the cursor on the same chat when it is
    /// still present.
    pub fn set_items(&mut self, items: Vec<ChatListItem>) {
        let current = self.selected_item().map(|item| item.id.clone());
        self.items = items;
        self.selected = current
            .and_then(|id| self.items.iter().position(|item| item.id == id))
            .unwrap_or(0);
    }

    pub fn selected_item(&self) -> Option<&ChatListItem> {
        self.items.get(self.selected)
    }

    pub fn select_id(&mut self, id: &str) {
        if let Some(pos) = self.items.iter().position(|item| item.id == id) {
            self.selected = pos;
        }
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.items.len() {
            self.selected += 1;
        }
    }
}

pub fn render_sidebar(
    f: &mut Frame,
    area: Rect,
    sidebar: &SidebarState,
    active_chat: Option<&str>,
    focused: bool,
    theme: &Theme,
) {
    let border_style = if focused {
        theme.input_border_style
    } else {
        theme.sidebar_border_style
    };
    let block = Block::default()
        .borders(Borders::RIGHT)
        .border_style(border_style)
        .title(Span::styled("Chats", theme.title_style));

    if sidebar.items().is_empty() {
        let list = List::new([ListItem::new(Line::from(Span::styled(
            EMPTY_SIDEBAR_TEXT,
            theme.sidebar_empty_style,
        )))])
        .block(block);
        f.render_widget(list, area);
        return;
    }

    let items: Vec<ListItem> = sidebar
        .items()
        .iter()
        .map(|item| {
            let style = if active_chat == Some(item.id.as_str()) {
                theme.sidebar_active_style
            } else {
                theme.sidebar_item_style
            };
            ListItem::new(Line::from(Span::styled(item.title.clone(), style)))
        })
        .collect();
    let mut state = ListState::default();
    if focused {
        state.select(Some(sidebar.selected));
    }
    let list = List::new(items)
        .block(block)
        .highlight_symbol("▸ ")
        .highlight_style(theme.affordance_active_style);
    f.render_stateful_widget(list, area, &mut state);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> ChatListItem {
        ChatListItem {
            id: id.to_string(),
            title: id.to_uppercase(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cursor_follows_chat_across_refresh() {
        let mut sidebar = SidebarState::new();
        sidebar.set_items(vec![item("a"), item("b"), item("c")]);
        sidebar.move_down();
        sidebar.move_down();
        sidebar.move_down();
        assert_eq!(sidebar.selected_item().map(|i| i.id.as_str()), Some("c"));

        sidebar.set_items(vec![item("new"), item("a"), item("c")]);
        assert_eq!(sidebar.selected_item().map(|i| i.id.as_str()), Some("c"));

        sidebar.set_items(vec![item("a")]);
        assert_eq!(sidebar.selected_item().map(|i| i.id.as_str()), Some("a"));
        sidebar.move_up();
        assert_eq!(sidebar.selected_item().map(|i| i.id.as_str()), Some("a"));
    }

    #[test]
    fn empty_list_has_no_selection() {
        let mut sidebar = SidebarState::new();
        sidebar.move_down();
        assert!(sidebar.selected_item().is_none());
        sidebar.select_id("missing");
        assert!(sidebar.selected_item().is_none());
    }
}
