//! Modal persona chooser.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};
use ratatui::Frame;

use crate::core::persona::Persona;
use crate::ui::layout::centered_rect;
use crate::ui::theme::Theme;

pub const NO_PERSONA_LABEL: &str = "No persona";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaChoice {
    /// `None` is the entry that switches personas off.
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaPicker {
    choices: Vec<PersonaChoice>,
    selected: usize,
}

impl PersonaPicker {
    /// Lists "No persona" followed by `personas`, with the cursor on the
    /// active one.
    pub fn new(personas: &[Persona], active: Option<&str>) -> Self {
        let mut choices = vec![PersonaChoice {
            id: None,
            name: NO_PERSONA_LABEL.to_string(),
            description: None,
        }];
        choices.extend(personas.iter().map(|p| PersonaChoice {
            id: Some(p.id.clone()),
            name: p.name.clone(),
            description: p.description.clone(),
        }));
        let selected = choices
            .iter()
            .position(|c| c.id.as_deref() == active)
            .unwrap_or(0);
        Self { choices, selected }
    }

    pub fn choices(&self) -> &[PersonaChoice] {
        &self.choices
    }

    pub fn selected(&self) -> &PersonaChoice {
        &self.choices[self.selected]
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.choices.len() {
            self.selected += 1;
        }
    }
}

pub fn render_persona_picker(f: &mut Frame, area: Rect, picker: &PersonaPicker, theme: &Theme) {
    let height = picker.choices().len() as u16 + 4;
    let rect = centered_rect(area, 60, height);
    let items: Vec<ListItem> = picker
        .choices()
        .iter()
        .map(|choice| {
            let mut spans = vec![Span::styled(choice.name.clone(), theme.sidebar_item_style)];
            if let Some(description) = &choice.description {
                spans.push(Span::styled(
                    format!("  {description}"),
                    theme.affordance_style,
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.dialog_border_style)
        .title(Span::styled(
            "Persona (Enter switch · Esc cancel)",
            theme.dialog_border_style,
        ));
    let mut state = ListState::default();
    state.select(Some(picker.selected));
    let list = List::new(items)
        .block(block)
        .highlight_symbol("▸ ")
        .highlight_style(theme.affordance_active_style);
    f.render_widget(Clear, rect);
    f.render_stateful_widget(list, rect, &mut state);
}
