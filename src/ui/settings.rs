//! Modal settings form: one API key per provider, default model, and voice.

use ratatui::layout::Rect;
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::core::keyring::mask_key;
use crate::ui::layout::centered_rect;
use crate::ui::theme::Theme;

pub const SETTINGS_SAVED: &str = "Settings saved.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    /// Key for the provider at this position in the form
    ApiKey(usize),
    DefaultModel,
    TtsVoice,
    TtsInstructions,
}

/// A provider whose key can be entered in the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyField {
    pub provider_id: String,
    pub label: String,
    /// Masked form of the key in use, if any
    pub current_hint: Option<String>,
}

impl KeyField {
    pub fn new(provider_id: &str, display_name: &str, current_key: Option<&str>) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            label: format!("{display_name} key"),
            current_hint: current_key.map(mask_key),
        }
    }
}

/// Values to apply when the form is submitted. Only keys the user typed are
/// included, as (provider id, key) pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSubmission {
    pub api_keys: Vec<(String, String)>,
    pub default_model: String,
    pub tts_voice: String,
    pub tts_instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    keys: Vec<KeyField>,
    key_values: Vec<String>,
    default_model: String,
    tts_voice: String,
    tts_instructions: String,
    focus: SettingsField,
}

impl SettingsForm {
    pub fn new(
        keys: Vec<KeyField>,
        default_model: &str,
        tts_voice: &str,
        tts_instructions: Option<&str>,
    ) -> Self {
        let focus = if keys.is_empty() {
            SettingsField::DefaultModel
        } else {
            SettingsField::ApiKey(0)
        };
        Self {
            key_values: vec![String::new(); keys.len()],
            keys,
            default_model: default_model.to_string(),
            tts_voice: tts_voice.to_string(),
            tts_instructions: tts_instructions.unwrap_or_default().to_string(),
            focus,
        }
    }

    fn fields(&self) -> Vec<SettingsField> {
        (0..self.keys.len())
            .map(SettingsField::ApiKey)
            .chain([
                SettingsField::DefaultModel,
                SettingsField::TtsVoice,
                SettingsField::TtsInstructions,
            ])
            .collect()
    }

    fn label(&self, field: SettingsField) -> &str {
        match field {
            SettingsField::ApiKey(index) => &self.keys[index].label,
            SettingsField::DefaultModel => "Default model",
            SettingsField::TtsVoice => "TTS voice",
            SettingsField::TtsInstructions => "TTS instructions",
        }
    }

    pub fn focus(&self) -> SettingsField {
        self.focus
    }

    pub fn value(&self, field: SettingsField) -> &str {
        match field {
            SettingsField::ApiKey(index) => &self.key_values[index],
            SettingsField::DefaultModel => &self.default_model,
            SettingsField::TtsVoice => &self.tts_voice,
            SettingsField::TtsInstructions => &self.tts_instructions,
        }
    }

    fn focused_value_mut(&mut self) -> &mut String {
        match self.focus {
            SettingsField::ApiKey(index) => &mut self.key_values[index],
            SettingsField::DefaultModel => &mut self.default_model,
            SettingsField::TtsVoice => &mut self.tts_voice,
            SettingsField::TtsInstructions => &mut self.tts_instructions,
        }
    }

    fn step_focus(&mut self, forward: bool) {
        let fields = self.fields();
        let len = fields.len();
        let current = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        self.focus = fields[next];
    }

    pub fn focus_next(&mut self) {
        self.step_focus(true);
    }

    pub fn focus_previous(&mut self) {
        self.step_focus(false);
    }

    pub fn insert_char(&mut self, ch: char) {
        if !ch.is_control() {
            self.focused_value_mut().push(ch);
        }
    }

    pub fn insert_str(&mut self, text: &str) {
        for ch in text.chars() {
            self.insert_char(ch);
        }
    }

    pub fn backspace(&mut self) {
        self.focused_value_mut().pop();
    }

    pub fn submission(&self) -> SettingsSubmission {
        let api_keys = self
            .keys
            .iter()
            .zip(&self.key_values)
            .map(|(field, value)| (field.provider_id.clone(), value.trim().to_string()))
            .filter(|(_, key)| !key.is_empty())
            .collect();
        let tts_instructions =
            Some(self.tts_instructions.trim().to_string()).filter(|s| !s.is_empty());
        SettingsSubmission {
            api_keys,
            default_model: self.default_model.trim().to_string(),
            tts_voice: self.tts_voice.trim().to_string(),
            tts_instructions,
        }
    }

    fn display_value(&self, field: SettingsField) -> String {
        let value = self.value(field);
        match field {
            SettingsField::ApiKey(index) if value.is_empty() => self.keys[index]
                .current_hint
                .as_ref()
                .map(|hint| format!("{hint} (type to replace)"))
                .unwrap_or_else(|| "not set".to_string()),
            SettingsField::ApiKey(_) => mask_key(value),
            _ => value.to_string(),
        }
    }
}

pub fn render_settings(f: &mut Frame, area: Rect, form: &SettingsForm, theme: &Theme) {
    let fields = form.fields();
    let height = (fields.len() as u16) * 2 + 4;
    let rect = centered_rect(area, 64, height);
    let mut lines = Vec::new();
    for field in fields {
        let focused = form.focus() == field;
        let marker = if focused { "▸ " } else { "  " };
        let value_style = if focused {
            theme.input_text_style.add_modifier(Modifier::UNDERLINED)
        } else {
            theme.input_text_style
        };
        lines.push(Line::from(vec![
            Span::styled(marker, theme.selection_marker_style),
            Span::styled(format!("{:<18}", form.label(field)), theme.input_title_style),
            Span::styled(form.display_value(field), value_style),
        ]));
        lines.push(Line::default());
    }
    lines.push(Line::from(Span::styled(
        "Enter save · Esc cancel · Tab/↑/↓ move",
        theme.affordance_style,
    )));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.dialog_border_style)
        .title(Span::styled("Settings", theme.dialog_border_style));
    f.render_widget(Clear, rect);
    f.render_widget(Paragraph::new(lines).block(block), rect);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(openai: Option<&str>) -> Vec<KeyField> {
        vec![
            KeyField::new("openai", "OpenAI", openai),
            KeyField::new("gemini", "Gemini", None),
        ]
    }

    #[test]
    fn untouched_keys_are_not_resubmitted() {
        let form = SettingsForm::new(keys(Some("sk-secret-1234")), "gpt-4o", "onyx", None);
        let submission = form.submission();
        assert!(submission.api_keys.is_empty());
        assert_eq!(submission.default_model, "gpt-4o");
        assert_eq!(submission.tts_voice, "onyx");
        assert_eq!(submission.tts_instructions, None);
        assert!(form
            .display_value(SettingsField::ApiKey(0))
            .ends_with("(type to replace)"));
        assert_eq!(form.display_value(SettingsField::ApiKey(1)), "not set");
    }

    #[test]
    fn typing_edits_the_focused_field() {
        let mut form = SettingsForm::new(keys(None), "gpt-4o", "onyx", Some("Calm"));
        form.focus_next();
        form.insert_str("gm-new");
        form.focus_next();
        for _ in 0..3 {
            form.backspace();
        }
        form.insert_str("-mini");
        form.focus_previous();
        form.focus_previous();
        form.focus_previous();
        assert_eq!(form.focus(), SettingsField::TtsInstructions);
        form.insert_str(" and slow");

        let submission = form.submission();
        assert_eq!(
            submission.api_keys,
            vec![("gemini".to_string(), "gm-new".to_string())]
        );
        assert_eq!(submission.default_model, "gpt-mini");
        assert_eq!(submission.tts_instructions.as_deref(), Some("Calm and slow"));
        assert!(!form.display_value(SettingsField::ApiKey(1)).contains("gm-new"));
    }
}
