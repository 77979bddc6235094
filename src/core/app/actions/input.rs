use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::streaming::abort_active_stream;
use super::{App, AppAction, AppActionContext, AppCommand, FieldEdit};
use crate::core::app::ui_state::{UiFocus, UiMode};
use crate::core::attachments::{AttachmentError, AttachmentKind};
use crate::core::config::Config;
use crate::ui::notifications::NotificationKind;
use crate::ui::settings::{KeyField, SettingsForm, SettingsSubmission, SETTINGS_SAVED};
use crate::ui::transcript::TranscriptMode;
use crate::ui::welcome::example_prompt;
use tracing::warn;

const TOGGLE_NOTICE_LIFETIME: Duration = Duration::from_millis(1500);

pub(super) fn handle_input_action(
    app: &mut App,
    action: AppAction,
    ctx: AppActionContext,
) -> Option<AppCommand> {
    match action {
        AppAction::Notify { kind, message } => {
            app.notify(kind, message);
            None
        }
        AppAction::DismissNotification => {
            app.ui.notifications.dismiss_latest();
            None
        }
        AppAction::ExpireNotifications => {
            app.ui.notifications.expire(Instant::now());
            None
        }
        AppAction::InsertIntoInput { text } => {
            insert_text(app, &text);
            None
        }
        AppAction::UseExamplePrompt { number } => {
            let prompt = example_prompt(number).filter(|_| {
                app.ui.transcript.mode() == TranscriptMode::Welcome && app.ui.input_is_empty()
            });
            match prompt {
                Some(prompt) => app.ui.set_input_text(prompt),
                None => insert_text(app, &number.to_string()),
            }
            None
        }
        AppAction::ScrollTranscript { lines } => {
            scroll_transcript(app, lines, ctx);
            None
        }
        AppAction::ToggleWebSearch => {
            toggle_web_search(app);
            None
        }
        AppAction::ToggleImageGeneration => {
            toggle_image_generation(app);
            None
        }
        AppAction::ToggleTranscriptLog => {
            match app.session.transcript_log.toggle() {
                Ok(message) => app.notify(NotificationKind::Info, message),
                Err(err) => app.notify(NotificationKind::Warning, err.to_string()),
            }
            None
        }
        AppAction::ToggleSidebar => {
            app.ui.sidebar.visible = !app.ui.sidebar.visible;
            if !app.ui.sidebar.visible {
                app.ui.focus = UiFocus::Input;
            }
            None
        }
        AppAction::ToggleFocus => {
            app.ui.toggle_focus();
            None
        }
        AppAction::OpenFilePrompt { kind } => {
            open_file_prompt(app, kind);
            None
        }
        AppAction::EditFilePrompt { edit } => {
            if let UiMode::FilePrompt { path, .. } = &mut app.ui.mode {
                match edit {
                    FieldEdit::Char(ch) => path.push(ch),
                    FieldEdit::Paste(text) => path.push_str(text.trim_end_matches(['\r', '\n'])),
                    FieldEdit::Backspace => {
                        path.pop();
                    }
                    FieldEdit::Next | FieldEdit::Previous => {}
                }
            }
            None
        }
        AppAction::CompleteFilePrompt => {
            complete_file_prompt(app);
            None
        }
        AppAction::ClearAttachments => {
            if !app.ui.attachments.is_empty() {
                app.ui.attachments.clear();
                app.notify(NotificationKind::Info, "Attachments removed.");
            }
            None
        }
        AppAction::OpenSettings => {
            let keys = app
                .session
                .providers
                .providers()
                .iter()
                .map(|p| KeyField::new(&p.id, &p.display_name, app.session.api_key_for(&p.id)))
                .collect();
            let form = SettingsForm::new(
                keys,
                &app.session.model,
                &app.session.voice.voice,
                app.session.voice.instructions.as_deref(),
            );
            app.ui.mode = UiMode::Settings(form);
            None
        }
        AppAction::EditSettings { edit } => {
            if let UiMode::Settings(form) = &mut app.ui.mode {
                match edit {
                    FieldEdit::Char(ch) => form.insert_char(ch),
                    FieldEdit::Paste(text) => form.insert_str(&text),
                    FieldEdit::Backspace => form.backspace(),
                    FieldEdit::Next => form.focus_next(),
                    FieldEdit::Previous => form.focus_previous(),
                }
            }
            None
        }
        AppAction::SubmitSettings => {
            let UiMode::Settings(form) = &app.ui.mode else {
                return None;
            };
            let submission = form.submission();
            app.ui.mode = UiMode::Typing;
            apply_settings(app, submission);
            None
        }
        AppAction::CancelOverlay => {
            app.ui.mode = UiMode::Typing;
            None
        }
        AppAction::Quit => {
            abort_active_stream(app);
            app.playback.stop_all();
            app.ui.exit_requested = true;
            None
        }
        _ => unreachable!(),
    }
}

fn insert_text(app: &mut App, text: &str) {
    if app.ui.is_typing() {
        app.ui.apply_textarea_edit(|textarea| {
            textarea.insert_str(text);
        });
        return;
    }
    match &mut app.ui.mode {
        UiMode::Typing | UiMode::Confirm(_) | UiMode::PersonaPicker(_) => {}
        UiMode::FilePrompt { path, .. } => path.push_str(text.trim_end_matches(['\r', '\n'])),
        UiMode::Settings(form) => form.insert_str(text),
    }
}

fn scroll_transcript(app: &mut App, lines: i32, ctx: AppActionContext) {
    let (total, height) = app.transcript_metrics(ctx.term_width, ctx.term_height);
    let amount = lines.unsigned_abs().min(u16::MAX as u32) as u16;
    if lines < 0 {
        app.ui.transcript.scroll_up(amount, total, height);
    } else {
        app.ui.transcript.scroll_down(amount, total, height);
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

fn toggle_web_search(app: &mut App) {
    if !app.session.capabilities.supports_web_search {
        let message = format!("Web search is not available for {}.", app.session.model_label());
        app.notify(NotificationKind::Warning, message);
        return;
    }
    app.ui.web_search = !app.ui.web_search;
    let message = format!("Web search for next message: {}", on_off(app.ui.web_search));
    app.notify_for(NotificationKind::Info, message, TOGGLE_NOTICE_LIFETIME);
}

fn toggle_image_generation(app: &mut App) {
    if !app.session.capabilities.supports_image_generation {
        let message = format!(
            "Image generation is not available for {}.",
            app.session.model_label()
        );
        app.notify(NotificationKind::Warning, message);
        return;
    }
    app.ui.image_generation = !app.ui.image_generation;
    let message = format!("Image Generation Mode: {}", on_off(app.ui.image_generation));
    app.notify_for(NotificationKind::Info, message, TOGGLE_NOTICE_LIFETIME);
}

fn open_file_prompt(app: &mut App, kind: AttachmentKind) {
    if kind == AttachmentKind::Image && !app.session.capabilities.supports_images {
        let err = AttachmentError::ImagesNotSupported {
            model: app.session.model_label().to_string(),
        };
        app.notify(NotificationKind::Warning, err.to_string());
        return;
    }
    app.ui.mode = UiMode::FilePrompt {
        kind,
        path: String::new(),
    };
}

/// Turns what was typed into a path: surrounding quotes dropped, `~/`
/// expanded.
fn prompt_path(typed: &str) -> PathBuf {
    let trimmed = typed.trim().trim_matches(|c| c == '"' || c == '\'');
    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(trimmed)
}

fn complete_file_prompt(app: &mut App) {
    let UiMode::FilePrompt { kind, path } = std::mem::replace(&mut app.ui.mode, UiMode::Typing)
    else {
        return;
    };
    if path.trim().is_empty() {
        return;
    }
    let path = prompt_path(&path);
    let kind = match kind {
        AttachmentKind::Image => AttachmentKind::Image,
        AttachmentKind::File => AttachmentKind::for_path(&path),
    };

    let result = match kind {
        AttachmentKind::File => app
            .ui
            .attachments
            .add_file(&path)
            .map(|file| format!("Attached {}.", file.name)),
        AttachmentKind::Image => {
            let model = app.session.model_label().to_string();
            app.ui
                .attachments
                .set_image(&path, &model, app.session.capabilities)
                .map(|_| "Image ready to send with your next message.".to_string())
        }
    };
    match result {
        Ok(message) => app.notify(NotificationKind::Success, message),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "attachment rejected");
            app.notify(NotificationKind::Error, err.to_string());
        }
    }
}

/// Switches the model and turns off anything it cannot do.
pub(super) fn apply_model_selection(app: &mut App, model: &str) {
    let caps = app.session.select_model(model);
    if !caps.supports_web_search {
        app.ui.web_search = false;
    }
    if !caps.supports_image_generation {
        app.ui.image_generation = false;
    }
    if !caps.supports_images && app.ui.attachments.take_image().is_some() {
        let message = format!(
            "{} does not accept images; the pending image was removed.",
            app.session.model_label()
        );
        app.notify(NotificationKind::Warning, message);
    }
}

fn apply_settings(app: &mut App, submission: SettingsSubmission) {
    let SettingsSubmission {
        api_keys,
        default_model,
        tts_voice,
        tts_instructions,
    } = submission;

    for (provider, key) in api_keys {
        if let Err(err) = app.session.key_store.store(&provider, &key) {
            warn!(provider = %provider, error = %err, "could not store API key in keyring");
            app.notify(
                NotificationKind::Warning,
                format!("API key kept for this session only: {err}"),
            );
        }
        app.session.set_api_key(&provider, key);
    }
    if !default_model.is_empty() && default_model != app.session.model {
        apply_model_selection(app, &default_model);
    }
    if !tts_voice.is_empty() {
        app.session.voice.voice = tts_voice.clone();
    }
    app.session.voice.instructions = tts_instructions.clone();

    let saved = Config::mutate(move |config| {
        if !default_model.is_empty() {
            config.default_model = Some(default_model);
        }
        if !tts_voice.is_empty() {
            config.tts_voice = Some(tts_voice);
        }
        config.tts_instructions = tts_instructions;
        Ok(())
    });
    match saved {
        Ok(()) => app.notify(NotificationKind::Success, SETTINGS_SAVED),
        Err(err) => app.notify(
            NotificationKind::Error,
            format!("Could not save settings: {err}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::welcome::EXAMPLE_PROMPTS;
    use crate::utils::test_utils::{act, complete_turn, create_test_app};
    use tempfile::TempDir;

    fn latest(app: &App) -> Option<(NotificationKind, String)> {
        app.ui
            .notifications
            .latest()
            .map(|n| (n.kind, n.message.clone()))
    }

    #[test]
    fn toggles_announce_their_state() {
        let mut app = create_test_app();
        act(&mut app, AppAction::ToggleWebSearch);
        assert!(app.ui.web_search);
        assert_eq!(
            latest(&app).map(|(_, m)| m).as_deref(),
            Some("Web search for next message: ON")
        );
        act(&mut app, AppAction::ToggleImageGeneration);
        act(&mut app, AppAction::ToggleImageGeneration);
        assert!(!app.ui.image_generation);
        assert_eq!(
            latest(&app).map(|(_, m)| m).as_deref(),
            Some("Image Generation Mode: OFF")
        );
    }

    #[test]
    fn toggles_respect_capabilities() {
        let mut app = create_test_app();
        app.session.select_model("o3-mini");
        act(&mut app, AppAction::ToggleWebSearch);
        act(&mut app, AppAction::ToggleImageGeneration);
        assert!(!app.ui.web_search && !app.ui.image_generation);
        assert_eq!(latest(&app).map(|(k, _)| k), Some(NotificationKind::Warning));

        act(&mut app, AppAction::OpenFilePrompt { kind: AttachmentKind::Image });
        assert!(app.ui.is_typing());
    }

    #[test]
    fn model_switch_drops_unsupported_extras() {
        let mut app = create_test_app();
        app.ui.web_search = true;
        app.ui.image_generation = true;
        app.ui
            .attachments
            .set_image_bytes("cat.png", &[1, 2, 3], "gpt-4o", app.session.capabilities)
            .unwrap();

        apply_model_selection(&mut app, "o3-mini");
        assert!(!app.ui.web_search);
        assert!(!app.ui.image_generation);
        assert!(app.ui.attachments.image().is_none());
        assert_eq!(latest(&app).map(|(k, _)| k), Some(NotificationKind::Warning));
    }

    #[test]
    fn file_prompt_attaches_by_extension() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("notes.md");
        std::fs::write(&notes, "# Notes").unwrap();
        let picture = dir.path().join("pic.png");
        std::fs::write(&picture, [0x89, b'P', b'N', b'G']).unwrap();

        let mut app = create_test_app();
        for path in [&notes, &picture] {
            act(&mut app, AppAction::OpenFilePrompt { kind: AttachmentKind::File });
            act(
                &mut app,
                AppAction::InsertIntoInput {
                    text: format!("\"{}\"", path.display()),
                },
            );
            act(&mut app, AppAction::CompleteFilePrompt);
        }

        assert!(app.ui.is_typing());
        assert_eq!(app.ui.attachments.files().len(), 1);
        assert!(app.ui.attachments.image().is_some());
        assert_eq!(
            latest(&app).map(|(_, m)| m).as_deref(),
            Some("Image ready to send with your next message.")
        );
    }

    #[test]
    fn file_prompt_reports_rejections() {
        let mut app = create_test_app();
        act(&mut app, AppAction::OpenFilePrompt { kind: AttachmentKind::File });
        for ch in "missing.pdf".chars() {
            act(&mut app, AppAction::EditFilePrompt { edit: FieldEdit::Char(ch) });
        }
        act(&mut app, AppAction::CompleteFilePrompt);
        assert!(app.ui.attachments.is_empty());
        assert_eq!(latest(&app).map(|(k, _)| k), Some(NotificationKind::Error));
    }

    #[test]
    fn example_prompts_fill_only_an_empty_welcome_input() {
        let mut app = create_test_app();
        act(&mut app, AppAction::UseExamplePrompt { number: '2' });
        assert_eq!(app.ui.input_text(), EXAMPLE_PROMPTS[1]);

        app.ui.clear_input();
        complete_turn(&mut app, "hi", "hello");
        act(&mut app, AppAction::UseExamplePrompt { number: '2' });
        assert_eq!(app.ui.input_text(), "2");
    }

    #[test]
    fn settings_apply_to_session_and_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let _guard = Config::test_config_guard();
        Config::set_test_config_path(path.clone());

        let mut app = create_test_app();
        act(&mut app, AppAction::OpenSettings);
        act(&mut app, AppAction::InsertIntoInput { text: "sk-fresh".into() });
        act(&mut app, AppAction::EditSettings { edit: FieldEdit::Next });
        act(&mut app, AppAction::InsertIntoInput { text: "gm-fresh".into() });
        // xAI key left blank
        act(&mut app, AppAction::EditSettings { edit: FieldEdit::Next });
        act(&mut app, AppAction::EditSettings { edit: FieldEdit::Next });
        for _ in 0..app.session.model.len() {
            act(&mut app, AppAction::EditSettings { edit: FieldEdit::Backspace });
        }
        act(&mut app, AppAction::InsertIntoInput { text: "o3-mini".into() });
        act(&mut app, AppAction::SubmitSettings);

        assert!(app.ui.is_typing());
        assert_eq!(app.session.api_key_for("openai"), Some("sk-fresh"));
        assert_eq!(app.session.api_key_for("gemini"), Some("gm-fresh"));
        assert_eq!(app.session.api_key_for("xai"), None);
        assert_eq!(app.session.model, "o3-mini");
        assert!(!app.session.capabilities.supports_images);
        assert_eq!(
            latest(&app).map(|(_, m)| m).as_deref(),
            Some(SETTINGS_SAVED)
        );
        let saved = Config::load_from_path(&path).unwrap();
        assert_eq!(saved.default_model.as_deref(), Some("o3-mini"));
        assert_eq!(saved.tts_voice.as_deref(), Some("onyx"));

        Config::clear_test_config_override();
    }

    #[test]
    fn transcript_toggle_without_file_warns() {
        let mut app = create_test_app();
        act(&mut app, AppAction::ToggleTranscriptLog);
        assert_eq!(latest(&app).map(|(k, _)| k), Some(NotificationKind::Warning));
    }
}
