use super::chats::clear_conversation;
use super::input::apply_model_selection;
use super::{App, AppAction, AppActionContext, AppCommand};
use crate::core::app::ui_state::{UiFocus, UiMode};
use crate::ui::notifications::NotificationKind;
use crate::ui::personas::PersonaPicker;
use tracing::debug;

pub(super) const NO_PERSONAS: &str =
    "No personas configured. Add [[personas]] entries to config.toml.";

pub(super) fn handle_persona_action(
    app: &mut App,
    action: AppAction,
    _ctx: AppActionContext,
) -> Option<AppCommand> {
    match action {
        AppAction::OpenPersonaPicker => {
            let personas = app.session.personas.list();
            if personas.is_empty() {
                app.notify(NotificationKind::Info, NO_PERSONAS);
                return None;
            }
            let active = app.session.personas.active().map(|p| p.id.as_str());
            let picker = PersonaPicker::new(personas, active);
            app.ui.mode = UiMode::PersonaPicker(picker);
            None
        }
        AppAction::PersonaPickerUp => {
            if let UiMode::PersonaPicker(picker) = &mut app.ui.mode {
                picker.move_up();
            }
            None
        }
        AppAction::PersonaPickerDown => {
            if let UiMode::PersonaPicker(picker) = &mut app.ui.mode {
                picker.move_down();
            }
            None
        }
        AppAction::ConfirmPersona => {
            let UiMode::PersonaPicker(picker) =
                std::mem::replace(&mut app.ui.mode, UiMode::Typing)
            else {
                return None;
            };
            activate_persona(app, picker.selected().id.clone());
            None
        }
        AppAction::ActivatePersona { id } => {
            activate_persona(app, id);
            None
        }
        _ => unreachable!(),
    }
}

/// Switching persona starts a fresh conversation under the new instructions.
fn activate_persona(app: &mut App, id: Option<String>) {
    let Some(id) = id else {
        if app.session.personas.active().is_some() {
            clear_conversation(app);
            app.session.personas.clear();
            app.notify(NotificationKind::Info, "Persona switched off.");
        }
        return;
    };

    let persona = match app.session.personas.find(&id) {
        Some(persona) => persona.clone(),
        None => {
            app.notify(NotificationKind::Error, format!("Unknown persona '{id}'."));
            return;
        }
    };
    clear_conversation(app);
    if let Err(err) = app.session.personas.activate(&persona.id) {
        app.notify(NotificationKind::Error, err);
        return;
    }
    if let Some(model) = persona.model.as_deref().filter(|m| *m != app.session.model) {
        apply_model_selection(app, model);
    }
    app.ui.focus = UiFocus::Input;
    debug!(persona = %persona.id, "persona activated");
    app.notify(
        NotificationKind::Success,
        format!("Switched to persona: {}", persona.name),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::persona::{Persona, PersonaManager};
    use crate::ui::transcript::TranscriptMode;
    use crate::utils::test_utils::{act, complete_turn, create_test_app, records};

    fn latest(app: &App) -> Option<String> {
        app.ui.notifications.latest().map(|n| n.message.clone())
    }

    fn app_with_personas() -> App {
        let mut app = create_test_app();
        let config = Config {
            personas: vec![
                Persona {
                    id: "chef".into(),
                    name: "Chef".into(),
                    description: Some("Cooking help".into()),
                    instructions: "You are a chef.".into(),
                    model: Some("gpt-4.1".into()),
                },
                Persona {
                    id: "coach".into(),
                    name: "Coach".into(),
                    description: None,
                    instructions: "You are a running coach.".into(),
                    model: None,
                },
            ],
            ..Config::default()
        };
        app.session.personas = PersonaManager::from_config(&config);
        app
    }

    #[test]
    fn picker_needs_configured_personas() {
        let mut app = create_test_app();
        act(&mut app, AppAction::OpenPersonaPicker);
        assert!(app.ui.is_typing());
        assert_eq!(latest(&app).as_deref(), Some(NO_PERSONAS));
    }

    #[test]
    fn choosing_a_persona_starts_fresh_with_its_model() {
        let mut app = app_with_personas();
        complete_turn(&mut app, "hello", "hi there");

        act(&mut app, AppAction::OpenPersonaPicker);
        act(&mut app, AppAction::PersonaPickerDown);
        act(&mut app, AppAction::ConfirmPersona);

        assert!(app.ui.is_typing());
        assert_eq!(
            app.session.personas.active().map(|p| p.id.as_str()),
            Some("chef")
        );
        assert_eq!(app.session.model, "gpt-4.1");
        assert!(records(&app).is_empty());
        assert_eq!(app.ui.transcript.mode(), TranscriptMode::Welcome);
        assert_eq!(latest(&app).as_deref(), Some("Switched to persona: Chef"));
    }

    #[test]
    fn new_chat_and_no_persona_switch_it_off() {
        let mut app = app_with_personas();
        act(&mut app, AppAction::ActivatePersona { id: Some("coach".into()) });
        assert_eq!(app.session.model, "gpt-4o");
        assert_eq!(app.session.personas.system_prompt(), Some("You are a running coach."));

        act(&mut app, AppAction::ActivatePersona { id: None });
        assert!(app.session.personas.active().is_none());
        assert_eq!(latest(&app).as_deref(), Some("Persona switched off."));

        act(&mut app, AppAction::ActivatePersona { id: Some("coach".into()) });
        act(&mut app, AppAction::NewChat);
        assert!(app.session.personas.active().is_none());
    }

    #[test]
    fn unknown_persona_changes_nothing() {
        let mut app = app_with_personas();
        complete_turn(&mut app, "keep", "this");
        act(&mut app, AppAction::ActivatePersona { id: Some("ghost".into()) });
        assert_eq!(records(&app).len(), 2);
        assert_eq!(latest(&app).as_deref(), Some("Unknown persona 'ghost'."));
    }
}
