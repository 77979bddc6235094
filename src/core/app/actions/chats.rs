use super::input::apply_model_selection;
use super::streaming::abort_active_stream;
use super::{App, AppAction, AppActionContext, AppCommand};
use crate::core::affordances::AffordanceSet;
use crate::core::app::ui_state::{UiFocus, UiMode};
use crate::core::history::{ConversationHistory, HistoryStore};
use crate::core::sessions::ChatSession;
use crate::core::stream_controller::ResponseKind;
use crate::ui::dialog::{ConfirmAction, ConfirmDialog};
use crate::ui::notifications::NotificationKind;
use crate::ui::render::ContentRenderer;
use tracing::{debug, warn};

pub(super) fn handle_chat_action(
    app: &mut App,
    action: AppAction,
    _ctx: AppActionContext,
) -> Option<AppCommand> {
    match action {
        AppAction::NewChat => {
            start_new_chat(app);
            None
        }
        AppAction::LoadChat { id } => {
            load_chat(app, &id);
            None
        }
        AppAction::LoadSelectedChat => {
            if let Some(id) = app.ui.sidebar.selected_item().map(|item| item.id.clone()) {
                load_chat(app, &id);
            }
            None
        }
        AppAction::SidebarMoveUp => {
            app.ui.sidebar.move_up();
            None
        }
        AppAction::SidebarMoveDown => {
            app.ui.sidebar.move_down();
            None
        }
        AppAction::RequestDeleteChat => {
            if let Some(item) = app.ui.sidebar.selected_item() {
                app.ui.mode = UiMode::Confirm(ConfirmDialog::delete_chat(&item.id, &item.title));
            }
            None
        }
        AppAction::ToggleDialogFocus => {
            if let UiMode::Confirm(dialog) = &mut app.ui.mode {
                dialog.toggle_focus();
            }
            None
        }
        AppAction::ConfirmDialog => {
            let UiMode::Confirm(dialog) = std::mem::replace(&mut app.ui.mode, UiMode::Typing)
            else {
                return None;
            };
            if dialog.confirm_focused {
                match dialog.action {
                    ConfirmAction::DeleteChat { id, title } => delete_chat(app, &id, &title),
                }
            }
            None
        }
        _ => unreachable!(),
    }
}

/// Drops everything tied to the current conversation.
pub(super) fn clear_conversation(app: &mut App) {
    abort_active_stream(app);
    app.playback.stop_all();
    app.session.history.clear();
    app.session.controller.reset();
    app.session.chat = None;
    app.ui.transcript.reset();
}

fn start_new_chat(app: &mut App) {
    clear_conversation(app);
    app.session.personas.clear();
    app.ui.focus = UiFocus::Input;
    debug!("started a new chat");
}

fn load_chat(app: &mut App, id: &str) {
    let Some(store) = &app.chats else {
        return;
    };
    let chat = match store.load(id) {
        Ok(chat) => chat,
        Err(err) => {
            warn!(chat = id, error = %err, "could not load chat");
            app.notify(NotificationKind::Error, format!("Could not load chat: {err}"));
            return;
        }
    };

    clear_conversation(app);
    app.session.personas.clear();
    if !chat.model.is_empty() && chat.model != app.session.model {
        apply_model_selection(app, &chat.model);
    }
    show_history(app, &chat);
    app.session.history = ConversationHistory::from_records(chat.messages.clone());
    app.ui.sidebar.select_id(&chat.id);
    app.session.chat = Some(chat);
    app.ui.focus = UiFocus::Input;
}

/// Re-renders a stored conversation. The last answer is handed to the
/// stream controller so it can be regenerated; earlier answers cannot.
fn show_history(app: &mut App, chat: &ChatSession) {
    let last_index = chat.messages.len().checked_sub(1);
    for (index, record) in chat.messages.iter().enumerate() {
        if record.role.is_user() {
            let names = record
                .attached_files_meta
                .iter()
                .flatten()
                .map(|file| file.name.clone())
                .collect();
            app.ui.transcript.push_user(
                record.typed_text(),
                names,
                record.image_data.is_some(),
                index,
            );
            continue;
        }

        if Some(index) == last_index {
            let restored = app.session.controller.restore_finalized(
                record,
                index,
                &mut app.ui.transcript,
                &app.ui.renderer,
            );
            if let Some(handle) = restored {
                app.ui.transcript.bind_history(handle.id(), index);
                continue;
            }
        }
        let kind = if record.is_generated_image() {
            ResponseKind::GeneratedImage
        } else {
            ResponseKind::Text
        };
        let markup = app.ui.renderer.parse_to_final_markup(&record.content);
        app.ui.transcript.push_history_assistant(
            markup,
            AffordanceSet::for_response(kind).without_regenerate(),
            index,
        );
    }
}

fn delete_chat(app: &mut App, id: &str, title: &str) {
    let Some(store) = &app.chats else {
        return;
    };
    if let Err(err) = store.delete(id) {
        warn!(chat = id, error = %err, "could not delete chat");
        app.notify(NotificationKind::Error, format!("Could not delete chat: {err}"));
        return;
    }
    debug!(chat = id, title, "chat deleted");
    if app.session.active_chat_id() == Some(id) {
        start_new_chat(app);
    }
    app.refresh_sidebar();
    app.notify(NotificationKind::Success, "Chat deleted.");
}
