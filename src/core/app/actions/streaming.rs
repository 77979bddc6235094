use super::{App, AppAction, AppActionContext, AppCommand};
use crate::api::ChatMessage;
use crate::core::attachments::ComposedMessage;
use crate::core::affordances::ListenState;
use crate::core::app::session::Endpoint;
use crate::core::dispatch::{
    error_headline, image_markdown, DispatchMode, DispatchOutcome, DispatchParams,
};
use crate::core::history::HistoryStore;
use crate::core::message::MessageRecord;
use crate::core::sessions::{title_from, UNTITLED_CHAT};
use crate::core::stream_controller::{DisplaySurface, ResponseKind, SlotPhase};
use crate::ui::notifications::NotificationKind;
use tracing::{debug, warn};

pub(super) const EMPTY_SUBMISSION: &str = "Please enter a message or upload an image/file.";
pub(super) const EMPTY_IMAGE_PROMPT: &str = "Please enter a prompt for image generation.";
pub(super) const WINDOW_TOO_SMALL: &str = "The window is too small to show a response.";

pub(super) fn handle_streaming_action(
    app: &mut App,
    action: AppAction,
    _ctx: AppActionContext,
) -> Option<AppCommand> {
    match action {
        AppAction::AppendResponseChunk { content, stream_id } => {
            if !app.is_current_stream(stream_id) {
                return None;
            }
            append_response_chunk(app, &content);
            None
        }
        AppAction::ResponseReceived { outcome, stream_id } => {
            if !app.is_current_stream(stream_id) {
                return None;
            }
            match outcome {
                DispatchOutcome::Complete(text) => append_response_chunk(app, &text),
                DispatchOutcome::Image { url, prompt } => {
                    append_response_chunk(app, &image_markdown(&url, &prompt));
                    app.session.pending_image_url = Some(url);
                }
            }
            None
        }
        AppAction::StreamErrored { message, stream_id } => {
            if !app.is_current_stream(stream_id) {
                return None;
            }
            handle_stream_error(app, &message);
            None
        }
        AppAction::StreamCompleted { stream_id } => {
            if !app.is_current_stream(stream_id) {
                return None;
            }
            finalize_stream(app);
            None
        }
        AppAction::CancelStreaming => {
            if abort_active_stream(app) {
                app.notify(NotificationKind::Info, "Response cancelled.");
            }
            None
        }
        AppAction::SubmitMessage => submit_message(app),
        AppAction::RegenerateResponse => regenerate_response(app),
        _ => unreachable!(),
    }
}

fn append_response_chunk(app: &mut App, content: &str) {
    let Some(handle) = app.session.controller.active_handle() else {
        return;
    };
    if let Err(err) = app.session.controller.append_chunk(
        handle,
        content,
        &mut app.ui.transcript,
        &app.ui.renderer,
    ) {
        debug!(error = %err, "dropping chunk");
    }
}

/// Cancels the in-flight request and removes its partial response. Returns
/// whether a streaming slot was discarded.
pub(super) fn abort_active_stream(app: &mut App) -> bool {
    app.session.cancel_current_stream();
    app.session.pending_image_url = None;
    let Some(handle) = app.session.controller.active_handle() else {
        return false;
    };
    if app.session.controller.phase_of(handle) != Some(SlotPhase::Streaming) {
        return false;
    }
    match app.session.controller.abort(handle, &mut app.ui.transcript) {
        Ok(partial) => {
            debug!(discarded = partial.len(), "partial response discarded");
            true
        }
        Err(err) => {
            warn!(error = %err, "could not abort response slot");
            false
        }
    }
}

fn handle_stream_error(app: &mut App, message: &str) {
    warn!(error = %message, "request failed");
    abort_active_stream(app);
    app.session.stream_cancel_token = None;
    let headline = error_headline(message).to_string();
    app.notify(NotificationKind::Error, headline);
}

fn finalize_stream(app: &mut App) {
    let Some(handle) = app.session.controller.active_handle() else {
        return;
    };
    if app.session.controller.phase_of(handle) != Some(SlotPhase::Streaming) {
        return;
    }
    app.session.stream_cancel_token = None;
    let image_url = app.session.pending_image_url.take();
    let kind = if image_url.is_some() {
        ResponseKind::GeneratedImage
    } else {
        ResponseKind::Text
    };

    let finalized = match app.session.controller.finalize(
        handle,
        kind,
        &app.session.history,
        &mut app.ui.transcript,
        &app.ui.renderer,
    ) {
        Ok(finalized) => finalized,
        Err(err) => {
            warn!(error = %err, "finalize rejected");
            return;
        }
    };

    let mut record = MessageRecord::assistant(finalized.raw_text);
    if let Some(url) = image_url {
        record = record.with_image(url);
    }
    if let Err(err) = app.session.transcript_log.log_record(&record) {
        warn!(error = %err, "transcript log write failed");
    }
    let index = app.session.history.append(record);
    debug_assert_eq!(index, finalized.history_index);
    app.ui.transcript.bind_history(finalized.slot, index);
    app.persist_chat();
}

fn submit_message(app: &mut App) -> Option<AppCommand> {
    let input = app.ui.input_text();
    let text = input.trim();
    let image_mode = app.ui.image_generation;
    if image_mode && text.is_empty() {
        app.notify(NotificationKind::Warning, EMPTY_IMAGE_PROMPT);
        return None;
    }
    if text.is_empty() && app.ui.attachments.is_empty() {
        app.notify(NotificationKind::Info, EMPTY_SUBMISSION);
        return None;
    }
    let request_model = if image_mode {
        app.session.image_model.clone()
    } else {
        app.session.model.clone()
    };
    let endpoint = endpoint_or_notify(app, &request_model)?;
    if !surface_ready(app) {
        return None;
    }

    abort_active_stream(app);

    let ComposedMessage {
        record,
        display_text,
        attachment_names,
        has_image,
    } = app.ui.attachments.compose(text);
    let title_source = if display_text.is_empty() {
        attachment_names.join(", ")
    } else {
        display_text.clone()
    };
    if let Err(err) = app.session.transcript_log.log_record(&record) {
        warn!(error = %err, "transcript log write failed");
    }
    let index = app.session.history.append(record);
    app.ui
        .transcript
        .push_user(&display_text, attachment_names, has_image, index);
    app.ui.transcript.clear_selection();
    if let Some(chat) = app.session.chat_mut() {
        if chat.title == UNTITLED_CHAT {
            chat.title = title_from(&title_source);
        }
    }

    let mode = if image_mode {
        DispatchMode::ImageGeneration {
            prompt: text.to_string(),
        }
    } else {
        DispatchMode::Chat {
            web_search: app.ui.web_search && app.session.capabilities.supports_web_search,
            stream: app.session.capabilities.supports_streaming,
        }
    };

    app.ui.web_search = false;
    app.ui.image_generation = false;
    app.ui.clear_input();
    app.persist_chat();

    start_response(app, mode, request_model, endpoint)
}

fn regenerate_response(app: &mut App) -> Option<AppCommand> {
    if app.session.controller.is_streaming() {
        app.notify(NotificationKind::Info, "Wait for the current response to finish.");
        return None;
    }
    let target = app.ui.transcript.affordance_target()?;
    let slot = app
        .ui
        .transcript
        .entry(target)
        .filter(|entry| entry.affordances.regenerate)
        .and_then(|entry| entry.slot());
    let handle = app
        .session
        .controller
        .active_handle()
        .filter(|handle| Some(handle.id()) == slot);
    let Some(handle) = handle else {
        app.notify(
            NotificationKind::Info,
            "Only the latest response can be regenerated.",
        );
        return None;
    };
    let model = app.session.model.clone();
    let endpoint = endpoint_or_notify(app, &model)?;
    if !surface_ready(app) {
        return None;
    }

    if app.playback.listen_state(target) != ListenState::Idle {
        app.playback.stop_all();
    }
    match app.session.controller.regenerate(
        handle,
        &mut app.ui.transcript,
        &mut app.session.history,
    ) {
        Ok(request) => {
            debug!(slot = %request.removed_slot, "regenerating response");
        }
        Err(err) => {
            warn!(error = %err, "regenerate rejected");
            app.notify(NotificationKind::Warning, err.to_string());
            return None;
        }
    }
    app.ui.transcript.clear_selection();
    if let Err(err) = app.session.transcript_log.remove_last_response() {
        warn!(error = %err, "could not rewrite transcript log");
    }
    app.persist_chat();

    let mode = DispatchMode::Chat {
        web_search: false,
        stream: app.session.capabilities.supports_streaming,
    };
    start_response(app, mode, model, endpoint)
}

fn endpoint_or_notify(app: &mut App, model: &str) -> Option<Endpoint> {
    match app.session.endpoint_for(model) {
        Ok(endpoint) => Some(endpoint),
        Err(notice) => {
            app.notify(NotificationKind::Error, notice);
            None
        }
    }
}

/// Nothing may touch history until a response slot is known to fit.
fn surface_ready(app: &mut App) -> bool {
    if app.ui.transcript.is_available() {
        return true;
    }
    app.notify(NotificationKind::Warning, WINDOW_TOO_SMALL);
    false
}

/// Opens a slot for the answer and builds the request that fills it.
fn start_response(
    app: &mut App,
    mode: DispatchMode,
    model: String,
    endpoint: Endpoint,
) -> Option<AppCommand> {
    if app
        .session
        .controller
        .create(&mut app.ui.transcript)
        .is_none()
    {
        app.notify(NotificationKind::Warning, WINDOW_TOO_SMALL);
        return None;
    }
    let (stream_id, cancel_token) = app.session.begin_stream();
    let system = app.session.personas.system_prompt().map(ChatMessage::system);
    let messages = system
        .into_iter()
        .chain(app.session.history.records().iter().map(ChatMessage::from_record))
        .collect();
    debug!(stream_id, model = %model, ?mode, "dispatching request");
    Some(AppCommand::SpawnStream(DispatchParams {
        client: app.session.client.clone(),
        base_url: endpoint.base_url,
        api_key: endpoint.api_key,
        model,
        messages,
        mode,
        cancel_token,
        stream_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::app::AppCommand;
    use crate::core::stream_controller::ControllerState;
    use crate::ui::transcript::{EntryContent, EntryKind, TranscriptMode};
    use crate::utils::test_utils::{
        act, complete_turn, create_test_app, create_test_app_with, records, stream_response,
        submit,
    };
    use tempfile::TempDir;

    fn latest_notification(app: &App) -> Option<String> {
        app.ui.notifications.latest().map(|n| n.message.clone())
    }

    #[test]
    fn chunks_stream_then_commit_one_record() {
        let mut app = create_test_app();
        let stream_id = submit(&mut app, "Say hello");
        assert_eq!(app.ui.transcript.mode(), TranscriptMode::Chat);
        assert!(app.ui.input_is_empty());

        for chunk in ["Hel", "lo, ", "world!"] {
            act(
                &mut app,
                AppAction::AppendResponseChunk {
                    content: chunk.to_string(),
                    stream_id,
                },
            );
        }
        let last = app.ui.transcript.entries().last().unwrap();
        assert_eq!(
            last.kind,
            EntryKind::Assistant {
                slot: app.session.controller.active_handle().map(|h| h.id()),
                content: EntryContent::Streaming("Hello, world!".into()),
            }
        );
        assert!(last.affordances.is_empty());

        act(&mut app, AppAction::StreamCompleted { stream_id });
        let history = records(&app);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Hello, world!");
        let last = app.ui.transcript.entries().last().unwrap();
        assert!(last.affordances.copy && last.affordances.regenerate && last.affordances.listen);
        assert_eq!(last.history_index, Some(1));
    }

    #[test]
    fn stale_stream_messages_are_ignored() {
        let mut app = create_test_app();
        let first = submit(&mut app, "one");
        let second = submit(&mut app, "two");
        assert_ne!(first, second);

        act(
            &mut app,
            AppAction::AppendResponseChunk {
                content: "late".into(),
                stream_id: first,
            },
        );
        act(&mut app, AppAction::StreamCompleted { stream_id: first });
        assert!(app.session.controller.is_streaming());
        assert_eq!(
            app.session
                .controller
                .active_slot()
                .map(|slot| slot.accumulated_raw_text().to_string()),
            Some(String::new())
        );
    }

    #[test]
    fn resubmitting_discards_unfinished_response() {
        let mut app = create_test_app();
        let first = submit(&mut app, "one");
        act(
            &mut app,
            AppAction::AppendResponseChunk {
                content: "partial".into(),
                stream_id: first,
            },
        );
        let second = submit(&mut app, "two");
        stream_response(&mut app, second, &["done"]);

        let history = records(&app);
        let contents: Vec<&str> = history.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "done"]);
        let assistant_entries = app
            .ui
            .transcript
            .entries()
            .iter()
            .filter(|e| e.is_assistant())
            .count();
        assert_eq!(assistant_entries, 1);
    }

    #[test]
    fn error_mid_stream_commits_nothing() {
        let mut app = create_test_app();
        let stream_id = submit(&mut app, "question");
        act(
            &mut app,
            AppAction::AppendResponseChunk {
                content: "half an ans".into(),
                stream_id,
            },
        );
        act(
            &mut app,
            AppAction::StreamErrored {
                message: "API Error: Rate limited\n\n```json\n{}\n```".into(),
                stream_id,
            },
        );

        assert_eq!(records(&app).len(), 1);
        assert!(matches!(
            app.session.controller.state(),
            ControllerState::Idle
        ));
        assert!(app.ui.transcript.entries().iter().all(|e| !e.is_assistant()));
        assert_eq!(
            latest_notification(&app).as_deref(),
            Some("API Error: Rate limited")
        );
    }

    #[test]
    fn cancel_removes_partial_response() {
        let mut app = create_test_app();
        let stream_id = submit(&mut app, "question");
        act(
            &mut app,
            AppAction::AppendResponseChunk {
                content: "partial".into(),
                stream_id,
            },
        );
        act(&mut app, AppAction::CancelStreaming);
        assert!(!app.session.controller.is_streaming());
        assert_eq!(records(&app).len(), 1);
        assert_eq!(latest_notification(&app).as_deref(), Some("Response cancelled."));
    }

    #[test]
    fn validation_messages() {
        let mut app = create_test_app();
        assert!(act(&mut app, AppAction::SubmitMessage).is_none());
        assert_eq!(latest_notification(&app).as_deref(), Some(EMPTY_SUBMISSION));

        app.ui.image_generation = true;
        assert!(act(&mut app, AppAction::SubmitMessage).is_none());
        assert_eq!(latest_notification(&app).as_deref(), Some(EMPTY_IMAGE_PROMPT));

        app.ui.image_generation = false;
        app.session.api_keys.clear();
        app.ui.set_input_text("hello");
        assert!(act(&mut app, AppAction::SubmitMessage).is_none());
        assert_eq!(
            latest_notification(&app).as_deref(),
            Some("OpenAI API key not set in Settings.")
        );
        assert!(records(&app).is_empty());
    }

    #[test]
    fn requests_go_to_the_model_provider() {
        let mut app = create_test_app();
        app.session.select_model("grok-3");
        app.ui.set_input_text("hello grok");
        assert!(act(&mut app, AppAction::SubmitMessage).is_none());
        assert_eq!(
            latest_notification(&app).as_deref(),
            Some("xAI API key not set in Settings.")
        );
        assert_eq!(app.ui.input_text(), "hello grok");
        assert!(records(&app).is_empty());

        app.session.set_api_key("xai", "xai-key".into());
        let Some(AppCommand::SpawnStream(params)) = act(&mut app, AppAction::SubmitMessage) else {
            panic!("expected a stream");
        };
        assert_eq!(params.base_url, "https://api.x.ai/v1");
        assert_eq!(params.api_key, "xai-key");
        assert_eq!(params.model, "grok-3");
    }

    #[test]
    fn whole_answers_commit_like_streamed_ones() {
        use crate::core::capabilities::{ModelCatalog, ModelProfile};

        let mut app = create_test_app();
        app.session.catalog = ModelCatalog::new(&[ModelProfile {
            id: "batch-only".into(),
            display_name: None,
            provider: None,
            supports_images: false,
            supports_web_search: false,
            supports_image_generation: false,
            supports_streaming: false,
        }]);
        app.session.select_model("batch-only");
        app.ui.set_input_text("one shot");
        let Some(AppCommand::SpawnStream(params)) = act(&mut app, AppAction::SubmitMessage) else {
            panic!("expected a request");
        };
        assert_eq!(
            params.mode,
            DispatchMode::Chat {
                web_search: false,
                stream: false
            }
        );

        let stream_id = params.stream_id;
        act(
            &mut app,
            AppAction::ResponseReceived {
                outcome: DispatchOutcome::Complete("All of it at once.".into()),
                stream_id,
            },
        );
        act(&mut app, AppAction::StreamCompleted { stream_id });

        let history = records(&app);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "All of it at once.");
        assert!(history[1].image_data.is_none());
        assert!(matches!(
            app.session.controller.state(),
            ControllerState::Finalized(_)
        ));
        let last = app.ui.transcript.entries().last().unwrap();
        assert!(last.affordances.regenerate && last.affordances.listen);
    }

    #[test]
    fn persona_instructions_lead_the_request_but_stay_out_of_history() {
        use crate::core::config::Config;
        use crate::core::persona::{Persona, PersonaManager};

        let mut app = create_test_app();
        let config = Config {
            personas: vec![Persona {
                id: "terse".into(),
                name: "Terse".into(),
                description: None,
                instructions: "Answer in five words.".into(),
                model: None,
            }],
            ..Config::default()
        };
        app.session.personas = PersonaManager::from_config(&config);
        app.session.personas.activate("terse").unwrap();

        app.ui.set_input_text("why is the sky blue?");
        let Some(AppCommand::SpawnStream(params)) = act(&mut app, AppAction::SubmitMessage) else {
            panic!("expected a stream");
        };
        assert_eq!(params.messages.len(), 2);
        assert_eq!(params.messages[0], ChatMessage::system("Answer in five words."));
        assert_eq!(params.messages[1].role, "user");
        assert_eq!(records(&app).len(), 1);
    }

    #[test]
    fn toggles_shape_the_request_and_reset_after_send() {
        let mut app = create_test_app();
        app.ui.web_search = true;
        app.ui.set_input_text("news today");
        let Some(AppCommand::SpawnStream(params)) = act(&mut app, AppAction::SubmitMessage) else {
            panic!("expected a stream");
        };
        assert_eq!(
            params.mode,
            DispatchMode::Chat {
                web_search: true,
                stream: true
            }
        );
        assert!(!app.ui.web_search);

        app.ui.image_generation = true;
        app.ui.set_input_text("a red fox");
        let Some(AppCommand::SpawnStream(params)) = act(&mut app, AppAction::SubmitMessage) else {
            panic!("expected a stream");
        };
        assert_eq!(
            params.mode,
            DispatchMode::ImageGeneration {
                prompt: "a red fox".into()
            }
        );
        assert_eq!(params.model, app.session.image_model);
        assert!(!app.ui.image_generation);
    }

    #[test]
    fn image_result_commits_image_data_and_offers_copy_only() {
        let mut app = create_test_app();
        app.ui.image_generation = true;
        let stream_id = submit(&mut app, "a lighthouse");
        act(
            &mut app,
            AppAction::ResponseReceived {
                outcome: DispatchOutcome::Image {
                    url: "https://img.example/1.png".into(),
                    prompt: "a lighthouse".into(),
                },
                stream_id,
            },
        );
        act(&mut app, AppAction::StreamCompleted { stream_id });

        let history = records(&app);
        assert_eq!(
            history[1].image_data.as_deref(),
            Some("https://img.example/1.png")
        );
        let last = app.ui.transcript.entries().last().unwrap();
        assert!(last.affordances.copy);
        assert!(!last.affordances.regenerate && !last.affordances.listen);
    }

    #[test]
    fn regenerate_replaces_only_the_last_answer() {
        let mut app = create_test_app();
        complete_turn(&mut app, "first", "answer one");
        complete_turn(&mut app, "second", "answer two");

        let Some(AppCommand::SpawnStream(params)) = act(&mut app, AppAction::RegenerateResponse)
        else {
            panic!("expected a new request");
        };
        assert_eq!(params.messages.len(), 3);
        let contents: Vec<String> = records(&app).into_iter().map(|r| r.content).collect();
        assert_eq!(contents, vec!["first", "answer one", "second"]);

        stream_response(&mut app, params.stream_id, &["answer two, again"]);
        assert_eq!(records(&app)[3].content, "answer two, again");
        let older = app
            .ui
            .transcript
            .entries()
            .iter()
            .find(|e| e.history_index == Some(1))
            .unwrap();
        assert!(!older.affordances.regenerate);
    }

    #[test]
    fn regenerate_on_older_answer_is_refused() {
        let mut app = create_test_app();
        complete_turn(&mut app, "first", "answer one");
        complete_turn(&mut app, "second", "answer two");
        app.ui.transcript.select_previous();
        app.ui.transcript.select_previous();

        assert!(act(&mut app, AppAction::RegenerateResponse).is_none());
        assert_eq!(records(&app).len(), 4);
        assert_eq!(
            latest_notification(&app).as_deref(),
            Some("Only the latest response can be regenerated.")
        );
    }

    #[test]
    fn submit_on_a_tiny_window_keeps_the_input() {
        let mut app = create_test_app();
        app.ui.transcript.set_available(false);
        app.ui.set_input_text("hello");

        assert!(act(&mut app, AppAction::SubmitMessage).is_none());
        assert!(records(&app).is_empty());
        assert_eq!(app.ui.input_text(), "hello");
        assert_eq!(latest_notification(&app).as_deref(), Some(WINDOW_TOO_SMALL));
    }

    #[test]
    fn regenerate_on_a_tiny_window_keeps_the_answer() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("log.txt");
        let mut app = create_test_app_with(Default::default(), None, Some(log_path.clone()));
        complete_turn(&mut app, "question", "the answer");
        app.ui.transcript.set_available(false);

        assert!(act(&mut app, AppAction::RegenerateResponse).is_none());
        let contents: Vec<String> = records(&app).into_iter().map(|r| r.content).collect();
        assert_eq!(contents, vec!["question", "the answer"]);
        assert!(std::fs::read_to_string(&log_path).unwrap().contains("the answer"));
        assert!(matches!(
            app.session.controller.state(),
            ControllerState::Finalized(_)
        ));

        app.ui.transcript.set_available(true);
        assert!(act(&mut app, AppAction::RegenerateResponse).is_some());
    }

    #[test]
    fn regenerate_rewrites_transcript_log() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("log.txt");
        let mut app = create_test_app_with(Default::default(), None, Some(log_path.clone()));
        complete_turn(&mut app, "question", "first try");
        act(&mut app, AppAction::RegenerateResponse);

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("question"));
        assert!(!contents.contains("first try"));
    }
}
