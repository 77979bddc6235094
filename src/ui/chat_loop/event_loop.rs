//! Event polling, dispatching, and UI rendering loop.
//!
//! The loop owns the terminal. It polls crossterm input on a reader task,
//! resolves keys through [`map_key`](super::keybindings::map_key), feeds
//! actions to the shared [`App`], and runs the background work those actions
//! ask for: model requests, speech synthesis, and clipboard writes. Stream
//! output is coalesced per frame so a burst of chunks costs one re-render.

use std::{
    error::Error,
    io,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use ratatui::crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use ratatui::prelude::Size;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::core::affordances::{PlaybackEvent, ProcessPlayer};
use crate::core::app::{
    apply_actions, App, AppAction, AppActionContext, AppActionDispatcher, AppActionEnvelope,
    AppCommand, AppInitConfig, SpeechJob,
};
use crate::core::config::Config;
use crate::core::dispatch::{RequestDispatcher, StreamMessage};
use crate::core::keyring::ApiKeyStore;
use crate::core::providers::ProviderCatalog;
use crate::core::sessions::ChatSessionStore;
use crate::core::speech::{OpenAiSpeech, SpeechSynthesizer, VoiceSettings};
use crate::ui::notifications::NotificationKind;
use crate::ui::renderer::ui;
use crate::utils::clipboard::copy_to_clipboard;

use super::keybindings::{map_key, map_mouse, sanitize_pasted_text, KeyContext, KeyResult};
use super::lifecycle::{restore_terminal, setup_terminal, SharedTerminal};
use super::{AppHandle, UiEvent};

const MAX_FPS: u64 = 60;
const NOTIFICATION_TICK: Duration = Duration::from_millis(250);

/// What the CLI hands to the chat loop.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub transcript_file: Option<PathBuf>,
}

fn bootstrap_app(
    options: ChatOptions,
    config: &Config,
    playback_tx: mpsc::UnboundedSender<PlaybackEvent>,
) -> App {
    let key_store = ApiKeyStore::default();
    let api_keys = key_store.resolve_all(ProviderCatalog::new(config).providers());

    let chats = match ChatSessionStore::open_default() {
        Ok(store) => Some(store),
        Err(err) => {
            warn!(error = %err, "chat history disabled");
            None
        }
    };

    let player = ProcessPlayer::new(config.resolve_audio_player(), playback_tx);
    let init = AppInitConfig {
        model: options.model,
        transcript_file: options.transcript_file,
        api_keys,
        key_store,
        chats,
        player: Arc::new(player),
    };
    App::new(init, config)
}

fn spawn_event_reader(event_tx: mpsc::UnboundedSender<UiEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Ok(true) = event::poll(Duration::from_millis(10)) {
                match event::read() {
                    Ok(ev) => {
                        if event_tx.send(UiEvent::Crossterm(ev)).is_err() {
                            break;
                        }
                    }
                    Err(_) => {
                        continue;
                    }
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    })
}

/// Asks `synthesizer` for audio and reports the result as an action.
async fn synthesize_speech<S>(
    synthesizer: &S,
    request_id: u64,
    text: &str,
    voice: &VoiceSettings,
) -> AppAction
where
    S: SpeechSynthesizer + ?Sized,
{
    match synthesizer.synthesize(text, voice).await {
        Ok(audio) => AppAction::SpeechReady { request_id, audio },
        Err(err) => {
            warn!(request_id, error = %err, "speech synthesis failed");
            AppAction::SpeechFailed {
                request_id,
                error: err.to_string(),
            }
        }
    }
}

fn spawn_speech_job(dispatcher: AppActionDispatcher, job: SpeechJob, ctx: AppActionContext) {
    tokio::spawn(async move {
        let SpeechJob {
            request_id,
            text,
            voice,
            client,
            base_url,
            api_key,
        } = job;
        let synthesizer = OpenAiSpeech::new(client, base_url, api_key);
        let action = synthesize_speech(&synthesizer, request_id, &text, &voice).await;
        dispatcher.dispatch_many([action], ctx);
    });
}

fn spawn_clipboard_copy(dispatcher: AppActionDispatcher, text: String, ctx: AppActionContext) {
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || copy_to_clipboard(&text))
            .await
            .map_err(|err| err.to_string())
            .and_then(|result| result);
        let action = match result {
            Ok(method) => {
                debug!(?method, "copied to clipboard");
                AppAction::Notify {
                    kind: NotificationKind::Success,
                    message: "Copied to clipboard.".to_string(),
                }
            }
            Err(err) => AppAction::Notify {
                kind: NotificationKind::Error,
                message: err,
            },
        };
        dispatcher.dispatch_many([action], ctx);
    });
}

fn playback_event_action(event: PlaybackEvent) -> AppAction {
    match event {
        PlaybackEvent::Finished { playback_id } => AppAction::PlaybackFinished { playback_id },
        PlaybackEvent::Failed { playback_id, error } => {
            AppAction::PlaybackFailed { playback_id, error }
        }
    }
}

async fn is_exit_requested(app: &AppHandle) -> bool {
    app.read(|app| app.ui.exit_requested).await
}

async fn current_terminal_size(terminal: &SharedTerminal) -> Size {
    let terminal_guard = terminal.lock().await;
    terminal_guard.size().unwrap_or_default()
}

async fn try_draw_frame(
    app: &AppHandle,
    terminal: &SharedTerminal,
    request_redraw: &mut bool,
    last_draw: &mut Instant,
    frame_duration: Duration,
) -> io::Result<()> {
    if !*request_redraw {
        return Ok(());
    }

    let now = Instant::now();
    if now.duration_since(*last_draw) < frame_duration {
        return Ok(());
    }

    let mut terminal_guard = terminal.lock().await;
    app.read(|app| terminal_guard.draw(|f| ui(f, app)).map(|_| ()))
        .await?;
    *last_draw = now;
    *request_redraw = false;
    Ok(())
}

async fn process_ui_events(
    app: &AppHandle,
    event_rx: &mut mpsc::UnboundedReceiver<UiEvent>,
    dispatcher: &AppActionDispatcher,
    term_size: Size,
) -> bool {
    let ctx = AppActionContext {
        term_width: term_size.width,
        term_height: term_size.height,
    };
    let mut events_processed = false;

    while let Ok(ev) = event_rx.try_recv() {
        events_processed = true;
        match ev {
            UiEvent::Crossterm(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                route_keyboard_event(app, dispatcher, key, ctx).await;
            }
            UiEvent::Crossterm(Event::Paste(text)) => {
                let text = sanitize_pasted_text(&text);
                if !text.is_empty() {
                    dispatcher.dispatch_many([AppAction::InsertIntoInput { text }], ctx);
                }
            }
            UiEvent::Crossterm(Event::Mouse(mouse)) => {
                if let Some(action) = map_mouse(&mouse) {
                    dispatcher.dispatch_many([action], ctx);
                }
            }
            UiEvent::Crossterm(_) => {}
        }
    }

    events_processed
}

async fn route_keyboard_event(
    app: &AppHandle,
    dispatcher: &AppActionDispatcher,
    key: KeyEvent,
    ctx: AppActionContext,
) {
    let context = app
        .read(|app| KeyContext::from_app(app, ctx.term_width, ctx.term_height))
        .await;

    match map_key(&context, &key) {
        KeyResult::Action(action) => dispatcher.dispatch_many([action], ctx),
        KeyResult::TextInput => {
            app.update(|app| {
                app.ui.apply_textarea_edit(|textarea| {
                    textarea.input(tui_textarea::Input::from(key));
                });
            })
            .await;
        }
        KeyResult::NotHandled => {}
    }
}

/// Drains stream output for the current request. Chunks that arrived since the
/// last frame become a single append; anything tagged with an older stream id
/// is dropped here.
fn process_stream_updates(
    dispatcher: &AppActionDispatcher,
    rx: &mut mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    ctx: AppActionContext,
    current_stream_id: u64,
) -> bool {
    let mut received_any = false;
    let mut coalesced_chunks = String::new();
    let mut followup_actions = Vec::new();

    while let Ok((message, msg_stream_id)) = rx.try_recv() {
        if msg_stream_id != current_stream_id {
            continue;
        }

        match message {
            StreamMessage::Chunk(content) => coalesced_chunks.push_str(&content),
            StreamMessage::Complete(outcome) => {
                followup_actions.push(AppAction::ResponseReceived {
                    outcome,
                    stream_id: msg_stream_id,
                });
            }
            StreamMessage::Error(err) => {
                followup_actions.push(AppAction::StreamErrored {
                    message: err,
                    stream_id: msg_stream_id,
                });
            }
            StreamMessage::End => followup_actions.push(AppAction::StreamCompleted {
                stream_id: msg_stream_id,
            }),
        }

        received_any = true;
    }

    if !received_any {
        return false;
    }

    let mut actions = Vec::with_capacity(1 + followup_actions.len());
    if !coalesced_chunks.is_empty() {
        actions.push(AppAction::AppendResponseChunk {
            content: coalesced_chunks,
            stream_id: current_stream_id,
        });
    }
    actions.extend(followup_actions);
    dispatcher.dispatch_many(actions, ctx);

    true
}

fn process_playback_events(
    dispatcher: &AppActionDispatcher,
    rx: &mut mpsc::UnboundedReceiver<PlaybackEvent>,
    ctx: AppActionContext,
) -> bool {
    let mut received_any = false;
    while let Ok(event) = rx.try_recv() {
        dispatcher.dispatch_many([playback_event_action(event)], ctx);
        received_any = true;
    }
    received_any
}

async fn drain_action_queue(
    app: &AppHandle,
    dispatcher: &AppActionDispatcher,
    request_dispatcher: &RequestDispatcher,
    action_rx: &mut mpsc::UnboundedReceiver<AppActionEnvelope>,
    ctx: AppActionContext,
) -> bool {
    let mut pending = Vec::new();
    while let Ok(envelope) = action_rx.try_recv() {
        pending.push(envelope);
    }

    if pending.is_empty() {
        return false;
    }

    let commands = app.update(|app| apply_actions(app, pending)).await;
    for cmd in commands {
        match cmd {
            AppCommand::SpawnStream(params) => {
                debug!(stream_id = params.stream_id, model = %params.model, "dispatching request");
                request_dispatcher.dispatch(params);
            }
            AppCommand::SynthesizeSpeech(job) => {
                spawn_speech_job(dispatcher.clone(), job, ctx);
            }
            AppCommand::CopyToClipboard(text) => {
                spawn_clipboard_copy(dispatcher.clone(), text, ctx);
            }
        }
    }
    true
}

pub async fn run_chat(options: ChatOptions, config: Config) -> Result<(), Box<dyn Error>> {
    let (playback_tx, mut playback_rx) = mpsc::unbounded_channel::<PlaybackEvent>();
    let app = AppHandle::new(Arc::new(Mutex::new(bootstrap_app(
        options,
        &config,
        playback_tx,
    ))));
    let model = app.read(|app| app.session.model.clone()).await;
    info!(%model, "chat session starting");

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<AppActionEnvelope>();
    let action_dispatcher = AppActionDispatcher::new(action_tx);
    let (request_dispatcher, mut stream_rx) = RequestDispatcher::new();

    let terminal = setup_terminal()?;
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<UiEvent>();
    let event_reader_handle = spawn_event_reader(event_tx);

    let frame_duration = Duration::from_millis(1000 / MAX_FPS);
    let mut last_draw = Instant::now() - frame_duration;
    let mut request_redraw = true;
    let mut last_tick = Instant::now();
    let mut last_size = Size::default();

    let result: Result<(), Box<dyn Error>> = 'main_loop: loop {
        if is_exit_requested(&app).await {
            break 'main_loop Ok(());
        }

        let term_size = current_terminal_size(&terminal).await;
        if term_size != last_size {
            app.update(|app| app.sync_terminal_size(term_size.width, term_size.height))
                .await;
            last_size = term_size;
            request_redraw = true;
        }
        let ctx = AppActionContext {
            term_width: term_size.width,
            term_height: term_size.height,
        };

        if let Err(err) = try_draw_frame(
            &app,
            &terminal,
            &mut request_redraw,
            &mut last_draw,
            frame_duration,
        )
        .await
        {
            break 'main_loop Err(err.into());
        }

        let events_processed =
            process_ui_events(&app, &mut event_rx, &action_dispatcher, term_size).await;

        let current_stream_id = app.read(|app| app.session.current_stream_id).await;
        let received_any =
            process_stream_updates(&action_dispatcher, &mut stream_rx, ctx, current_stream_id);
        let playback_changed = process_playback_events(&action_dispatcher, &mut playback_rx, ctx);

        if last_tick.elapsed() >= NOTIFICATION_TICK {
            last_tick = Instant::now();
            let has_notifications = app.read(|app| !app.ui.notifications.is_empty()).await;
            if has_notifications {
                action_dispatcher.dispatch_many([AppAction::ExpireNotifications], ctx);
            }
        }

        let actions_applied = drain_action_queue(
            &app,
            &action_dispatcher,
            &request_dispatcher,
            &mut action_rx,
            ctx,
        )
        .await;

        if events_processed || received_any || playback_changed || actions_applied {
            request_redraw = true;
        }

        if !request_redraw {
            tokio::time::sleep(Duration::from_millis(16)).await;
        }
    };

    event_reader_handle.abort();
    restore_terminal(&terminal).await?;
    app.update(|app| {
        app.session.cancel_current_stream();
        app.playback.stop_all();
    })
    .await;
    info!("chat session ended");

    result
}
