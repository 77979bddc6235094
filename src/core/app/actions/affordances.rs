use std::time::Duration;

use super::{App, AppAction, AppActionContext, AppCommand, SpeechJob};
use crate::core::affordances::{AffordanceSet, ListenRequest};
use crate::core::history::HistoryStore;
use crate::core::message::MessageRecord;
use crate::ui::notifications::NotificationKind;
use crate::ui::transcript::EntryId;
use tracing::{debug, warn};

const VOICE_DISCLOSURE: &str = "Playing AI-generated voice.";
const VOICE_DISCLOSURE_LIFETIME: Duration = Duration::from_secs(4);

pub(super) fn handle_affordance_action(
    app: &mut App,
    action: AppAction,
    _ctx: AppActionContext,
) -> Option<AppCommand> {
    match action {
        AppAction::CopyResponse => copy_response(app),
        AppAction::ListenResponse => listen_response(app),
        AppAction::SelectPreviousResponse => {
            app.ui.transcript.select_previous();
            None
        }
        AppAction::SelectNextResponse => {
            app.ui.transcript.select_next();
            None
        }
        AppAction::SpeechReady { request_id, audio } => {
            let format = app.session.voice.format.clone();
            match app.playback.speech_ready(request_id, audio, &format) {
                Ok(Some(_)) => app.notify_for(
                    NotificationKind::Info,
                    VOICE_DISCLOSURE,
                    VOICE_DISCLOSURE_LIFETIME,
                ),
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "playback failed to start");
                    app.notify(NotificationKind::Error, err.to_string());
                }
            }
            None
        }
        AppAction::SpeechFailed { request_id, error } => {
            if app.playback.speech_failed(request_id).is_some() {
                app.notify(NotificationKind::Error, error);
            }
            None
        }
        AppAction::PlaybackFinished { playback_id } => {
            app.playback.playback_ended(playback_id);
            None
        }
        AppAction::PlaybackFailed { playback_id, error } => {
            if app.playback.playback_ended(playback_id) {
                app.notify(NotificationKind::Error, error);
            }
            None
        }
        _ => unreachable!(),
    }
}

/// The targeted entry and its committed record, if the entry offers `want`.
fn target_record(
    app: &App,
    want: impl Fn(AffordanceSet) -> bool,
) -> Option<(EntryId, &MessageRecord)> {
    let target = app.ui.transcript.affordance_target()?;
    let entry = app.ui.transcript.entry(target)?;
    if !want(entry.affordances) {
        return None;
    }
    let index = entry.history_index?;
    app.session
        .history
        .records()
        .get(index)
        .map(|record| (target, record))
}

fn copy_response(app: &mut App) -> Option<AppCommand> {
    let Some((_, record)) = target_record(app, |a| a.copy) else {
        app.notify(NotificationKind::Info, "Nothing to copy yet.");
        return None;
    };
    let text = match (&record.image_data, record.is_generated_image()) {
        (Some(url), true) => url.clone(),
        _ => record.content.clone(),
    };
    Some(AppCommand::CopyToClipboard(text))
}

fn listen_response(app: &mut App) -> Option<AppCommand> {
    let Some((target, record)) = target_record(app, |a| a.listen) else {
        app.notify(NotificationKind::Info, "Nothing to listen to yet.");
        return None;
    };
    let text = record.content.clone();
    match app.playback.request_listen(target) {
        ListenRequest::Stopped => {
            debug!(%target, "playback stopped by user");
            None
        }
        ListenRequest::Synthesize { request_id } => {
            let endpoint = match app.session.speech_endpoint() {
                Ok(endpoint) => endpoint,
                Err(notice) => {
                    app.playback.speech_failed(request_id);
                    app.notify(NotificationKind::Error, notice);
                    return None;
                }
            };
            Some(AppCommand::SynthesizeSpeech(SpeechJob {
                request_id,
                text,
                voice: app.session.voice.clone(),
                client: app.session.client.clone(),
                base_url: endpoint.base_url,
                api_key: endpoint.api_key,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::affordances::test_support::FakePlayer;
    use crate::core::affordances::ListenState;
    use crate::utils::test_utils::{act, complete_turn, create_test_app, create_test_app_with};

    fn listen(app: &mut App) -> u64 {
        match act(app, AppAction::ListenResponse) {
            Some(AppCommand::SynthesizeSpeech(job)) => job.request_id,
            _ => panic!("expected a speech request"),
        }
    }

    fn newest_assistant(app: &App) -> EntryId {
        app.ui
            .transcript
            .entries()
            .iter()
            .rev()
            .find(|e| e.is_assistant())
            .map(|e| e.id)
            .unwrap()
    }

    #[test]
    fn copy_uses_the_raw_response_text() {
        let mut app = create_test_app();
        assert!(act(&mut app, AppAction::CopyResponse).is_none());
        complete_turn(&mut app, "hi", "**bold** reply");
        match act(&mut app, AppAction::CopyResponse) {
            Some(AppCommand::CopyToClipboard(text)) => assert_eq!(text, "**bold** reply"),
            _ => panic!("expected a copy"),
        }
    }

    #[test]
    fn listen_loads_then_plays_with_disclosure() {
        let player = FakePlayer::default();
        let mut app = create_test_app_with(player.clone(), None, None);
        complete_turn(&mut app, "hi", "spoken reply");
        let entry = newest_assistant(&app);

        let request_id = listen(&mut app);
        assert_eq!(app.listen_state(entry), ListenState::Loading);

        act(
            &mut app,
            AppAction::SpeechReady {
                request_id,
                audio: vec![1, 2, 3],
            },
        );
        assert_eq!(app.listen_state(entry), ListenState::Playing);
        assert_eq!(
            app.ui.notifications.latest().map(|n| n.message.as_str()),
            Some(VOICE_DISCLOSURE)
        );
        assert_eq!(player.live.lock().unwrap().len(), 1);
    }

    #[test]
    fn listening_to_another_message_keeps_one_stream() {
        let player = FakePlayer::default();
        let mut app = create_test_app_with(player.clone(), None, None);
        complete_turn(&mut app, "one", "first reply");
        complete_turn(&mut app, "two", "second reply");

        let first = listen(&mut app);
        act(&mut app, AppAction::SpeechReady { request_id: first, audio: vec![0] });

        app.ui.transcript.select_previous();
        app.ui.transcript.select_previous();
        let second = listen(&mut app);
        act(&mut app, AppAction::SpeechReady { request_id: second, audio: vec![0] });

        assert_eq!(app.playback.active_count(), 1);
        assert_eq!(player.live.lock().unwrap().len(), 1);
        let log = player.log.lock().unwrap().clone();
        assert!(log.iter().any(|line| line.starts_with("release")));
    }

    #[test]
    fn listen_on_playing_message_stops_it() {
        let mut app = create_test_app();
        complete_turn(&mut app, "hi", "reply");
        let entry = newest_assistant(&app);
        let request_id = listen(&mut app);
        act(&mut app, AppAction::SpeechReady { request_id, audio: vec![0] });

        assert!(act(&mut app, AppAction::ListenResponse).is_none());
        assert_eq!(app.listen_state(entry), ListenState::Idle);
    }

    #[test]
    fn speech_failure_clears_loading() {
        let mut app = create_test_app();
        complete_turn(&mut app, "hi", "reply");
        let entry = newest_assistant(&app);
        let request_id = listen(&mut app);
        act(
            &mut app,
            AppAction::SpeechFailed {
                request_id,
                error: "Speech request failed (500): boom".into(),
            },
        );
        assert_eq!(app.listen_state(entry), ListenState::Idle);
        assert_eq!(app.playback.active_count(), 0);
        assert_eq!(
            app.ui.notifications.latest().map(|n| n.kind),
            Some(NotificationKind::Error)
        );
    }

    #[test]
    fn natural_end_returns_to_idle() {
        let mut app = create_test_app();
        complete_turn(&mut app, "hi", "reply");
        let entry = newest_assistant(&app);
        let request_id = listen(&mut app);
        act(&mut app, AppAction::SpeechReady { request_id, audio: vec![0] });
        let playback_id = app.playback.active_playback_id().unwrap();

        act(&mut app, AppAction::PlaybackFinished { playback_id });
        assert_eq!(app.listen_state(entry), ListenState::Idle);
    }

    #[test]
    fn speech_uses_the_openai_key_whatever_the_model() {
        let mut app = create_test_app();
        app.session.select_model("gemini-2.5-pro");
        app.session.set_api_key("gemini", "gemini-key".into());
        complete_turn(&mut app, "hi", "reply");
        match act(&mut app, AppAction::ListenResponse) {
            Some(AppCommand::SynthesizeSpeech(job)) => {
                assert_eq!(job.api_key, "test-key");
                assert_eq!(job.base_url, "https://api.openai.com/v1");
            }
            _ => panic!("expected a speech request"),
        }

        app.session.api_keys.remove("openai");
        let entry = newest_assistant(&app);
        assert!(act(&mut app, AppAction::ListenResponse).is_none());
        assert_eq!(app.listen_state(entry), ListenState::Idle);
        assert_eq!(
            app.ui.notifications.latest().map(|n| n.message.as_str()),
            Some("OpenAI API key not set in Settings.")
        );
    }
}
