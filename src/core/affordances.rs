//! Post-finalization actions and the single audio playback channel.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::stream_controller::ResponseKind;
use crate::ui::transcript::EntryId;

/// Which actions a finalized message offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AffordanceSet {
    pub copy: bool,
    pub regenerate: bool,
    pub listen: bool,
}

impl AffordanceSet {
    pub const fn none() -> Self {
        Self {
            copy: false,
            regenerate: false,
            listen: false,
        }
    }

    pub const fn copy_only() -> Self {
        Self {
            copy: true,
            regenerate: false,
            listen: false,
        }
    }

    pub const fn all() -> Self {
        Self {
            copy: true,
            regenerate: true,
            listen: true,
        }
    }

    /// Image results can be copied but not regenerated or narrated.
    pub fn for_response(kind: ResponseKind) -> Self {
        match kind {
            ResponseKind::Text => Self::all(),
            ResponseKind::GeneratedImage => Self::copy_only(),
        }
    }

    pub fn without_regenerate(self) -> Self {
        Self {
            regenerate: false,
            ..self
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.copy || self.regenerate || self.listen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenState {
    Idle,
    Loading,
    Playing,
}

#[derive(Debug)]
pub enum PlaybackError {
    NoPlayerConfigured,
    TempFile(std::io::Error),
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackError::NoPlayerConfigured => {
                write!(f, "No audio player configured (set audio-player)")
            }
            PlaybackError::TempFile(err) => write!(f, "Could not buffer audio: {err}"),
            PlaybackError::Spawn { command, source } => {
                write!(f, "Could not start audio player `{command}`: {source}")
            }
        }
    }
}

impl std::error::Error for PlaybackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlaybackError::NoPlayerConfigured => None,
            PlaybackError::TempFile(err) => Some(err),
            PlaybackError::Spawn { source, .. } => Some(source),
        }
    }
}

/// Reported by a player when a stream ends on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Finished { playback_id: u64 },
    Failed { playback_id: u64, error: String },
}

/// One running audio stream. Teardown happens in three steps so a stream can
/// never report back after it has been replaced.
pub trait PlaybackStream: Send {
    /// Halt audible output.
    fn stop(&mut self);
    /// Drop any completion callback so the stream cannot report back.
    fn detach_handlers(&mut self);
    /// Free the buffered audio and any OS resources behind it.
    fn release(&mut self);
}

pub trait AudioPlayer: Send + Sync {
    fn start(
        &self,
        playback_id: u64,
        audio: Vec<u8>,
        format: &str,
    ) -> Result<Box<dyn PlaybackStream>, PlaybackError>;
}

struct ActivePlayback {
    id: u64,
    target: EntryId,
    stream: Box<dyn PlaybackStream>,
}

/// Owns the audio channel: at most one stream plays, and at most one speech
/// request is awaited.
pub struct PlaybackCoordinator {
    player: Arc<dyn AudioPlayer>,
    active: Option<ActivePlayback>,
    pending: Option<(u64, EntryId)>,
    next_id: u64,
}

impl fmt::Debug for PlaybackCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackCoordinator")
            .field("active", &self.active.as_ref().map(|a| (a.id, a.target)))
            .field("pending", &self.pending)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenRequest {
    /// The target was playing and has been stopped.
    Stopped,
    /// Speech should be synthesized for the target under this request id.
    Synthesize { request_id: u64 },
}

impl PlaybackCoordinator {
    pub fn new(player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            player,
            active: None,
            pending: None,
            next_id: 0,
        }
    }

    pub fn listen_state(&self, target: EntryId) -> ListenState {
        if self.active.as_ref().is_some_and(|a| a.target == target) {
            ListenState::Playing
        } else if self.pending.is_some_and(|(_, t)| t == target) {
            ListenState::Loading
        } else {
            ListenState::Idle
        }
    }

    pub fn active_count(&self) -> usize {
        usize::from(self.active.is_some())
    }

    pub fn active_playback_id(&self) -> Option<u64> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Listen pressed on `target`. Pressing it on the playing message stops
    /// playback; otherwise whatever is playing is torn down and a new speech
    /// request begins.
    pub fn request_listen(&mut self, target: EntryId) -> ListenRequest {
        if self.active.as_ref().is_some_and(|a| a.target == target) {
            self.stop_current();
            return ListenRequest::Stopped;
        }
        self.stop_current();
        let request_id = self.allocate_id();
        self.pending = Some((request_id, target));
        ListenRequest::Synthesize { request_id }
    }

    /// Speech arrived. Returns the target that started playing, or `None`
    /// when the request was superseded in the meantime.
    pub fn speech_ready(
        &mut self,
        request_id: u64,
        audio: Vec<u8>,
        format: &str,
    ) -> Result<Option<EntryId>, PlaybackError> {
        let Some((pending_id, target)) = self.pending else {
            return Ok(None);
        };
        if pending_id != request_id {
            debug!(request_id, pending_id, "dropping superseded speech");
            return Ok(None);
        }
        self.pending = None;
        self.stop_current();

        let playback_id = self.allocate_id();
        let stream = self.player.start(playback_id, audio, format)?;
        self.active = Some(ActivePlayback {
            id: playback_id,
            target,
            stream,
        });
        debug!(playback_id, ?target, "playback started");
        Ok(Some(target))
    }

    /// Synthesis failed; clears the loading state if it still belongs to the
    /// request.
    pub fn speech_failed(&mut self, request_id: u64) -> Option<EntryId> {
        match self.pending {
            Some((pending_id, target)) if pending_id == request_id => {
                self.pending = None;
                Some(target)
            }
            _ => None,
        }
    }

    pub fn playback_ended(&mut self, playback_id: u64) -> bool {
        if self.active_playback_id() != Some(playback_id) {
            return false;
        }
        if let Some(mut active) = self.active.take() {
            active.stream.detach_handlers();
            active.stream.release();
        }
        true
    }

    /// Tear down the current stream and forget any pending request.
    pub fn stop_all(&mut self) {
        self.pending = None;
        self.stop_current();
    }

    fn stop_current(&mut self) {
        if let Some(mut active) = self.active.take() {
            debug!(playback_id = active.id, "stopping playback");
            active.stream.stop();
            active.stream.detach_handlers();
            active.stream.release();
        }
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.stop_current();
    }
}

/// Plays audio by handing a temporary file to an external player command.
pub struct ProcessPlayer {
    command: Vec<String>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl ProcessPlayer {
    pub fn new(command: Vec<String>, events: mpsc::UnboundedSender<PlaybackEvent>) -> Self {
        Self { command, events }
    }
}

struct ProcessStream {
    stop_token: CancellationToken,
    watcher: Option<JoinHandle<()>>,
    audio_file: Option<NamedTempFile>,
}

impl PlaybackStream for ProcessStream {
    fn stop(&mut self) {
        self.stop_token.cancel();
    }

    fn detach_handlers(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }

    fn release(&mut self) {
        self.audio_file.take();
    }
}

impl AudioPlayer for ProcessPlayer {
    fn start(
        &self,
        playback_id: u64,
        audio: Vec<u8>,
        format: &str,
    ) -> Result<Box<dyn PlaybackStream>, PlaybackError> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(PlaybackError::NoPlayerConfigured);
        };

        let mut audio_file = tempfile::Builder::new()
            .prefix("murmur-speech-")
            .suffix(&format!(".{format}"))
            .tempfile()
            .map_err(PlaybackError::TempFile)?;
        audio_file
            .write_all(&audio)
            .and_then(|_| audio_file.flush())
            .map_err(PlaybackError::TempFile)?;

        let mut child = Command::new(program)
            .args(args)
            .arg(audio_file.path())
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PlaybackError::Spawn {
                command: program.clone(),
                source,
            })?;

        let stop_token = CancellationToken::new();
        let watcher_token = stop_token.clone();
        let events = self.events.clone();
        let watcher = tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    let event = match status {
                        Ok(status) if status.success() => PlaybackEvent::Finished { playback_id },
                        Ok(status) => PlaybackEvent::Failed {
                            playback_id,
                            error: format!("audio player exited with {status}"),
                        },
                        Err(err) => PlaybackEvent::Failed {
                            playback_id,
                            error: err.to_string(),
                        },
                    };
                    let _ = events.send(event);
                }
                _ = watcher_token.cancelled() => {
                    let _ = child.kill().await;
                }
            }
        });

        Ok(Box::new(ProcessStream {
            stop_token,
            watcher: Some(watcher),
            audio_file: Some(audio_file),
        }))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records teardown calls so tests can check ordering and release.
    #[derive(Default, Clone)]
    pub struct FakePlayer {
        pub log: Arc<Mutex<Vec<String>>>,
        pub live: Arc<Mutex<Vec<u64>>>,
    }

    struct FakeStream {
        id: u64,
        log: Arc<Mutex<Vec<String>>>,
        live: Arc<Mutex<Vec<u64>>>,
    }

    impl PlaybackStream for FakeStream {
        fn stop(&mut self) {
            self.log.lock().unwrap().push(format!("stop {}", self.id));
        }

        fn detach_handlers(&mut self) {
            self.log.lock().unwrap().push(format!("detach {}", self.id));
        }

        fn release(&mut self) {
            self.log.lock().unwrap().push(format!("release {}", self.id));
            self.live.lock().unwrap().retain(|id| *id != self.id);
        }
    }

    impl AudioPlayer for FakePlayer {
        fn start(
            &self,
            playback_id: u64,
            _audio: Vec<u8>,
            _format: &str,
        ) -> Result<Box<dyn PlaybackStream>, PlaybackError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("start {playback_id}"));
            self.live.lock().unwrap().push(playback_id);
            Ok(Box::new(FakeStream {
                id: playback_id,
                log: self.log.clone(),
                live: self.live.clone(),
            }))
        }
    }
}
