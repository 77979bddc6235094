//! Lifecycle of the assistant response currently on screen.
//!
//! The controller owns at most one [`StreamingSlot`] at a time. A slot is
//! created empty, grows through [`StreamController::append_chunk`] while the
//! response streams in, and is re-rendered exactly once by
//! [`StreamController::finalize`]. A finalized slot can only leave the
//! controller by being regenerated or replaced by the next response; it never
//! streams again.
//!
//! Rendering and display are collaborators passed into each call so the
//! controller itself holds no references to UI state.

use std::fmt;

use tracing::{debug, warn};

use crate::core::affordances::AffordanceSet;
use crate::core::history::HistoryStore;
use crate::core::message::MessageRecord;
use crate::ui::render::{ContentRenderer, RenderedMarkup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Token returned by [`StreamController::create`]. Every later operation must
/// present the handle of the slot it targets; handles of discarded slots are
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHandle {
    id: SlotId,
}

impl SlotHandle {
    pub fn id(&self) -> SlotId {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotPhase {
    Streaming,
    Finalized,
}

impl fmt::Display for SlotPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotPhase::Streaming => f.write_str("streaming"),
            SlotPhase::Finalized => f.write_str("finalized"),
        }
    }
}

/// What a finalized response represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Text,
    GeneratedImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingSlot {
    id: SlotId,
    accumulated_raw_text: String,
    bound_history_index: Option<usize>,
    kind: ResponseKind,
    affordances: AffordanceSet,
}

impl StreamingSlot {
    fn new(id: SlotId) -> Self {
        Self {
            id,
            accumulated_raw_text: String::new(),
            bound_history_index: None,
            kind: ResponseKind::Text,
            affordances: AffordanceSet::none(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn accumulated_raw_text(&self) -> &str {
        &self.accumulated_raw_text
    }

    pub fn bound_history_index(&self) -> Option<usize> {
        self.bound_history_index
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    pub fn affordances(&self) -> AffordanceSet {
        self.affordances
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ControllerState {
    #[default]
    Idle,
    Streaming(StreamingSlot),
    Finalized(StreamingSlot),
}

impl ControllerState {
    fn slot(&self) -> Option<&StreamingSlot> {
        match self {
            ControllerState::Idle => None,
            ControllerState::Streaming(slot) | ControllerState::Finalized(slot) => Some(slot),
        }
    }

    fn phase(&self) -> Option<SlotPhase> {
        match self {
            ControllerState::Idle => None,
            ControllerState::Streaming(_) => Some(SlotPhase::Streaming),
            ControllerState::Finalized(_) => Some(SlotPhase::Finalized),
        }
    }
}

/// Rejections for operations presented with a handle the controller cannot
/// honor. None of these mutate controller or display state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// No slot is currently owned by the controller.
    NoActiveSlot { requested: SlotId },
    /// The handle belongs to a slot that has since been replaced or removed.
    StaleHandle { requested: SlotId, active: SlotId },
    /// The slot exists but is not in the phase the operation requires.
    WrongPhase {
        slot: SlotId,
        expected: SlotPhase,
        actual: SlotPhase,
    },
    /// Generated-image results cannot be regenerated.
    NotRegenerable { slot: SlotId },
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotError::NoActiveSlot { requested } => {
                write!(f, "{requested} is not active: no response in progress")
            }
            SlotError::StaleHandle { requested, active } => {
                write!(f, "{requested} is stale; the active response is {active}")
            }
            SlotError::WrongPhase {
                slot,
                expected,
                actual,
            } => write!(f, "{slot} is {actual}, expected {expected}"),
            SlotError::NotRegenerable { slot } => {
                write!(f, "{slot} holds a generated image and cannot be regenerated")
            }
        }
    }
}

impl std::error::Error for SlotError {}

/// The display operations the controller needs from whatever shows the
/// conversation.
pub trait DisplaySurface {
    fn is_available(&self) -> bool;

    /// Leave the welcome screen, if it is showing.
    fn enter_chat_mode(&mut self);

    fn push_slot(&mut self, slot: SlotId);

    /// Append an already-escaped fragment to the slot's visible content.
    fn append_fragment(&mut self, slot: SlotId, fragment: &str);

    /// Replace everything shown for the slot with final markup.
    fn replace_content(&mut self, slot: SlotId, markup: RenderedMarkup);

    fn reveal_affordances(&mut self, slot: SlotId, affordances: AffordanceSet);

    fn remove_slot(&mut self, slot: SlotId);

    fn scroll_to_bottom(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedResponse {
    pub slot: SlotId,
    pub raw_text: String,
    pub history_index: usize,
    pub affordances: AffordanceSet,
}

/// Signal returned by a successful regenerate: the dispatcher should re-issue
/// the request from the now-truncated history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegenerateRequest {
    pub removed_slot: SlotId,
    pub removed_record: Option<MessageRecord>,
}

#[derive(Debug, Default)]
pub struct StreamController {
    state: ControllerState,
    next_slot_id: u64,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.state, ControllerState::Streaming(_))
    }

    pub fn active_slot(&self) -> Option<&StreamingSlot> {
        self.state.slot()
    }

    /// Handle of the slot the controller currently owns, if any.
    pub fn active_handle(&self) -> Option<SlotHandle> {
        self.state.slot().map(|slot| SlotHandle { id: slot.id })
    }

    pub fn phase_of(&self, handle: SlotHandle) -> Option<SlotPhase> {
        match self.state.slot() {
            Some(slot) if slot.id == handle.id => self.state.phase(),
            _ => None,
        }
    }

    /// Allocate a new slot and show it.
    ///
    /// Returns `None` without touching anything when the surface is
    /// unavailable. A slot still streaming is discarded first; a finalized
    /// slot stays on screen but loses its regenerate affordance, since only
    /// the newest response can be regenerated.
    pub fn create<S>(&mut self, surface: &mut S) -> Option<SlotHandle>
    where
        S: DisplaySurface + ?Sized,
    {
        if !surface.is_available() {
            warn!("display surface unavailable; response slot not created");
            return None;
        }

        match std::mem::take(&mut self.state) {
            ControllerState::Idle => {}
            ControllerState::Streaming(previous) => {
                debug!(slot = %previous.id, "discarding unfinished slot for new response");
                surface.remove_slot(previous.id);
            }
            ControllerState::Finalized(previous) => {
                let retired = previous.affordances.without_regenerate();
                if retired != previous.affordances {
                    surface.reveal_affordances(previous.id, retired);
                }
            }
        }

        self.next_slot_id += 1;
        let id = SlotId(self.next_slot_id);
        surface.enter_chat_mode();
        surface.push_slot(id);
        surface.scroll_to_bottom();
        self.state = ControllerState::Streaming(StreamingSlot::new(id));
        debug!(slot = %id, "response slot created");
        Some(SlotHandle { id })
    }

    /// Escape `raw_chunk`, show it, and record it verbatim.
    pub fn append_chunk<S, R>(
        &mut self,
        handle: SlotHandle,
        raw_chunk: &str,
        surface: &mut S,
        renderer: &R,
    ) -> Result<(), SlotError>
    where
        S: DisplaySurface + ?Sized,
        R: ContentRenderer + ?Sized,
    {
        let slot = self.streaming_slot_mut(handle)?;
        if raw_chunk.is_empty() {
            return Ok(());
        }
        slot.accumulated_raw_text.push_str(raw_chunk);
        let fragment = renderer.escape_for_streaming(raw_chunk);
        surface.append_fragment(handle.id, &fragment);
        surface.scroll_to_bottom();
        Ok(())
    }

    /// Re-render the complete response, reveal its affordances, and bind it
    /// to the next history position. The caller commits the returned text.
    pub fn finalize<S, R, H>(
        &mut self,
        handle: SlotHandle,
        kind: ResponseKind,
        history: &H,
        surface: &mut S,
        renderer: &R,
    ) -> Result<FinalizedResponse, SlotError>
    where
        S: DisplaySurface + ?Sized,
        R: ContentRenderer + ?Sized,
        H: HistoryStore + ?Sized,
    {
        self.streaming_slot_mut(handle)?;
        let ControllerState::Streaming(mut slot) = std::mem::take(&mut self.state) else {
            unreachable!("phase checked above");
        };

        let markup = renderer.parse_to_final_markup(&slot.accumulated_raw_text);
        surface.replace_content(slot.id, markup);

        let affordances = AffordanceSet::for_response(kind);
        surface.reveal_affordances(slot.id, affordances);
        surface.scroll_to_bottom();

        let history_index = history.len();
        slot.bound_history_index = Some(history_index);
        slot.kind = kind;
        slot.affordances = affordances;

        let finalized = FinalizedResponse {
            slot: slot.id,
            raw_text: slot.accumulated_raw_text.clone(),
            history_index,
            affordances,
        };
        debug!(slot = %slot.id, history_index, ?kind, "response finalized");
        self.state = ControllerState::Finalized(slot);
        Ok(finalized)
    }

    /// Remove a finalized response and drop the most recent assistant record
    /// so the request can be issued again.
    pub fn regenerate<S, H>(
        &mut self,
        handle: SlotHandle,
        surface: &mut S,
        history: &mut H,
    ) -> Result<RegenerateRequest, SlotError>
    where
        S: DisplaySurface + ?Sized,
        H: HistoryStore + ?Sized,
    {
        let slot = self.slot_in_phase(handle, SlotPhase::Finalized)?;
        if slot.kind == ResponseKind::GeneratedImage {
            return Err(SlotError::NotRegenerable { slot: slot.id });
        }

        let id = slot.id;
        self.state = ControllerState::Idle;
        surface.remove_slot(id);
        let removed_record = history.remove_last_assistant_record();
        debug!(slot = %id, removed = removed_record.is_some(), "response removed for regeneration");
        Ok(RegenerateRequest {
            removed_slot: id,
            removed_record,
        })
    }

    /// Discard a slot that is still streaming. The partial text is removed
    /// from the surface and handed back, never committed.
    pub fn abort<S>(&mut self, handle: SlotHandle, surface: &mut S) -> Result<String, SlotError>
    where
        S: DisplaySurface + ?Sized,
    {
        self.streaming_slot_mut(handle)?;
        let ControllerState::Streaming(slot) = std::mem::take(&mut self.state) else {
            unreachable!("phase checked above");
        };
        surface.remove_slot(slot.id);
        debug!(
            slot = %slot.id,
            discarded_bytes = slot.accumulated_raw_text.len(),
            "streaming response aborted"
        );
        Ok(slot.accumulated_raw_text)
    }

    /// Show an already-committed assistant record as the controller's
    /// finalized slot, so a reloaded conversation's last answer can be
    /// regenerated like a fresh one.
    pub fn restore_finalized<S, R>(
        &mut self,
        record: &MessageRecord,
        history_index: usize,
        surface: &mut S,
        renderer: &R,
    ) -> Option<SlotHandle>
    where
        S: DisplaySurface + ?Sized,
        R: ContentRenderer + ?Sized,
    {
        let handle = self.create(surface)?;
        let kind = if record.is_generated_image() {
            ResponseKind::GeneratedImage
        } else {
            ResponseKind::Text
        };
        let ControllerState::Streaming(mut slot) = std::mem::take(&mut self.state) else {
            unreachable!("create leaves a streaming slot");
        };
        slot.accumulated_raw_text = record.content.clone();
        slot.bound_history_index = Some(history_index);
        slot.kind = kind;
        slot.affordances = AffordanceSet::for_response(kind);

        surface.replace_content(slot.id, renderer.parse_to_final_markup(&record.content));
        surface.reveal_affordances(slot.id, slot.affordances);
        self.state = ControllerState::Finalized(slot);
        Some(handle)
    }

    /// Forget the current slot without touching the surface. Used when the
    /// whole transcript is being replaced.
    pub fn reset(&mut self) {
        self.state = ControllerState::Idle;
    }

    fn streaming_slot_mut(&mut self, handle: SlotHandle) -> Result<&mut StreamingSlot, SlotError> {
        self.slot_in_phase(handle, SlotPhase::Streaming)?;
        match &mut self.state {
            ControllerState::Streaming(slot) => Ok(slot),
            _ => unreachable!("phase checked above"),
        }
    }

    fn slot_in_phase(
        &self,
        handle: SlotHandle,
        expected: SlotPhase,
    ) -> Result<&StreamingSlot, SlotError> {
        let (Some(slot), Some(actual)) = (self.state.slot(), self.state.phase()) else {
            return Err(SlotError::NoActiveSlot {
                requested: handle.id,
            });
        };
        if slot.id != handle.id {
            return Err(SlotError::StaleHandle {
                requested: handle.id,
                active: slot.id,
            });
        }
        if actual != expected {
            return Err(SlotError::WrongPhase {
                slot: slot.id,
                expected,
                actual,
            });
        }
        Ok(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::history::ConversationHistory;
    use crate::ui::render::MarkdownRenderer;
    use crate::ui::theme::Theme;

    #[derive(Debug, Default)]
    struct RecordingSurface {
        unavailable: bool,
        chat_mode: bool,
        scrolls: usize,
        slots: Vec<(SlotId, String, Option<RenderedMarkup>, Option<AffordanceSet>)>,
    }

    impl RecordingSurface {
        fn slot(&self, id: SlotId) -> Option<&(SlotId, String, Option<RenderedMarkup>, Option<AffordanceSet>)> {
            self.slots.iter().find(|(slot, ..)| *slot == id)
        }

        fn fragments(&self, id: SlotId) -> &str {
            self.slot(id).map(|(_, text, ..)| text.as_str()).unwrap_or("")
        }

        fn affordances(&self, id: SlotId) -> Option<AffordanceSet> {
            self.slot(id).and_then(|(.., affordances)| *affordances)
        }
    }

    impl DisplaySurface for RecordingSurface {
        fn is_available(&self) -> bool {
            !self.unavailable
        }

        fn enter_chat_mode(&mut self) {
            self.chat_mode = true;
        }

        fn push_slot(&mut self, slot: SlotId) {
            self.slots.push((slot, String::new(), None, None));
        }

        fn append_fragment(&mut self, slot: SlotId, fragment: &str) {
            if let Some(entry) = self.slots.iter_mut().find(|(id, ..)| *id == slot) {
                entry.1.push_str(fragment);
            }
        }

        fn replace_content(&mut self, slot: SlotId, markup: RenderedMarkup) {
            if let Some(entry) = self.slots.iter_mut().find(|(id, ..)| *id == slot) {
                entry.1.clear();
                entry.2 = Some(markup);
            }
        }

        fn reveal_affordances(&mut self, slot: SlotId, affordances: AffordanceSet) {
            if let Some(entry) = self.slots.iter_mut().find(|(id, ..)| *id == slot) {
                entry.3 = Some(affordances);
            }
        }

        fn remove_slot(&mut self, slot: SlotId) {
            self.slots.retain(|(id, ..)| *id != slot);
        }

        fn scroll_to_bottom(&mut self) {
            self.scrolls += 1;
        }
    }

    fn renderer() -> MarkdownRenderer {
        MarkdownRenderer::new(Theme::default(), false)
    }

    fn stream_all(
        controller: &mut StreamController,
        surface: &mut RecordingSurface,
        chunks: &[&str],
    ) -> SlotHandle {
        let renderer = renderer();
        let handle = controller.create(surface).expect("surface available");
        for chunk in chunks {
            controller
                .append_chunk(handle, chunk, surface, &renderer)
                .expect("streaming");
        }
        handle
    }

    #[test]
    fn create_switches_to_chat_mode_and_starts_streaming() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();

        let handle = controller.create(&mut surface).unwrap();

        assert!(surface.chat_mode);
        assert_eq!(surface.slots.len(), 1);
        assert_eq!(controller.phase_of(handle), Some(SlotPhase::Streaming));
        assert_eq!(controller.active_slot().unwrap().accumulated_raw_text(), "");
        assert!(controller.active_slot().unwrap().bound_history_index().is_none());
    }

    #[test]
    fn create_without_surface_is_a_no_op() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface {
            unavailable: true,
            ..Default::default()
        };

        assert!(controller.create(&mut surface).is_none());
        assert_eq!(controller.state(), &ControllerState::Idle);
        assert!(!surface.chat_mode);
        assert!(surface.slots.is_empty());
    }

    #[test]
    fn visible_text_is_concatenation_of_escaped_chunks() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let renderer = renderer();
        let chunks = ["Hel", "lo\r\n", "\x1b[31mred", "\tend"];

        let handle = stream_all(&mut controller, &mut surface, &chunks);

        let expected_visible: String = chunks
            .iter()
            .map(|chunk| renderer.escape_for_streaming(chunk))
            .collect();
        assert_eq!(surface.fragments(handle.id()), expected_visible);
        assert_eq!(
            controller.active_slot().unwrap().accumulated_raw_text(),
            chunks.concat()
        );
        assert!(!surface.fragments(handle.id()).contains('\x1b'));
    }

    #[test]
    fn hello_world_scenario_commits_one_record() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let mut history = ConversationHistory::new();
        history.append(MessageRecord::user("greet me"));
        let renderer = renderer();

        let handle = stream_all(&mut controller, &mut surface, &["Hel", "lo, ", "world!"]);
        assert_eq!(surface.fragments(handle.id()), "Hello, world!");

        let finalized = controller
            .finalize(handle, ResponseKind::Text, &history, &mut surface, &renderer)
            .unwrap();
        assert_eq!(finalized.raw_text, "Hello, world!");
        assert_eq!(finalized.history_index, 1);

        let index = history.append(MessageRecord::assistant(finalized.raw_text));
        assert_eq!(index, finalized.history_index);
        assert_eq!(history.len(), 2);
        assert_eq!(history.records()[1].content, "Hello, world!");
    }

    #[test]
    fn final_markup_is_independent_of_chunking() {
        let renderer = renderer();
        let text = "Hello, **world**\n\n```rust\nfn main() {}\n```\n- a\n- b";
        let splits: Vec<Vec<&str>> = vec![
            vec![text],
            vec!["Hel", "lo, **wor", "ld**\n", "\n```rust\nfn main() {}\n```\n- a\n- b"],
            text.split_inclusive(['\n', ' ']).collect(),
        ];
        let expected = renderer.parse_to_final_markup(text);

        for chunks in splits {
            let mut controller = StreamController::new();
            let mut surface = RecordingSurface::default();
            let history = ConversationHistory::new();
            let handle = stream_all(&mut controller, &mut surface, &chunks);
            controller
                .finalize(handle, ResponseKind::Text, &history, &mut surface, &renderer)
                .unwrap();

            let (_, fragments, markup, _) = surface.slot(handle.id()).unwrap();
            assert!(fragments.is_empty());
            assert_eq!(markup.as_ref(), Some(&expected));
        }
    }

    #[test]
    fn affordances_appear_only_after_finalize() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let history = ConversationHistory::new();
        let renderer = renderer();

        let handle = stream_all(&mut controller, &mut surface, &["partial"]);
        assert_eq!(surface.affordances(handle.id()), None);

        controller
            .finalize(handle, ResponseKind::Text, &history, &mut surface, &renderer)
            .unwrap();
        let shown = surface.affordances(handle.id()).unwrap();
        assert!(shown.copy && shown.regenerate && shown.listen);
    }

    #[test]
    fn image_results_only_offer_copy() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let history = ConversationHistory::new();
        let renderer = renderer();

        let handle = stream_all(&mut controller, &mut surface, &["![cat](https://img/cat.png)"]);
        let finalized = controller
            .finalize(
                handle,
                ResponseKind::GeneratedImage,
                &history,
                &mut surface,
                &renderer,
            )
            .unwrap();

        assert_eq!(finalized.affordances, AffordanceSet::copy_only());
        assert_eq!(surface.affordances(handle.id()), Some(AffordanceSet::copy_only()));
    }

    #[test]
    fn second_finalize_is_rejected() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let history = ConversationHistory::new();
        let renderer = renderer();

        let handle = stream_all(&mut controller, &mut surface, &["done"]);
        controller
            .finalize(handle, ResponseKind::Text, &history, &mut surface, &renderer)
            .unwrap();
        let before = surface.slot(handle.id()).cloned();

        let err = controller
            .finalize(handle, ResponseKind::Text, &history, &mut surface, &renderer)
            .unwrap_err();
        assert_eq!(
            err,
            SlotError::WrongPhase {
                slot: handle.id(),
                expected: SlotPhase::Streaming,
                actual: SlotPhase::Finalized,
            }
        );
        assert_eq!(surface.slot(handle.id()).cloned(), before);
    }

    #[test]
    fn append_after_finalize_is_rejected_and_ignored() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let history = ConversationHistory::new();
        let renderer = renderer();

        let handle = stream_all(&mut controller, &mut surface, &["done"]);
        controller
            .finalize(handle, ResponseKind::Text, &history, &mut surface, &renderer)
            .unwrap();

        let err = controller
            .append_chunk(handle, " more", &mut surface, &renderer)
            .unwrap_err();
        assert!(matches!(err, SlotError::WrongPhase { .. }));
        assert_eq!(controller.active_slot().unwrap().accumulated_raw_text(), "done");
        assert_eq!(surface.fragments(handle.id()), "");
    }

    #[test]
    fn regenerate_removes_slot_and_one_assistant_record() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let mut history = ConversationHistory::from_records(vec![
            MessageRecord::user("q1"),
            MessageRecord::assistant("a1"),
            MessageRecord::user("q2"),
        ]);
        let renderer = renderer();

        let handle = stream_all(&mut controller, &mut surface, &["a2"]);
        let finalized = controller
            .finalize(handle, ResponseKind::Text, &history, &mut surface, &renderer)
            .unwrap();
        history.append(MessageRecord::assistant(finalized.raw_text));

        let request = controller
            .regenerate(handle, &mut surface, &mut history)
            .unwrap();

        assert_eq!(request.removed_slot, handle.id());
        assert_eq!(request.removed_record.unwrap().content, "a2");
        assert!(surface.slot(handle.id()).is_none());
        assert_eq!(history.len(), 3);
        assert_eq!(history.records()[1].content, "a1");
        assert_eq!(controller.state(), &ControllerState::Idle);
    }

    #[test]
    fn second_regenerate_is_rejected() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let mut history = ConversationHistory::from_records(vec![MessageRecord::user("q")]);
        let renderer = renderer();

        let handle = stream_all(&mut controller, &mut surface, &["a"]);
        controller
            .finalize(handle, ResponseKind::Text, &history, &mut surface, &renderer)
            .unwrap();
        history.append(MessageRecord::assistant("a"));
        controller
            .regenerate(handle, &mut surface, &mut history)
            .unwrap();

        let err = controller
            .regenerate(handle, &mut surface, &mut history)
            .unwrap_err();
        assert_eq!(
            err,
            SlotError::NoActiveSlot {
                requested: handle.id()
            }
        );
        assert_eq!(history.len(), 1);

        let err = controller
            .append_chunk(handle, "late", &mut surface, &renderer)
            .unwrap_err();
        assert!(matches!(err, SlotError::NoActiveSlot { .. }));
    }

    #[test]
    fn regenerate_requires_finalized_slot() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let mut history = ConversationHistory::new();

        let handle = stream_all(&mut controller, &mut surface, &["still going"]);
        let err = controller
            .regenerate(handle, &mut surface, &mut history)
            .unwrap_err();
        assert!(matches!(
            err,
            SlotError::WrongPhase {
                expected: SlotPhase::Finalized,
                actual: SlotPhase::Streaming,
                ..
            }
        ));
        assert!(controller.is_streaming());
    }

    #[test]
    fn image_results_cannot_be_regenerated() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let mut history = ConversationHistory::new();
        let renderer = renderer();

        let handle = stream_all(&mut controller, &mut surface, &["image"]);
        controller
            .finalize(
                handle,
                ResponseKind::GeneratedImage,
                &history,
                &mut surface,
                &renderer,
            )
            .unwrap();
        history.append(MessageRecord::assistant("image").with_image("https://img/x.png"));

        let err = controller
            .regenerate(handle, &mut surface, &mut history)
            .unwrap_err();
        assert_eq!(err, SlotError::NotRegenerable { slot: handle.id() });
        assert_eq!(history.len(), 1);
        assert!(surface.slot(handle.id()).is_some());
    }

    #[test]
    fn stale_handles_are_rejected_after_new_create() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let history = ConversationHistory::new();
        let renderer = renderer();

        let first = stream_all(&mut controller, &mut surface, &["one"]);
        controller
            .finalize(first, ResponseKind::Text, &history, &mut surface, &renderer)
            .unwrap();
        let second = controller.create(&mut surface).unwrap();

        let err = controller
            .append_chunk(first, "x", &mut surface, &renderer)
            .unwrap_err();
        assert_eq!(
            err,
            SlotError::StaleHandle {
                requested: first.id(),
                active: second.id()
            }
        );
        assert!(!surface.affordances(first.id()).unwrap().regenerate);
        assert!(surface.affordances(first.id()).unwrap().copy);
    }

    #[test]
    fn abort_discards_partial_text() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let history = ConversationHistory::new();
        let renderer = renderer();

        let handle = stream_all(&mut controller, &mut surface, &["half an ans"]);
        let discarded = controller.abort(handle, &mut surface).unwrap();

        assert_eq!(discarded, "half an ans");
        assert!(surface.slots.is_empty());
        assert_eq!(controller.state(), &ControllerState::Idle);
        assert!(controller
            .finalize(handle, ResponseKind::Text, &history, &mut surface, &renderer)
            .is_err());
    }

    #[test]
    fn create_while_streaming_discards_previous_slot() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();

        let first = stream_all(&mut controller, &mut surface, &["abandoned"]);
        let second = controller.create(&mut surface).unwrap();

        assert_ne!(first.id(), second.id());
        assert!(surface.slot(first.id()).is_none());
        assert_eq!(surface.slots.len(), 1);
    }

    #[test]
    fn restored_record_is_regenerable() {
        let mut controller = StreamController::new();
        let mut surface = RecordingSurface::default();
        let mut history = ConversationHistory::from_records(vec![
            MessageRecord::user("q"),
            MessageRecord::assistant("loaded answer"),
        ]);
        let renderer = renderer();
        let record = history.records()[1].clone();

        let handle = controller
            .restore_finalized(&record, 1, &mut surface, &renderer)
            .unwrap();
        assert_eq!(controller.phase_of(handle), Some(SlotPhase::Finalized));
        assert_eq!(
            controller.active_slot().unwrap().bound_history_index(),
            Some(1)
        );

        controller
            .regenerate(handle, &mut surface, &mut history)
            .unwrap();
        assert_eq!(history.len(), 1);
    }
}
