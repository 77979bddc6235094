//! The scrollable conversation view.
//!
//! `Transcript` is the concrete [`DisplaySurface`]: it keeps an ordered list
//! of entries (user turns, assistant slots, and assistant messages restored
//! from history), knows whether the welcome screen or the chat is showing,
//! and turns everything into wrapped lines for the viewport.

use std::fmt;

use ratatui::style::Style;
use ratatui::text::{Line, Span};

use crate::core::affordances::{AffordanceSet, ListenState};
use crate::core::stream_controller::{DisplaySurface, SlotId};
use crate::ui::render::RenderedMarkup;
use crate::ui::theme::Theme;
use crate::utils::scroll::ScrollCalculator;

const USER_PREFIX: &str = "You: ";
const USER_CONTINUATION: &str = "     ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscriptMode {
    #[default]
    Welcome,
    Chat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContent {
    /// Escaped fragments shown verbatim while a response streams.
    Streaming(String),
    Final(RenderedMarkup),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    User {
        text: String,
        attachments: Vec<String>,
        has_image: bool,
    },
    Assistant {
        slot: Option<SlotId>,
        content: EntryContent,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    pub kind: EntryKind,
    pub affordances: AffordanceSet,
    /// Position of the backing record in the conversation history, once
    /// committed.
    pub history_index: Option<usize>,
}

impl Entry {
    pub fn slot(&self) -> Option<SlotId> {
        match &self.kind {
            EntryKind::Assistant { slot, .. } => *slot,
            EntryKind::User { .. } => None,
        }
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self.kind, EntryKind::Assistant { .. })
    }
}

#[derive(Debug)]
pub struct Transcript {
    mode: TranscriptMode,
    entries: Vec<Entry>,
    next_id: u64,
    available: bool,
    auto_follow: bool,
    scroll_offset: u16,
    selected: Option<EntryId>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            mode: TranscriptMode::Welcome,
            entries: Vec::new(),
            next_id: 0,
            available: true,
            auto_follow: true,
            scroll_offset: 0,
            selected: None,
        }
    }

    pub fn mode(&self) -> TranscriptMode {
        self.mode
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Marks the surface as unable to show anything (e.g. a terminal too
    /// small to hold the transcript).
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    /// Back to an empty welcome screen.
    pub fn reset(&mut self) {
        self.mode = TranscriptMode::Welcome;
        self.entries.clear();
        self.auto_follow = true;
        self.scroll_offset = 0;
        self.selected = None;
    }

    pub fn push_user(
        &mut self,
        text: &str,
        attachments: Vec<String>,
        has_image: bool,
        history_index: usize,
    ) -> EntryId {
        self.enter_chat_mode();
        let id = self.allocate_id();
        self.entries.push(Entry {
            id,
            kind: EntryKind::User {
                text: text.to_string(),
                attachments,
                has_image,
            },
            affordances: AffordanceSet::none(),
            history_index: Some(history_index),
        });
        self.auto_follow = true;
        id
    }

    /// Adds a committed assistant message that is not owned by the stream
    /// controller (earlier turns of a loaded conversation).
    pub fn push_history_assistant(
        &mut self,
        markup: RenderedMarkup,
        affordances: AffordanceSet,
        history_index: usize,
    ) -> EntryId {
        self.enter_chat_mode();
        let id = self.allocate_id();
        self.entries.push(Entry {
            id,
            kind: EntryKind::Assistant {
                slot: None,
                content: EntryContent::Final(markup),
            },
            affordances,
            history_index: Some(history_index),
        });
        id
    }

    pub fn bind_history(&mut self, slot: SlotId, history_index: usize) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.slot() == Some(slot)) {
            entry.history_index = Some(history_index);
        }
    }

    pub fn selected(&self) -> Option<EntryId> {
        self.selected
    }

    /// The entry affordance keys act on: the selection, or else the newest
    /// assistant message that offers anything.
    pub fn affordance_target(&self) -> Option<EntryId> {
        self.selected.or_else(|| {
            self.entries
                .iter()
                .rev()
                .find(|e| e.is_assistant() && !e.affordances.is_empty())
                .map(|e| e.id)
        })
    }

    pub fn select_previous(&mut self) {
        let candidates: Vec<EntryId> = self.selectable().collect();
        if candidates.is_empty() {
            return;
        }
        let next = match self
            .selected
            .and_then(|id| candidates.iter().position(|c| *c == id))
        {
            Some(0) => candidates[0],
            Some(pos) => candidates[pos - 1],
            None => candidates[candidates.len() - 1],
        };
        self.selected = Some(next);
    }

    pub fn select_next(&mut self) {
        let candidates: Vec<EntryId> = self.selectable().collect();
        let Some(current) = self.selected else {
            return;
        };
        self.selected = candidates
            .iter()
            .position(|c| *c == current)
            .and_then(|pos| candidates.get(pos + 1).copied());
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    fn selectable(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.entries
            .iter()
            .filter(|e| e.is_assistant() && !e.affordances.is_empty())
            .map(|e| e.id)
    }

    pub fn set_affordances(&mut self, id: EntryId, affordances: AffordanceSet) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.affordances = affordances;
        }
    }

    pub fn scroll_up(&mut self, lines: u16, total_lines: usize, viewport_height: u16) {
        let current = self.effective_offset(total_lines, viewport_height);
        self.auto_follow = false;
        self.scroll_offset = current.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16, total_lines: usize, viewport_height: u16) {
        let max = ScrollCalculator::max_scroll_offset(total_lines, viewport_height);
        let next = self
            .effective_offset(total_lines, viewport_height)
            .saturating_add(lines);
        if next >= max {
            self.auto_follow = true;
            self.scroll_offset = max;
        } else {
            self.scroll_offset = next;
        }
    }

    pub fn is_following(&self) -> bool {
        self.auto_follow
    }

    /// Offset to draw with: pinned to the bottom while following new output.
    pub fn effective_offset(&self, total_lines: usize, viewport_height: u16) -> u16 {
        if self.auto_follow {
            ScrollCalculator::max_scroll_offset(total_lines, viewport_height)
        } else {
            ScrollCalculator::clamp_offset(self.scroll_offset, total_lines, viewport_height)
        }
    }

    /// Every entry as wrapped lines for a viewport `width` columns wide.
    pub fn build_lines<F>(&self, theme: &Theme, width: u16, listen_state: F) -> Vec<Line<'static>>
    where
        F: Fn(EntryId) -> ListenState,
    {
        let mut raw: Vec<Line<'static>> = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                raw.push(Line::default());
            }
            match &entry.kind {
                EntryKind::User {
                    text,
                    attachments,
                    has_image,
                } => push_user_lines(&mut raw, theme, text, attachments, *has_image),
                EntryKind::Assistant { content, .. } => match content {
                    EntryContent::Streaming(text) => {
                        raw.extend(text.split('\n').map(|l| {
                            Line::from(Span::styled(l.to_string(), theme.streaming_text_style))
                        }));
                    }
                    EntryContent::Final(markup) => raw.extend(markup.lines.iter().cloned()),
                },
            }
            if !entry.affordances.is_empty() {
                let selected = self.selected == Some(entry.id);
                raw.push(affordance_bar(
                    theme,
                    entry.affordances,
                    listen_state(entry.id),
                    selected,
                ));
            }
        }
        ScrollCalculator::prewrap_lines(&raw, width)
    }

    fn allocate_id(&mut self) -> EntryId {
        self.next_id += 1;
        EntryId(self.next_id)
    }

    fn slot_entry_mut(&mut self, slot: SlotId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.slot() == Some(slot))
    }
}

fn push_user_lines(
    out: &mut Vec<Line<'static>>,
    theme: &Theme,
    text: &str,
    attachments: &[String],
    has_image: bool,
) {
    for (i, line) in text.lines().enumerate() {
        let prefix = if i == 0 { USER_PREFIX } else { USER_CONTINUATION };
        out.push(Line::from(vec![
            Span::styled(prefix, theme.user_prefix_style),
            Span::styled(crate::ui::markdown::sanitize_inline(line), theme.user_text_style),
        ]));
    }
    if text.is_empty() {
        out.push(Line::from(Span::styled(USER_PREFIX, theme.user_prefix_style)));
    }
    let mut notes = Vec::new();
    if has_image {
        notes.push("[image]".to_string());
    }
    notes.extend(attachments.iter().map(|name| format!("[file: {name}]")));
    if !notes.is_empty() {
        out.push(Line::from(vec![
            Span::raw(USER_CONTINUATION),
            Span::styled(notes.join(" "), theme.attachment_style),
        ]));
    }
}

fn affordance_bar(
    theme: &Theme,
    affordances: AffordanceSet,
    listen: ListenState,
    selected: bool,
) -> Line<'static> {
    let style: Style = if selected {
        theme.affordance_active_style
    } else {
        theme.affordance_style
    };
    let mut labels: Vec<&str> = Vec::new();
    if affordances.copy {
        labels.push("^Y Copy");
    }
    if affordances.regenerate {
        labels.push("^R Regenerate");
    }
    if affordances.listen {
        labels.push(match listen {
            ListenState::Idle => "^P Listen",
            ListenState::Loading => "^P Loading…",
            ListenState::Playing => "^P Stop",
        });
    }
    let marker = if selected { "▸ " } else { "  " };
    Line::from(vec![
        Span::styled(marker, theme.selection_marker_style),
        Span::styled(labels.join("  "), style),
    ])
}

impl DisplaySurface for Transcript {
    fn is_available(&self) -> bool {
        self.available
    }

    fn enter_chat_mode(&mut self) {
        self.mode = TranscriptMode::Chat;
    }

    fn push_slot(&mut self, slot: SlotId) {
        let id = self.allocate_id();
        self.entries.push(Entry {
            id,
            kind: EntryKind::Assistant {
                slot: Some(slot),
                content: EntryContent::Streaming(String::new()),
            },
            affordances: AffordanceSet::none(),
            history_index: None,
        });
    }

    fn append_fragment(&mut self, slot: SlotId, fragment: &str) {
        if let Some(Entry {
            kind:
                EntryKind::Assistant {
                    content: EntryContent::Streaming(text),
                    ..
                },
            ..
        }) = self.slot_entry_mut(slot)
        {
            text.push_str(fragment);
        }
    }

    fn replace_content(&mut self, slot: SlotId, markup: RenderedMarkup) {
        if let Some(Entry {
            kind: EntryKind::Assistant { content, .. },
            ..
        }) = self.slot_entry_mut(slot)
        {
            *content = EntryContent::Final(markup);
        }
    }

    fn reveal_affordances(&mut self, slot: SlotId, affordances: AffordanceSet) {
        if let Some(entry) = self.slot_entry_mut(slot) {
            entry.affordances = affordances;
        }
    }

    fn remove_slot(&mut self, slot: SlotId) {
        let removed: Vec<EntryId> = self
            .entries
            .iter()
            .filter(|e| e.slot() == Some(slot))
            .map(|e| e.id)
            .collect();
        self.entries.retain(|e| e.slot() != Some(slot));
        if self.selected.is_some_and(|id| removed.contains(&id)) {
            self.selected = None;
        }
    }

    fn scroll_to_bottom(&mut self) {
        self.auto_follow = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::history::{ConversationHistory, HistoryStore};
    use crate::core::message::MessageRecord;
    use crate::core::stream_controller::{ResponseKind, StreamController};
    use crate::ui::render::MarkdownRenderer;

    fn texts(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn idle(_: EntryId) -> ListenState {
        ListenState::Idle
    }

    #[test]
    fn starts_on_welcome_screen() {
        let transcript = Transcript::new();
        assert_eq!(transcript.mode(), TranscriptMode::Welcome);
        assert!(transcript.entries().is_empty());
    }

    #[test]
    fn streaming_fragments_show_verbatim_then_final_markup_replaces_them() {
        let mut transcript = Transcript::new();
        let mut controller = StreamController::new();
        let renderer = MarkdownRenderer::new(Theme::default(), false);
        let history = ConversationHistory::new();
        let theme = Theme::default();

        let handle = controller.create(&mut transcript).unwrap();
        assert_eq!(transcript.mode(), TranscriptMode::Chat);
        controller
            .append_chunk(handle, "**bo", &mut transcript, &renderer)
            .unwrap();
        controller
            .append_chunk(handle, "ld**", &mut transcript, &renderer)
            .unwrap();
        assert_eq!(texts(&transcript.build_lines(&theme, 80, idle)), vec!["**bold**"]);

        controller
            .finalize(handle, ResponseKind::Text, &history, &mut transcript, &renderer)
            .unwrap();
        let lines = texts(&transcript.build_lines(&theme, 80, idle));
        assert_eq!(lines[0], "bold");
        assert!(lines[1].contains("Copy"));
        assert!(lines[1].contains("Regenerate"));
        assert!(lines[1].contains("Listen"));
    }

    #[test]
    fn user_entries_show_prefix_and_attachments() {
        let mut transcript = Transcript::new();
        transcript.push_user("hi\nthere", vec!["notes.md".into()], true, 0);
        let lines = texts(&transcript.build_lines(&Theme::default(), 80, idle));
        assert_eq!(
            lines,
            vec![
                "You: hi",
                "     there",
                "     [image] [file: notes.md]"
            ]
        );
    }

    #[test]
    fn listen_label_tracks_playback_state() {
        let mut transcript = Transcript::new();
        let id = transcript.push_history_assistant(
            RenderedMarkup::plain("answer"),
            AffordanceSet::all(),
            1,
        );
        let lines = texts(&transcript.build_lines(&Theme::default(), 80, |e| {
            if e == id {
                ListenState::Playing
            } else {
                ListenState::Idle
            }
        }));
        assert!(lines[1].contains("^P Stop"));
    }

    #[test]
    fn removing_a_slot_drops_its_entry_and_selection() {
        let mut transcript = Transcript::new();
        let mut controller = StreamController::new();
        let renderer = MarkdownRenderer::new(Theme::default(), false);
        let mut history = ConversationHistory::new();
        history.append(MessageRecord::user("q"));

        let handle = controller.create(&mut transcript).unwrap();
        controller
            .append_chunk(handle, "a", &mut transcript, &renderer)
            .unwrap();
        controller
            .finalize(handle, ResponseKind::Text, &history, &mut transcript, &renderer)
            .unwrap();
        transcript.select_previous();
        assert!(transcript.selected().is_some());

        controller
            .regenerate(handle, &mut transcript, &mut history)
            .unwrap();
        assert!(transcript.entries().is_empty());
        assert!(transcript.selected().is_none());
    }

    #[test]
    fn affordance_target_defaults_to_newest_assistant() {
        let mut transcript = Transcript::new();
        let first = transcript.push_history_assistant(
            RenderedMarkup::plain("one"),
            AffordanceSet::all().without_regenerate(),
            1,
        );
        let second =
            transcript.push_history_assistant(RenderedMarkup::plain("two"), AffordanceSet::all(), 3);
        assert_eq!(transcript.affordance_target(), Some(second));

        transcript.select_previous();
        assert_eq!(transcript.selected(), Some(second));
        transcript.select_previous();
        assert_eq!(transcript.affordance_target(), Some(first));
        transcript.select_next();
        assert_eq!(transcript.selected(), Some(second));
        transcript.select_next();
        assert_eq!(transcript.selected(), None);
    }

    #[test]
    fn manual_scroll_stops_following_until_bottom() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.effective_offset(30, 10), 20);

        transcript.scroll_up(5, 30, 10);
        assert!(!transcript.is_following());
        assert_eq!(transcript.effective_offset(30, 10), 15);
        assert_eq!(transcript.effective_offset(40, 10), 15);

        transcript.scroll_down(50, 40, 10);
        assert!(transcript.is_following());
        assert_eq!(transcript.effective_offset(45, 10), 35);
    }

    #[test]
    fn reset_returns_to_welcome() {
        let mut transcript = Transcript::new();
        transcript.push_user("q", Vec::new(), false, 0);
        transcript.reset();
        assert_eq!(transcript.mode(), TranscriptMode::Welcome);
        assert!(transcript.entries().is_empty());
    }
}
