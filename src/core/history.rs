//! Ordered conversation log.
//!
//! Records are only ever appended or removed whole; nothing hands out a
//! mutable reference to a committed record.

use crate::core::message::{MessageRecord, Role};

pub trait HistoryStore {
    /// Appends a record and returns the index it was stored at.
    fn append(&mut self, record: MessageRecord) -> usize;

    /// Removes the most recent assistant record, wherever it sits in the log.
    fn remove_last_assistant_record(&mut self) -> Option<MessageRecord>;

    fn records(&self) -> &[MessageRecord];

    fn len(&self) -> usize {
        self.records().len()
    }

    fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    fn last_assistant_index(&self) -> Option<usize> {
        self.records()
            .iter()
            .rposition(|record| record.role == Role::Assistant)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    records: Vec<MessageRecord>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<MessageRecord>) -> Self {
        Self { records }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl HistoryStore for ConversationHistory {
    fn append(&mut self, record: MessageRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    fn remove_last_assistant_record(&mut self) -> Option<MessageRecord> {
        let index = self.last_assistant_index()?;
        Some(self.records.remove(index))
    }

    fn records(&self) -> &[MessageRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_returns_positions_in_order() {
        let mut history = ConversationHistory::new();
        assert_eq!(history.append(MessageRecord::user("one")), 0);
        assert_eq!(history.append(MessageRecord::assistant("two")), 1);
        assert_eq!(history.len(), 2);
        assert_eq!(history.records()[1].content, "two");
    }

    #[test]
    fn removes_only_the_most_recent_assistant_record() {
        let mut history = ConversationHistory::from_records(vec![
            MessageRecord::user("q1"),
            MessageRecord::assistant("a1"),
            MessageRecord::user("q2"),
            MessageRecord::assistant("a2"),
        ]);

        let removed = history.remove_last_assistant_record().unwrap();
        assert_eq!(removed.content, "a2");
        assert_eq!(history.len(), 3);
        assert_eq!(history.records()[1].content, "a1");
        assert_eq!(history.records()[2].content, "q2");
    }

    #[test]
    fn removal_skips_trailing_user_records() {
        let mut history = ConversationHistory::from_records(vec![
            MessageRecord::user("q1"),
            MessageRecord::assistant("a1"),
            MessageRecord::user("q2"),
        ]);

        let removed = history.remove_last_assistant_record().unwrap();
        assert_eq!(removed.content, "a1");
        assert_eq!(
            history
                .records()
                .iter()
                .map(|r| r.content.as_str())
                .collect::<Vec<_>>(),
            vec!["q1", "q2"]
        );
    }

    #[test]
    fn removal_without_assistant_is_none() {
        let mut history = ConversationHistory::from_records(vec![MessageRecord::user("q1")]);
        assert!(history.remove_last_assistant_record().is_none());
        assert_eq!(history.len(), 1);
    }
}
