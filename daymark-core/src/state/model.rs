use chrono::Utc;
use std::time::Duration;
use tokio::time::Instant;

use super::tracker::ChangeTracker;
use crate::models::{Document, Mutation, RemoteDocument, ValidationError};

/// Next value of the logical clock. Never goes backwards, even when the wall
/// clock does.
pub fn next_clock(previous: i64, wall_ms: i64) -> i64 {
    if wall_ms > previous {
        wall_ms
    } else {
        previous + 1
    }
}

/// The in-memory document together with its change flags.
#[derive(Debug, Clone)]
pub struct DocumentModel {
    document: Document,
    tracker: ChangeTracker,
    device_id: String,
}

impl DocumentModel {
    pub fn new(document: Document, device_id: impl Into<String>, suppression: Duration) -> Self {
        Self {
            document,
            tracker: ChangeTracker::new(suppression),
            device_id: device_id.into(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn updated_at(&self) -> i64 {
        self.document.updated_at
    }

    /// Applies a user edit, bumps the clock and marks the document dirty.
    /// Returns the new clock value.
    pub fn apply_local_mutation(
        &mut self,
        mutation: Mutation,
        now: Instant,
    ) -> Result<i64, ValidationError> {
        self.document.apply(mutation)?;
        self.document.updated_at =
            next_clock(self.document.updated_at, Utc::now().timestamp_millis());
        self.document.device_id = self.device_id.clone();
        self.tracker.mark_local_dirty(now);
        Ok(self.document.updated_at)
    }

    /// Overwrites local state with a remote copy. Fields the payload lacks
    /// keep their local value. The caller decides whether the remote copy
    /// should win.
    pub fn apply_remote_document(&mut self, remote: RemoteDocument, now: Instant) {
        if let Some(habits) = remote.habits {
            self.document.habits = habits;
        }
        if let Some(mental_state) = remote.mental_state {
            self.document.mental_state = mental_state;
        }
        if let Some(school_data) = remote.school_data {
            self.document.school_data = school_data;
        }
        if let Some(device_id) = remote.device_id {
            self.document.device_id = device_id;
        }
        self.document.updated_at = remote.updated_at;
        self.tracker.mark_remote_applied(now);
    }

    /// Clears the dirty flag after a push, unless the document changed again
    /// while the push was in flight.
    pub fn mark_pushed(&mut self, pushed_clock: i64) -> bool {
        if self.document.updated_at == pushed_clock {
            self.tracker.clear_dirty();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Habit, MoodEntry, MoodLog};
    use crate::state::DEFAULT_SUPPRESSION_WINDOW;
    use serde_json::json;

    fn model() -> DocumentModel {
        DocumentModel::new(Document::new("dev-a"), "dev-a", DEFAULT_SUPPRESSION_WINDOW)
    }

    fn log_mood(day: u32) -> Mutation {
        Mutation::LogMood {
            date: format!("2025-01-{:02}", day),
            mood: 3,
            motivation: 4,
        }
    }

    #[test]
    fn test_next_clock() {
        assert_eq!(next_clock(100, 200), 200);
        assert_eq!(next_clock(200, 200), 201);
        assert_eq!(next_clock(300, 200), 301);
    }

    #[test]
    fn test_clock_strictly_increases() {
        let mut model = model();
        let now = Instant::now();
        let mut previous = model.updated_at();

        for day in 1..=20 {
            let clock = model.apply_local_mutation(log_mood(day), now).unwrap();
            assert!(clock > previous);
            previous = clock;
        }
    }

    #[test]
    fn test_clock_survives_future_remote() {
        let mut model = model();
        let now = Instant::now();
        let far_future = Utc::now().timestamp_millis() + 60_000;
        model.apply_remote_document(
            RemoteDocument {
                updated_at: far_future,
                ..RemoteDocument::from(Document::new("dev-b"))
            },
            now,
        );

        let clock = model.apply_local_mutation(log_mood(1), now).unwrap();
        assert_eq!(clock, far_future + 1);
    }

    #[test]
    fn test_rejected_mutation_keeps_clock_and_flags() {
        let mut model = model();
        let now = Instant::now();
        let err = model
            .apply_local_mutation(
                Mutation::LogMood {
                    date: "2025-01-01".into(),
                    mood: 0,
                    motivation: 1,
                },
                now,
            )
            .unwrap_err();

        assert!(matches!(err, ValidationError::ScoreOutOfRange { .. }));
        assert_eq!(model.updated_at(), 0);
        assert!(!model.tracker().is_dirty());
    }

    #[test]
    fn test_local_mutation_marks_dirty() {
        let mut model = model();
        let now = Instant::now();
        model.apply_local_mutation(log_mood(1), now).unwrap();
        assert_eq!(model.tracker().local_dirty_since(), Some(now));
        assert_eq!(model.document().device_id, "dev-a");
    }

    #[test]
    fn test_remote_apply_replaces_whole_document() {
        let mut model = model();
        let now = Instant::now();
        model.apply_local_mutation(log_mood(1), now).unwrap();

        let mut remote_doc = Document::new("dev-b");
        remote_doc.habits = vec![Habit::new("A", "a", 1).with_id("a")];
        remote_doc.mental_state = MoodLog::new();
        remote_doc.updated_at = 200;
        model.apply_remote_document(RemoteDocument::from(remote_doc.clone()), now);

        assert_eq!(model.document(), &remote_doc);
        assert!(!model.tracker().is_dirty());
        assert!(model.tracker().is_remote_applying(now));
    }

    #[test]
    fn test_remote_apply_without_school_data_keeps_local() {
        let mut model = model();
        let now = Instant::now();
        model
            .apply_local_mutation(Mutation::SetSchoolData(json!({"goals": ["A+"]})), now)
            .unwrap();

        let mut mental_state = MoodLog::new();
        mental_state.insert("2025-02-02".into(), MoodEntry::new(2, 2));
        let remote = RemoteDocument {
            habits: Some(Vec::new()),
            mental_state: Some(mental_state.clone()),
            school_data: None,
            updated_at: i64::MAX / 2,
            device_id: Some("dev-b".into()),
            missing: false,
        };
        model.apply_remote_document(remote, now);

        assert_eq!(model.document().school_data, json!({"goals": ["A+"]}));
        assert_eq!(model.document().mental_state, mental_state);
        assert!(model.document().habits.is_empty());
    }

    #[test]
    fn test_mark_pushed_only_when_unchanged() {
        let mut model = model();
        let now = Instant::now();
        let pushed = model.apply_local_mutation(log_mood(1), now).unwrap();
        model.apply_local_mutation(log_mood(2), now).unwrap();

        assert!(!model.mark_pushed(pushed));
        assert!(model.tracker().is_dirty());

        let latest = model.updated_at();
        assert!(model.mark_pushed(latest));
        assert!(!model.tracker().is_dirty());
    }
}
