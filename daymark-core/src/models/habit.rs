use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// A tracked habit. Completion is recorded per day: a date key present in
/// `completed_dates` means the habit was done that day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub icon: String,
    /// Target completions per week
    pub goal: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub completed_dates: BTreeSet<String>,
}

impl Habit {
    pub fn new(name: impl Into<String>, icon: impl Into<String>, goal: u8) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            icon: icon.into(),
            goal,
            color: None,
            completed_dates: BTreeSet::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn is_completed_on(&self, date_key: &str) -> bool {
        self.completed_dates.contains(date_key)
    }

    /// Flips completion for a day and returns the new state.
    pub fn toggle(&mut self, date_key: &str) -> bool {
        if self.completed_dates.remove(date_key) {
            false
        } else {
            self.completed_dates.insert(date_key.to_string());
            true
        }
    }

    /// The three habits every fresh document starts with. Ids are fixed so
    /// that two untouched installations hold identical documents.
    pub fn defaults() -> Vec<Habit> {
        vec![
            Habit::new("Drink water", "droplet", 7)
                .with_id("default-water")
                .with_color("#3b82f6"),
            Habit::new("Exercise", "dumbbell", 3)
                .with_id("default-exercise")
                .with_color("#22c55e"),
            Habit::new("Read", "book", 5)
                .with_id("default-reading")
                .with_color("#f59e0b"),
        ]
    }
}

impl fmt::Display for Habit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] goal {}/week, {} day(s) done",
            self.name,
            self.icon,
            self.goal,
            self.completed_dates.len()
        )
    }
}
