//! Local edits to a [`Document`].
//!
//! Every edit is checked before it touches the document; a rejected mutation
//! leaves the document exactly as it was.

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use super::document::Document;
use super::habit::Habit;
use super::mood::{MoodEntry, SCORE_RANGE};

const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Accepted weekly goal for a habit.
pub const GOAL_RANGE: std::ops::RangeInclusive<u8> = 1..=7;

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddHabit {
        name: String,
        icon: String,
        goal: u8,
        color: Option<String>,
    },
    UpdateHabit {
        id: String,
        name: Option<String>,
        icon: Option<String>,
        goal: Option<u8>,
        color: Option<String>,
    },
    RemoveHabit {
        id: String,
    },
    ToggleCompletion {
        habit_id: String,
        date: String,
    },
    LogMood {
        date: String,
        mood: u8,
        motivation: u8,
    },
    ClearMood {
        date: String,
    },
    SetSchoolData(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("habit name must not be empty")]
    EmptyName,
    #[error("goal must be between 1 and 7, got {0}")]
    GoalOutOfRange(u8),
    #[error("{field} must be between 1 and 5, got {value}")]
    ScoreOutOfRange { field: &'static str, value: u8 },
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("habit not found: {0}")]
    HabitNotFound(String),
    #[error("school data must be a JSON object")]
    SchoolDataNotObject,
}

/// Parses a strict `YYYY-MM-DD` date key.
pub fn parse_date_key(key: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT)
        .ok()
        .filter(|date| date.format(DATE_KEY_FORMAT).to_string() == key)
        .ok_or_else(|| ValidationError::InvalidDate(key.to_string()))
}

pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

fn check_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(())
}

fn check_goal(goal: u8) -> Result<(), ValidationError> {
    if !GOAL_RANGE.contains(&goal) {
        return Err(ValidationError::GoalOutOfRange(goal));
    }
    Ok(())
}

fn check_score(field: &'static str, value: u8) -> Result<(), ValidationError> {
    if !SCORE_RANGE.contains(&value) {
        return Err(ValidationError::ScoreOutOfRange { field, value });
    }
    Ok(())
}

fn check_habit(doc: &Document, id: &str) -> Result<(), ValidationError> {
    doc.habit(id)
        .map(|_| ())
        .ok_or_else(|| ValidationError::HabitNotFound(id.to_string()))
}

impl Mutation {
    pub fn validate(&self, doc: &Document) -> Result<(), ValidationError> {
        match self {
            Mutation::AddHabit { name, goal, .. } => {
                check_name(name)?;
                check_goal(*goal)
            }
            Mutation::UpdateHabit { id, name, goal, .. } => {
                check_habit(doc, id)?;
                if let Some(name) = name {
                    check_name(name)?;
                }
                if let Some(goal) = goal {
                    check_goal(*goal)?;
                }
                Ok(())
            }
            Mutation::RemoveHabit { id } => check_habit(doc, id),
            Mutation::ToggleCompletion { habit_id, date } => {
                parse_date_key(date)?;
                check_habit(doc, habit_id)
            }
            Mutation::LogMood {
                date,
                mood,
                motivation,
            } => {
                parse_date_key(date)?;
                check_score("mood", *mood)?;
                check_score("motivation", *motivation)
            }
            Mutation::ClearMood { date } => parse_date_key(date).map(|_| ()),
            Mutation::SetSchoolData(data) => {
                if !data.is_object() {
                    return Err(ValidationError::SchoolDataNotObject);
                }
                Ok(())
            }
        }
    }
}

impl Document {
    /// Validates and applies a mutation. The logical clock is not touched
    /// here; that is the document model's job.
    pub fn apply(&mut self, mutation: Mutation) -> Result<(), ValidationError> {
        mutation.validate(self)?;

        match mutation {
            Mutation::AddHabit {
                name,
                icon,
                goal,
                color,
            } => {
                let mut habit = Habit::new(name.trim(), icon, goal);
                habit.color = color;
                self.habits.push(habit);
            }
            Mutation::UpdateHabit {
                id,
                name,
                icon,
                goal,
                color,
            } => {
                let habit = self
                    .habit_mut(&id)
                    .ok_or(ValidationError::HabitNotFound(id.clone()))?;
                if let Some(name) = name {
                    habit.name = name.trim().to_string();
                }
                if let Some(icon) = icon {
                    habit.icon = icon;
                }
                if let Some(goal) = goal {
                    habit.goal = goal;
                }
                if color.is_some() {
                    habit.color = color;
                }
            }
            Mutation::RemoveHabit { id } => {
                self.habits.retain(|h| h.id != id);
            }
            Mutation::ToggleCompletion { habit_id, date } => {
                let habit = self
                    .habit_mut(&habit_id)
                    .ok_or(ValidationError::HabitNotFound(habit_id.clone()))?;
                habit.toggle(&date);
            }
            Mutation::LogMood {
                date,
                mood,
                motivation,
            } => {
                self.mental_state
                    .insert(date, MoodEntry::new(mood, motivation));
            }
            Mutation::ClearMood { date } => {
                self.mental_state.remove(&date);
            }
            Mutation::SetSchoolData(data) => {
                self.school_data = data;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        Document::new("dev-1")
    }

    #[test]
    fn test_parse_date_key() {
        assert!(parse_date_key("2025-02-28").is_ok());
        assert!(parse_date_key("2025-02-30").is_err());
        assert!(parse_date_key("2025-2-1").is_err());
        assert!(parse_date_key("yesterday").is_err());
    }

    #[test]
    fn test_add_habit() {
        let mut doc = doc();
        doc.apply(Mutation::AddHabit {
            name: "  Meditate ".into(),
            icon: "lotus".into(),
            goal: 7,
            color: Some("#ffffff".into()),
        })
        .unwrap();

        let habit = doc.habits.last().unwrap();
        assert_eq!(habit.name, "Meditate");
        assert_eq!(habit.color.as_deref(), Some("#ffffff"));
    }

    #[test]
    fn test_add_habit_rejects_bad_input() {
        let mut doc = doc();
        let before = doc.clone();

        let err = doc
            .apply(Mutation::AddHabit {
                name: "   ".into(),
                icon: "x".into(),
                goal: 3,
                color: None,
            })
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);

        let err = doc
            .apply(Mutation::AddHabit {
                name: "Run".into(),
                icon: "x".into(),
                goal: 0,
                color: None,
            })
            .unwrap_err();
        assert_eq!(err, ValidationError::GoalOutOfRange(0));

        assert_eq!(doc, before);
    }

    #[test]
    fn test_toggle_completion() {
        let mut doc = doc();
        doc.apply(Mutation::ToggleCompletion {
            habit_id: "default-water".into(),
            date: "2025-03-01".into(),
        })
        .unwrap();

        assert!(doc
            .habit("default-water")
            .unwrap()
            .is_completed_on("2025-03-01"));
    }

    #[test]
    fn test_toggle_unknown_habit() {
        let mut doc = doc();
        let err = doc
            .apply(Mutation::ToggleCompletion {
                habit_id: "nope".into(),
                date: "2025-03-01".into(),
            })
            .unwrap_err();
        assert_eq!(err, ValidationError::HabitNotFound("nope".into()));
    }

    #[test]
    fn test_update_and_remove_habit() {
        let mut doc = doc();
        doc.apply(Mutation::UpdateHabit {
            id: "default-reading".into(),
            name: Some("Read fiction".into()),
            icon: None,
            goal: Some(2),
            color: None,
        })
        .unwrap();

        let habit = doc.habit("default-reading").unwrap();
        assert_eq!(habit.name, "Read fiction");
        assert_eq!(habit.goal, 2);
        assert_eq!(habit.color.as_deref(), Some("#f59e0b"));

        doc.apply(Mutation::RemoveHabit {
            id: "default-reading".into(),
        })
        .unwrap();
        assert!(doc.habit("default-reading").is_none());
        assert_eq!(doc.habits.len(), 2);
    }

    #[test]
    fn test_log_mood_range() {
        let mut doc = doc();
        doc.apply(Mutation::LogMood {
            date: "2025-01-10".into(),
            mood: 5,
            motivation: 1,
        })
        .unwrap();
        assert_eq!(doc.mental_state["2025-01-10"], MoodEntry::new(5, 1));

        let err = doc
            .apply(Mutation::LogMood {
                date: "2025-01-11".into(),
                mood: 6,
                motivation: 3,
            })
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::ScoreOutOfRange {
                field: "mood",
                value: 6
            }
        );

        doc.apply(Mutation::ClearMood {
            date: "2025-01-10".into(),
        })
        .unwrap();
        assert!(doc.mental_state.is_empty());
    }

    #[test]
    fn test_set_school_data() {
        let mut doc = doc();
        doc.apply(Mutation::SetSchoolData(json!({"subjects": ["math"]})))
            .unwrap();
        assert_eq!(doc.school_data["subjects"], json!(["math"]));

        let err = doc
            .apply(Mutation::SetSchoolData(json!([1, 2])))
            .unwrap_err();
        assert_eq!(err, ValidationError::SchoolDataNotObject);
    }
}
