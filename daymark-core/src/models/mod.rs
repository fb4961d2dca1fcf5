mod document;
mod habit;
mod mood;
mod mutation;

pub use document::{empty_school_data, Document, RemoteDocument};
pub use habit::Habit;
pub use mood::{MoodEntry, MoodLog, SCORE_RANGE};
pub use mutation::{date_key, parse_date_key, Mutation, ValidationError, GOAL_RANGE};
