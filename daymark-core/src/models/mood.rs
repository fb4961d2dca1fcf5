use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

/// Accepted range for both mood and motivation scores.
pub const SCORE_RANGE: RangeInclusive<u8> = 1..=5;

/// Mood log keyed by date key (`YYYY-MM-DD`).
pub type MoodLog = BTreeMap<String, MoodEntry>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub mood: u8,
    pub motivation: u8,
}

impl MoodEntry {
    pub fn new(mood: u8, motivation: u8) -> Self {
        Self { mood, motivation }
    }
}

impl fmt::Display for MoodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mood {}/5, motivation {}/5", self.mood, self.motivation)
    }
}
