//! The unit of synchronization.
//!
//! A [`Document`] is always pushed whole. What comes back from a backend is a
//! [`RemoteDocument`], whose collections are optional so that a partial or
//! corrupt payload can be told apart from a legitimately empty one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::habit::Habit;
use super::mood::MoodLog;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub habits: Vec<Habit>,
    pub mental_state: MoodLog,
    /// Subjects, tests, tasks, schedule, goals and settings. Carried as a
    /// whole and never inspected by the sync engine.
    pub school_data: Value,
    /// Logical clock: milliseconds since epoch at the last local mutation.
    pub updated_at: i64,
    #[serde(default)]
    pub device_id: String,
}

impl Document {
    /// A fresh document with the default habits and a zero clock.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            habits: Habit::defaults(),
            mental_state: MoodLog::new(),
            school_data: empty_school_data(),
            updated_at: 0,
            device_id: device_id.into(),
        }
    }

    pub fn habit(&self, id: &str) -> Option<&Habit> {
        self.habits.iter().find(|h| h.id == id)
    }

    pub fn habit_mut(&mut self, id: &str) -> Option<&mut Habit> {
        self.habits.iter_mut().find(|h| h.id == id)
    }
}

pub fn empty_school_data() -> Value {
    Value::Object(Map::new())
}

/// A document as observed on a remote backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteDocument {
    pub habits: Option<Vec<Habit>>,
    pub mental_state: Option<MoodLog>,
    pub school_data: Option<Value>,
    pub updated_at: i64,
    pub device_id: Option<String>,
    /// True for the sentinel returned when nothing has ever been stored
    /// under the requested code.
    pub missing: bool,
}

impl RemoteDocument {
    /// Sentinel for "never synced": zero clock, empty collections.
    pub fn empty() -> Self {
        Self {
            habits: Some(Vec::new()),
            mental_state: Some(MoodLog::new()),
            school_data: Some(empty_school_data()),
            updated_at: 0,
            device_id: None,
            missing: true,
        }
    }

    /// Reads a payload field by field. A field that is absent or does not
    /// parse is left as `None` instead of failing the whole payload.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };

        let habits = fields
            .remove("habits")
            .and_then(|v| serde_json::from_value(v).ok());
        let mental_state = fields
            .remove("mentalState")
            .and_then(|v| serde_json::from_value(v).ok());
        let school_data = fields.remove("schoolData").filter(|v| !v.is_null());
        let updated_at = fields
            .get("updatedAt")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(0);
        let device_id = fields
            .get("deviceId")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            habits,
            mental_state,
            school_data,
            updated_at,
            device_id,
            missing: false,
        }
    }

    /// A payload may overwrite local state only if it carries at least the
    /// habit list and the mood log.
    pub fn is_structurally_valid(&self) -> bool {
        self.habits.is_some() && self.mental_state.is_some()
    }
}

impl From<Document> for RemoteDocument {
    fn from(doc: Document) -> Self {
        Self {
            habits: Some(doc.habits),
            mental_state: Some(doc.mental_state),
            school_data: Some(doc.school_data),
            updated_at: doc.updated_at,
            device_id: Some(doc.device_id),
            missing: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MoodEntry;
    use serde_json::json;

    #[test]
    fn test_new_document_has_defaults() {
        let doc = Document::new("dev-1");
        assert_eq!(doc.habits.len(), 3);
        assert!(doc.mental_state.is_empty());
        assert_eq!(doc.school_data, json!({}));
        assert_eq!(doc.updated_at, 0);
        assert_eq!(doc.device_id, "dev-1");
    }

    #[test]
    fn test_document_wire_format() {
        let mut doc = Document::new("dev-1");
        doc.mental_state
            .insert("2025-01-01".into(), MoodEntry::new(4, 3));
        doc.updated_at = 1000;

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["updatedAt"], json!(1000));
        assert_eq!(value["deviceId"], json!("dev-1"));
        assert_eq!(
            value["mentalState"]["2025-01-01"],
            json!({"mood": 4, "motivation": 3})
        );
        assert!(value["schoolData"].is_object());
    }

    #[test]
    fn test_remote_from_full_payload() {
        let doc = Document::new("dev-1");
        let remote = RemoteDocument::from_value(serde_json::to_value(&doc).unwrap());

        assert!(remote.is_structurally_valid());
        assert!(!remote.missing);
        assert_eq!(remote, RemoteDocument::from(doc));
    }

    #[test]
    fn test_remote_missing_school_data() {
        let remote = RemoteDocument::from_value(json!({
            "habits": [],
            "mentalState": {},
            "updatedAt": 5
        }));

        assert!(remote.is_structurally_valid());
        assert!(remote.school_data.is_none());
        assert_eq!(remote.updated_at, 5);
    }

    #[test]
    fn test_remote_malformed_fields_are_dropped() {
        let remote = RemoteDocument::from_value(json!({
            "habits": "not a list",
            "mentalState": {},
            "updatedAt": 7
        }));

        assert!(remote.habits.is_none());
        assert!(!remote.is_structurally_valid());
    }

    #[test]
    fn test_remote_non_object_payload() {
        let remote = RemoteDocument::from_value(json!([1, 2, 3]));
        assert!(!remote.is_structurally_valid());
        assert_eq!(remote.updated_at, 0);
    }

    #[test]
    fn test_empty_sentinel() {
        let empty = RemoteDocument::empty();
        assert!(empty.missing);
        assert!(empty.is_structurally_valid());
        assert_eq!(empty.updated_at, 0);
    }
}
