//! The task record shared between popup, storage and the alarm handler.
//!
//! Field names and enum spellings match the JSON documents the popup
//! already writes, so existing storage documents load unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

/// Display priority. Not consumed by scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Unit for the optional time estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateUnit {
    Minutes,
    Hours,
    Days,
}

/// A user task.
///
/// `id` doubles as the periodic alarm name; the end-of-task alarm name is
/// derived from it (see [`crate::alarms`]). `last_reminder_at` is written
/// only by the alarm handler, never by the popup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Preferred body text for periodic reminder notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation_text: Option<String>,
    /// Presence marks the task as started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_datetime: Option<DateTime<Utc>>,
    /// Instant at which the one-shot end-of-task alarm fires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_datetime: Option<DateTime<Utc>>,
    /// Reminder period in minutes; presence means a periodic reminder is active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_every: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reminder_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    /// Estimate magnitude, displayed by the popup's progress view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_unit: Option<EstimateUnit>,
}

impl Task {
    /// Create a task with the given id and title; everything else empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            motivation_text: None,
            start_datetime: None,
            due_datetime: None,
            reminder_every: None,
            last_reminder_at: None,
            status: TaskStatus::default(),
            priority: Priority::default(),
            estimated_time: None,
            estimated_time_unit: None,
        }
    }

    /// Body text for this task's periodic reminder notification:
    /// motivation text if non-empty, else description, else empty.
    #[must_use]
    pub fn reminder_body(&self) -> String {
        self.motivation_text
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.description.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or_default()
            .to_owned()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut task = Task::new("t1", "Write report");
        task.motivation_text = Some("Keep going! 🚀".to_owned());
        task.reminder_every = Some(30);

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["id"], "t1");
        assert_eq!(json["motivationText"], "Keep going! 🚀");
        assert_eq!(json["reminderEvery"], 30);
        assert_eq!(json["status"], "TODO");
        assert_eq!(json["priority"], "medium");
        // Absent optionals are omitted entirely.
        assert!(json.get("dueDatetime").is_none());
        assert!(json.get("lastReminderAt").is_none());
    }

    #[test]
    fn deserializes_minimal_document() {
        let task: Task =
            serde_json::from_value(serde_json::json!({"id": "t2", "title": "Ship release"}))
                .unwrap();
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.reminder_every, None);
    }

    #[test]
    fn enum_spellings_match_stored_documents() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "t3",
            "title": "Review PR",
            "status": "IN_PROGRESS",
            "priority": "high",
            "estimatedTime": 2,
            "estimatedTimeUnit": "hours",
        }))
        .unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.estimated_time_unit, Some(EstimateUnit::Hours));
    }

    #[test]
    fn datetime_fields_parse_rfc3339() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "t4",
            "title": "Due soon",
            "dueDatetime": "2025-06-01T12:30:00Z",
        }))
        .unwrap();
        let due = task.due_datetime.unwrap();
        assert_eq!(due.to_rfc3339(), "2025-06-01T12:30:00+00:00");
    }

    #[test]
    fn reminder_body_prefers_motivation_text() {
        let mut task = Task::new("t5", "Write");
        assert_eq!(task.reminder_body(), "");

        task.description = Some("A description".to_owned());
        assert_eq!(task.reminder_body(), "A description");

        task.motivation_text = Some("Keep going! 🚀".to_owned());
        assert_eq!(task.reminder_body(), "Keep going! 🚀");

        // Empty motivation text falls back to the description.
        task.motivation_text = Some(String::new());
        assert_eq!(task.reminder_body(), "A description");
    }
}
