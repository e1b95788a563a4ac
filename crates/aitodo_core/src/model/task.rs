use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use time::Date;
use time::macros::format_description;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Case-insensitive match against the three known values.
    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Like [`Priority::normalize`], but unknown values fall back to `Medium`.
    pub fn normalize_or_default(raw: &str) -> Self {
        Self::normalize(raw).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::normalize(raw).ok_or_else(|| {
            AppError::invalid_input(format!("priority must be High, Medium or Low (got '{raw}')"))
        })
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw
            .as_str()
            .map(Priority::normalize_or_default)
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

impl Subtask {
    pub fn new(title: &str) -> Self {
        Self {
            id: new_id(),
            title: title.trim().to_string(),
            done: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub done: bool,
    pub created_at: String,
    #[serde(default, with = "due_date")]
    pub due: Option<Date>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

impl Task {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    /// Give stored subtasks without an id one derived from the task id and
    /// their position, so reloading the same file yields the same ids.
    pub(crate) fn fill_subtask_ids(&mut self) {
        for (position, subtask) in self.subtasks.iter_mut().enumerate() {
            if subtask.id.trim().is_empty() {
                subtask.id = stored_subtask_id(&self.id, position);
            }
        }
    }
}

/// Input for creating a task; `priority` is free text and gets normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub due: Option<Date>,
    pub priority: String,
    pub tags: Vec<String>,
}

/// Field edits applied by `TaskRepository::update`. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub done: Option<bool>,
    pub due: Option<Option<Date>>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn stored_subtask_id(task_id: &str, position: usize) -> String {
    let name = format!("{task_id}/subtasks/{position}");
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Trim, drop blanks and repeated entries; first occurrence wins.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let trimmed = tag.as_ref().trim();
        if trimmed.is_empty() || normalized.iter().any(|seen| seen == trimmed) {
            continue;
        }
        normalized.push(trimmed.to_string());
    }
    normalized
}

/// Split a comma separated tag list as typed by a user.
pub fn split_tags(csv: &str) -> Vec<String> {
    normalize_tags(csv.split(','))
}

/// Parse a `YYYY-MM-DD` calendar date. Anything else is treated as no date.
pub fn parse_due(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()
}

mod due_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(due: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error> {
        match due {
            Some(date) => serializer.serialize_some(&date.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Date>, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(raw
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(super::parse_due))
    }
}

#[cfg(test)]
mod tests {
    use super::{Priority, Task, normalize_tags, parse_due, split_tags};
    use time::{Date, Month};

    #[test]
    fn priority_normalizes_case_and_whitespace() {
        assert_eq!(Priority::normalize(" low "), Some(Priority::Low));
        assert_eq!(Priority::normalize("HIGH"), Some(Priority::High));
        assert_eq!(Priority::normalize("mEdIuM"), Some(Priority::Medium));
        assert_eq!(Priority::normalize("urgent"), None);
        assert_eq!(Priority::normalize_or_default("urgent"), Priority::Medium);
    }

    #[test]
    fn priority_from_str_rejects_unknown_values() {
        let err = "someday".parse::<Priority>().unwrap_err();
        assert_eq!(err.code(), "invalid_input");
        assert_eq!("low".parse::<Priority>().unwrap(), Priority::Low);
    }

    #[test]
    fn normalize_tags_strips_blanks_and_duplicates() {
        let tags = normalize_tags(["groceries", "", "groceries", "  home ", "home"]);
        assert_eq!(tags, vec!["groceries".to_string(), "home".to_string()]);
    }

    #[test]
    fn split_tags_reads_comma_separated_input() {
        assert_eq!(
            split_tags("work, project,,work , school"),
            vec!["work", "project", "school"]
        );
        assert!(split_tags(" , ").is_empty());
    }

    #[test]
    fn parse_due_accepts_only_calendar_dates() {
        assert_eq!(
            parse_due("2024-03-01"),
            Some(Date::from_calendar_date(2024, Month::March, 1).unwrap())
        );
        assert_eq!(parse_due("2024-02-30"), None);
        assert_eq!(parse_due("next friday"), None);
        assert_eq!(parse_due(""), None);
    }

    #[test]
    fn task_deserializes_leniently() {
        let raw = serde_json::json!({
            "id": "a1",
            "title": "Pay rent",
            "created_at": "2025-12-20T00:00:00Z",
            "due": "not-a-date",
            "priority": "urgent",
            "subtasks": [{ "title": "find checkbook" }]
        });

        let mut task: Task = serde_json::from_value(raw).unwrap();
        task.fill_subtask_ids();

        assert!(!task.done);
        assert_eq!(task.due, None);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.tags.is_empty());
        assert_eq!(task.subtasks.len(), 1);
        assert!(!task.subtasks[0].id.is_empty());
        assert!(!task.subtasks[0].done);
    }

    #[test]
    fn missing_subtask_ids_are_derived_the_same_way_every_time() {
        let raw = serde_json::json!({
            "id": "t1",
            "title": "Plan trip",
            "created_at": "2025-12-20T00:00:00Z",
            "subtasks": [
                { "title": "Book flights", "done": false },
                { "id": "kept", "title": "Reserve hotel", "done": true },
                { "title": "Pack", "done": false }
            ]
        });

        let mut first: Task = serde_json::from_value(raw.clone()).unwrap();
        let mut second: Task = serde_json::from_value(raw).unwrap();
        first.fill_subtask_ids();
        second.fill_subtask_ids();

        assert_eq!(first, second);
        assert_eq!(first.subtasks[1].id, "kept");
        assert_ne!(first.subtasks[0].id, first.subtasks[2].id);
        assert!(first.subtasks.iter().all(|subtask| !subtask.id.is_empty()));
    }

    #[test]
    fn task_serializes_due_as_calendar_date() {
        let task = Task {
            id: "a1".to_string(),
            title: "Pay rent".to_string(),
            done: false,
            created_at: "2025-12-20T00:00:00Z".to_string(),
            due: parse_due("2024-03-01"),
            priority: Priority::Low,
            tags: vec!["home".to_string()],
            subtasks: Vec::new(),
        };

        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value["due"], "2024-03-01");
        assert_eq!(value["priority"], "Low");
    }
}
