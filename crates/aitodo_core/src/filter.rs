use crate::model::{Priority, Task};
use serde::{Deserialize, Serialize};

/// How a non-blank tag filter combines with the other predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagFilterMode {
    /// The tag match alone decides inclusion once a tag is given.
    #[default]
    TagOnly,
    /// Every predicate must hold.
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub open_only: bool,
    pub priorities: Vec<Priority>,
    pub tag: Option<String>,
    pub tag_mode: TagFilterMode,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        let tag = self
            .tag
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty());

        if let Some(tag) = tag
            && self.tag_mode == TagFilterMode::TagOnly
        {
            return task.has_tag(tag);
        }

        if self.open_only && task.done {
            return false;
        }
        if !self.priorities.is_empty() && !self.priorities.contains(&task.priority) {
            return false;
        }
        match tag {
            Some(tag) => task.has_tag(tag),
            None => true,
        }
    }
}

/// Tasks matching `filter`, in their original order.
pub fn filter(tasks: &[Task], filter: &TaskFilter) -> Vec<Task> {
    tasks
        .iter()
        .filter(|task| filter.matches(task))
        .cloned()
        .collect()
}
