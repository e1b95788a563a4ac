mod task;

pub use task::{
    Priority, Subtask, Task, TaskDraft, TaskPatch, normalize_tags, parse_due, split_tags,
};
pub(crate) use task::new_id;
