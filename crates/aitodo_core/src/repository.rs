//! The session-owned task list and its mirrored JSON file.
//!
//! A [`TaskRepository`] is built once per process and handed by reference to
//! whatever drives it. Reads are lazy and fail soft; writes replace the whole
//! file and never propagate errors. Mutators only touch the in-memory list,
//! so callers decide when to [`TaskRepository::flush`].

use crate::error::AppError;
use crate::model::{Priority, Subtask, Task, TaskDraft, TaskPatch, new_id, normalize_tags};
use crate::storage::json_store;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug)]
pub struct TaskRepository {
    path: PathBuf,
    tasks: Option<Vec<Task>>,
}

impl TaskRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tasks: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current list, reading the backing file on first use.
    pub fn load(&mut self) -> &[Task] {
        self.tasks_mut()
    }

    /// Replace the list and write it out.
    pub fn save(&mut self, tasks: Vec<Task>) {
        self.tasks = Some(tasks);
        self.flush();
    }

    /// Write the current list. Failures are logged; memory stays authoritative.
    pub fn flush(&mut self) {
        let path = self.path.clone();
        let tasks = self.tasks_mut();
        if let Err(err) = json_store::write_tasks(&path, &tasks[..]) {
            tracing::warn!(path = %path.display(), error = %err, "failed to persist tasks");
        }
    }

    pub fn create(&mut self, draft: TaskDraft) -> Result<Task, AppError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_input("title is required"));
        }

        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| AppError::invalid_data(err.to_string()))?;

        let tasks = self.tasks_mut();
        let mut id = new_id();
        while tasks.iter().any(|task| task.id == id) {
            id = new_id();
        }

        let task = Task {
            id,
            title: title.to_string(),
            done: false,
            created_at,
            due: draft.due,
            priority: Priority::normalize_or_default(&draft.priority),
            tags: normalize_tags(&draft.tags),
            subtasks: Vec::new(),
        };
        tasks.push(task.clone());
        tracing::debug!(id = %task.id, "created task");

        Ok(task)
    }

    pub fn get(&mut self, id: &str) -> Result<Task, AppError> {
        let index = self.position(id)?;
        Ok(self.tasks_mut()[index].clone())
    }

    pub fn update(&mut self, id: &str, patch: TaskPatch) -> Result<Task, AppError> {
        let title = match patch.title.as_deref() {
            Some(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(AppError::invalid_input("title is required"));
                }
                Some(trimmed.to_string())
            }
            None => None,
        };

        let index = self.position(id)?;
        let task = &mut self.tasks_mut()[index];
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(done) = patch.done {
            task.done = done;
        }
        if let Some(due) = patch.due {
            task.due = due;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(tags) = patch.tags {
            task.tags = normalize_tags(&tags);
        }

        Ok(task.clone())
    }

    pub fn toggle_done(&mut self, id: &str) -> Result<Task, AppError> {
        let index = self.position(id)?;
        let task = &mut self.tasks_mut()[index];
        task.done = !task.done;
        Ok(task.clone())
    }

    /// Returns how many tasks changed state.
    pub fn mark_all_done(&mut self) -> usize {
        let mut changed = 0;
        for task in self.tasks_mut().iter_mut().filter(|task| !task.done) {
            task.done = true;
            changed += 1;
        }
        changed
    }

    /// Remove the task whose id is exactly `id`. Unknown ids are ignored.
    pub fn delete(&mut self, id: &str) -> Option<Task> {
        let tasks = self.tasks_mut();
        let index = tasks.iter().position(|task| task.id == id)?;
        Some(tasks.remove(index))
    }

    pub fn add_subtask(&mut self, task_id: &str, title: &str) -> Result<Subtask, AppError> {
        let mut added = self.add_subtasks(task_id, [title])?;
        added
            .pop()
            .ok_or_else(|| AppError::invalid_input("subtask title is required"))
    }

    /// Append several subtasks at once; every title must be non-blank.
    pub fn add_subtasks<I, S>(&mut self, task_id: &str, titles: I) -> Result<Vec<Subtask>, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut subtasks = Vec::new();
        for title in titles {
            if title.as_ref().trim().is_empty() {
                return Err(AppError::invalid_input("subtask title is required"));
            }
            subtasks.push(Subtask::new(title.as_ref()));
        }

        let index = self.position(task_id)?;
        self.tasks_mut()[index].subtasks.extend(subtasks.iter().cloned());
        Ok(subtasks)
    }

    pub fn set_subtask_done(
        &mut self,
        task_id: &str,
        subtask_id: &str,
        done: bool,
    ) -> Result<Subtask, AppError> {
        self.with_subtask(task_id, subtask_id, |subtask| subtask.done = done)
    }

    pub fn rename_subtask(
        &mut self,
        task_id: &str,
        subtask_id: &str,
        title: &str,
    ) -> Result<Subtask, AppError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("subtask title is required"));
        }
        self.with_subtask(task_id, subtask_id, |subtask| {
            subtask.title = trimmed.to_string()
        })
    }

    pub fn remove_subtask(&mut self, task_id: &str, subtask_id: &str) -> Result<Subtask, AppError> {
        let index = self.position(task_id)?;
        let task = &mut self.tasks_mut()[index];
        let position = subtask_position(task, subtask_id)?;
        Ok(task.subtasks.remove(position))
    }

    fn with_subtask<F>(&mut self, task_id: &str, subtask_id: &str, edit: F) -> Result<Subtask, AppError>
    where
        F: FnOnce(&mut Subtask),
    {
        let index = self.position(task_id)?;
        let task = &mut self.tasks_mut()[index];
        let position = subtask_position(task, subtask_id)?;
        let subtask = &mut task.subtasks[position];
        edit(subtask);
        Ok(subtask.clone())
    }

    fn tasks_mut(&mut self) -> &mut Vec<Task> {
        let path = &self.path;
        self.tasks.get_or_insert_with(|| match json_store::read_tasks(path) {
            Ok(tasks) => tasks,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to load tasks, starting empty");
                Vec::new()
            }
        })
    }

    /// Index of the task whose id equals `id` or, failing that, uniquely starts with it.
    fn position(&mut self, id: &str) -> Result<usize, AppError> {
        let trimmed_id = id.trim();
        if trimmed_id.is_empty() {
            return Err(AppError::invalid_input("id is required"));
        }

        let tasks = self.tasks_mut();
        if let Some(index) = tasks.iter().position(|task| task.id == trimmed_id) {
            return Ok(index);
        }
        resolve_prefix(tasks.iter().map(|task| task.id.as_str()), trimmed_id, "task")
    }
}

fn subtask_position(task: &Task, subtask_id: &str) -> Result<usize, AppError> {
    let trimmed_id = subtask_id.trim();
    if trimmed_id.is_empty() {
        return Err(AppError::invalid_input("subtask id is required"));
    }
    if let Some(index) = task.subtasks.iter().position(|subtask| subtask.id == trimmed_id) {
        return Ok(index);
    }
    resolve_prefix(
        task.subtasks.iter().map(|subtask| subtask.id.as_str()),
        trimmed_id,
        "subtask",
    )
}

fn resolve_prefix<'a, I>(ids: I, prefix: &str, kind: &str) -> Result<usize, AppError>
where
    I: Iterator<Item = &'a str>,
{
    let mut matches = ids
        .enumerate()
        .filter(|(_, id)| id.starts_with(prefix))
        .map(|(index, _)| index);
    match (matches.next(), matches.next()) {
        (Some(index), None) => Ok(index),
        (Some(_), Some(_)) => Err(AppError::invalid_input(format!(
            "{kind} id '{prefix}' is ambiguous"
        ))),
        (None, _) => Err(AppError::invalid_input(format!("{kind} not found"))),
    }
}
