//! Prompt text for each enrichment operation.

use crate::model::Task;

pub fn parse_task(description: &str) -> String {
    format!(
        r#"Extract a to-do item from: """{description}""".
Return JSON with keys:
- title (short string)
- priority (High/Medium/Low)
- due (YYYY-MM-DD or null)
- tags (array of short tags)
Only output valid JSON."#
    )
}

pub fn breakdown(title: &str) -> String {
    format!("Break the task into 3-6 concise subtasks (bullet list, one line each): {title:?}")
}

pub fn reprioritize(tasks: &[Task]) -> String {
    let mut prompt = String::from(
        "Reassign each task a priority of High/Medium/Low. \
         Return JSON array with objects: {title, priority}.\n",
    );
    let lines: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(index, task)| summary_line(index + 1, task))
        .collect();
    prompt.push_str(&lines.join("\n"));
    prompt
}

fn summary_line(number: usize, task: &Task) -> String {
    let due = task
        .due
        .map(|date| date.to_string())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "{number}. {} (due: {due}, priority: {}, done: {})",
        task.title, task.priority, task.done
    )
}
