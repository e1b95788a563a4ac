use std::collections::HashMap;

use serde_json::Value;
use time::Date;

use super::extract::{extract_json_array, extract_json_object};
use super::provider::CompletionClient;
use super::{AnthropicClient, EnrichmentError, GeminiClient, prompts};
use crate::config::{AiConfig, ProviderKind};
use crate::model::{Priority, Task, normalize_tags, parse_due, split_tags};

/// Upper bound on subtasks returned by a breakdown.
pub const MAX_SUBTASKS: usize = 6;
/// Longest subtask line, in characters, kept from a breakdown.
pub const MAX_SUBTASK_CHARS: usize = 140;

/// Task fields extracted from a free-text description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTask {
    pub title: String,
    pub priority: Priority,
    pub due: Option<Date>,
    pub tags: Vec<String>,
}

impl ParsedTask {
    pub fn fallback(input: &str) -> Self {
        Self {
            title: input.trim().to_string(),
            priority: Priority::Medium,
            due: None,
            tags: Vec::new(),
        }
    }
}

/// Enrichment front door. Enabled when it holds a provider client; every
/// operation returns its fallback instead of an error.
pub struct Gateway {
    client: Option<Box<dyn CompletionClient>>,
}

impl Gateway {
    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub fn new(client: Box<dyn CompletionClient>) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Build a gateway for the configured provider. A missing or blank
    /// credential yields a disabled gateway.
    pub fn from_config(config: &AiConfig, api_key: Option<&str>) -> Self {
        let Some(api_key) = api_key.map(str::trim).filter(|key| !key.is_empty()) else {
            return Self::disabled();
        };

        let timeout = config.timeout();
        let built: Result<Box<dyn CompletionClient>, EnrichmentError> = match config.provider {
            ProviderKind::Gemini => GeminiClient::new(api_key, timeout).map(|mut client| {
                if let Some(url) = config.base_url.as_deref() {
                    client = client.with_base_url(url);
                }
                if let Some(model) = config.model.as_deref() {
                    client = client.with_model(model);
                }
                Box::new(client) as Box<dyn CompletionClient>
            }),
            ProviderKind::Anthropic => AnthropicClient::new(api_key, timeout).map(|mut client| {
                if let Some(url) = config.base_url.as_deref() {
                    client = client.with_base_url(url);
                }
                if let Some(model) = config.model.as_deref() {
                    client = client.with_model(model);
                }
                Box::new(client) as Box<dyn CompletionClient>
            }),
        };

        match built {
            Ok(client) => Self::new(client),
            Err(err) => {
                tracing::warn!(error = %err, "AI provider unavailable, enrichment disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.client.as_deref().map(|client| client.name())
    }

    /// Extract title, priority, due date and tags from a description.
    pub fn parse_task(&self, text: &str) -> ParsedTask {
        self.enrich(
            "parse_task",
            |client| {
                let reply = client.complete(&prompts::parse_task(text))?;
                parsed_task_from_reply(text, &reply)
            },
            || ParsedTask::fallback(text),
        )
    }

    /// Up to [`MAX_SUBTASKS`] short subtask titles for `title`.
    pub fn breakdown_task(&self, title: &str) -> Vec<String> {
        self.enrich(
            "breakdown_task",
            |client| {
                let reply = client.complete(&prompts::breakdown(title))?;
                Ok(subtasks_from_reply(&reply))
            },
            Vec::new,
        )
    }

    /// Reassign priorities by exact title. Tasks the provider does not
    /// mention keep their priority.
    pub fn reprioritize(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        if tasks.is_empty() {
            return tasks;
        }

        let mapping = self.enrich(
            "reprioritize",
            |client| {
                let reply = client.complete(&prompts::reprioritize(&tasks))?;
                priorities_from_reply(&reply)
            },
            HashMap::new,
        );

        for task in &mut tasks {
            if let Some(priority) = mapping.get(&task.title) {
                task.priority = *priority;
            }
        }
        tasks
    }

    /// Single place where provider failures turn into fallbacks.
    fn enrich<T, C, F>(&self, operation: &str, call: C, fallback: F) -> T
    where
        C: FnOnce(&dyn CompletionClient) -> Result<T, EnrichmentError>,
        F: FnOnce() -> T,
    {
        let result = match self.client.as_deref() {
            Some(client) => call(client),
            None => Err(EnrichmentError::Disabled),
        };

        match result {
            Ok(value) => value,
            Err(EnrichmentError::Disabled) => {
                tracing::debug!(operation, "AI disabled, using fallback");
                fallback()
            }
            Err(err) => {
                tracing::warn!(operation, error = %err, "AI enrichment failed, using fallback");
                fallback()
            }
        }
    }
}

fn parsed_task_from_reply(input: &str, reply: &str) -> Result<ParsedTask, EnrichmentError> {
    let object = extract_json_object(reply)?;
    let text_field = |key: &str| object.get(key).and_then(Value::as_str);

    let title = text_field("title")
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| input.trim())
        .to_string();
    let priority = text_field("priority")
        .map(Priority::normalize_or_default)
        .unwrap_or_default();
    let due = text_field("due").and_then(parse_due);
    let tags = match object.get("tags") {
        Some(Value::Array(items)) => normalize_tags(items.iter().filter_map(Value::as_str)),
        Some(Value::String(csv)) => split_tags(csv),
        _ => Vec::new(),
    };

    Ok(ParsedTask {
        title,
        priority,
        due,
        tags,
    })
}

fn subtasks_from_reply(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(strip_bullet)
        .filter(|line| !line.is_empty() && line.chars().count() <= MAX_SUBTASK_CHARS)
        .take(MAX_SUBTASKS)
        .map(str::to_string)
        .collect()
}

fn strip_bullet(line: &str) -> &str {
    let line = line
        .trim_start_matches(|ch: char| ch == '-' || ch == '•' || ch == '*' || ch.is_whitespace())
        .trim_end_matches(|ch: char| ch == '-' || ch == '•' || ch.is_whitespace());
    let digits = line.len() - line.trim_start_matches(|ch: char| ch.is_ascii_digit()).len();
    if digits == 0 {
        return line;
    }

    let rest = &line[digits..];
    match rest.strip_prefix(['.', ')']) {
        Some(item) if item.starts_with(char::is_whitespace) => item.trim(),
        _ => line,
    }
}

fn priorities_from_reply(reply: &str) -> Result<HashMap<String, Priority>, EnrichmentError> {
    let items = extract_json_array(reply)?;
    let mut mapping = HashMap::new();

    for item in &items {
        let Some(title) = item.get("title").and_then(Value::as_str) else {
            continue;
        };
        let Some(priority) = item
            .get("priority")
            .and_then(Value::as_str)
            .and_then(Priority::normalize)
        else {
            continue;
        };
        mapping.insert(title.to_string(), priority);
    }

    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::{Gateway, MAX_SUBTASK_CHARS, ParsedTask, strip_bullet, subtasks_from_reply};
    use crate::ai::{CompletionClient, EnrichmentError};
    use crate::config::AiConfig;
    use crate::model::{Priority, Task, parse_due};
    use std::sync::{Arc, Mutex};

    /// Replays canned replies and records the prompts it saw.
    struct ScriptedClient {
        replies: Mutex<Vec<Result<String, EnrichmentError>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedClient {
        fn replying(replies: Vec<Result<String, EnrichmentError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl CompletionClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        fn complete(&self, prompt: &str) -> Result<String, EnrichmentError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(EnrichmentError::EmptyResponse);
            }
            replies.remove(0)
        }
    }

    fn gateway(reply: &str) -> Gateway {
        Gateway::new(Box::new(ScriptedClient::replying(vec![Ok(reply.to_string())])))
    }

    fn failing(err: EnrichmentError) -> Gateway {
        Gateway::new(Box::new(ScriptedClient::replying(vec![Err(err)])))
    }

    fn task(title: &str, priority: Priority) -> Task {
        Task {
            id: format!("id-{title}"),
            title: title.to_string(),
            done: false,
            created_at: "2025-12-20T00:00:00Z".to_string(),
            due: None,
            priority,
            tags: Vec::new(),
            subtasks: Vec::new(),
        }
    }

    #[test]
    fn disabled_parse_returns_trimmed_input_defaults() {
        let parsed = Gateway::disabled().parse_task("  Call mom tomorrow ");

        assert_eq!(
            parsed,
            ParsedTask {
                title: "Call mom tomorrow".to_string(),
                priority: Priority::Medium,
                due: None,
                tags: Vec::new(),
            }
        );
    }

    #[test]
    fn parse_reads_fields_from_wrapped_json() {
        let gateway = gateway(
            "Here is the task:\n```json\n{\"title\": \"Draft report\", \"priority\": \"high\", \"due\": \"2025-03-07\", \"tags\": [\"project\", \"\", \"project\", \"work\"]}\n```",
        );

        let parsed = gateway.parse_task("Draft report by Friday, high priority, tag: project");

        assert_eq!(parsed.title, "Draft report");
        assert_eq!(parsed.priority, Priority::High);
        assert_eq!(parsed.due, parse_due("2025-03-07"));
        assert_eq!(parsed.tags, vec!["project".to_string(), "work".to_string()]);
    }

    #[test]
    fn parse_fills_defaults_for_missing_or_bad_fields() {
        let gateway = gateway("{\"priority\": \"someday\", \"due\": \"friday\"}");

        let parsed = gateway.parse_task(" Water plants ");

        assert_eq!(parsed, ParsedTask::fallback("Water plants"));
    }

    #[test]
    fn parse_falls_back_on_failures() {
        let no_json = gateway("I could not understand that.");
        let malformed = gateway("{title: oops}");
        let timed_out = failing(EnrichmentError::Timeout);

        for gateway in [no_json, malformed, timed_out] {
            assert_eq!(gateway.parse_task("Call mom"), ParsedTask::fallback("Call mom"));
        }
    }

    #[test]
    fn breakdown_cleans_bullets_and_caps_results() {
        let long_line = "x".repeat(MAX_SUBTASK_CHARS + 1);
        let reply = format!(
            "- Outline sections\n\n• Collect data\n* Write draft\n1. Review with team\n{long_line}\n2) Fix comments\n- Submit\n- Celebrate\n"
        );

        let subtasks = gateway(&reply).breakdown_task("Finish report");

        assert_eq!(
            subtasks,
            vec![
                "Outline sections",
                "Collect data",
                "Write draft",
                "Review with team",
                "Fix comments",
                "Submit",
            ]
        );
    }

    #[test]
    fn breakdown_returns_empty_when_disabled_or_failing() {
        assert!(Gateway::disabled().breakdown_task("anything").is_empty());
        assert!(
            failing(EnrichmentError::Transport("refused".into()))
                .breakdown_task("anything")
                .is_empty()
        );
    }

    #[test]
    fn subtask_lines_respect_limits() {
        let reply = (0..20)
            .map(|index| format!("- step {index}"))
            .collect::<Vec<_>>()
            .join("\n");
        let subtasks = subtasks_from_reply(&reply);

        assert_eq!(subtasks.len(), 6);
        assert!(subtasks.iter().all(|line| !line.trim().is_empty()));
        assert!(subtasks.iter().all(|line| line.chars().count() <= MAX_SUBTASK_CHARS));
    }

    #[test]
    fn strip_bullet_keeps_leading_numbers_that_are_content() {
        assert_eq!(strip_bullet("3. Buy paint"), "Buy paint");
        assert_eq!(strip_bullet("2024 budget review"), "2024 budget review");
        assert_eq!(strip_bullet("3.5 hours of review"), "3.5 hours of review");
        assert_eq!(strip_bullet("  * Read *Dune* again"), "Read *Dune* again");
        assert_eq!(strip_bullet("- Outline sections -"), "Outline sections");
        assert_eq!(strip_bullet("• Collect data •  "), "Collect data");
    }

    #[test]
    fn reprioritize_applies_exact_title_matches_only() {
        let gateway = gateway(
            "Sure:\n[{\"title\": \"File taxes\", \"priority\": \"high\"}, {\"title\": \"water plants\", \"priority\": \"Low\"}, {\"title\": \"Walk dog\", \"priority\": \"critical\"}]",
        );
        let tasks = vec![
            task("File taxes", Priority::Low),
            task("Water plants", Priority::Medium),
            task("Walk dog", Priority::Medium),
        ];

        let updated = gateway.reprioritize(tasks);

        assert_eq!(updated[0].priority, Priority::High);
        assert_eq!(updated[1].priority, Priority::Medium);
        assert_eq!(updated[2].priority, Priority::Medium);
    }

    #[test]
    fn reprioritize_aliases_duplicate_titles() {
        let gateway = gateway("[{\"title\": \"Email\", \"priority\": \"High\"}]");
        let tasks = vec![task("Email", Priority::Low), task("Email", Priority::Medium)];

        let updated = gateway.reprioritize(tasks);

        assert!(updated.iter().all(|task| task.priority == Priority::High));
    }

    #[test]
    fn reprioritize_leaves_tasks_unchanged_on_failure() {
        let tasks = vec![task("File taxes", Priority::Low)];

        assert_eq!(Gateway::disabled().reprioritize(tasks.clone()), tasks);
        assert_eq!(gateway("no array here").reprioritize(tasks.clone()), tasks);
        assert_eq!(
            failing(EnrichmentError::Status {
                status: 500,
                message: "boom".into()
            })
            .reprioritize(tasks.clone()),
            tasks
        );
    }

    #[test]
    fn reprioritize_skips_provider_for_empty_list() {
        let client = ScriptedClient::replying(vec![Ok("[]".to_string())]);
        let prompts = Arc::clone(&client.prompts);
        let gateway = Gateway::new(Box::new(client));

        assert!(gateway.reprioritize(Vec::new()).is_empty());
        assert!(prompts.lock().unwrap().is_empty());

        gateway.reprioritize(vec![task("File taxes", Priority::Low)]);
        assert_eq!(prompts.lock().unwrap().len(), 1);
    }

    #[test]
    fn from_config_requires_a_credential() {
        let config = AiConfig::default();

        assert!(!Gateway::from_config(&config, None).is_enabled());
        assert!(!Gateway::from_config(&config, Some("   ")).is_enabled());

        let enabled = Gateway::from_config(&config, Some("secret"));
        assert!(enabled.is_enabled());
        assert_eq!(enabled.provider_name(), Some("gemini"));
    }
}
