use aitodo_core::config::{ConfigOverrides, ProviderKind, canonical_name, tag_filter_mode_from_name};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// AI provider credential (otherwise read from the environment)
    #[arg(long = "api-key", value_name = "KEY", global = true)]
    pub api_key: Option<String>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: aitodo add "Buy milk" --due 2024-03-01 --priority low --tags groceries
    Add {
        title: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
        /// High, Medium or Low
        #[arg(long, default_value = "Medium")]
        priority: String,
        /// Comma separated tags
        #[arg(long, default_value = "")]
        tags: String,
    },
    /// Describe a task and let AI fill in the fields
    ///
    /// Example: aitodo ai-add "Draft report by Friday, high priority, tag: project"
    AiAdd {
        description: Option<String>,
    },
    /// List tasks
    ///
    /// Example: aitodo list --open --priority high --tag work
    List {
        /// Hide completed tasks
        #[arg(long)]
        open: bool,
        /// Only these priorities (repeatable or comma separated)
        #[arg(long, value_delimiter = ',')]
        priority: Vec<String>,
        /// Only tasks carrying this exact tag
        #[arg(long)]
        tag: Option<String>,
        /// Apply the other filters together with --tag
        #[arg(long)]
        strict_tags: bool,
    },
    /// Show details of a task
    ///
    /// Example: aitodo show 1f2e
    Show {
        id: String,
    },
    /// Mark a task as done
    ///
    /// Example: aitodo done 1f2e
    /// Example: aitodo done 1f2e --undo
    Done {
        id: String,
        #[arg(long)]
        undo: bool,
    },
    /// Edit a task's fields
    ///
    /// Example: aitodo edit 1f2e --title "Buy oat milk" --priority high
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        #[arg(long)]
        clear_due: bool,
        #[arg(long)]
        priority: Option<String>,
        /// Comma separated tags, replacing the current ones
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete a task
    ///
    /// Example: aitodo delete 1f2e
    Delete {
        id: String,
    },
    /// Manage a task's subtasks
    Subtask {
        #[command(subcommand)]
        subtask: SubtaskCommand,
    },
    /// Let AI split a task into subtasks
    ///
    /// Example: aitodo breakdown 1f2e
    Breakdown {
        id: String,
    },
    /// Let AI reassign priorities across all tasks
    Prioritize,
    /// Mark every task as done
    DoneAll,
    /// Show AI and storage status
    Status,
}

#[derive(Subcommand, Debug)]
pub enum SubtaskCommand {
    /// Example: aitodo subtask add 1f2e "Call the bank"
    Add { task_id: String, title: String },
    /// Example: aitodo subtask done 1f2e 9ab0
    Done {
        task_id: String,
        subtask_id: String,
        #[arg(long)]
        undo: bool,
    },
    /// Example: aitodo subtask rename 1f2e 9ab0 "Call the bank before noon"
    Rename {
        task_id: String,
        subtask_id: String,
        title: String,
    },
    /// Example: aitodo subtask remove 1f2e 9ab0
    Remove { task_id: String, subtask_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    StorePath,
    TagFilter,
    Provider,
    Model,
    BaseUrl,
    TimeoutSecs,
    ApiKeyEnv,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let (field, remainder) = key_raw
        .split_once('.')
        .map(|(field, rest)| (field.trim(), Some(rest.trim())))
        .unwrap_or((key_raw.trim(), None));

    let canonical_field =
        canonical_name(field).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match (canonical_field.as_str(), remainder) {
        ("store_path", None) => ConfigOverrideTarget::StorePath,
        ("tag_filter", None) => ConfigOverrideTarget::TagFilter,
        ("ai", Some(sub)) => match canonical_name(sub).as_deref() {
            Some("provider") => ConfigOverrideTarget::Provider,
            Some("model") => ConfigOverrideTarget::Model,
            Some("base_url") => ConfigOverrideTarget::BaseUrl,
            Some("timeout_secs") | Some("timeout") => ConfigOverrideTarget::TimeoutSecs,
            Some("api_key_env") => ConfigOverrideTarget::ApiKeyEnv,
            Some(other) => return Err(format!("unknown ai field '{other}'")),
            None => return Err("ai override requires a field name".to_string()),
        },
        ("ai", None) => return Err("ai override requires a field name".to_string()),
        (other, Some(_)) if other == "store_path" || other == "tag_filter" => {
            return Err(format!("{other} override cannot have subfields"));
        }
        (other, _) => return Err(format!("unknown config field '{other}'")),
    };

    Ok(ParsedConfigOverride { target, value })
}

/// Fold every `--config-override` argument into one set of overrides.
pub fn collect_config_overrides(raw: &[String]) -> Result<ConfigOverrides, String> {
    let mut overrides = ConfigOverrides::default();

    for entry in raw {
        let parsed = parse_config_override(entry)?;
        let value = parsed.value;
        match parsed.target {
            ConfigOverrideTarget::StorePath => overrides.store_path = Some(PathBuf::from(value)),
            ConfigOverrideTarget::TagFilter => {
                overrides.tag_filter = Some(
                    tag_filter_mode_from_name(&value)
                        .ok_or_else(|| format!("unknown tag filter mode '{value}'"))?,
                );
            }
            ConfigOverrideTarget::Provider => {
                overrides.provider = Some(
                    ProviderKind::from_name(&value)
                        .ok_or_else(|| format!("unknown AI provider '{value}'"))?,
                );
            }
            ConfigOverrideTarget::Model => overrides.model = Some(value),
            ConfigOverrideTarget::BaseUrl => overrides.base_url = Some(value),
            ConfigOverrideTarget::TimeoutSecs => {
                overrides.timeout_secs = Some(
                    value
                        .parse()
                        .map_err(|_| format!("timeout must be a whole number of seconds (got '{value}')"))?,
                );
            }
            ConfigOverrideTarget::ApiKeyEnv => overrides.api_key_env = Some(value),
        }
    }

    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::{ConfigOverrideTarget, collect_config_overrides, parse_config_override};
    use aitodo_core::config::ProviderKind;
    use aitodo_core::filter::TagFilterMode;

    #[test]
    fn parse_config_override_canonicalizes_field_names() {
        let parsed = parse_config_override(" Tag-Filter = all ").unwrap();

        assert_eq!(parsed.target, ConfigOverrideTarget::TagFilter);
        assert_eq!(parsed.value, "all");
    }

    #[test]
    fn parse_config_override_reads_ai_subfields() {
        let parsed = parse_config_override("ai. Base-URL = http://localhost:8080").unwrap();

        assert_eq!(parsed.target, ConfigOverrideTarget::BaseUrl);
        assert_eq!(parsed.value, "http://localhost:8080");
    }

    #[test]
    fn parse_config_override_rejects_empty_ai_field() {
        let err = parse_config_override("ai. = gemini").unwrap_err();
        assert!(err.contains("ai override requires a field name"));
    }

    #[test]
    fn parse_config_override_rejects_unknown_fields() {
        let err = parse_config_override("unknown.field=value").unwrap_err();
        assert!(err.contains("unknown config field"));
        let err = parse_config_override("ai.temperature=1").unwrap_err();
        assert!(err.contains("unknown ai field"));
    }

    #[test]
    fn parse_config_override_rejects_missing_equals() {
        let err = parse_config_override("store_path").unwrap_err();
        assert!(err.contains("KEY=VALUE"));
    }

    #[test]
    fn collect_config_overrides_parses_values() {
        let overrides = collect_config_overrides(&[
            "ai.provider=Claude".to_string(),
            "ai.timeout_secs=5".to_string(),
            "tag_filter=strict".to_string(),
        ])
        .unwrap();

        assert_eq!(overrides.provider, Some(ProviderKind::Anthropic));
        assert_eq!(overrides.timeout_secs, Some(5));
        assert_eq!(overrides.tag_filter, Some(TagFilterMode::All));
    }

    #[test]
    fn collect_config_overrides_rejects_bad_values() {
        let err = collect_config_overrides(&["ai.timeout=soon".to_string()]).unwrap_err();
        assert!(err.contains("timeout must be"));
        let err = collect_config_overrides(&["ai.provider=llama".to_string()]).unwrap_err();
        assert!(err.contains("unknown AI provider"));
    }
}
