use aitodo_cli::cli::{Cli, Command, SubtaskCommand, collect_config_overrides};
use aitodo_core::config::{load_config_with_fallback, merge_overrides};
use aitodo_core::error::AppError;
use aitodo_core::filter::{TagFilterMode, TaskFilter, filter};
use aitodo_core::model::{Priority, Task, TaskDraft, TaskPatch, parse_due, split_tags};
use aitodo_core::{Gateway, TaskRepository};
use clap::{CommandFactory, Parser};
use std::io::{self, BufRead};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use time::Date;
use tracing_subscriber::EnvFilter;

const SHORT_ID_LEN: usize = 8;

/// One repository and one gateway for the life of the process.
struct Session {
    repo: TaskRepository,
    gateway: Gateway,
    tag_mode: TagFilterMode,
}

impl Session {
    fn open(api_key: Option<&str>, raw_overrides: &[String]) -> Result<Self, AppError> {
        let loaded = load_config_with_fallback();
        if let Some(err) = loaded.error.as_ref() {
            tracing::warn!(error = %err, "config unavailable, using defaults");
        }

        let overrides = collect_config_overrides(raw_overrides).map_err(AppError::invalid_input)?;
        let config = merge_overrides(&loaded.config, &overrides);
        let api_key = config.ai.resolve_api_key(api_key);

        Ok(Self {
            repo: TaskRepository::new(config.store_path()?),
            gateway: Gateway::from_config(&config.ai, api_key.as_deref()),
            tag_mode: config.tag_filter,
        })
    }
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Done")]
    done: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Tags")]
    tags: String,
    #[tabled(rename = "Subtasks")]
    subtasks: String,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        let finished = task.subtasks.iter().filter(|subtask| subtask.done).count();
        Self {
            id: short_id(&task.id).to_string(),
            done: checkbox(task.done).to_string(),
            title: task.title.clone(),
            priority: task.priority.to_string(),
            due: due_label(task.due),
            tags: tags_label(&task.tags),
            subtasks: if task.subtasks.is_empty() {
                "-".to_string()
            } else {
                format!("{finished}/{}", task.subtasks.len())
            },
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LEN).unwrap_or(id)
}

fn checkbox(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

fn due_label(due: Option<Date>) -> String {
    due.map(|date| date.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn tags_label(tags: &[String]) -> String {
    if tags.is_empty() {
        "-".to_string()
    } else {
        tags.join(", ")
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|err| AppError::invalid_data(err.to_string()))
}

fn print_tasks_table(tasks: &[Task], total: usize) {
    println!("Tasks ({}/{})", tasks.len(), total);
    if tasks.is_empty() {
        println!("No tasks to show.");
        return;
    }

    let rows: Vec<TaskRow> = tasks.iter().map(TaskRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{table}");
}

fn print_task_details(task: &Task) {
    println!("{} {} ({})", checkbox(task.done), task.title, task.id);
    println!("  priority: {}", task.priority);
    println!("  due: {}", due_label(task.due));
    println!("  tags: {}", tags_label(&task.tags));
    println!("  created: {}", task.created_at);
    if task.subtasks.is_empty() {
        println!("  subtasks: -");
        return;
    }
    println!("  subtasks:");
    for subtask in &task.subtasks {
        println!(
            "    {} {} ({})",
            checkbox(subtask.done),
            subtask.title,
            short_id(&subtask.id)
        );
    }
}

fn print_task(task: &Task, json: bool, verb: &str) -> Result<(), AppError> {
    if json {
        println!("{}", to_json(task)?);
    } else {
        println!("{verb} task: {} ({})", task.title, short_id(&task.id));
    }
    Ok(())
}

/// Lenient due-date input: anything that is not `YYYY-MM-DD` means no date.
fn due_input(raw: Option<&str>) -> Option<Date> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    let parsed = parse_due(raw);
    if parsed.is_none() {
        eprintln!("WARNING: ignoring invalid due date '{raw}' (expected YYYY-MM-DD)");
    }
    parsed
}

/// Full id of the task `id` names, exactly or by unique prefix.
fn resolve_task_id(tasks: &[Task], id: &str) -> Result<Option<String>, AppError> {
    let id = id.trim();
    if id.is_empty() {
        return Ok(None);
    }
    if let Some(task) = tasks.iter().find(|task| task.id == id) {
        return Ok(Some(task.id.clone()));
    }

    let mut matches = tasks.iter().filter(|task| task.id.starts_with(id));
    match (matches.next(), matches.next()) {
        (Some(task), None) => Ok(Some(task.id.clone())),
        (Some(_), Some(_)) => Err(AppError::invalid_input(format!(
            "task id '{id}' is ambiguous"
        ))),
        (None, _) => Ok(None),
    }
}

fn required_text(value: Option<String>, what: &str) -> Result<String, AppError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::invalid_input(format!("{what} is required"))),
    }
}

fn warn_ai_disabled(action: &str) {
    eprintln!(
        "WARNING: AI features are disabled; {action} needs an API key \
         (--api-key, AITODO_API_KEY or the provider's key variable)"
    );
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        match ch {
            '\\' if in_quotes => escape = true,
            '"' => in_quotes = !in_quotes,
            ch if ch.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            ch => current.push(ch),
        }
    }

    if in_quotes {
        return Err(AppError::invalid_input("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

fn run_subtask_command(
    session: &mut Session,
    command: SubtaskCommand,
    json: bool,
) -> Result<(), AppError> {
    let repo = &mut session.repo;
    let (subtask, verb) = match command {
        SubtaskCommand::Add { task_id, title } => (repo.add_subtask(&task_id, &title)?, "Added"),
        SubtaskCommand::Done {
            task_id,
            subtask_id,
            undo,
        } => {
            let verb = if undo { "Reopened" } else { "Completed" };
            (repo.set_subtask_done(&task_id, &subtask_id, !undo)?, verb)
        }
        SubtaskCommand::Rename {
            task_id,
            subtask_id,
            title,
        } => (repo.rename_subtask(&task_id, &subtask_id, &title)?, "Renamed"),
        SubtaskCommand::Remove {
            task_id,
            subtask_id,
        } => (repo.remove_subtask(&task_id, &subtask_id)?, "Removed"),
    };
    repo.flush();

    if json {
        println!("{}", to_json(&subtask)?);
    } else {
        println!("{verb} subtask: {} ({})", subtask.title, short_id(&subtask.id));
    }
    Ok(())
}

fn run_command(session: &mut Session, cli: Cli) -> Result<(), AppError> {
    let json = cli.json;

    match cli.command {
        Command::Add {
            title,
            due,
            priority,
            tags,
        } => {
            let title = required_text(title, "title")?;
            let task = session.repo.create(TaskDraft {
                title,
                due: due_input(due.as_deref()),
                priority,
                tags: split_tags(&tags),
            })?;
            session.repo.flush();
            print_task(&task, json, "Added")?;
        }
        Command::AiAdd { description } => {
            let description = required_text(description, "description")?;
            let parsed = session.gateway.parse_task(&description);
            let task = session.repo.create(TaskDraft {
                title: parsed.title,
                due: parsed.due,
                priority: parsed.priority.to_string(),
                tags: parsed.tags,
            })?;
            session.repo.flush();
            print_task(&task, json, "Added")?;
        }
        Command::List {
            open,
            priority,
            tag,
            strict_tags,
        } => {
            let priorities = priority
                .iter()
                .map(|value| value.parse::<Priority>())
                .collect::<Result<Vec<_>, _>>()?;
            let criteria = TaskFilter {
                open_only: open,
                priorities,
                tag,
                tag_mode: if strict_tags {
                    TagFilterMode::All
                } else {
                    session.tag_mode
                },
            };

            let tasks = session.repo.load();
            let shown = filter(tasks, &criteria);
            if json {
                println!("{}", to_json(&shown)?);
            } else {
                print_tasks_table(&shown, tasks.len());
            }
        }
        Command::Show { id } => {
            let task = session.repo.get(&id)?;
            if json {
                println!("{}", to_json(&task)?);
            } else {
                print_task_details(&task);
            }
        }
        Command::Done { id, undo } => {
            let current = session.repo.get(&id)?;
            let task = if current.done == undo {
                session.repo.toggle_done(&id)?
            } else {
                current
            };
            session.repo.flush();
            print_task(&task, json, if undo { "Reopened" } else { "Completed" })?;
        }
        Command::Edit {
            id,
            title,
            due,
            clear_due,
            priority,
            tags,
        } => {
            let due = if clear_due {
                Some(None)
            } else {
                due.as_deref().map(|raw| due_input(Some(raw)))
            };
            let patch = TaskPatch {
                title,
                done: None,
                due,
                priority: priority
                    .as_deref()
                    .map(|raw| raw.parse::<Priority>())
                    .transpose()?,
                tags: tags.as_deref().map(split_tags),
            };
            let task = session.repo.update(&id, patch)?;
            session.repo.flush();
            print_task(&task, json, "Updated")?;
        }
        Command::Delete { id } => {
            let removed = match resolve_task_id(session.repo.load(), &id)? {
                Some(full_id) => session.repo.delete(&full_id),
                None => None,
            };
            let Some(task) = removed else {
                if json {
                    println!("null");
                } else {
                    println!("No task matches '{id}'; nothing deleted.");
                }
                return Ok(());
            };
            session.repo.flush();
            print_task(&task, json, "Deleted")?;
        }
        Command::Subtask { subtask } => run_subtask_command(session, subtask, json)?,
        Command::Breakdown { id } => {
            let task = session.repo.get(&id)?;
            if !session.gateway.is_enabled() {
                warn_ai_disabled("breakdown");
                return Ok(());
            }

            let titles = session.gateway.breakdown_task(&task.title);
            let added = session.repo.add_subtasks(&task.id, titles)?;
            session.repo.flush();
            if json {
                println!("{}", to_json(&added)?);
            } else {
                println!("Added {} AI-generated subtasks to: {}", added.len(), task.title);
                for subtask in &added {
                    println!("  {} {}", checkbox(subtask.done), subtask.title);
                }
            }
        }
        Command::Prioritize => {
            if !session.gateway.is_enabled() {
                warn_ai_disabled("prioritize");
                return Ok(());
            }

            let current = session.repo.load().to_vec();
            let updated = session.gateway.reprioritize(current);
            session.repo.save(updated);
            let tasks = session.repo.load();
            if json {
                println!("{}", to_json(tasks)?);
            } else {
                println!("Priorities updated where possible.");
                print_tasks_table(tasks, tasks.len());
            }
        }
        Command::DoneAll => {
            let changed = session.repo.mark_all_done();
            session.repo.flush();
            if json {
                println!("{}", serde_json::json!({ "completed": changed }));
            } else {
                println!("Marked {changed} tasks as done.");
            }
        }
        Command::Status => {
            let provider = session.gateway.provider_name();
            let path = session.repo.path().display().to_string();
            if json {
                let payload = serde_json::json!({
                    "ai_enabled": session.gateway.is_enabled(),
                    "provider": provider,
                    "store_path": path,
                });
                println!("{payload}");
            } else {
                match provider {
                    Some(name) => println!("AI: enabled ({name})"),
                    None => println!("AI: disabled"),
                }
                println!("Store: {path}");
            }
        }
    }

    Ok(())
}

fn run_interactive(session: &mut Session) -> Result<(), AppError> {
    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock
            .read_line(&mut input)
            .map_err(|err| AppError::io(err.to_string()))?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("aitodo".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if cli.api_key.is_some() || !cli.config_override.is_empty() {
            eprintln!("WARNING: --api-key and --config-override only apply at startup");
        }

        if let Err(err) = run_command(session, cli) {
            eprintln!("ERROR: {}", err);
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        let result = Session::open(None, &[]).and_then(|mut session| run_interactive(&mut session));
        if let Err(err) = result {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            use clap::error::ErrorKind;
            if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
                err.exit();
            }
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    let mut session = match Session::open(cli.api_key.as_deref(), &cli.config_override) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(&mut session, cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
