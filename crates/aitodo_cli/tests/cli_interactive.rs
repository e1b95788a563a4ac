use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("aitodo-{nanos}-{file_name}"))
}

fn run_interactive(input: &str) -> std::process::Output {
    let exe = env!("CARGO_BIN_EXE_aitodo");
    let store_path = temp_path("cli-interactive.json");

    let mut child = Command::new(exe)
        .env("AITODO_STORE_PATH", &store_path)
        .env("AITODO_CONFIG_PATH", store_path.with_extension("config.json"))
        .env_remove("AITODO_API_KEY")
        .env_remove("GEMINI_API_KEY")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn interactive session");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        stdin
            .write_all(input.as_bytes())
            .expect("failed to write to stdin");
    }

    let output = child
        .wait_with_output()
        .expect("failed to read interactive output");

    std::fs::remove_file(&store_path).ok();
    output
}

#[test]
fn interactive_help_shows_usage() {
    let output = run_interactive("help\nexit\n");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"));
}

#[test]
fn interactive_invalid_command_keeps_session_alive() {
    let output = run_interactive("nope\nadd \"after error\"\nquit\n");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stderr.contains("ERROR: invalid_input"));
    assert!(stdout.contains("Added task: after error"));
}

#[test]
fn interactive_commands_share_one_task_list() {
    let output = run_interactive(
        "add \"Buy milk\" --tags groceries\nadd \"Write report\" --priority high\ndone-all\nlist\n",
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Marked 2 tasks as done."));
    assert!(stdout.contains("Tasks (2/2)"));
    assert!(stdout.contains("Write report"));
}

#[test]
fn interactive_unterminated_quote_is_reported() {
    let output = run_interactive("add \"never closed\nexit\n");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unterminated quote"));
}
