use crate::error::AppError;
use crate::model::Task;
use std::path::{Path, PathBuf};

const STORE_FILE_NAME: &str = "tasks.json";
pub const STORE_ENV_VAR: &str = "AITODO_STORE_PATH";

/// The `AITODO_STORE_PATH` override, when set to something non-blank.
pub fn store_path_from_env() -> Option<PathBuf> {
    std::env::var(STORE_ENV_VAR)
        .ok()
        .filter(|path| !path.trim().is_empty())
        .map(PathBuf::from)
}

pub fn store_path() -> Result<PathBuf, AppError> {
    if let Some(path) = store_path_from_env() {
        return Ok(path);
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("aitodo").join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("aitodo")
            .join(STORE_FILE_NAME))
    }
}

/// Read the task array at `path`. A missing file is an empty list.
pub fn read_tasks(path: &Path) -> Result<Vec<Task>, AppError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let mut tasks: Vec<Task> = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    tasks.iter_mut().for_each(Task::fill_subtask_ids);
    tracing::debug!(path = %path.display(), count = tasks.len(), "read task store");
    Ok(tasks)
}

/// Overwrite `path` with the full task list.
pub fn write_tasks(path: &Path, tasks: &[Task]) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let content =
        serde_json::to_string_pretty(tasks).map_err(|err| AppError::invalid_data(err.to_string()))?;
    std::fs::write(path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions).map_err(|err| AppError::io(err.to_string()))?;
    }

    tracing::debug!(path = %path.display(), count = tasks.len(), "wrote task store");
    Ok(())
}
