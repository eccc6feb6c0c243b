use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_EXECUTABLE: &str = "npx --no-install jest";
pub const DEFAULT_DEBUG_EXECUTABLE: &str = "npx --node-options=--inspect-brk --no-install jest";

/// All configurable settings with their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct JestrunSettings {
    pub executable: String,
    pub debug_executable: String,
    /// Offer every command for editing before it runs.
    pub confirm_before_run: bool,
    pub kill_without_asking: bool,
    pub project_name_in_session_name: bool,
    /// Also clear when a long-lived process (`jest --watch`) starts another
    /// run after printing a summary. Off: only a launch clears.
    pub clear_on_banner: bool,
}

impl Default for JestrunSettings {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            debug_executable: DEFAULT_DEBUG_EXECUTABLE.to_string(),
            confirm_before_run: false,
            kill_without_asking: false,
            project_name_in_session_name: false,
            clear_on_banner: false,
        }
    }
}

/// Raw JSON representation. All fields optional for partial overrides.
#[derive(Debug, Deserialize, Default)]
struct SettingsFile {
    #[serde(rename = "runner.executable")]
    executable: Option<String>,
    #[serde(rename = "runner.debugExecutable")]
    debug_executable: Option<String>,
    #[serde(rename = "run.confirm")]
    confirm_before_run: Option<bool>,
    #[serde(rename = "session.killWithoutAsking")]
    kill_without_asking: Option<bool>,
    #[serde(rename = "session.projectNameInName")]
    project_name_in_session_name: Option<bool>,
    #[serde(rename = "session.clearOnBanner")]
    clear_on_banner: Option<bool>,
}

/// Resolve settings: defaults → user global → project-local.
pub fn resolve(project_root: Option<&Path>) -> JestrunSettings {
    let global_path = dirs::home_dir()
        .map(|h| h.join(".jestrun/settings.json"));
    let project_path = project_root
        .map(|r| r.join(".jestrun/settings.json"));
    resolve_with_paths(
        global_path.as_deref(),
        project_path.as_deref(),
    )
}

/// Testable resolver that accepts explicit file paths (no home dir dependency).
fn resolve_with_paths(
    global_path: Option<&Path>,
    project_path: Option<&Path>,
) -> JestrunSettings {
    let mut settings = JestrunSettings::default();

    if let Some(path) = global_path {
        apply_file(&mut settings, path);
    }
    if let Some(path) = project_path {
        apply_file(&mut settings, path);
    }

    settings
}

fn apply_file(settings: &mut JestrunSettings, path: &Path) {
    let Ok(content) = std::fs::read_to_string(path) else { return };
    let Ok(file) = serde_json::from_str::<SettingsFile>(&content) else {
        tracing::warn!("Invalid settings file, ignoring: {}", path.display());
        return;
    };
    if let Some(v) = file.executable {
        apply_executable(&mut settings.executable, v, "runner.executable");
    }
    if let Some(v) = file.debug_executable {
        apply_executable(&mut settings.debug_executable, v, "runner.debugExecutable");
    }
    if let Some(v) = file.confirm_before_run {
        settings.confirm_before_run = v;
    }
    if let Some(v) = file.kill_without_asking {
        settings.kill_without_asking = v;
    }
    if let Some(v) = file.project_name_in_session_name {
        settings.project_name_in_session_name = v;
    }
    if let Some(v) = file.clear_on_banner {
        settings.clear_on_banner = v;
    }
}

fn apply_executable(slot: &mut String, value: String, key: &str) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        tracing::warn!("{} is empty, keeping '{}'", key, slot);
    } else {
        *slot = trimmed.to_string();
    }
}
