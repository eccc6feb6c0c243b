pub mod args;
pub mod command;
pub mod project;

use std::path::{Path, PathBuf};
use clap::{Args, Subcommand};

use crate::config::JestrunSettings;
use crate::locator::{self, Location, ParsedSource};
use crate::session::{Launch, SessionPolicy};
use args::ArgumentTransformer;
use command::{CommandBuilder, CommandLine, Executables, RunRequest};
use project::Project;

/// Jest flag that limits a run to the tests that failed last time.
pub const ONLY_FAILURES: &str = "--onlyFailures";

/// Options shared by every run action.
#[derive(Debug, Clone, Default, Args)]
pub struct RunOptions {
    /// Run under the debugger executable (implies --runInBand)
    #[arg(long)]
    pub debug: bool,

    /// Offer the command for editing before it runs
    #[arg(long)]
    pub edit: bool,

    /// Kill a running test process without asking
    #[arg(long)]
    pub force: bool,

    /// Extra runner flags (after --)
    #[arg(last = true)]
    pub flags: Vec<String>,
}

/// What to run.
#[derive(Debug, Clone, Subcommand)]
pub enum Action {
    /// Run every test in the project
    Project {
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Run all tests in a file
    File {
        file: PathBuf,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Run a test file, or the test file belonging to a source file
    Dwim {
        file: PathBuf,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Run the test enclosing FILE:LINE[:COL]
    Nearest {
        location: Location,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Re-run only the tests that failed in the previous run
    LastFailed {
        #[arg(default_value = ".")]
        dir: PathBuf,
        #[command(flatten)]
        options: RunOptions,
    },
}

impl Action {
    pub fn options(&self) -> &RunOptions {
        match self {
            Action::Project { options, .. }
            | Action::File { options, .. }
            | Action::Dwim { options, .. }
            | Action::Nearest { options, .. }
            | Action::LastFailed { options, .. } => options,
        }
    }

    /// File or directory the project is discovered from.
    fn anchor(&self) -> &Path {
        match self {
            Action::Project { dir, .. } | Action::LastFailed { dir, .. } => dir,
            Action::File { file, .. } | Action::Dwim { file, .. } => file,
            Action::Nearest { location, .. } => &location.file,
        }
    }
}

/// A resolved action, ready to hand to the session registry.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub project: Project,
    pub settings: JestrunSettings,
    pub request: RunRequest,
    pub command: CommandLine,
}

impl Prepared {
    /// Hand the prepared command to the session registry. `force` kills a
    /// running process without asking, on top of the settings.
    pub fn into_launch(self, current_session: Option<String>, force: bool) -> Launch {
        let mut policy = SessionPolicy::from_settings(&self.settings);
        policy.kill_without_asking |= force;
        Launch {
            project: self.project,
            current_session,
            command: self.command,
            flags: self.request.raw_flags,
            edit: self.request.force_edit,
            policy,
        }
    }
}

pub struct Runner {
    settings: Option<JestrunSettings>,
    transformer: ArgumentTransformer,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Settings are resolved per project from the settings files.
    pub fn new() -> Self {
        Self { settings: None, transformer: ArgumentTransformer::default() }
    }

    /// Use fixed settings for every project.
    pub fn with_settings(settings: JestrunSettings) -> Self {
        Self { settings: Some(settings), transformer: ArgumentTransformer::default() }
    }

    pub fn settings_for(&self, project: &Project) -> JestrunSettings {
        self.settings
            .clone()
            .unwrap_or_else(|| crate::config::resolve(Some(&project.root)))
    }

    /// Resolve `action` into a request and its command line. Relative paths
    /// are taken from `cwd`.
    pub fn prepare(&self, action: &Action, cwd: &Path) -> crate::Result<Prepared> {
        let anchor = absolute(cwd, action.anchor());
        let project = Project::discover(&anchor);
        let settings = self.settings_for(&project);
        let options = action.options();

        let mut request = RunRequest {
            raw_flags: options.flags.clone(),
            file_path: None,
            test_name_pattern: None,
            use_debugger: options.debug,
            force_edit: options.edit || settings.confirm_before_run,
        };

        match action {
            Action::Project { .. } => {}
            Action::LastFailed { .. } => {
                if !request.raw_flags.iter().any(|f| f == ONLY_FAILURES) {
                    request.raw_flags.push(ONLY_FAILURES.to_string());
                }
            }
            Action::File { .. } => {
                request.file_path = Some(anchor);
            }
            Action::Dwim { .. } => {
                let test_file = project::find_test_file(&project, &anchor)
                    .ok_or_else(|| crate::Error::NoTestFile(anchor.clone()))?;
                request.file_path = Some(test_file);
            }
            Action::Nearest { location, .. } => {
                request.test_name_pattern = nearest_pattern(&anchor, location)?;
                if request.test_name_pattern.is_none() {
                    tracing::info!("No test at {}:{}, running the whole file", anchor.display(), location.line);
                }
                request.file_path = Some(anchor);
            }
        }

        let executables = Executables::from_settings(&settings);
        let command = CommandBuilder::new(&project.root, &executables, &self.transformer)
            .build(&request);

        Ok(Prepared { project, settings, request, command })
    }
}

fn nearest_pattern(file: &Path, location: &Location) -> crate::Result<Option<String>> {
    let Some(source) = ParsedSource::read(file)? else {
        return Ok(None);
    };
    Ok(location
        .char_offset(source.text())
        .and_then(|offset| locator::nearest_test_name(&source, offset)))
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        let joined = cwd.join(path);
        // Keep `.` out of rendered paths
        joined.components().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CALC_TEST: &str = r#"const { add } = require("./calc");

describe("Calculator", () => {
  it("adds", () => {
    expect(add(1, 2)).toBe(3);
  });
});
"#;

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"name": "calc"}"#).unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/calc.js"), "exports.add = (a, b) => a + b;\n").unwrap();
        std::fs::write(dir.path().join("src/calc.test.js"), CALC_TEST).unwrap();
        dir
    }

    fn runner() -> Runner {
        Runner::with_settings(JestrunSettings::default())
    }

    #[test]
    fn test_nearest_builds_pattern() {
        let dir = fixture();
        let action = Action::Nearest {
            location: "src/calc.test.js:5:5".parse().unwrap(),
            options: RunOptions::default(),
        };
        let prepared = runner().prepare(&action, dir.path()).unwrap();
        assert_eq!(prepared.project.display_name, "calc");
        assert_eq!(prepared.request.test_name_pattern.as_deref(), Some("Calculator adds"));
        assert_eq!(
            prepared.command.rendered,
            "npx --no-install jest --colors=false src/calc.test.js --testNamePattern 'Calculator adds'"
        );
    }

    #[test]
    fn test_nearest_outside_tests_runs_file() {
        let dir = fixture();
        let action = Action::Nearest {
            location: "src/calc.test.js:1".parse().unwrap(),
            options: RunOptions::default(),
        };
        let prepared = runner().prepare(&action, dir.path()).unwrap();
        assert_eq!(prepared.request.test_name_pattern, None);
        assert!(prepared.command.rendered.ends_with(" src/calc.test.js"));
    }

    #[test]
    fn test_dwim_maps_source_to_test() {
        let dir = fixture();
        let action = Action::Dwim { file: "src/calc.js".into(), options: RunOptions::default() };
        let prepared = runner().prepare(&action, dir.path()).unwrap();
        assert_eq!(prepared.request.file_path, Some(dir.path().join("src/calc.test.js")));
    }

    #[test]
    fn test_dwim_without_test_file() {
        let dir = fixture();
        std::fs::write(dir.path().join("src/other.js"), "").unwrap();
        let action = Action::Dwim { file: "src/other.js".into(), options: RunOptions::default() };
        let err = runner().prepare(&action, dir.path()).unwrap_err();
        assert!(matches!(err, crate::Error::NoTestFile(_)));
    }

    #[test]
    fn test_last_failed_adds_only_failures_once() {
        let dir = fixture();
        let action = Action::LastFailed {
            dir: ".".into(),
            options: RunOptions { flags: vec![ONLY_FAILURES.to_string()], ..Default::default() },
        };
        let prepared = runner().prepare(&action, dir.path()).unwrap();
        assert_eq!(prepared.command.rendered, "npx --no-install jest --onlyFailures --colors=false");
    }

    #[test]
    fn test_debug_and_edit_options() {
        let dir = fixture();
        let action = Action::File {
            file: "src/calc.test.js".into(),
            options: RunOptions { debug: true, edit: true, ..Default::default() },
        };
        let prepared = runner().prepare(&action, dir.path()).unwrap();
        assert!(prepared.request.force_edit);
        assert!(prepared.command.rendered.contains("--inspect-brk"));
        assert!(prepared.command.rendered.ends_with("--runInBand src/calc.test.js"));
    }

    #[test]
    fn test_confirm_setting_forces_edit() {
        let dir = fixture();
        let settings = JestrunSettings { confirm_before_run: true, ..Default::default() };
        let action = Action::Project { dir: ".".into(), options: RunOptions::default() };
        let prepared = Runner::with_settings(settings).prepare(&action, dir.path()).unwrap();
        assert!(prepared.request.force_edit);
        assert_eq!(prepared.request.file_path, None);
    }

    #[test]
    fn test_into_launch_carries_flags_and_force() {
        let dir = fixture();
        let settings = JestrunSettings { project_name_in_session_name: true, ..Default::default() };
        let action = Action::Project {
            dir: ".".into(),
            options: RunOptions { flags: vec!["--ci".to_string()], ..Default::default() },
        };
        let prepared = Runner::with_settings(settings).prepare(&action, dir.path()).unwrap();
        let launch = prepared.into_launch(Some("*jest*".to_string()), true);
        assert_eq!(launch.flags, ["--ci"]);
        assert_eq!(launch.current_session.as_deref(), Some("*jest*"));
        assert!(launch.policy.kill_without_asking);
        assert!(launch.policy.project_name_in_session_name);
        assert!(!launch.edit);
    }
}
