use std::path::{Path, PathBuf};

use super::args::ArgumentTransformer;

/// Jest flag that disables worker processes; the debugger can only attach to one.
pub const RUN_IN_BAND: &str = "--runInBand";
pub const TEST_NAME_PATTERN: &str = "--testNamePattern";

/// Everything needed to build one command line. Built fresh per invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRequest {
    pub raw_flags: Vec<String>,
    pub file_path: Option<PathBuf>,
    pub test_name_pattern: Option<String>,
    pub use_debugger: bool,
    pub force_edit: bool,
}

/// A built command. `rendered` is what gets edited, stored and executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub executable: String,
    pub argv: Vec<String>,
    pub rendered: String,
}

impl CommandLine {
    pub fn new(executable: &str, argv: Vec<String>) -> Self {
        let rendered = std::iter::once(executable)
            .chain(argv.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        Self { executable: executable.to_string(), argv, rendered }
    }

    /// The same command after the user edited its text. `argv` is kept as
    /// built; it is never reconstructed from the edited string.
    pub fn with_rendered(mut self, rendered: impl Into<String>) -> Self {
        self.rendered = rendered.into();
        self
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// The two runner invocations a project can be configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executables {
    pub standard: String,
    pub debug: String,
}

impl Executables {
    pub fn from_settings(settings: &crate::config::JestrunSettings) -> Self {
        Self {
            standard: settings.executable.clone(),
            debug: settings.debug_executable.clone(),
        }
    }
}

pub struct CommandBuilder<'a> {
    project_root: &'a Path,
    executables: &'a Executables,
    transformer: &'a ArgumentTransformer,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(
        project_root: &'a Path,
        executables: &'a Executables,
        transformer: &'a ArgumentTransformer,
    ) -> Self {
        Self { project_root, executables, transformer }
    }

    /// Argv layout: flags, `--runInBand`, file, `--testNamePattern <pattern>`.
    ///
    /// The file and the pattern are each one shell word in `rendered`:
    /// single-quoted when they hold anything the shell would split or expand,
    /// bare otherwise (`src/a.test.js`, `'Outer inner works'`).
    pub fn build(&self, request: &RunRequest) -> CommandLine {
        let mut argv = self.transformer.transform(&request.raw_flags);

        if request.use_debugger {
            argv.push(RUN_IN_BAND.to_string());
        }

        if let Some(file) = &request.file_path {
            let relative = self.relative_to_root(file);
            argv.push(shell_words::quote(&relative.to_string_lossy()).into_owned());
        }

        if let Some(pattern) = &request.test_name_pattern {
            argv.push(TEST_NAME_PATTERN.to_string());
            argv.push(shell_words::quote(pattern).into_owned());
        }

        let executable = if request.use_debugger {
            &self.executables.debug
        } else {
            &self.executables.standard
        };
        let command = CommandLine::new(executable, argv);
        tracing::debug!("Built command: {}", command.rendered);
        command
    }

    /// Absolute paths are made relative to the project root, which is where
    /// the runner executes, regardless of the caller's working directory.
    fn relative_to_root(&self, file: &Path) -> PathBuf {
        if !file.is_absolute() {
            return file.to_path_buf();
        }
        pathdiff::diff_paths(file, self.project_root).unwrap_or_else(|| file.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executables() -> Executables {
        Executables {
            standard: crate::config::DEFAULT_EXECUTABLE.to_string(),
            debug: crate::config::DEFAULT_DEBUG_EXECUTABLE.to_string(),
        }
    }

    fn build(root: &str, request: &RunRequest) -> CommandLine {
        let exes = executables();
        let transformer = ArgumentTransformer::default();
        CommandBuilder::new(Path::new(root), &exes, &transformer).build(request)
    }

    #[test]
    fn test_file_and_pattern() {
        let cmd = build("/proj", &RunRequest {
            file_path: Some(PathBuf::from("/proj/src/a.test.js")),
            test_name_pattern: Some("Outer inner works".to_string()),
            ..Default::default()
        });
        assert_eq!(
            cmd.rendered,
            "npx --no-install jest --colors=false src/a.test.js --testNamePattern 'Outer inner works'"
        );
        assert_eq!(cmd.executable, "npx --no-install jest");
        assert_eq!(cmd.argv.last().map(String::as_str), Some("'Outer inner works'"));

        let words = shell_words::split(&cmd.rendered).unwrap();
        assert!(words.ends_with(&[
            "src/a.test.js".to_string(),
            "--testNamePattern".to_string(),
            "Outer inner works".to_string(),
        ]));
    }

    #[test]
    fn test_debugger_runs_in_band() {
        let cmd = build("/proj", &RunRequest {
            file_path: Some(PathBuf::from("/proj/a.test.ts")),
            use_debugger: true,
            ..Default::default()
        });
        assert!(cmd.rendered.starts_with("npx --node-options=--inspect-brk --no-install jest "));
        assert_eq!(cmd.argv, vec!["--colors=false", "--runInBand", "a.test.ts"]);
    }

    #[test]
    fn test_project_run_has_no_file() {
        let cmd = build("/proj", &RunRequest {
            raw_flags: vec!["--colors".to_string(), "--ci".to_string()],
            ..Default::default()
        });
        assert_eq!(cmd.rendered, "npx --no-install jest --colors=true --ci");
    }

    #[test]
    fn test_path_with_spaces_is_quoted() {
        let cmd = build("/proj", &RunRequest {
            file_path: Some(PathBuf::from("/proj/my tests/a.test.js")),
            ..Default::default()
        });
        assert_eq!(cmd.argv.last().map(String::as_str), Some("'my tests/a.test.js'"));
    }

    #[test]
    fn test_file_outside_root() {
        let cmd = build("/proj/app", &RunRequest {
            file_path: Some(PathBuf::from("/proj/lib/b.test.js")),
            ..Default::default()
        });
        assert_eq!(cmd.argv.last().map(String::as_str), Some("../lib/b.test.js"));
    }

    #[test]
    fn test_relative_file_kept() {
        let cmd = build("/proj", &RunRequest {
            file_path: Some(PathBuf::from("src/a.test.js")),
            ..Default::default()
        });
        assert_eq!(cmd.argv.last().map(String::as_str), Some("src/a.test.js"));
    }

    #[test]
    fn test_edited_command_keeps_argv() {
        let cmd = build("/proj", &RunRequest::default());
        let argv = cmd.argv.clone();
        let edited = cmd.with_rendered("yarn jest --watch");
        assert_eq!(edited.rendered, "yarn jest --watch");
        assert_eq!(edited.argv, argv);
        assert_eq!(edited.to_string(), "yarn jest --watch");
    }
}
