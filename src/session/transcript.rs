use std::path::Path;
use regex::Regex;

/// Jest's closing summary. Its presence means a finished run is on screen.
fn banner_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^Test Suites:.*\n^Tests:.*\n^Snapshots:.*\n^Time:.*")
            .expect("banner pattern is valid")
    })
}

/// First output of a run, as Jest prints it in watch mode: an optional
/// screen clear, then a suite status line or the discovery message.
fn run_start_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:\x1b\[[0-9;?]*[A-Za-z]|\x1bc|\s)*(?:RUNS|PASS|FAIL|Determining test suites)\b")
            .expect("run start pattern is valid")
    })
}

/// Accumulated output of one session.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    text: String,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: &str) {
        self.text.push_str(chunk);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Two header lines naming the directory and the command, then a blank line.
    pub fn write_header(&mut self, directory: &Path, command: &str) {
        self.text.push_str(&format!("cwd: {}\ncmd: {}\n\n", directory.display(), command));
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// True when a completed run's summary banner is still on screen.
    pub fn shows_completed_run(&self) -> bool {
        banner_pattern().is_match(&self.text)
    }

    /// True when `chunk` opens a new run while an earlier run's summary is
    /// still shown. Trailing lines of the finished run (`Ran all test
    /// suites.`, watch usage) do not count.
    pub fn is_stale_before(&self, chunk: &str) -> bool {
        run_start_pattern().is_match(chunk) && self.shows_completed_run()
    }
}
