/// Rendered commands, most recent first, each listed once.
/// Lives as long as the process; nothing is written to disk.
#[derive(Debug, Clone, Default)]
pub struct RunHistory {
    entries: Vec<String>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `command`, moving an earlier identical entry to the front.
    pub fn record(&mut self, command: &str) {
        self.entries.retain(|e| e != command);
        self.entries.insert(0, command.to_string());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
