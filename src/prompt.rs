use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, Lines};

/// The user-facing questions a launch may need answered.
///
/// Both calls suspend only the flow that asked. Session events keep
/// queueing while a prompt waits and are applied once it is answered.
#[allow(async_fn_in_trait)]
pub trait Prompter {
    /// Yes/no question. `false` aborts whatever asked.
    async fn confirm(&mut self, question: &str) -> bool;

    /// Offer `initial` for editing, with `history` for recall.
    /// `None` means the user declined.
    async fn edit(&mut self, initial: &str, history: &[String]) -> Option<String>;
}

/// Answers without asking: confirms with a fixed answer and accepts
/// commands unchanged. Used by one-shot `run`.
#[derive(Debug, Clone, Copy)]
pub struct AutoPrompter {
    pub confirm: bool,
}

impl Prompter for AutoPrompter {
    async fn confirm(&mut self, question: &str) -> bool {
        tracing::debug!("Auto-answering '{}' with {}", question, self.confirm);
        self.confirm
    }

    async fn edit(&mut self, initial: &str, _history: &[String]) -> Option<String> {
        Some(initial.to_string())
    }
}

/// How many history entries an edit prompt lists.
const HISTORY_SHOWN: usize = 10;

/// Prompts on a line-oriented terminal.
///
/// Edit answers: empty keeps the command, `!N` recalls history entry N,
/// `:q` declines, anything else replaces the command.
pub struct LinePrompter<'a, R, W> {
    lines: &'a mut Lines<R>,
    out: W,
}

impl<'a, R, W> LinePrompter<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(lines: &'a mut Lines<R>, out: W) -> Self {
        Self { lines, out }
    }

    async fn ask(&mut self, prompt: &str) -> Option<String> {
        if self.out.write_all(prompt.as_bytes()).await.is_err() {
            return None;
        }
        let _ = self.out.flush().await;
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Prompt read failed: {}", e);
                None
            }
        }
    }
}

impl<'a, R, W> Prompter for LinePrompter<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn confirm(&mut self, question: &str) -> bool {
        let answer = self.ask(&format!("{} (y/n) ", question)).await;
        matches!(answer.as_deref().map(str::trim), Some("y") | Some("yes") | Some("Y"))
    }

    async fn edit(&mut self, initial: &str, history: &[String]) -> Option<String> {
        let mut listing = String::new();
        for (i, entry) in history.iter().take(HISTORY_SHOWN).enumerate() {
            listing.push_str(&format!("  !{} {}\n", i, entry));
        }
        if !listing.is_empty() && self.out.write_all(listing.as_bytes()).await.is_err() {
            return None;
        }
        let answer = self.ask(&format!("Command [{}]: ", initial)).await?;
        resolve_edit(answer.trim(), initial, history)
    }
}

fn resolve_edit(answer: &str, initial: &str, history: &[String]) -> Option<String> {
    if answer.is_empty() {
        return Some(initial.to_string());
    }
    if answer == ":q" {
        return None;
    }
    if let Some(index) = answer.strip_prefix('!').and_then(|n| n.parse::<usize>().ok()) {
        return history.get(index).cloned();
    }
    Some(answer.to_string())
}
