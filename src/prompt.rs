// ABOUTME: Interactive deletion-mode selection and hard-delete confirmation.
// ABOUTME: Generic over the reader and writer so prompts run against in-memory buffers in tests.

use std::io::{BufRead, Stderr, StdinLock, Write};

use crate::reconcile::DeletionMode;

/// Word that must be typed exactly to start a hard deletion.
pub const HARD_DELETE_CONFIRMATION: &str = "DELETE";

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("input closed before an answer was given")]
    Closed,

    #[error("prompt I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run a prompt interaction on the blocking pool so a pending answer never
/// holds a runtime worker.
pub async fn blocking<T, F>(interaction: F) -> Result<T, PromptError>
where
    F: FnOnce() -> Result<T, PromptError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(interaction)
        .await
        .map_err(|e| PromptError::Io(std::io::Error::other(e)))?
}

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<StdinLock<'static>, Stderr> {
    /// Read answers from stdin, write prompts to stderr.
    pub fn terminal() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn say(&mut self, line: &str) -> Result<(), PromptError> {
        writeln!(self.output, "{line}")?;
        Ok(())
    }

    fn ask(&mut self, question: &str) -> Result<String, PromptError> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Err(PromptError::Closed);
        }
        Ok(answer.trim().to_string())
    }

    /// Ask for mock (1) or hard (2). Hard needs a `yes`; anything else
    /// returns to the menu. Invalid choices re-prompt.
    pub fn select_mode(&mut self) -> Result<DeletionMode, PromptError> {
        self.say("Please select a deletion mode:")?;
        self.say("  1. MOCK MODE (safe): show what would be deleted without making changes")?;
        self.say("  2. HARD DELETE MODE (dangerous): permanently delete images from the registry")?;

        loop {
            match self.ask("Enter your choice (1 or 2): ")?.as_str() {
                "1" => {
                    self.say("Mock mode selected, no images will be deleted")?;
                    return Ok(DeletionMode::Mock);
                }
                "2" => {
                    self.say("WARNING: hard delete mode permanently deletes images!")?;
                    let confirm = self.ask("Are you absolutely sure? Type 'yes' to confirm: ")?;
                    if confirm.eq_ignore_ascii_case("yes") {
                        self.say("Hard delete mode confirmed")?;
                        return Ok(DeletionMode::Hard);
                    }
                    self.say("Hard delete cancelled, returning to mode selection")?;
                }
                _ => self.say("Invalid choice. Please enter 1 or 2.")?,
            }
        }
    }

    /// Final gate before a hard deletion of `count` manifests.
    pub fn confirm_hard_delete(&mut self, count: usize) -> Result<bool, PromptError> {
        self.say(&format!(
            "WARNING: You are about to permanently delete {count} manifest(s)!"
        ))?;
        self.say("This action CANNOT be undone.")?;
        let answer = self.ask(&format!(
            "Type '{HARD_DELETE_CONFIRMATION}' (in all caps) to confirm deletion: "
        ))?;
        Ok(answer == HARD_DELETE_CONFIRMATION)
    }
}
