//! Command history for devterm
//!
//! Stores submitted commands (newest last) and a navigation cursor that the
//! input field walks with the Up/Down keys. Nothing is persisted.

/// Default maximum number of history entries
pub const HISTORY_LIMIT: usize = 1000;

/// Navigation direction through the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDirection {
    /// Towards older commands (Up)
    Older,
    /// Towards newer commands (Down)
    Newer,
}

impl HistoryDirection {
    /// Map a signed step (-1 older, +1 newer) to a direction
    pub fn from_step(step: i32) -> Option<Self> {
        match step.signum() {
            -1 => Some(HistoryDirection::Older),
            1 => Some(HistoryDirection::Newer),
            _ => None,
        }
    }
}

/// What the input field should show after a navigation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recall<'a> {
    /// Show this entry
    Entry(&'a str),
    /// Moved past the newest entry: clear the field
    Cleared,
    /// History is empty: leave the field alone
    Empty,
}

/// Command history with a clamped cursor
pub struct CommandHistory {
    /// Submitted commands (newest last)
    entries: Vec<String>,
    /// Index of the entry last recalled, always within `0..entries.len()`
    cursor: usize,
    /// Cursor sits on the newest entry but it has not been shown yet
    at_rest: bool,
    /// Maximum entries
    max_entries: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHistory {
    /// Create a new command history
    pub fn new() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }

    /// Create a history that keeps at most `max_entries` commands
    pub fn with_limit(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            at_rest: true,
            max_entries: max_entries.max(1),
        }
    }

    /// Add a command and reset the cursor to it.
    ///
    /// Whitespace-only commands are ignored. Returns whether an entry was added.
    pub fn add(&mut self, command: &str) -> bool {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return false;
        }

        self.entries.push(trimmed.to_string());

        // Trim if exceeding limit
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }

        self.cursor = self.entries.len() - 1;
        self.at_rest = true;
        true
    }

    /// Step the cursor one entry in `direction` and report what to show.
    ///
    /// Older stops at the oldest entry. The first Older step after a submission
    /// recalls the newest entry itself. Newer past the newest clears the field and
    /// re-arms that first step.
    pub fn navigate(&mut self, direction: HistoryDirection) -> Recall<'_> {
        if self.entries.is_empty() {
            return Recall::Empty;
        }

        let newest = self.entries.len() - 1;
        match direction {
            HistoryDirection::Older => {
                if self.at_rest {
                    self.at_rest = false;
                } else {
                    self.cursor = self.cursor.saturating_sub(1);
                }
            }
            HistoryDirection::Newer => {
                if self.at_rest {
                    return Recall::Cleared;
                }
                if self.cursor >= newest {
                    self.cursor = newest;
                    self.at_rest = true;
                    return Recall::Cleared;
                }
                self.cursor += 1;
            }
        }

        Recall::Entry(&self.entries[self.cursor])
    }

    /// Current cursor position, or `None` when empty
    pub fn cursor(&self) -> Option<usize> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.cursor)
        }
    }

    /// Get entry count
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
