//! Bounded transcript buffer
//!
//! Holds the visible terminal output as one string capped at a character budget.
//! When an append would exceed the budget the oldest text is cut at a line
//! boundary, so the top of the transcript never starts with a ragged partial line.
//! Lengths are counted in `char`s, so a cut never lands inside a multi-byte character.

/// Default character budget for the visible transcript
pub const DEFAULT_MAX_OUTPUT_LENGTH: usize = 10_000;

/// Bounded, line-aware output buffer
#[derive(Debug, Clone)]
pub struct Transcript {
    /// Visible text
    text: String,
    /// Length of `text` in chars
    char_len: usize,
    /// Character budget
    max_len: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT_LENGTH)
    }
}

impl Transcript {
    /// Create an empty transcript. A zero budget is raised to one character.
    pub fn new(max_len: usize) -> Self {
        Self {
            text: String::new(),
            char_len: 0,
            max_len: max_len.max(1),
        }
    }

    /// Append a chunk, trimming old content if needed.
    ///
    /// Returns `true` if anything was discarded to stay within budget.
    pub fn append(&mut self, chunk: &str) -> bool {
        if chunk.is_empty() {
            return false;
        }

        let chunk_len = chunk.chars().count();

        // Fits as is
        if self.char_len + chunk_len <= self.max_len {
            self.text.push_str(chunk);
            self.char_len += chunk_len;
            return false;
        }

        if chunk_len > self.max_len {
            // The chunk alone is over budget: old text goes entirely, and the chunk
            // keeps its tail from the first line start past the cutoff. A boundary
            // that would leave nothing at all does not count.
            let drop = chunk_len - self.max_len;
            let cut = line_start_at_or_after(chunk, drop, false)
                .unwrap_or_else(|| byte_offset(chunk, drop));
            let kept = &chunk[cut..];
            self.text.clear();
            self.text.push_str(kept);
            self.char_len = kept.chars().count();
        } else {
            // Drop just enough old text, rounded forward to a line start
            let drop = self.char_len + chunk_len - self.max_len;
            let cut = line_start_at_or_after(&self.text, drop, true)
                .unwrap_or_else(|| byte_offset(&self.text, drop));
            let dropped_chars = self.text[..cut].chars().count();
            self.text.drain(..cut);
            self.char_len -= dropped_chars;
            self.text.push_str(chunk);
            self.char_len += chunk_len;
        }

        true
    }

    /// Append `line` followed by a newline
    pub fn append_line(&mut self, line: &str) -> bool {
        let mut chunk = String::with_capacity(line.len() + 1);
        chunk.push_str(line);
        chunk.push('\n');
        self.append(&chunk)
    }

    /// Discard everything
    pub fn clear(&mut self) {
        self.text.clear();
        self.char_len = 0;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in chars
    pub fn len(&self) -> usize {
        self.char_len
    }

    pub fn is_empty(&self) -> bool {
        self.char_len == 0
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Char index of the last character, where the host places its caret
    pub fn cursor_position(&self) -> usize {
        self.char_len.saturating_sub(1)
    }
}

/// Byte offset of the char at index `char_idx` (or `text.len()` past the end)
fn byte_offset(text: &str, char_idx: usize) -> usize {
    text.char_indices()
        .nth(char_idx)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len())
}

/// Byte offset of the first line start at or after char index `drop`.
///
/// A line starts at offset 0 or right after a `\n`. `allow_end` decides whether
/// the end of `text` itself (after a trailing newline) is an acceptable cut.
fn line_start_at_or_after(text: &str, drop: usize, allow_end: bool) -> Option<usize> {
    let start = byte_offset(text, drop);
    let candidate = if start == 0 || text.as_bytes()[start - 1] == b'\n' {
        start
    } else {
        text[start..].find('\n').map(|i| start + i + 1)?
    };

    if candidate == text.len() && !allow_end {
        None
    } else {
        Some(candidate)
    }
}
