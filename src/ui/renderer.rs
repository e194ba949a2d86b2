//! Panel renderer using crossterm
//!
//! Draws the transcript tail, a status line and the input line. The renderer
//! only sees text and a scroll offset; it knows nothing about the shell.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, Print, ResetColor, SetAttribute},
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use unicode_width::UnicodeWidthChar;

/// Prompt shown in front of the input line
pub const PROMPT: &str = "> ";

/// Everything the renderer needs for one frame
pub struct PanelView<'a> {
    pub transcript: &'a str,
    pub input: &'a str,
    pub status: &'a str,
    /// Lines scrolled back from the bottom
    pub scroll: usize,
    /// Input is disabled (session terminated)
    pub input_disabled: bool,
}

/// Panel renderer
pub struct Renderer {
    /// Whether the terminal has been initialized
    initialized: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self { initialized: false }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Clear(ClearType::All), MoveTo(0, 0))?;
        self.initialized = true;
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset), Show);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        // Disable raw mode - this is the most important part
        terminal::disable_raw_mode()
    }

    /// Render one frame
    pub fn render(&mut self, view: &PanelView<'_>) -> io::Result<()> {
        let (cols, rows) = Self::size()?;
        let width = cols as usize;
        // Transcript area leaves room for the status and input lines
        let body_rows = (rows as usize).saturating_sub(2);

        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(65536, stdout.lock());
        queue!(stdout, Hide)?;

        let lines = visible_lines(view.transcript, width, body_rows, view.scroll);
        for row in 0..body_rows {
            queue!(stdout, MoveTo(0, row as u16), Clear(ClearType::CurrentLine))?;
            if let Some(line) = lines.get(row) {
                queue!(stdout, Print(line))?;
            }
        }

        // Status line in reverse video
        let status_row = body_rows as u16;
        queue!(
            stdout,
            MoveTo(0, status_row),
            Clear(ClearType::CurrentLine),
            SetAttribute(Attribute::Reverse),
            Print(pad_to_width(&fit_width(view.status, width), width)),
            SetAttribute(Attribute::Reset)
        )?;

        // Input line
        let input_row = status_row.saturating_add(1);
        queue!(stdout, MoveTo(0, input_row), Clear(ClearType::CurrentLine))?;
        if view.input_disabled {
            queue!(
                stdout,
                SetAttribute(Attribute::Dim),
                Print(fit_width("(session ended, press Esc to close)", width)),
                SetAttribute(Attribute::Reset)
            )?;
        } else {
            let line = format!("{}{}", PROMPT, view.input);
            let shown = tail_width(&line, width.saturating_sub(1));
            let caret = display_width(&shown) as u16;
            queue!(stdout, Print(&shown), MoveTo(caret, input_row), Show)?;
        }

        stdout.flush()
    }

    /// Get terminal size
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn char_width(ch: char) -> usize {
    if ch == '\t' {
        1
    } else {
        ch.width().unwrap_or(0)
    }
}

/// Display width in terminal columns
pub fn display_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

/// Longest prefix of `line` that fits in `width` columns (tabs shown as a space)
pub fn fit_width(line: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in line.chars() {
        let w = char_width(ch);
        if used + w > width {
            break;
        }
        used += w;
        out.push(if ch == '\t' { ' ' } else { ch });
    }
    out
}

/// Longest suffix of `line` that fits in `width` columns
fn tail_width(line: &str, width: usize) -> String {
    let mut kept = Vec::new();
    let mut used = 0;
    for ch in line.chars().rev() {
        let w = char_width(ch);
        if used + w > width {
            break;
        }
        used += w;
        kept.push(if ch == '\t' { ' ' } else { ch });
    }
    kept.into_iter().rev().collect()
}

fn pad_to_width(line: &str, width: usize) -> String {
    let mut out = line.to_string();
    let used = display_width(line);
    if used < width {
        out.push_str(&" ".repeat(width - used));
    }
    out
}

/// The `height` transcript lines to show, `scroll` lines up from the bottom.
///
/// A trailing newline does not produce an empty last line. Scrolling is clamped
/// so the window never runs past the first line.
pub fn visible_lines(transcript: &str, width: usize, height: usize, scroll: usize) -> Vec<String> {
    if height == 0 {
        return Vec::new();
    }

    let lines: Vec<&str> = transcript.lines().collect();
    let max_scroll = lines.len().saturating_sub(height);
    let end = lines.len() - scroll.min(max_scroll);
    let start = end.saturating_sub(height);

    lines[start..end]
        .iter()
        .map(|line| fit_width(line, width))
        .collect()
}

/// Largest useful scroll offset for a transcript shown in `height` rows
pub fn max_scroll(transcript: &str, height: usize) -> usize {
    transcript.lines().count().saturating_sub(height)
}
