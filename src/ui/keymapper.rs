//! Key mapping for the terminal panel
//!
//! Converts key events into panel actions. The shell never sees raw keys: the
//! panel edits its own input line and submits whole commands.

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        result
    }
}

/// Something the panel should do in response to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    /// Type a character into the input line
    Insert(char),
    /// Delete the last input character
    Backspace,
    /// Submit the input line
    Submit,
    /// Recall an older command
    HistoryOlder,
    /// Recall a newer command
    HistoryNewer,
    /// Scroll the transcript back
    ScrollUp,
    /// Scroll the transcript forward
    ScrollDown,
    /// Clear the transcript
    Clear,
    /// Run the shell's help
    Help,
    /// Close the panel
    Quit,
}

impl PanelAction {
    /// Whether the action edits or submits input (disabled once the session ends)
    pub fn needs_input(&self) -> bool {
        matches!(
            self,
            PanelAction::Insert(_)
                | PanelAction::Backspace
                | PanelAction::Submit
                | PanelAction::HistoryOlder
                | PanelAction::HistoryNewer
                | PanelAction::Help
        )
    }
}

/// Key mapper for converting key events to panel actions
pub struct KeyMapper;

impl KeyMapper {
    /// Map a crossterm KeyEvent to a panel action
    pub fn map(event: &KeyEvent) -> Option<PanelAction> {
        // Only process key press events
        if event.kind == KeyEventKind::Release {
            return None;
        }

        let mods = Modifiers::from(event.modifiers);

        if mods.contains(Modifiers::CTRL) {
            return match event.code {
                KeyCode::Char('c') | KeyCode::Char('d') => Some(PanelAction::Quit),
                KeyCode::Char('l') => Some(PanelAction::Clear),
                _ => None,
            };
        }

        match event.code {
            KeyCode::Char(ch) if !mods.contains(Modifiers::ALT) => Some(PanelAction::Insert(ch)),
            KeyCode::Enter => Some(PanelAction::Submit),
            KeyCode::Backspace => Some(PanelAction::Backspace),
            KeyCode::Tab => Some(PanelAction::Insert('\t')),
            KeyCode::Up => Some(PanelAction::HistoryOlder),
            KeyCode::Down => Some(PanelAction::HistoryNewer),
            KeyCode::PageUp => Some(PanelAction::ScrollUp),
            KeyCode::PageDown => Some(PanelAction::ScrollDown),
            KeyCode::F(1) => Some(PanelAction::Help),
            KeyCode::Esc => Some(PanelAction::Quit),
            _ => None,
        }
    }
}
