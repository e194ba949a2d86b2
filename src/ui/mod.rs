//! Host panel: key handling and rendering.
//!
//! - **keymapper**: keyboard events to panel actions
//! - **renderer**: transcript, status line and input line drawing

pub mod keymapper;
pub mod renderer;

pub use keymapper::{KeyMapper, Modifiers, PanelAction};
pub use renderer::{PanelView, Renderer};
