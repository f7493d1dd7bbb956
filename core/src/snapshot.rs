//! Render-ready view of a session, handed to the presentation layer after
//! every call into the core.

use serde::Serialize;

/// Overlay text shown once the board is stuck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminalNotice {
    pub title: String,
    pub description: String,
}

impl TerminalNotice {
    pub fn game_over() -> Self {
        Self {
            title: "Game over".to_owned(),
            description: "No moves left".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderSnapshot {
    pub size: usize,
    pub rows: Vec<Vec<u32>>,
    pub score: u64,
    pub best: u64,
    pub can_undo: bool,
    /// `Some` exactly when the game is over.
    pub terminal: Option<TerminalNotice>,
}

impl RenderSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }
}
