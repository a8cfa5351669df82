use serde::{Deserialize, Serialize};

use crate::domain::ZeroStyle;

/// A scoreboard command as issued from a channel. Scores arrive as raw signed
/// integers; range checks belong to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BoardCommand {
    Start {
        player_a: String,
        player_b: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Add {
        a: i64,
        b: i64,
    },
    Edit {
        round_no: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        a: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        b: Option<i64>,
    },
    Undo,
    Show,
    Rename {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_a: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        player_b: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Reset,
    Delete,
    ZeroStyle {
        style: ZeroStyle,
    },
    Help,
}

impl BoardCommand {
    /// Command name as the chat host registers it.
    pub fn name(&self) -> &'static str {
        match self {
            BoardCommand::Start { .. } => "board_start",
            BoardCommand::Add { .. } => "board_add",
            BoardCommand::Edit { .. } => "board_edit",
            BoardCommand::Undo => "board_undo",
            BoardCommand::Show => "board_show",
            BoardCommand::Rename { .. } => "board_rename",
            BoardCommand::Reset => "board_reset",
            BoardCommand::Delete => "board_delete",
            BoardCommand::ZeroStyle { .. } => "board_zero_style",
            BoardCommand::Help => "board_help",
        }
    }
}

/// What a handler sends back: a short confirmation for the caller and, when a
/// board still exists, its freshly rendered table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardReply {
    pub notice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board: Option<String>,
}
