use std::sync::Arc;

use shared::{
    domain::{ConversationId, Scoreboard, ZeroStyle},
    error::{ApiError, BoardError},
    protocol::{BoardCommand, BoardReply},
    render::render_markdown,
};
use storage::ScoreboardStore;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<ScoreboardStore>,
}

pub const HELP_TEXT: &str = "\
**Scoreboard commands**

• `/board_start <player_a> <player_b> [title]`: start a two-player board in this channel. Names are ASCII, up to 8 characters.
• `/board_add <a> <b>`: add a round with one score per player.
• `/board_edit <round_no> [a] [b]`: fix the scores of an existing round, e.g. `/board_edit 3 a:50`.
• `/board_undo`: remove the last round.
• `/board_show`: show the board again.
• `/board_rename [player_a] [player_b] [title]`: change names or title.
• `/board_reset`: clear all rounds, keep names and title.
• `/board_delete`: delete the board entirely.
• `/board_zero_style <dash|zero>`: draw zero as `-` or `0`.
• `/board_help`: show this help.

**Layout**
- RND: width 5, right-aligned with one trailing space
- Names: ASCII, 8 characters right-aligned, padded to width 10
- Scores: right-aligned with one trailing space (width 10); zero follows the zero style
- Σ: totals, Δ: difference (signed)
";

pub async fn dispatch(
    ctx: &ApiContext,
    conversation_id: &ConversationId,
    command: BoardCommand,
) -> Result<BoardReply, ApiError> {
    let name = command.name();
    let outcome = match command {
        BoardCommand::Start {
            player_a,
            player_b,
            title,
        } => board_start(ctx, conversation_id, &player_a, &player_b, title.as_deref()).await,
        BoardCommand::Add { a, b } => board_add(ctx, conversation_id, a, b).await,
        BoardCommand::Edit { round_no, a, b } => {
            board_edit(ctx, conversation_id, round_no, a, b).await
        }
        BoardCommand::Undo => board_undo(ctx, conversation_id).await,
        BoardCommand::Show => board_show(ctx, conversation_id).await,
        BoardCommand::Rename {
            player_a,
            player_b,
            title,
        } => {
            board_rename(
                ctx,
                conversation_id,
                player_a.as_deref(),
                player_b.as_deref(),
                title.as_deref(),
            )
            .await
        }
        BoardCommand::Reset => board_reset(ctx, conversation_id).await,
        BoardCommand::Delete => board_delete(ctx, conversation_id).await,
        BoardCommand::ZeroStyle { style } => board_zero_style(ctx, conversation_id, style).await,
        BoardCommand::Help => Ok(board_help()),
    };
    match &outcome {
        Ok(_) => info!(command = name, %conversation_id, "command handled"),
        Err(err) => info!(command = name, %conversation_id, code = ?err.code, "command rejected"),
    }
    outcome
}

pub async fn board_start(
    ctx: &ApiContext,
    conversation_id: &ConversationId,
    player_a: &str,
    player_b: &str,
    title: Option<&str>,
) -> Result<BoardReply, ApiError> {
    let board = ctx
        .store
        .start(conversation_id, player_a, player_b, title)
        .await
        .map_err(user_error)?;
    Ok(with_board(
        "Scoreboard created. Add rounds with /board_add.",
        &board,
    ))
}

pub async fn board_add(
    ctx: &ApiContext,
    conversation_id: &ConversationId,
    a: i64,
    b: i64,
) -> Result<BoardReply, ApiError> {
    let board = ctx
        .store
        .add_round(conversation_id, a, b)
        .await
        .map_err(user_error)?;
    Ok(with_board(
        format!("Added: RND {}  A={a}  B={b}", board.round_count()),
        &board,
    ))
}

pub async fn board_edit(
    ctx: &ApiContext,
    conversation_id: &ConversationId,
    round_no: i64,
    a: Option<i64>,
    b: Option<i64>,
) -> Result<BoardReply, ApiError> {
    let board = ctx
        .store
        .edit_round(conversation_id, round_no, a, b)
        .await
        .map_err(user_error)?;
    let notice = match usize::try_from(round_no).ok().and_then(|no| board.round(no)) {
        Some(round) => format!(
            "Round {round_no} updated. A={} B={}",
            round.score_a, round.score_b
        ),
        None => format!("Round {round_no} updated."),
    };
    Ok(with_board(notice, &board))
}

pub async fn board_undo(
    ctx: &ApiContext,
    conversation_id: &ConversationId,
) -> Result<BoardReply, ApiError> {
    let (removed, board) = ctx
        .store
        .undo(conversation_id)
        .await
        .map_err(user_error)?;
    Ok(with_board(
        format!(
            "Removed round {} (A={} B={}).",
            board.round_count() + 1,
            removed.score_a,
            removed.score_b
        ),
        &board,
    ))
}

pub async fn board_show(
    ctx: &ApiContext,
    conversation_id: &ConversationId,
) -> Result<BoardReply, ApiError> {
    let board = ctx
        .store
        .show(conversation_id)
        .await
        .map_err(user_error)?;
    Ok(with_board("Current scoreboard.", &board))
}

pub async fn board_rename(
    ctx: &ApiContext,
    conversation_id: &ConversationId,
    player_a: Option<&str>,
    player_b: Option<&str>,
    title: Option<&str>,
) -> Result<BoardReply, ApiError> {
    let board = ctx
        .store
        .rename(conversation_id, player_a, player_b, title)
        .await
        .map_err(user_error)?;
    Ok(with_board("Names/title updated.", &board))
}

pub async fn board_reset(
    ctx: &ApiContext,
    conversation_id: &ConversationId,
) -> Result<BoardReply, ApiError> {
    let board = ctx
        .store
        .reset(conversation_id)
        .await
        .map_err(user_error)?;
    Ok(with_board("Scoreboard reset.", &board))
}

pub async fn board_delete(
    ctx: &ApiContext,
    conversation_id: &ConversationId,
) -> Result<BoardReply, ApiError> {
    ctx.store
        .delete(conversation_id)
        .await
        .map_err(user_error)?;
    Ok(BoardReply {
        notice: "Scoreboard deleted. Start a new one with /board_start.".into(),
        board: None,
    })
}

pub async fn board_zero_style(
    ctx: &ApiContext,
    conversation_id: &ConversationId,
    style: ZeroStyle,
) -> Result<BoardReply, ApiError> {
    let board = ctx
        .store
        .set_zero_style(conversation_id, style)
        .await
        .map_err(user_error)?;
    Ok(with_board(
        format!("Zeros are now shown as {}.", style.zero_cell()),
        &board,
    ))
}

pub fn board_help() -> BoardReply {
    BoardReply {
        notice: HELP_TEXT.into(),
        board: None,
    }
}

fn with_board(notice: impl Into<String>, board: &Scoreboard) -> BoardReply {
    BoardReply {
        notice: notice.into(),
        board: Some(render_markdown(board)),
    }
}

/// Keeps the error code and swaps in wording meant for the channel.
fn user_error(err: BoardError) -> ApiError {
    let message = match &err {
        BoardError::NotFound(_) => {
            "There is no scoreboard in this channel. Create one with /board_start.".to_string()
        }
        BoardError::AlreadyExists(_) => {
            "A scoreboard already exists here. Use /board_show to view it or /board_reset to clear it."
                .to_string()
        }
        BoardError::RoundNotFound { requested, count } => {
            format!("Round {requested} does not exist. The latest round is {count}.")
        }
        BoardError::EmptyBoard => "There is no round to undo.".to_string(),
        BoardError::InvalidInput(detail) => format!("Invalid input: {detail}"),
        BoardError::Persistence(detail) => {
            warn!(error = %detail, "scoreboard change applied but not saved");
            format!("The change was applied but could not be saved: {detail}")
        }
    };
    ApiError::new(err.code(), message)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
