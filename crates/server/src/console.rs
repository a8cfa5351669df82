//! Line-oriented host: `<conversation-id> <command> [args...]` per line.

use server_api::{dispatch, ApiContext};
use shared::{
    domain::{ConversationId, ZeroStyle},
    error::{ApiError, BoardError},
    protocol::BoardCommand,
};

/// Parses one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<(ConversationId, BoardCommand)>, BoardError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace();
    let conversation_id = ConversationId::new(tokens.next().unwrap_or_default())?;
    let name = tokens
        .next()
        .ok_or_else(|| BoardError::InvalidInput("missing command after conversation id".into()))?;
    let args: Vec<&str> = tokens.collect();

    let command = match name.trim_start_matches('/') {
        "board_start" => {
            let [player_a, player_b, rest @ ..] = args.as_slice() else {
                return Err(usage("board_start <player_a> <player_b> [title]"));
            };
            BoardCommand::Start {
                player_a: player_a.to_string(),
                player_b: player_b.to_string(),
                title: (!rest.is_empty()).then(|| rest.join(" ")),
            }
        }
        "board_add" => {
            if args.len() > 2 {
                return Err(usage("board_add <a> <b>"));
            }
            BoardCommand::Add {
                a: args.first().map(|v| parse_int(v)).transpose()?.unwrap_or(0),
                b: args.get(1).map(|v| parse_int(v)).transpose()?.unwrap_or(0),
            }
        }
        "board_edit" => {
            let [round_no, rest @ ..] = args.as_slice() else {
                return Err(usage("board_edit <round_no> [a=N] [b=N]"));
            };
            let mut a = None;
            let mut b = None;
            for arg in rest {
                match split_option(arg) {
                    Some(("a", value)) => a = Some(parse_int(value)?),
                    Some(("b", value)) => b = Some(parse_int(value)?),
                    _ => return Err(usage("board_edit <round_no> [a=N] [b=N]")),
                }
            }
            BoardCommand::Edit {
                round_no: parse_int(round_no)?,
                a,
                b,
            }
        }
        "board_undo" => no_args(&args, BoardCommand::Undo)?,
        "board_show" => no_args(&args, BoardCommand::Show)?,
        "board_rename" => parse_rename(&args)?,
        "board_reset" => no_args(&args, BoardCommand::Reset)?,
        "board_delete" => no_args(&args, BoardCommand::Delete)?,
        "board_zero_style" => {
            let [style] = args.as_slice() else {
                return Err(usage("board_zero_style <dash|zero>"));
            };
            BoardCommand::ZeroStyle {
                style: style.parse::<ZeroStyle>()?,
            }
        }
        "board_help" => BoardCommand::Help,
        other => {
            return Err(BoardError::InvalidInput(format!(
                "unknown command '{other}'; try board_help"
            )))
        }
    };

    Ok(Some((conversation_id, command)))
}

/// Runs one line against the store and returns the text to print.
pub async fn handle_line(ctx: &ApiContext, line: &str) -> Option<String> {
    let parsed = match parse_line(line) {
        Ok(parsed) => parsed?,
        Err(err) => return Some(format_error(&ApiError::from(err))),
    };
    let (conversation_id, command) = parsed;
    Some(match dispatch(ctx, &conversation_id, command).await {
        Ok(reply) => match reply.board {
            Some(board) => format!("{}\n{board}", reply.notice),
            None => reply.notice,
        },
        Err(err) => format_error(&err),
    })
}

fn format_error(err: &ApiError) -> String {
    format!("error [{:?}]: {}", err.code, err.message)
}

/// `title=` swallows the rest of the line so titles may contain spaces.
fn parse_rename(args: &[&str]) -> Result<BoardCommand, BoardError> {
    let mut player_a = None;
    let mut player_b = None;
    let mut title = None;
    for (idx, arg) in args.iter().enumerate() {
        match split_option(arg) {
            Some(("a", value)) => player_a = Some(value.to_string()),
            Some(("b", value)) => player_b = Some(value.to_string()),
            Some(("title", value)) => {
                let mut parts = vec![value];
                parts.extend(args[idx + 1..].iter().copied());
                title = Some(parts.join(" ").trim().to_string());
                break;
            }
            _ => return Err(usage("board_rename [a=NAME] [b=NAME] [title=TEXT]")),
        }
    }
    Ok(BoardCommand::Rename {
        player_a,
        player_b,
        title,
    })
}

fn split_option(arg: &str) -> Option<(&str, &str)> {
    arg.split_once('=').or_else(|| arg.split_once(':'))
}

fn no_args(args: &[&str], command: BoardCommand) -> Result<BoardCommand, BoardError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(usage(command.name()))
    }
}

fn parse_int(raw: &str) -> Result<i64, BoardError> {
    raw.parse::<i64>()
        .map_err(|_| BoardError::InvalidInput(format!("'{raw}' is not an integer")))
}

fn usage(text: &str) -> BoardError {
    BoardError::InvalidInput(format!("usage: <conversation-id> {text}"))
}

#[cfg(test)]
#[path = "tests/console_tests.rs"]
mod tests;
