//! Fixed-width text rendering of a scoreboard.
//!
//! ```text
//! +-----+----------+----------+
//! | RND |    Alice |      Bob |
//! +-----+----------+----------+
//! |   1 |        3 |        - |
//! +-----+----------+----------+
//! |   Σ |        3 |        - |
//! |   Δ |       +3 |       -3 |
//! +-----+----------+----------+
//! ```

use crate::domain::{PlayerName, Scoreboard, ZeroStyle, MAX_NAME_LEN};

const COL_RND: usize = 5;
const COL_PLAYER: usize = 10;

/// Title line followed by the table.
pub fn render(board: &Scoreboard) -> String {
    let mut out = title_line(board);
    out.push('\n');
    out.push_str(&render_table(board));
    out
}

/// Chat form: bold title line, table inside a code fence so the columns line up.
pub fn render_markdown(board: &Scoreboard) -> String {
    format!("**{}**\n```\n{}```", title_line(board), render_table(board))
}

pub fn title_line(board: &Scoreboard) -> String {
    match &board.title {
        Some(title) => format!("【{title}】 {} vs {}", board.player_a, board.player_b),
        None => format!("{} vs {}", board.player_a, board.player_b),
    }
}

pub fn render_table(board: &Scoreboard) -> String {
    let style = board.zero_style;
    let (total_a, total_b) = board.totals();
    let delta = board.delta();

    let mut out = String::new();
    out.push_str(&hline());
    out.push_str(&row(
        "RND",
        &name_cell(&board.player_a),
        &name_cell(&board.player_b),
    ));
    out.push_str(&hline());
    for (idx, round) in board.rounds.iter().enumerate() {
        out.push_str(&row(
            &(idx + 1).to_string(),
            &score_cell(u128::from(round.score_a), style),
            &score_cell(u128::from(round.score_b), style),
        ));
    }
    out.push_str(&hline());
    out.push_str(&row(
        "Σ",
        &score_cell(total_a, style),
        &score_cell(total_b, style),
    ));
    out.push_str(&row(
        "Δ",
        &delta_cell(delta, style),
        &delta_cell(-delta, style),
    ));
    out.push_str(&hline());
    out
}

fn hline() -> String {
    format!(
        "+{}+{}+{}+\n",
        "-".repeat(COL_RND),
        "-".repeat(COL_PLAYER),
        "-".repeat(COL_PLAYER)
    )
}

fn row(label: &str, a: &str, b: &str) -> String {
    format!("|{}|{a}|{b}|\n", rnd_cell(label))
}

fn rnd_cell(text: &str) -> String {
    format!("{text:>width$} ", width = COL_RND - 1)
}

fn name_cell(name: &PlayerName) -> String {
    format!(" {:>width$} ", name.as_str(), width = MAX_NAME_LEN)
}

fn score_cell(value: u128, style: ZeroStyle) -> String {
    let text = if value == 0 {
        style.zero_cell().to_string()
    } else {
        value.to_string()
    };
    pad_score(&text)
}

fn delta_cell(value: i128, style: ZeroStyle) -> String {
    let text = if value == 0 {
        style.zero_cell().to_string()
    } else {
        format!("{value:+}")
    };
    pad_score(&text)
}

fn pad_score(text: &str) -> String {
    format!("{text:>width$} ", width = COL_PLAYER - 1)
}
