use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::BoardError;

/// Longest player name the table can show without clipping.
pub const MAX_NAME_LEN: usize = 8;

/// Stable identity of the channel or thread that owns a scoreboard.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(raw: impl Into<String>) -> Result<Self, BoardError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BoardError::InvalidInput(
                "conversation id must not be empty".into(),
            ));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(BoardError::InvalidInput(format!(
                "conversation id '{trimmed}' must not contain whitespace"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Builds the `guild:channel:thread` key. For a thread, `channel_id` is the
    /// parent channel and `thread_id` the thread itself; plain channels use thread 0.
    pub fn for_channel(guild_id: Option<u64>, channel_id: u64, thread_id: Option<u64>) -> Self {
        Self(format!(
            "{}:{}:{}",
            guild_id.unwrap_or(0),
            channel_id,
            thread_id.unwrap_or(0)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ConversationId {
    type Error = BoardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ConversationId> for String {
    fn from(value: ConversationId) -> Self {
        value.0
    }
}

/// Display name of one side of the match: printable ASCII, at most
/// [`MAX_NAME_LEN`] characters. Longer input is cut, not rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerName(String);

impl PlayerName {
    pub fn parse(raw: &str) -> Result<Self, BoardError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BoardError::InvalidInput(
                "player name must not be empty".into(),
            ));
        }
        if !trimmed.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
            return Err(BoardError::InvalidInput(format!(
                "player name '{trimmed}' must be printable ASCII (up to {MAX_NAME_LEN} characters)"
            )));
        }
        // ASCII only past this point, so byte slicing is char slicing.
        let cut = trimmed.len().min(MAX_NAME_LEN);
        Ok(Self(trimmed[..cut].trim_end().to_string()))
    }

    /// `Player A` / `Player B`, for stored names that no longer validate.
    pub fn placeholder(side: &str) -> Self {
        Self(format!("Player {side}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PlayerName {
    type Error = BoardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PlayerName> for String {
    fn from(value: PlayerName) -> Self {
        value.0
    }
}

/// Normalizes an optional title: surrounding whitespace is dropped and a blank
/// title means "no title".
pub fn normalize_title(raw: Option<&str>) -> Result<Option<String>, BoardError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.chars().any(char::is_control) {
        return Err(BoardError::InvalidInput(
            "title must be a single line".into(),
        ));
    }
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// How a zero-valued score cell is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroStyle {
    #[default]
    Dash,
    Zero,
}

impl ZeroStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            ZeroStyle::Dash => "dash",
            ZeroStyle::Zero => "zero",
        }
    }

    pub fn zero_cell(self) -> &'static str {
        match self {
            ZeroStyle::Dash => "-",
            ZeroStyle::Zero => "0",
        }
    }
}

impl FromStr for ZeroStyle {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dash" => Ok(ZeroStyle::Dash),
            "zero" => Ok(ZeroStyle::Zero),
            other => Err(BoardError::InvalidInput(format!(
                "zero style must be 'dash' or 'zero', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ZeroStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Round {
    pub score_a: u64,
    pub score_b: u64,
}

/// Converts a score from the command layer, which may carry any integer.
pub fn checked_score(raw: i64, side: &str) -> Result<u64, BoardError> {
    u64::try_from(raw).map_err(|_| {
        BoardError::InvalidInput(format!(
            "score for player {side} must be a non-negative integer, got {raw}"
        ))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scoreboard {
    pub conversation_id: ConversationId,
    pub title: Option<String>,
    pub player_a: PlayerName,
    pub player_b: PlayerName,
    pub rounds: Vec<Round>,
    pub zero_style: ZeroStyle,
}

impl Scoreboard {
    pub fn new(
        conversation_id: ConversationId,
        player_a: PlayerName,
        player_b: PlayerName,
        title: Option<String>,
    ) -> Self {
        Self {
            conversation_id,
            title,
            player_a,
            player_b,
            rounds: Vec::new(),
            zero_style: ZeroStyle::default(),
        }
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Looks up a round by its 1-based number.
    pub fn round(&self, round_no: usize) -> Option<&Round> {
        round_no.checked_sub(1).and_then(|idx| self.rounds.get(idx))
    }

    pub fn totals(&self) -> (u128, u128) {
        self.rounds.iter().fold((0u128, 0u128), |(a, b), round| {
            (a + u128::from(round.score_a), b + u128::from(round.score_b))
        })
    }

    /// `totalA - totalB`; positive when player A leads.
    pub fn delta(&self) -> i128 {
        let (a, b) = self.totals();
        // Each total is a sum of u64 values, far below i128::MAX.
        a as i128 - b as i128
    }
}
