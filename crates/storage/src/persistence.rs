use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::domain::{
    normalize_title, ConversationId, PlayerName, Round, Scoreboard, ZeroStyle,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Every scoreboard the process knows about, keyed by conversation.
pub type BoardMap = BTreeMap<ConversationId, Scoreboard>;

/// Durable home of the full board mapping. `save` always receives the whole
/// mapping and must replace the previous content atomically.
#[async_trait]
pub trait BoardPersistence: Send + Sync {
    async fn load(&self) -> Result<BoardMap>;
    async fn save(&self, boards: &BoardMap) -> Result<()>;
}

/// Pretty-printed JSON object `{ conversation_id: record }` on local disk.
#[derive(Debug, Clone)]
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<path>.<tag>-<UTC stamp>`, next to the live file.
    fn aside_path(&self, tag: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let mut target = self.path.clone().into_os_string();
        target.push(format!(".{tag}-{stamp}"));
        PathBuf::from(target)
    }

    /// Moves an unparseable file out of the way so the next save cannot
    /// overwrite whatever is still recoverable in it.
    async fn quarantine(&self) -> Result<PathBuf> {
        let target = self.aside_path("corrupt");
        tokio::fs::rename(&self.path, &target)
            .await
            .with_context(|| {
                format!(
                    "failed to move corrupt scoreboard file '{}' aside",
                    self.path.display()
                )
            })?;
        Ok(target)
    }

    /// Copies the file aside before records that could not be read are
    /// dropped by the next save.
    async fn keep_copy(&self) -> Result<PathBuf> {
        let target = self.aside_path("rejected");
        tokio::fs::copy(&self.path, &target).await.with_context(|| {
            format!(
                "failed to copy scoreboard file '{}' aside",
                self.path.display()
            )
        })?;
        Ok(target)
    }

    /// `None` when the file does not exist. Any other I/O error is returned.
    async fn read_raw(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| {
                format!("failed to read scoreboard file '{}'", self.path.display())
            }),
        }
    }

    /// Reads and checks the file without any fallback: a missing file, a
    /// corrupt file or a record that needs repair is an error.
    pub async fn read_checked(&self) -> Result<BoardMap> {
        let raw = self.read_raw().await?.with_context(|| {
            format!("scoreboard file '{}' does not exist", self.path.display())
        })?;
        if is_blank(&raw) {
            return Ok(BoardMap::new());
        }
        let decoded = decode_boards(&raw)?;
        let problems: Vec<&String> = decoded
            .repaired
            .iter()
            .chain(&decoded.rejected)
            .collect();
        if !problems.is_empty() {
            bail!(
                "{} scoreboard record(s) need attention: {}",
                problems.len(),
                problems
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            );
        }
        Ok(decoded.boards)
    }

    /// Same view of the file that `load` would give, without moving or
    /// copying anything. Safe to call while another process owns the file.
    pub async fn read_snapshot(&self) -> Result<BoardMap> {
        let Some(raw) = self.read_raw().await? else {
            return Ok(BoardMap::new());
        };
        if is_blank(&raw) {
            return Ok(BoardMap::new());
        }
        let decoded = decode_boards(&raw)?;
        for note in decoded.repaired.iter().chain(&decoded.rejected) {
            warn!(path = %self.path.display(), record = %note, "scoreboard record needs attention");
        }
        Ok(decoded.boards)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl BoardPersistence for JsonFilePersistence {
    async fn load(&self) -> Result<BoardMap> {
        let Some(raw) = self.read_raw().await? else {
            info!(path = %self.path.display(), "no scoreboard file yet; starting empty");
            return Ok(BoardMap::new());
        };

        if is_blank(&raw) {
            return Ok(BoardMap::new());
        }

        let decoded = match decode_boards(&raw) {
            Ok(decoded) => decoded,
            Err(error) => {
                let moved_to = self.quarantine().await?;
                warn!(
                    path = %self.path.display(),
                    moved_to = %moved_to.display(),
                    error = %format!("{error:#}"),
                    "scoreboard file is corrupt; starting with an empty store"
                );
                return Ok(BoardMap::new());
            }
        };

        for note in &decoded.repaired {
            warn!(path = %self.path.display(), record = %note, "repaired scoreboard record");
        }
        if !decoded.rejected.is_empty() {
            let copied_to = self.keep_copy().await?;
            for note in &decoded.rejected {
                warn!(
                    path = %self.path.display(),
                    copied_to = %copied_to.display(),
                    record = %note,
                    "dropped unreadable scoreboard record"
                );
            }
        }
        info!(path = %self.path.display(), boards = decoded.boards.len(), "loaded scoreboards");
        Ok(decoded.boards)
    }

    async fn save(&self, boards: &BoardMap) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!(
                    "failed to create scoreboard directory '{}'",
                    parent.display()
                )
            })?;
        }

        let payload = encode_boards(boards)?;
        let temp_path = self.temp_path();
        if let Err(err) = write_synced(&temp_path, &payload).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err);
        }
        if let Err(err) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!(
                    "failed to replace scoreboard file '{}'",
                    self.path.display()
                )
            });
        }
        debug!(path = %self.path.display(), boards = boards.len(), "saved scoreboards");
        Ok(())
    }
}

fn is_blank(raw: &[u8]) -> bool {
    raw.iter().all(|b| b.is_ascii_whitespace())
}

async fn write_synced(path: &Path, payload: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create '{}'", path.display()))?;
    file.write_all(payload)
        .await
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("failed to sync '{}'", path.display()))?;
    Ok(())
}

/// On-disk record. Also accepts the older snake_case layout
/// (`player_a`, `{a, b}` rounds, `zero_as_dash`) and ignores unknown keys.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredBoard {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(alias = "player_a")]
    player_a: String,
    #[serde(alias = "player_b")]
    player_b: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zero_style: Option<ZeroStyle>,
    #[serde(rename = "zero_as_dash", default, skip_serializing)]
    zero_as_dash: Option<bool>,
    #[serde(default)]
    rounds: Vec<StoredRound>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRound {
    #[serde(alias = "a")]
    score_a: StoredScore,
    #[serde(alias = "b")]
    score_b: StoredScore,
}

/// Older files may hold negative scores; they load as zero.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredScore {
    Count(u64),
    Negative(i64),
}

impl StoredScore {
    fn repaired(self, round_no: usize, side: &str, repairs: &mut Vec<String>) -> u64 {
        match self {
            Self::Count(value) => value,
            Self::Negative(value) => {
                repairs.push(format!(
                    "round {round_no} score {side} was {value}, loaded as 0"
                ));
                0
            }
        }
    }
}

impl StoredBoard {
    fn from_board(board: &Scoreboard) -> Self {
        Self {
            title: board.title.clone(),
            player_a: board.player_a.to_string(),
            player_b: board.player_b.to_string(),
            zero_style: Some(board.zero_style),
            zero_as_dash: None,
            rounds: board
                .rounds
                .iter()
                .map(|round| StoredRound {
                    score_a: StoredScore::Count(round.score_a),
                    score_b: StoredScore::Count(round.score_b),
                })
                .collect(),
        }
    }

    /// Builds the domain board. Values the domain no longer accepts are
    /// replaced and described in `repairs` instead of failing the record.
    fn into_board(
        self,
        conversation_id: ConversationId,
        repairs: &mut Vec<String>,
    ) -> Scoreboard {
        let zero_style = match (self.zero_style, self.zero_as_dash) {
            (Some(style), _) => style,
            (None, Some(false)) => ZeroStyle::Zero,
            (None, _) => ZeroStyle::Dash,
        };
        let title = normalize_title(self.title.as_deref()).unwrap_or_else(|err| {
            repairs.push(format!("title dropped: {err}"));
            None
        });
        let player_a = stored_name(&self.player_a, "A", repairs);
        let player_b = stored_name(&self.player_b, "B", repairs);
        let rounds = self
            .rounds
            .into_iter()
            .enumerate()
            .map(|(idx, round)| Round {
                score_a: round.score_a.repaired(idx + 1, "A", repairs),
                score_b: round.score_b.repaired(idx + 1, "B", repairs),
            })
            .collect();
        Scoreboard {
            conversation_id,
            title,
            player_a,
            player_b,
            rounds,
            zero_style,
        }
    }
}

/// Falls back to `Player A` / `Player B` for names that no longer validate.
fn stored_name(raw: &str, side: &str, repairs: &mut Vec<String>) -> PlayerName {
    PlayerName::parse(raw).unwrap_or_else(|err| {
        let fallback = PlayerName::placeholder(side);
        repairs.push(format!("player {side} replaced by '{fallback}': {err}"));
        fallback
    })
}

/// Boards read from a file, with a note per record that was repaired or
/// left out.
#[derive(Debug, Default)]
struct Decoded {
    boards: BoardMap,
    repaired: Vec<String>,
    rejected: Vec<String>,
}

/// Fails only when the file as a whole is not a JSON object; a single bad
/// record is rejected on its own and the rest still load.
fn decode_boards(raw: &[u8]) -> Result<Decoded> {
    let records: BTreeMap<String, serde_json::Value> =
        serde_json::from_slice(raw).context("scoreboard file is not a valid board mapping")?;

    let mut decoded = Decoded::default();
    for (key, value) in records {
        let id = match ConversationId::new(key.as_str()) {
            Ok(id) => id,
            Err(err) => {
                decoded.rejected.push(format!("'{key}': {err}"));
                continue;
            }
        };
        let record = match serde_json::from_value::<StoredBoard>(value) {
            Ok(record) => record,
            Err(err) => {
                decoded.rejected.push(format!("'{key}': {err}"));
                continue;
            }
        };
        let mut repairs = Vec::new();
        let board = record.into_board(id.clone(), &mut repairs);
        decoded
            .repaired
            .extend(repairs.into_iter().map(|note| format!("'{key}': {note}")));
        decoded.boards.insert(id, board);
    }
    Ok(decoded)
}

fn encode_boards(boards: &BoardMap) -> Result<Vec<u8>> {
    let records: BTreeMap<&str, StoredBoard> = boards
        .iter()
        .map(|(id, board)| (id.as_str(), StoredBoard::from_board(board)))
        .collect();
    let mut payload =
        serde_json::to_vec_pretty(&records).context("failed to encode scoreboards")?;
    payload.push(b'\n');
    Ok(payload)
}

#[cfg(test)]
#[path = "tests/persistence_tests.rs"]
mod tests;
