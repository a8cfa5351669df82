use std::{collections::HashMap, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use shared::{
    domain::{
        checked_score, normalize_title, ConversationId, PlayerName, Round, Scoreboard, ZeroStyle,
    },
    error::BoardError,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::persistence::{BoardMap, BoardPersistence, JsonFilePersistence};

type KeyLock = Arc<Mutex<()>>;

struct Committed {
    boards: BoardMap,
    /// Bumped on every commit; orders snapshots for the writer.
    seq: u64,
}

/// All scoreboards of the process. Mutations on one conversation are
/// serialized by a per-conversation lock and written through to the
/// persistence adapter before the call returns.
pub struct ScoreboardStore {
    state: RwLock<Committed>,
    key_locks: Mutex<HashMap<ConversationId, KeyLock>>,
    /// Sequence number of the newest snapshot that reached storage.
    writer: Mutex<u64>,
    persistence: Arc<dyn BoardPersistence>,
}

impl ScoreboardStore {
    pub async fn open(persistence: Arc<dyn BoardPersistence>) -> Result<Self> {
        let boards = persistence
            .load()
            .await
            .context("failed to load persisted scoreboards")?;
        info!(boards = boards.len(), "scoreboard store ready");
        Ok(Self {
            state: RwLock::new(Committed { boards, seq: 0 }),
            key_locks: Mutex::new(HashMap::new()),
            writer: Mutex::new(0),
            persistence,
        })
    }

    pub async fn open_json(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(Arc::new(JsonFilePersistence::new(path))).await
    }

    pub async fn start(
        &self,
        id: &ConversationId,
        player_a: &str,
        player_b: &str,
        title: Option<&str>,
    ) -> Result<Scoreboard, BoardError> {
        self.mutate(id, |current| {
            if current.is_some() {
                return Err(BoardError::AlreadyExists(id.clone()));
            }
            let board = Scoreboard::new(
                id.clone(),
                PlayerName::parse(player_a)?,
                PlayerName::parse(player_b)?,
                normalize_title(title)?,
            );
            Ok((Some(board.clone()), board))
        })
        .await
    }

    /// Appends a round; its number is the new round count.
    pub async fn add_round(
        &self,
        id: &ConversationId,
        score_a: i64,
        score_b: i64,
    ) -> Result<Scoreboard, BoardError> {
        self.update(id, |board| {
            let round = Round {
                score_a: checked_score(score_a, "A")?,
                score_b: checked_score(score_b, "B")?,
            };
            board.rounds.push(round);
            Ok(())
        })
        .await
    }

    pub async fn edit_round(
        &self,
        id: &ConversationId,
        round_no: i64,
        score_a: Option<i64>,
        score_b: Option<i64>,
    ) -> Result<Scoreboard, BoardError> {
        self.update(id, |board| {
            if score_a.is_none() && score_b.is_none() {
                return Err(BoardError::InvalidInput(
                    "edit needs a new score for player A, player B, or both".into(),
                ));
            }
            let count = board.round_count();
            let round = usize::try_from(round_no)
                .ok()
                .and_then(|no| no.checked_sub(1))
                .and_then(|idx| board.rounds.get_mut(idx))
                .ok_or(BoardError::RoundNotFound {
                    requested: round_no,
                    count,
                })?;
            let new_a = score_a.map(|s| checked_score(s, "A")).transpose()?;
            let new_b = score_b.map(|s| checked_score(s, "B")).transpose()?;
            if let Some(a) = new_a {
                round.score_a = a;
            }
            if let Some(b) = new_b {
                round.score_b = b;
            }
            Ok(())
        })
        .await
    }

    /// Drops the highest-numbered round and hands it back.
    pub async fn undo(&self, id: &ConversationId) -> Result<(Round, Scoreboard), BoardError> {
        self.mutate(id, |current| {
            let mut board = current.ok_or_else(|| BoardError::NotFound(id.clone()))?;
            let removed = board.rounds.pop().ok_or(BoardError::EmptyBoard)?;
            Ok((Some(board.clone()), (removed, board)))
        })
        .await
    }

    /// Changes only the fields that are given. An empty title clears it.
    pub async fn rename(
        &self,
        id: &ConversationId,
        player_a: Option<&str>,
        player_b: Option<&str>,
        title: Option<&str>,
    ) -> Result<Scoreboard, BoardError> {
        self.update(id, |board| {
            if player_a.is_none() && player_b.is_none() && title.is_none() {
                return Err(BoardError::InvalidInput(
                    "rename needs a player name or a title".into(),
                ));
            }
            if let Some(name) = player_a {
                board.player_a = PlayerName::parse(name)?;
            }
            if let Some(name) = player_b {
                board.player_b = PlayerName::parse(name)?;
            }
            if title.is_some() {
                board.title = normalize_title(title)?;
            }
            Ok(())
        })
        .await
    }

    pub async fn reset(&self, id: &ConversationId) -> Result<Scoreboard, BoardError> {
        self.update(id, |board| {
            board.rounds.clear();
            Ok(())
        })
        .await
    }

    /// Removes the board with all of its rounds and returns what was removed.
    pub async fn delete(&self, id: &ConversationId) -> Result<Scoreboard, BoardError> {
        self.mutate(id, |current| {
            let board = current.ok_or_else(|| BoardError::NotFound(id.clone()))?;
            Ok((None, board))
        })
        .await
    }

    pub async fn set_zero_style(
        &self,
        id: &ConversationId,
        style: ZeroStyle,
    ) -> Result<Scoreboard, BoardError> {
        self.update(id, |board| {
            board.zero_style = style;
            Ok(())
        })
        .await
    }

    pub async fn show(&self, id: &ConversationId) -> Result<Scoreboard, BoardError> {
        self.state
            .read()
            .await
            .boards
            .get(id)
            .cloned()
            .ok_or_else(|| BoardError::NotFound(id.clone()))
    }

    pub async fn list(&self) -> Vec<ConversationId> {
        self.state.read().await.boards.keys().cloned().collect()
    }

    /// Writes the current mapping unless it is already the newest one on disk.
    pub async fn flush(&self) -> Result<(), BoardError> {
        let (seq, snapshot) = {
            let state = self.state.read().await;
            (state.seq, state.boards.clone())
        };
        if self.persist(seq, &snapshot).await? {
            info!(seq, boards = snapshot.len(), "flushed scoreboards to storage");
        }
        Ok(())
    }

    async fn update<F>(&self, id: &ConversationId, apply: F) -> Result<Scoreboard, BoardError>
    where
        F: FnOnce(&mut Scoreboard) -> Result<(), BoardError>,
    {
        self.mutate(id, |current| {
            let mut board = current.ok_or_else(|| BoardError::NotFound(id.clone()))?;
            apply(&mut board)?;
            Ok((Some(board.clone()), board))
        })
        .await
    }

    /// Runs `op` on a copy of the conversation's board while holding its key
    /// lock. `op` returns the board to commit (`None` removes it) plus the
    /// caller's value. Nothing is committed when `op` fails.
    async fn mutate<T, F>(&self, id: &ConversationId, op: F) -> Result<T, BoardError>
    where
        F: FnOnce(Option<Scoreboard>) -> Result<(Option<Scoreboard>, T), BoardError>,
    {
        let key_lock = self.key_lock(id).await;
        let outcome = {
            let _guard = key_lock.lock().await;
            self.commit(id, op).await
        };
        drop(key_lock);
        self.release_key_lock(id).await;
        outcome
    }

    async fn commit<T, F>(&self, id: &ConversationId, op: F) -> Result<T, BoardError>
    where
        F: FnOnce(Option<Scoreboard>) -> Result<(Option<Scoreboard>, T), BoardError>,
    {
        let current = self.state.read().await.boards.get(id).cloned();
        let (next, value) = op(current)?;

        let (seq, snapshot) = {
            let mut state = self.state.write().await;
            match next {
                Some(board) => {
                    state.boards.insert(id.clone(), board);
                }
                None => {
                    state.boards.remove(id);
                }
            }
            state.seq += 1;
            (state.seq, state.boards.clone())
        };
        debug!(conversation_id = %id, seq, "scoreboard change committed");

        self.persist(seq, &snapshot).await?;
        Ok(value)
    }

    /// Returns whether `snapshot` was written; `false` when a newer one
    /// already reached storage.
    async fn persist(&self, seq: u64, snapshot: &BoardMap) -> Result<bool, BoardError> {
        let mut last_written = self.writer.lock().await;
        if seq <= *last_written {
            debug!(
                seq,
                last_written = *last_written,
                "snapshot already superseded on disk"
            );
            return Ok(false);
        }
        match self.persistence.save(snapshot).await {
            Ok(()) => {
                *last_written = seq;
                Ok(true)
            }
            Err(err) => {
                error!(
                    seq,
                    error = %format!("{err:#}"),
                    "failed to persist scoreboards; in-memory state kept"
                );
                Err(BoardError::Persistence(format!("{err:#}")))
            }
        }
    }

    async fn key_lock(&self, id: &ConversationId) -> KeyLock {
        self.key_locks
            .lock()
            .await
            .entry(id.clone())
            .or_default()
            .clone()
    }

    /// Forgets the lock of a conversation that has no board, once nobody
    /// holds or waits on it. Clones only happen under the map lock, so a
    /// strong count of one means the map's own handle is the last.
    async fn release_key_lock(&self, id: &ConversationId) {
        let mut locks = self.key_locks.lock().await;
        let idle = locks
            .get(id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle && !self.state.read().await.boards.contains_key(id) {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    async fn tracked_key_locks(&self) -> usize {
        self.key_locks.lock().await.len()
    }
}

#[cfg(test)]
#[path = "tests/board_store_tests.rs"]
mod tests;
