use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex, PoisonError,
};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::persistence::{BoardMap, BoardPersistence};

/// Keeps the last saved mapping in memory. Counts saves and can be told to
/// fail them, which makes write-through behaviour observable in tests and
/// gives a host without a disk something to run on.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    saved: Mutex<BoardMap>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_boards(boards: BoardMap) -> Self {
        Self {
            saved: Mutex::new(boards),
            ..Self::default()
        }
    }

    pub fn saved(&self) -> BoardMap {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BoardPersistence for MemoryPersistence {
    async fn load(&self) -> Result<BoardMap> {
        Ok(self.saved())
    }

    async fn save(&self, boards: &BoardMap) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            bail!("simulated write failure");
        }
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = boards.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
