use super::*;
use crate::memory::MemoryPersistence;
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::Notify;

/// Parks every save until the test releases it.
#[derive(Default)]
struct GatedPersistence {
    boards: BoardMap,
    entered: Notify,
    release: Notify,
}

#[async_trait::async_trait]
impl BoardPersistence for GatedPersistence {
    async fn load(&self) -> anyhow::Result<BoardMap> {
        Ok(self.boards.clone())
    }

    async fn save(&self, _boards: &BoardMap) -> anyhow::Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

async fn setup() -> (Arc<ScoreboardStore>, Arc<MemoryPersistence>, ConversationId) {
    let persistence = Arc::new(MemoryPersistence::new());
    let store = ScoreboardStore::open(persistence.clone())
        .await
        .expect("store");
    let id = ConversationId::new("10:20:0").expect("id");
    (Arc::new(store), persistence, id)
}

async fn started() -> (Arc<ScoreboardStore>, Arc<MemoryPersistence>, ConversationId) {
    let (store, persistence, id) = setup().await;
    store
        .start(&id, "Alice", "Bob", None)
        .await
        .expect("start");
    (store, persistence, id)
}

fn scores(board: &Scoreboard) -> Vec<(u64, u64)> {
    board
        .rounds
        .iter()
        .map(|round| (round.score_a, round.score_b))
        .collect()
}

#[tokio::test]
async fn start_creates_an_empty_dash_board() {
    let (store, persistence, id) = setup().await;
    let board = store
        .start(&id, "Alice", "Bob", Some("Finals"))
        .await
        .expect("start");
    assert!(board.rounds.is_empty());
    assert_eq!(board.zero_style, ZeroStyle::Dash);
    assert_eq!(board.title.as_deref(), Some("Finals"));
    assert_eq!(persistence.save_count(), 1);
    assert_eq!(persistence.saved().get(&id), Some(&board));
}

#[tokio::test]
async fn start_twice_is_already_exists() {
    let (store, persistence, id) = started().await;
    let err = store
        .start(&id, "Carol", "Dave", None)
        .await
        .expect_err("should fail");
    assert!(matches!(err, BoardError::AlreadyExists(_)));
    assert_eq!(store.show(&id).await.expect("show").player_a.as_str(), "Alice");
    assert_eq!(persistence.save_count(), 1);
}

#[tokio::test]
async fn start_truncates_long_names_and_rejects_non_ascii() {
    let (store, _, id) = setup().await;
    let err = store
        .start(&id, "Alice", "ボブ", None)
        .await
        .expect_err("should fail");
    assert!(matches!(err, BoardError::InvalidInput(_)));
    assert!(matches!(store.show(&id).await, Err(BoardError::NotFound(_))));

    let board = store
        .start(&id, "Maximilian", "Bob", None)
        .await
        .expect("start");
    assert_eq!(board.player_a.as_str(), "Maximili");
}

#[tokio::test]
async fn operations_without_a_board_are_not_found() {
    let (store, persistence, id) = setup().await;
    let results = vec![
        store.add_round(&id, 1, 2).await.map(|_| ()),
        store.edit_round(&id, 1, Some(1), None).await.map(|_| ()),
        store.undo(&id).await.map(|_| ()),
        store.rename(&id, Some("X"), None, None).await.map(|_| ()),
        store.reset(&id).await.map(|_| ()),
        store.delete(&id).await.map(|_| ()),
        store.set_zero_style(&id, ZeroStyle::Zero).await.map(|_| ()),
        store.show(&id).await.map(|_| ()),
    ];
    for result in results {
        assert!(matches!(result, Err(BoardError::NotFound(_))));
    }
    assert_eq!(persistence.save_count(), 0);
    assert_eq!(store.tracked_key_locks().await, 0);
}

#[tokio::test]
async fn added_rounds_are_numbered_in_call_order() {
    let (store, persistence, id) = started().await;
    for n in 1..=5_i64 {
        let board = store.add_round(&id, n, 10 - n).await.expect("add");
        assert_eq!(board.round_count() as i64, n);
        assert_eq!(board.round(n as usize).expect("round").score_a, n as u64);
    }
    assert_eq!(persistence.save_count(), 6);
}

#[tokio::test]
async fn negative_scores_change_nothing() {
    let (store, persistence, id) = started().await;
    let err = store.add_round(&id, 3, -1).await.expect_err("should fail");
    assert!(matches!(err, BoardError::InvalidInput(_)));
    assert!(store.show(&id).await.expect("show").rounds.is_empty());
    assert_eq!(persistence.save_count(), 1);
}

#[tokio::test]
async fn edit_replaces_only_the_given_score() {
    let (store, _, id) = started().await;
    store.add_round(&id, 1, 2).await.expect("add");
    store.add_round(&id, 3, 4).await.expect("add");
    store.add_round(&id, 5, 6).await.expect("add");

    let board = store
        .edit_round(&id, 2, Some(30), None)
        .await
        .expect("edit");
    assert_eq!(scores(&board), vec![(1, 2), (30, 4), (5, 6)]);

    let board = store
        .edit_round(&id, 3, None, Some(0))
        .await
        .expect("edit");
    assert_eq!(scores(&board), vec![(1, 2), (30, 4), (5, 0)]);
}

#[tokio::test]
async fn edit_out_of_range_is_round_not_found() {
    let (store, persistence, id) = started().await;
    store.add_round(&id, 1, 2).await.expect("add");
    store.add_round(&id, 3, 4).await.expect("add");
    let before = store.show(&id).await.expect("show");

    for round_no in [0, -1, 3, 5] {
        let err = store
            .edit_round(&id, round_no, Some(9), Some(9))
            .await
            .expect_err("should fail");
        assert_eq!(
            err,
            BoardError::RoundNotFound {
                requested: round_no,
                count: 2
            }
        );
    }
    assert_eq!(store.show(&id).await.expect("show"), before);
    assert_eq!(persistence.save_count(), 3);
}

#[tokio::test]
async fn edit_needs_at_least_one_score_and_valid_values() {
    let (store, _, id) = started().await;
    store.add_round(&id, 1, 2).await.expect("add");

    let err = store
        .edit_round(&id, 1, None, None)
        .await
        .expect_err("should fail");
    assert!(matches!(err, BoardError::InvalidInput(_)));

    let err = store
        .edit_round(&id, 1, Some(7), Some(-3))
        .await
        .expect_err("should fail");
    assert!(matches!(err, BoardError::InvalidInput(_)));
    assert_eq!(scores(&store.show(&id).await.expect("show")), vec![(1, 2)]);
}

#[tokio::test]
async fn undo_removes_only_the_last_round() {
    let (store, _, id) = started().await;
    store.add_round(&id, 1, 2).await.expect("add");
    store.add_round(&id, 3, 4).await.expect("add");
    store.add_round(&id, 5, 6).await.expect("add");

    let (removed, board) = store.undo(&id).await.expect("undo");
    assert_eq!(removed, Round { score_a: 5, score_b: 6 });
    assert_eq!(scores(&board), vec![(1, 2), (3, 4)]);
    assert_eq!(store.show(&id).await.expect("show"), board);

    let board = store.add_round(&id, 7, 8).await.expect("add");
    assert_eq!(board.round(3), Some(&Round { score_a: 7, score_b: 8 }));
}

#[tokio::test]
async fn undo_on_empty_board_changes_nothing() {
    let (store, persistence, id) = started().await;
    let saved_before = persistence.saved();

    let err = store.undo(&id).await.expect_err("should fail");
    assert_eq!(err, BoardError::EmptyBoard);
    assert_eq!(persistence.save_count(), 1);
    assert_eq!(persistence.saved(), saved_before);
}

#[tokio::test]
async fn rename_keeps_unspecified_fields() {
    let (store, _, id) = setup().await;
    store
        .start(&id, "Alice", "Bob", Some("Cup"))
        .await
        .expect("start");

    let board = store
        .rename(&id, None, Some("Robert"), None)
        .await
        .expect("rename");
    assert_eq!(board.player_a.as_str(), "Alice");
    assert_eq!(board.player_b.as_str(), "Robert");
    assert_eq!(board.title.as_deref(), Some("Cup"));

    let board = store
        .rename(&id, None, None, Some(""))
        .await
        .expect("clear title");
    assert_eq!(board.title, None);
}

#[tokio::test]
async fn rename_is_all_or_nothing() {
    let (store, persistence, id) = started().await;
    let err = store
        .rename(&id, Some("Carol"), Some("ダン"), Some("New"))
        .await
        .expect_err("should fail");
    assert!(matches!(err, BoardError::InvalidInput(_)));

    let board = store.show(&id).await.expect("show");
    assert_eq!(board.player_a.as_str(), "Alice");
    assert_eq!(board.title, None);
    assert_eq!(persistence.save_count(), 1);

    let err = store
        .rename(&id, None, None, None)
        .await
        .expect_err("should fail");
    assert!(matches!(err, BoardError::InvalidInput(_)));
}

#[tokio::test]
async fn reset_clears_rounds_and_keeps_the_rest() {
    let (store, _, id) = setup().await;
    store
        .start(&id, "Alice", "Bob", Some("League"))
        .await
        .expect("start");
    store
        .set_zero_style(&id, ZeroStyle::Zero)
        .await
        .expect("style");
    store.add_round(&id, 4, 1).await.expect("add");
    let before = store.show(&id).await.expect("show");

    let board = store.reset(&id).await.expect("reset");
    assert!(board.rounds.is_empty());
    assert_eq!(board.player_a, before.player_a);
    assert_eq!(board.player_b, before.player_b);
    assert_eq!(board.title, before.title);
    assert_eq!(board.zero_style, ZeroStyle::Zero);
}

#[tokio::test]
async fn delete_removes_the_board_and_allows_a_new_start() {
    let (store, persistence, id) = started().await;
    store.add_round(&id, 1, 1).await.expect("add");

    let removed = store.delete(&id).await.expect("delete");
    assert_eq!(removed.round_count(), 1);
    assert!(matches!(store.show(&id).await, Err(BoardError::NotFound(_))));
    assert!(persistence.saved().is_empty());
    assert_eq!(store.tracked_key_locks().await, 0);

    let board = store
        .start(&id, "Carol", "Dave", None)
        .await
        .expect("restart");
    assert!(board.rounds.is_empty());
}

#[tokio::test]
async fn list_returns_sorted_conversations() {
    let (store, _, _) = setup().await;
    for key in ["b:1:0", "a:1:0", "c:1:0"] {
        let id = ConversationId::new(key).expect("id");
        store.start(&id, "A", "B", None).await.expect("start");
    }
    let listed: Vec<String> = store
        .list()
        .await
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(listed, vec!["a:1:0", "b:1:0", "c:1:0"]);
}

#[tokio::test]
async fn failed_save_keeps_the_mutation_in_memory() {
    let (store, persistence, id) = started().await;
    persistence.set_fail_saves(true);

    let err = store.add_round(&id, 2, 1).await.expect_err("should fail");
    assert!(matches!(err, BoardError::Persistence(_)));
    assert_eq!(store.show(&id).await.expect("show").round_count(), 1);
    assert!(persistence.saved()[&id].rounds.is_empty());

    persistence.set_fail_saves(false);
    store.flush().await.expect("flush");
    assert_eq!(persistence.saved()[&id].round_count(), 1);
    assert_eq!(persistence.save_count(), 2);
}

#[tokio::test]
async fn flush_skips_when_disk_is_current() {
    let (store, persistence, _) = started().await;
    store.flush().await.expect("flush");
    assert_eq!(persistence.save_count(), 1);
}

#[tokio::test]
async fn stale_snapshot_never_overwrites_a_newer_one() {
    let (store, persistence, id) = started().await;
    let mut older = BoardMap::new();
    older.insert(id.clone(), store.show(&id).await.expect("show"));
    let newer = BoardMap::new();

    assert!(store.persist(10, &newer).await.expect("newer"));
    assert!(!store.persist(9, &older).await.expect("older is skipped"));
    assert!(persistence.saved().is_empty());
}

#[tokio::test]
async fn concurrent_adds_on_one_conversation_are_all_kept() {
    let (store, persistence, id) = started().await;
    let adds = (0..40_i64).map(|n| {
        let store = store.clone();
        let id = id.clone();
        tokio::spawn(async move { store.add_round(&id, n, 0).await })
    });
    for result in join_all(adds).await {
        result.expect("task").expect("add");
    }

    let board = store.show(&id).await.expect("show");
    assert_eq!(board.round_count(), 40);
    let mut seen: Vec<u64> = board.rounds.iter().map(|r| r.score_a).collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..40).collect::<Vec<u64>>());
    assert_eq!(persistence.saved()[&id].round_count(), 40);
}

#[tokio::test]
async fn same_conversation_waits_while_other_conversations_proceed() {
    let (store, _, id) = started().await;
    let other = ConversationId::new("10:21:0").expect("id");
    store.start(&other, "Carol", "Dave", None).await.expect("start");

    let held = store.key_lock(&id).await;
    let guard = held.lock().await;

    let blocked = {
        let store = store.clone();
        let id = id.clone();
        tokio::spawn(async move { store.add_round(&id, 1, 1).await })
    };
    tokio::time::timeout(Duration::from_secs(1), store.add_round(&other, 2, 2))
        .await
        .expect("other conversation is not blocked")
        .expect("add");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!blocked.is_finished());
    assert!(store.show(&id).await.expect("show").rounds.is_empty());

    drop(guard);
    drop(held);
    blocked.await.expect("task").expect("add");
    assert_eq!(store.show(&id).await.expect("show").round_count(), 1);
}

#[tokio::test]
async fn show_during_an_in_flight_mutation_sees_a_whole_board() {
    let id = ConversationId::new("10:20:0").expect("id");
    let mut boards = BoardMap::new();
    boards.insert(
        id.clone(),
        Scoreboard::new(
            id.clone(),
            PlayerName::parse("Alice").expect("a"),
            PlayerName::parse("Bob").expect("b"),
            None,
        ),
    );
    let gate = Arc::new(GatedPersistence {
        boards,
        ..GatedPersistence::default()
    });
    let store = Arc::new(ScoreboardStore::open(gate.clone()).await.expect("store"));

    let adding = {
        let store = store.clone();
        let id = id.clone();
        tokio::spawn(async move { store.add_round(&id, 5, 1).await })
    };
    gate.entered.notified().await;

    let seen = tokio::time::timeout(Duration::from_secs(1), store.show(&id))
        .await
        .expect("show does not wait for the save")
        .expect("show");
    assert!(matches!(scores(&seen).as_slice(), [] | [(5, 1)]));
    assert!(!adding.is_finished());

    gate.release.notify_one();
    let board = adding.await.expect("task").expect("add");
    assert_eq!(scores(&board), vec![(5, 1)]);
    assert_eq!(scores(&store.show(&id).await.expect("show")), vec![(5, 1)]);
}
