use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::{domain::ConversationId, render::render};
use storage::{JsonFilePersistence, ScoreboardStore};

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "SCOREBOARD_PATH", default_value = "scoreboards.json")]
    path: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// One line per board: id, players, rounds, totals. Read-only.
    List,
    /// Read-only.
    Show {
        conversation_id: String,
    },
    /// Goes through the store, so a corrupt file is moved aside first.
    Delete {
        conversation_id: String,
    },
    /// Parses the file without touching it.
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Validate => {
            let boards = JsonFilePersistence::new(&cli.path)
                .read_checked()
                .await?;
            let rounds: usize = boards.values().map(|b| b.round_count()).sum();
            println!(
                "ok: {} board(s), {rounds} round(s) in {}",
                boards.len(),
                cli.path
            );
        }
        Command::List => {
            let boards = JsonFilePersistence::new(&cli.path).read_snapshot().await?;
            for (id, board) in &boards {
                let (total_a, total_b) = board.totals();
                println!(
                    "{id}\t{} vs {}\trounds={}\ttotals={total_a}-{total_b}",
                    board.player_a,
                    board.player_b,
                    board.round_count()
                );
            }
        }
        Command::Show { conversation_id } => {
            let id = ConversationId::new(conversation_id)?;
            let boards = JsonFilePersistence::new(&cli.path).read_snapshot().await?;
            let board = boards
                .get(&id)
                .with_context(|| format!("no scoreboard for {id}"))?;
            print!("{}", render(board));
        }
        Command::Delete { conversation_id } => {
            let id = ConversationId::new(conversation_id)?;
            let store = ScoreboardStore::open_json(&cli.path).await?;
            let board = store
                .delete(&id)
                .await
                .with_context(|| format!("failed to delete board {id}"))?;
            println!(
                "deleted {id} ({} vs {}, {} round(s))",
                board.player_a,
                board.player_b,
                board.round_count()
            );
        }
    }

    Ok(())
}
