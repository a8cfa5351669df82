use std::sync::Arc;

use server_api::ApiContext;
use storage::ScoreboardStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

mod config;
mod console;

use config::{load_settings, prepare_scoreboard_path};
use console::handle_line;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings();
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .with_writer(std::io::stderr)
        .init();

    let path = prepare_scoreboard_path(&settings.scoreboard_path)?;
    let store = ScoreboardStore::open_json(&path).await.map_err(|error| {
        error!(
            path = %path.display(),
            error = %format!("{error:#}"),
            "failed to load scoreboards; check the file and its permissions"
        );
        error
    })?;
    let ctx = ApiContext {
        store: Arc::new(store),
    };
    info!(path = %path.display(), "scoreboard host ready; reading commands from stdin");

    // Lines are handled in order so one channel's commands apply as typed.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if let Some(output) = handle_line(&ctx, &line).await {
                    println!("{output}");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
        }
    }

    ctx.store.flush().await?;
    info!("scoreboards flushed; shutting down");
    Ok(())
}
