//! zenzrs terminal front end
//!
//! Reads `context<TAB>input` (or just `input`) lines from stdin and prints the
//! model's conversion for each one.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zenzrs::app::AppState;
use zenzrs::inference::ModelLifecycleState;
use zenzrs::storage::settings::load_settings;
use zenzrs::types::{GenerationError, GenerationRequest};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zenzrs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = load_settings();
    let state = AppState::from_settings(settings);

    let mut status = state.lifecycle.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            match &current {
                ModelLifecycleState::Loading => eprintln!("モデル読み込み中…"),
                ModelLifecycleState::Ready => eprintln!("モデル読み込み完了"),
                ModelLifecycleState::Failed(reason) => {
                    eprintln!("モデル読み込み失敗: {}", reason)
                }
                ModelLifecycleState::Unloaded => {}
            }
            if current.is_terminal() {
                break;
            }
        }
    });
    let _load = state.start_loading();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        };

        let request = match line.split_once('\t') {
            Some((context, input)) => GenerationRequest::new(context, input),
            None => GenerationRequest::without_context(line),
        };

        match state.orchestrator.generate(request).await {
            Ok(text) => println!("=> {}", text),
            Err(GenerationError::NotReady) => println!("!! {}", state.lifecycle.state()),
            Err(e) => println!("!! {}", e),
        }
    }
}
