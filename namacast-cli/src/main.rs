use std::sync::Arc;

use namacast_core::time::format_clock;
use namacast_core::{CommentEngine, Config, CoreError, ProgramEngine, ProgramEvent, WrappedChat};
use namacast_nico::{NicoApi, NicoChatTransport, NicoClassifier};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    init_tracing();

    // Load config or create template on first run
    let config = match Config::load_or_create() {
        Ok(config) => config,
        Err(CoreError::ConfigNotFound { path }) => {
            eprintln!("A configuration file has been created at {}.", path.display());
            eprintln!(
                "Edit it with the user_session cookie of a logged-in broadcaster \
                 account, then run namacast again."
            );
            std::process::exit(0);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let api = match NicoApi::from_config(&config) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            error!("Failed to initialize the provider client: {e}");
            std::process::exit(1);
        }
    };

    // Shared cancellation token for graceful shutdown
    let cancel_token = CancellationToken::new();

    let program_engine = ProgramEngine::new(api, cancel_token.clone());
    let comment_engine = Arc::new(CommentEngine::new(
        program_engine.clone(),
        Arc::new(NicoChatTransport::new()),
        Arc::new(NicoClassifier::new()),
        Some(cancel_token.clone()),
    ));
    let chat_log = comment_engine.log();

    // Subscribe before the initial fetch so its transition is not missed
    let program_task = tokio::spawn(log_program_events(
        program_engine.subscribe(),
        cancel_token.clone(),
    ));
    let chat_task = tokio::spawn(print_chat_entries(
        chat_log.subscribe(),
        cancel_token.clone(),
    ));
    let comment_task = comment_engine.clone().start();

    let mut exit_code = 0;
    match program_engine.fetch_program().await {
        Ok(()) => {
            info!("Press Ctrl+C to stop");
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {e}");
            }
            info!("Received Ctrl+C, shutting down gracefully...");
            cancel_token.cancel();
        }
        Err(CoreError::NoSuitableSchedule) => {
            eprintln!("No user program is scheduled on this account. Reserve one and run again.");
            cancel_token.cancel();
            exit_code = 1;
        }
        Err(e) => {
            error!("Initial program fetch failed: {e}");
            cancel_token.cancel();
            exit_code = 1;
        }
    }

    let _ = comment_task.await;
    let _ = program_task.await;
    let _ = chat_task.await;

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

/// Log program transitions and statistics updates to the console
async fn log_program_events(
    mut rx: broadcast::Receiver<ProgramEvent>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            event = rx.recv() => match event {
                Ok(ProgramEvent::StateChanged { state }) => {
                    info!(
                        "Program {} ({}) is {}: on air {} to {}",
                        state.program_id,
                        state.title,
                        state.status,
                        format_clock(state.start_time),
                        format_clock(state.end_time),
                    );
                }
                Ok(ProgramEvent::StatisticsUpdated { state }) => {
                    info!(
                        "Viewers {}, comments {}, ad {}pt, gift {}pt",
                        state.viewers, state.comments, state.ad_points, state.gift_points
                    );
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Missed {n} program events");
                }
            }
        }
    }
}

/// Print appended chat-log entries, one line each
async fn print_chat_entries(
    mut rx: broadcast::Receiver<Vec<WrappedChat>>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                // Print whatever the final flush appended before stopping
                while let Ok(batch) = rx.try_recv() {
                    print_batch(&batch);
                }
                break;
            }
            batch = rx.recv() => match batch {
                Ok(batch) => print_batch(&batch),
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Missed {n} chat batches");
                }
            }
        }
    }
}

fn print_batch(batch: &[WrappedChat]) {
    for entry in batch {
        println!(
            "[{}] {:>9}  {}",
            format_clock(entry.date()),
            entry.kind,
            entry.content()
        );
    }
}

/// Initialize tracing with console output
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
