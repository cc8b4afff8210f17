//! `track`: run a tracking session against a position feed.
//!
//! Every session event is printed to stdout as one JSON line. The command
//! returns once the feed ends, a terminal position error stops tracking, or
//! the user hits Ctrl-C. A final `StateSnapshot` line closes the output.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use georeminder_core::notify::{
    CommandSpeaker, ConsoleNotifier, LogHaptics, NotificationDispatcher, SilentSpeaker, Speaker,
};
use georeminder_core::storage::NotificationsConfig;
use georeminder_core::tracking::{LineSource, PositionSource, ReplaySource, Track};
use georeminder_core::{Config, Event, TrackingSession, WatchOptions};
use tokio::io::BufReader;
use tokio::sync::broadcast::error::RecvError;

#[derive(Args)]
pub struct TrackArgs {
    /// Replay a scripted track file (JSON or TOML)
    #[arg(long, value_name = "FILE", conflicts_with = "stdin", required_unless_present = "stdin")]
    replay: Option<PathBuf>,
    /// Read "lat,lng[,accuracy]" lines from stdin
    #[arg(long)]
    stdin: bool,
    /// Use this delay between replay steps instead of the scripted ones
    #[arg(long, value_name = "MS", requires = "replay")]
    interval_ms: Option<u64>,
    /// Per-fix timeout (default: tracking.timeout_ms, 0 disables)
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,
    /// Do not vibrate, notify or speak on trigger
    #[arg(long)]
    no_alerts: bool,
}

pub fn run(args: TrackArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let mut options = config.tracking.watch_options();
    if let Some(timeout_ms) = args.timeout_ms {
        options.timeout_ms = timeout_ms;
    }
    let source = build_source(&args)?;
    let dispatcher = if args.no_alerts {
        NotificationDispatcher::silent()
    } else {
        build_dispatcher(&config.notifications)
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(track(source, dispatcher, options));
    // A pending stdin read would otherwise hold shutdown open.
    runtime.shutdown_timeout(Duration::from_secs(2));
    result
}

fn build_source(args: &TrackArgs) -> Result<Arc<dyn PositionSource>, Box<dyn std::error::Error>> {
    match &args.replay {
        Some(path) => {
            let mut track = Track::from_path(path)?;
            if let Some(interval) = args.interval_ms {
                for step in &mut track.steps {
                    step.delay_ms = interval;
                }
            }
            Ok(Arc::new(ReplaySource::new(track)))
        }
        None => Ok(Arc::new(LineSource::new(BufReader::new(tokio::io::stdin())))),
    }
}

fn build_dispatcher(config: &NotificationsConfig) -> NotificationDispatcher {
    let speaker: Arc<dyn Speaker> = match config
        .speech_command
        .as_deref()
        .and_then(CommandSpeaker::from_command_line)
    {
        Some(speaker) => Arc::new(speaker),
        None => Arc::new(SilentSpeaker),
    };
    NotificationDispatcher::new(
        Arc::new(LogHaptics),
        Arc::new(ConsoleNotifier::granted()),
        speaker,
        config.dispatcher_config(),
    )
}

async fn track(
    source: Arc<dyn PositionSource>,
    dispatcher: NotificationDispatcher,
    options: WatchOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = super::reminder::open_store()?;
    let (handle, join) = TrackingSession::spawn(store, source, dispatcher, options);
    let mut events = handle.subscribe();
    handle.start().await?;

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    println!("{}", serde_json::to_string(&event)?);
                    if matches!(event, Event::TrackingStopped { .. }) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping");
                if !handle.stop().await? {
                    break;
                }
            }
        }
    }

    let state = handle.state().await?;
    println!("{}", serde_json::to_string(&state)?);
    handle.shutdown().await?;
    join.await?;
    Ok(())
}
