//! Follow the supervisor until interrupted

use libtether_core::{EventCategory, HealthMonitor, TetherError};
use libtether_http::{EventFeedClient, HeartbeatClient, HttpProbe, StreamStatus};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::commands::activate::activate;
use crate::commands::status;
use crate::context::TetherContext;
use crate::output::{output_line, print_human};

enum Flow<T> {
    Item(T),
    Skip,
    Closed,
}

fn flow<T>(result: Result<T, RecvError>, channel: &str) -> Flow<T> {
    match result {
        Ok(item) => Flow::Item(item),
        Err(RecvError::Lagged(skipped)) => {
            debug!(channel, skipped, "subscriber lagged");
            Flow::Skip
        }
        Err(RecvError::Closed) => Flow::Closed,
    }
}

pub async fn run(
    cli: &Cli,
    no_activate: bool,
    categories: Vec<EventCategory>,
    no_beats: bool,
) -> Result<(), TetherError> {
    let ctx = TetherContext::resolve(cli)?;
    let config = &ctx.config;

    if !no_activate {
        let outcome = activate(config).await?;
        output_line(cli, "activation", &outcome, || format!("activation: {}", outcome));
    }

    let heartbeat = HeartbeatClient::from_config(config)?;
    let feed = EventFeedClient::from_config(config)?;
    let monitor = HealthMonitor::new(
        HttpProbe::supervisor(config)?,
        HttpProbe::dashboard(config)?,
        config.probe_timeout(),
    );

    let mut beats = heartbeat.subscribe_beats();
    let mut beat_status = heartbeat.subscribe_status();
    let mut events = feed.subscribe_all();
    let mut feed_status = feed.subscribe_status();
    let mut changes = monitor.events().subscribe_changed();

    heartbeat.start();
    feed.start();
    monitor.start_polling(config.poll_interval());
    info!("watching supervisor");
    print_human(cli, "Watching the supervisor; press Ctrl+C to stop");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("received shutdown signal");
                break;
            }
            received = beats.recv() => match flow(received, "beats") {
                Flow::Item(beat) => {
                    if !no_beats {
                        output_line(cli, "beat", &beat, || format!(
                            "beat: pool={} healthy={} proxy_port={}",
                            beat.pool_instances, beat.mcp_healthy, beat.mcp_proxy_port
                        ));
                    }
                }
                Flow::Skip => {}
                Flow::Closed => break,
            },
            received = events.recv() => match flow(received, "events") {
                Flow::Item(event) => {
                    let wanted = categories.is_empty()
                        || event.category().map(|c| categories.contains(&c)).unwrap_or(false);
                    if wanted {
                        output_line(cli, "event", &event, || {
                            let category = event.category().map(|c| c.as_str()).unwrap_or("other");
                            format!("event: [{}] {} {}", category, event.event_type, event.id)
                        });
                    }
                }
                Flow::Skip => {}
                Flow::Closed => break,
            },
            received = beat_status.recv() => match flow(received, "heartbeat status") {
                Flow::Item(status) => print_status(cli, "heartbeat", status),
                Flow::Skip => {}
                Flow::Closed => break,
            },
            received = feed_status.recv() => match flow(received, "events status") {
                Flow::Item(status) => print_status(cli, "events", status),
                Flow::Skip => {}
                Flow::Closed => break,
            },
            received = changes.recv() => match flow(received, "health") {
                Flow::Item(change) => {
                    output_line(cli, "health", &change.snapshot, || format!(
                        "health: {} -> {}\n{}",
                        change.transition.from,
                        change.transition.to,
                        status::render(&change.snapshot)
                    ));
                }
                Flow::Skip => {}
                Flow::Closed => break,
            },
        }
    }

    heartbeat.dispose();
    feed.dispose();
    monitor.stop_polling();
    Ok(())
}

fn print_status(cli: &Cli, stream: &str, status: StreamStatus) {
    let (label, delay_ms) = match status {
        StreamStatus::Connected => ("connected", None),
        StreamStatus::Restored => ("restored", None),
        StreamStatus::Lost => ("lost", None),
        StreamStatus::ReconnectScheduled(delay) => ("reconnect_scheduled", Some(delay.as_millis() as u64)),
    };
    let data = json!({ "stream": stream, "status": label, "delay_ms": delay_ms });
    output_line(cli, "stream", &data, || match delay_ms {
        Some(ms) => format!("{}: reconnecting in {}ms", stream, ms),
        None => format!("{}: {}", stream, label),
    });
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
