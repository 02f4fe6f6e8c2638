use std::sync::Arc;
use std::time::Duration;

use domain::driver::{ScaleLink, ScaleReader, ScaleWriter};
use infrastructure::{FrameBuffer, WeightFrameParser};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::Shared;

/// Sent once right after open: wake, print, query. Scales ignore what they do not support.
pub const WAKE_SEQUENCE: [&[u8]; 3] = [b"\r", b"P\r", b"Q\r"];
/// Repeated on the poll interval.
pub const POLL_COMMAND: &[u8] = b"P\r";

const READ_CHUNK_SIZE: usize = 256;

#[derive(Debug)]
pub(crate) enum LinkCommand {
    StartPolling(Duration),
    StopPolling,
}

fn poll_timer(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

async fn next_poll(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// A command that sits in the driver longer than this is abandoned.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

async fn write_best_effort(writer: &mut Box<dyn ScaleWriter>, command: &[u8]) {
    match timeout(WRITE_TIMEOUT, writer.write_command(command)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            debug!(command = ?String::from_utf8_lossy(command), error = %e, "Command write ignored")
        }
        Err(_) => {
            debug!(command = ?String::from_utf8_lossy(command), "Command write timed out")
        }
    }
}

/// Returns `false` when cancellation won the race against the write.
async fn write_unless_cancelled(
    writer: &mut Box<dyn ScaleWriter>,
    command: &[u8],
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => false,
        _ = write_best_effort(writer, command) => true,
    }
}

/// Sole owner of an open link: every write goes through here, reads are processed in
/// arrival order, and the poll timer lives and dies with the task.
pub(crate) async fn run_link(
    link: ScaleLink,
    shared: Arc<Shared>,
    parser: Arc<WeightFrameParser>,
    cancel: CancellationToken,
    commands: mpsc::UnboundedReceiver<LinkCommand>,
    poll_interval: Duration,
) {
    let ScaleLink {
        mut reader,
        mut writer,
    } = link;

    drive(
        &mut reader,
        &mut writer,
        &shared,
        &parser,
        &cancel,
        commands,
        poll_interval,
    )
    .await;

    // Stop listening before the handle goes away
    drop(reader);
    if timeout(SHUTDOWN_TIMEOUT, writer.shutdown()).await.is_err() {
        warn!("Serial writer shutdown timed out, releasing handle");
    }
}

async fn drive(
    reader: &mut Box<dyn ScaleReader>,
    writer: &mut Box<dyn ScaleWriter>,
    shared: &Shared,
    parser: &WeightFrameParser,
    cancel: &CancellationToken,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    poll_interval: Duration,
) {
    for command in WAKE_SEQUENCE {
        if !write_unless_cancelled(writer, command, cancel).await {
            debug!("Link task cancelled during wake sequence");
            return;
        }
    }

    info!(interval_ms = poll_interval.as_millis() as u64, "Starting poll loop");
    let mut poll = Some(poll_timer(poll_interval));
    let mut frames = FrameBuffer::new();
    let mut buf = [0u8; READ_CHUNK_SIZE];

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Link task cancelled");
                return;
            }
            Some(command) = commands.recv() => match command {
                LinkCommand::StartPolling(period) => {
                    info!(interval_ms = period.as_millis() as u64, "Polling started");
                    poll = Some(poll_timer(period));
                }
                LinkCommand::StopPolling => {
                    info!("Polling stopped");
                    poll = None;
                }
            },
            _ = next_poll(&mut poll) => {
                if !write_unless_cancelled(writer, POLL_COMMAND, cancel).await {
                    debug!("Link task cancelled during poll write");
                    return;
                }
            }
            result = reader.read_chunk(&mut buf) => match result {
                Ok(0) => {
                    shared.fault("Serial link closed by device");
                    return;
                }
                Ok(n) => shared.ingest(&buf[..n], &mut frames, parser),
                Err(e) => {
                    shared.fault(e.to_string());
                    return;
                }
            },
        }
    }
}
