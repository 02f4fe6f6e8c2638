use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use domain::driver::{
    ConnectionState, PortCatalog, PortInfo, ScaleConnectionConfig, ScaleDriver,
    clamp_poll_interval, resolve_port,
};
use domain::event::EventPublisher;
use domain::{DomainError, ScaleEvent, StabilityClassifier, ZeroOffsetTracker};
use infrastructure::{FrameBuffer, WeightFrameParser};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use super::link_task::{LinkCommand, run_link};

const RAW_PREVIEW_LEN: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleStatus {
    pub connected: bool,
    pub last_weight_kg: f64,
    pub samples_per_minute: u64,
    pub uptime_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaleDiagnostics {
    pub driver: String,
    pub ports: Vec<PortInfo>,
    pub connected: bool,
    pub state: ConnectionState,
    pub last_weight_kg: f64,
    pub zero_offset_kg: f64,
    pub buffer_len: usize,
    pub bytes_total: u64,
    pub last_raw_preview: String,
    pub poll_interval_ms: u64,
    pub config: Option<ScaleConnectionConfig>,
}

#[derive(Debug, Default)]
struct SessionState {
    connection: ConnectionState,
    zero: ZeroOffsetTracker,
    samples: u64,
    opened_at: Option<Instant>,
    bytes_total: u64,
    pending_len: usize,
    raw_preview: String,
    active_config: Option<ScaleConnectionConfig>,
    poll_interval: Duration,
}

impl SessionState {
    fn record_raw(&mut self, bytes: &[u8], pending_len: usize) {
        self.bytes_total += bytes.len() as u64;
        self.pending_len = pending_len;
        self.raw_preview.extend(bytes.iter().map(|&b| match b {
            b'\r' | b'\n' | 0x20..=0x7e => b as char,
            _ => '.',
        }));
        let excess = self.raw_preview.len().saturating_sub(RAW_PREVIEW_LEN);
        if excess > 0 {
            // Only ASCII is ever pushed, any index is a char boundary
            self.raw_preview.drain(..excess);
        }
    }
}

/// State touched by both the link task and external callers.
pub(crate) struct Shared {
    state: Mutex<SessionState>,
    publisher: Arc<dyn EventPublisher>,
    classifier: StabilityClassifier,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feeds received bytes through framing and parsing and broadcasts the accepted
    /// readings in arrival order.
    pub(crate) fn ingest(&self, bytes: &[u8], frames: &mut FrameBuffer, parser: &WeightFrameParser) {
        let completed = frames.append(bytes);
        let mut events = Vec::with_capacity(completed.len());

        {
            let mut state = self.lock();
            state.record_raw(bytes, frames.pending_len());

            for frame in completed {
                let reading = match parser.parse(&frame) {
                    Ok(reading) => reading,
                    Err(rejected) => {
                        trace!(%rejected, "Discarding frame");
                        continue;
                    }
                };
                let gross = reading.gross_kg();
                let stable = self.classifier.resolve(
                    reading.reported_stable(),
                    state.zero.last_gross_kg(),
                    gross,
                );
                state.zero.observe(gross);
                state.samples += 1;
                events.push(ScaleEvent::weight(state.zero.to_net(gross), gross, stable));
            }
        }

        for event in &events {
            self.publisher.publish(event);
        }
    }

    /// Moves an open link to `Faulted`. No-op once a close has started.
    pub(crate) fn fault(&self, reason: impl Into<String>) {
        let reason = reason.into();
        {
            let mut state = self.lock();
            if !state.connection.is_open() {
                return;
            }
            match state.connection.to_faulted(reason.clone()) {
                Ok(next) => state.connection = next,
                Err(e) => {
                    warn!(error = e, "Ignoring fault");
                    return;
                }
            }
        }

        error!(reason = %reason, "Scale link faulted");
        self.publisher.publish(&ScaleEvent::error(reason));
        self.publisher.publish(&ScaleEvent::disconnected());
    }
}

struct ActiveLink {
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<LinkCommand>,
    task: JoinHandle<()>,
}

/// Owns the scale connection: lifecycle, poll loop, tare state and counters.
pub struct ScaleSession {
    driver: Arc<dyn ScaleDriver>,
    catalog: Arc<dyn PortCatalog>,
    parser: Arc<WeightFrameParser>,
    shared: Arc<Shared>,
    // Held across open/close so only one attempt is ever in flight
    link: tokio::sync::Mutex<Option<ActiveLink>>,
}

impl ScaleSession {
    pub fn new(
        driver: Arc<dyn ScaleDriver>,
        catalog: Arc<dyn PortCatalog>,
        publisher: Arc<dyn EventPublisher>,
        parser: WeightFrameParser,
    ) -> Self {
        Self {
            driver,
            catalog,
            parser: Arc::new(parser),
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState::default()),
                publisher,
                classifier: StabilityClassifier::new(),
            }),
            link: tokio::sync::Mutex::new(None),
        }
    }

    pub fn list_ports(&self) -> Result<Vec<PortInfo>, DomainError> {
        self.catalog.list()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shared.lock().connection.clone()
    }

    pub fn driver_type(&self) -> &str {
        self.driver.driver_type()
    }

    /// Opens `config.device_path`, closing any current connection first.
    ///
    /// Unknown devices fail with `PortNotFound` before anything changes.
    pub async fn open(&self, config: ScaleConnectionConfig) -> Result<(), DomainError> {
        config.validate()?;
        let mut slot = self.link.lock().await;

        resolve_port(self.catalog.as_ref(), &config.device_path)?;
        self.close_link(&mut slot).await;

        {
            let mut state = self.shared.lock();
            state.connection = state
                .connection
                .to_connecting()
                .map_err(|e| DomainError::Transport(e.to_string()))?;
        }

        info!(port = %config.device_path, driver = self.driver.driver_type(), "Opening scale connection");
        let link = match self.driver.open(&config).await {
            Ok(link) => link,
            Err(e) => {
                let reason = e.to_string();
                {
                    let mut state = self.shared.lock();
                    if let Ok(next) = state.connection.to_faulted(reason.clone()) {
                        state.connection = next;
                    }
                }
                error!(port = %config.device_path, error = %reason, "Failed to open scale connection");
                self.shared.publisher.publish(&ScaleEvent::error(reason));
                return Err(e);
            }
        };

        let poll_interval = config.poll_interval();
        {
            let mut state = self.shared.lock();
            state.connection = state
                .connection
                .to_open()
                .map_err(|e| DomainError::Transport(e.to_string()))?;
            state.samples = 0;
            state.opened_at = Some(Instant::now());
            state.bytes_total = 0;
            state.pending_len = 0;
            state.raw_preview.clear();
            state.poll_interval = poll_interval;
            state.active_config = Some(config.clone());
        }
        self.shared
            .publisher
            .publish(&ScaleEvent::connected(config.device_path.clone()));
        info!(port = %config.device_path, "Scale connected");

        let cancel = CancellationToken::new();
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(
            link,
            self.shared.clone(),
            self.parser.clone(),
            cancel.clone(),
            rx,
            poll_interval,
        ));
        *slot = Some(ActiveLink {
            cancel,
            commands,
            task,
        });
        Ok(())
    }

    /// Closes the connection. Idempotent.
    pub async fn close(&self) -> Result<(), DomainError> {
        let mut slot = self.link.lock().await;
        self.close_link(&mut slot).await;
        Ok(())
    }

    async fn close_link(&self, slot: &mut Option<ActiveLink>) {
        let Some(active) = slot.take() else {
            let mut state = self.shared.lock();
            if let Some(reason) = state.connection.fault_reason() {
                info!(reason = %reason, "Clearing fault");
                state.connection = state.connection.to_disconnected();
            }
            return;
        };

        let was_open = {
            let mut state = self.shared.lock();
            match state.connection.to_closing() {
                Ok(next) => {
                    state.connection = next;
                    true
                }
                Err(_) => false,
            }
        };

        // Returns only after the task dropped its timer and reader and released the handle
        active.cancel.cancel();
        if let Err(e) = active.task.await {
            warn!(error = %e, "Scale link task ended abnormally");
        }

        {
            let mut state = self.shared.lock();
            state.connection = state.connection.to_disconnected();
            state.pending_len = 0;
        }
        if was_open {
            self.shared.publisher.publish(&ScaleEvent::disconnected());
            info!("Scale disconnected");
        }
    }

    /// (Re)starts polling at `interval_ms` (floor 50 ms), or at the current interval when
    /// missing or zero. Returns the effective interval.
    pub async fn start_polling(&self, interval_ms: Option<u64>) -> Result<Duration, DomainError> {
        let slot = self.link.lock().await;
        let active = slot.as_ref().ok_or(DomainError::NotConnected)?;

        let period = {
            let mut state = self.shared.lock();
            if !state.connection.is_open() {
                return Err(DomainError::NotConnected);
            }
            let period = match interval_ms.filter(|ms| *ms > 0) {
                Some(ms) => clamp_poll_interval(ms),
                None => state.poll_interval,
            };
            state.poll_interval = period;
            period
        };

        active
            .commands
            .send(LinkCommand::StartPolling(period))
            .map_err(|_| DomainError::NotConnected)?;
        Ok(period)
    }

    pub async fn stop_polling(&self) -> Result<(), DomainError> {
        let slot = self.link.lock().await;
        if let Some(active) = slot.as_ref() {
            // A finished task has nothing left to stop
            let _ = active.commands.send(LinkCommand::StopPolling);
        }
        Ok(())
    }

    /// Sets the zero offset to the latest gross reading.
    pub fn tare(&self) -> f64 {
        let offset = self.shared.lock().zero.tare();
        info!(zero_offset_kg = offset, "Tare set");
        offset
    }

    pub fn clear_tare(&self) -> f64 {
        let offset = self.shared.lock().zero.clear_tare();
        info!("Tare cleared");
        offset
    }

    pub fn zero_offset_kg(&self) -> f64 {
        self.shared.lock().zero.offset_kg()
    }

    pub fn to_net(&self, gross_kg: f64) -> f64 {
        self.shared.lock().zero.to_net(gross_kg)
    }

    pub fn status(&self) -> ScaleStatus {
        let state = self.shared.lock();
        let elapsed = state.opened_at.map(|t| t.elapsed()).unwrap_or_default();
        let elapsed_min = elapsed.as_secs_f64() / 60.0;
        let samples_per_minute = if elapsed_min > 0.0 {
            (state.samples as f64 / elapsed_min).round() as u64
        } else {
            0
        };

        ScaleStatus {
            connected: state.connection.is_open(),
            last_weight_kg: state.zero.last_gross_kg().unwrap_or(0.0),
            samples_per_minute,
            uptime_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn diagnostics(&self) -> ScaleDiagnostics {
        let ports = self.catalog.list().unwrap_or_else(|e| {
            warn!(error = %e, "Port enumeration failed");
            Vec::new()
        });
        let state = self.shared.lock();

        ScaleDiagnostics {
            driver: self.driver_type().to_string(),
            ports,
            connected: state.connection.is_open(),
            state: state.connection.clone(),
            last_weight_kg: state.zero.last_gross_kg().unwrap_or(0.0),
            zero_offset_kg: state.zero.offset_kg(),
            buffer_len: state.pending_len,
            bytes_total: state.bytes_total,
            last_raw_preview: state.raw_preview.clone(),
            poll_interval_ms: state.poll_interval.as_millis() as u64,
            config: state.active_config.clone(),
        }
    }
}
