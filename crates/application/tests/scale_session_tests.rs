use application::scale::{POLL_COMMAND, ScaleSession, SubscriberBroadcast, Subscription};
use async_trait::async_trait;
use domain::DomainError;
use domain::driver::{
    ConnectionState, ScaleConnectionConfig, ScaleDriver, ScaleLink, ScaleReader, ScaleWriter,
};
use infrastructure::WeightFrameParser;
use infrastructure::drivers::StaticPortCatalog;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, sleep, timeout};

type Feed = mpsc::UnboundedSender<Result<Vec<u8>, DomainError>>;

// --- Mock Driver with Fault Injection ---

#[derive(Clone, Default)]
struct MockScale {
    // (device, command) in write order
    writes: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    feeds: Arc<Mutex<HashMap<String, Feed>>>,
    open_calls: Arc<AtomicUsize>,
    live_links: Arc<AtomicUsize>,
    max_live_links: Arc<AtomicUsize>,
    fail_open: Arc<Mutex<Option<String>>>,
    // Writes never complete while set, like a port held by flow control
    stall_writes: Arc<AtomicBool>,
}

impl MockScale {
    fn feed(&self, device: &str, bytes: &[u8]) {
        let feeds = self.feeds.lock().unwrap();
        feeds[device].send(Ok(bytes.to_vec())).unwrap();
    }

    fn inject_error(&self, device: &str, message: &str) {
        let feeds = self.feeds.lock().unwrap();
        feeds[device]
            .send(Err(DomainError::Transport(message.to_string())))
            .unwrap();
    }

    fn poll_writes(&self) -> usize {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, cmd)| cmd.as_slice() == POLL_COMMAND)
            .count()
    }

    fn commands_for(&self, device: &str) -> Vec<Vec<u8>> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == device)
            .map(|(_, cmd)| cmd.clone())
            .collect()
    }
}

struct MockReader {
    rx: mpsc::UnboundedReceiver<Result<Vec<u8>, DomainError>>,
}

#[async_trait]
impl ScaleReader for MockReader {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize, DomainError> {
        match self.rx.recv().await {
            Some(Ok(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(Err(e)) => Err(e),
            None => Ok(0),
        }
    }
}

struct MockWriter {
    device: String,
    scale: MockScale,
}

#[async_trait]
impl ScaleWriter for MockWriter {
    async fn write_command(&mut self, command: &[u8]) -> Result<(), DomainError> {
        if self.scale.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.scale
            .writes
            .lock()
            .unwrap()
            .push((self.device.clone(), command.to_vec()));
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.scale.live_links.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScaleDriver for MockScale {
    async fn open(&self, config: &ScaleConnectionConfig) -> Result<ScaleLink, DomainError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.fail_open.lock().unwrap().clone() {
            return Err(DomainError::OpenFailed {
                path: config.device_path.clone(),
                reason,
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds
            .lock()
            .unwrap()
            .insert(config.device_path.clone(), tx);

        let live = self.live_links.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live_links.fetch_max(live, Ordering::SeqCst);

        Ok(ScaleLink::new(
            Box::new(MockReader { rx }),
            Box::new(MockWriter {
                device: config.device_path.clone(),
                scale: self.clone(),
            }),
        ))
    }

    fn driver_type(&self) -> &str {
        "Mock"
    }
}

// --- Helpers ---

fn setup() -> (ScaleSession, MockScale, Subscription) {
    let scale = MockScale::default();
    let broadcast = Arc::new(SubscriberBroadcast::new(64));
    let subscription = broadcast.subscribe();
    let session = ScaleSession::new(
        Arc::new(scale.clone()),
        Arc::new(StaticPortCatalog::with_paths(&["COM3", "COM12"])),
        broadcast,
        WeightFrameParser::new(),
    );
    (session, scale, subscription)
}

async fn next_event(sub: &mut Subscription) -> Value {
    let payload = timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("Timed out waiting for event")
        .expect("Subscription closed");
    serde_json::from_str(&payload).unwrap()
}

async fn assert_no_event(sub: &mut Subscription) {
    sleep(Duration::from_millis(50)).await;
    assert_eq!(sub.try_recv(), None);
}

fn assert_kg(value: &Value, expected: f64) {
    let actual = value.as_f64().unwrap();
    assert!((actual - expected).abs() < 1e-9, "expected {}, got {}", expected, actual);
}

// --- Tests ---

#[tokio::test]
async fn test_weight_events_follow_the_byte_stream() {
    let (session, scale, mut events) = setup();
    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();

    let status = next_event(&mut events).await;
    assert_eq!(status["type"], "status");
    assert_eq!(status["connected"], true);
    assert_eq!(status["port"], "COM3");

    scale.feed("COM3", b"+000085.9 G S\r\n12.5 g\r\nNOI");
    scale.feed("COM3", b"SE###\r\n12.5004 g\n");

    let first = next_event(&mut events).await;
    assert_eq!(first["type"], "weight");
    assert_kg(&first["grossKg"], 0.0859);
    assert_kg(&first["kg"], 0.0859);
    assert_eq!(first["stable"], true);
    assert!(first["t"].as_i64().unwrap() > 0);

    // Fallback frames carry no status, so the comparator decides
    let second = next_event(&mut events).await;
    assert_kg(&second["grossKg"], 0.0125);
    assert_eq!(second["stable"], false);

    let third = next_event(&mut events).await;
    assert_kg(&third["grossKg"], 0.0125004);
    assert_eq!(third["stable"], true);

    assert_no_event(&mut events).await;

    let status = session.status();
    assert!(status.connected);
    assert!((status.last_weight_kg - 0.0125004).abs() < 1e-9);

    let diagnostics = session.diagnostics();
    assert_eq!(diagnostics.buffer_len, 0);
    assert!(diagnostics.bytes_total > 0);
    assert!(diagnostics.last_raw_preview.contains("SE###"));
}

#[tokio::test]
async fn test_wake_sequence_is_sent_on_open() {
    let (session, scale, mut events) = setup();
    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();
    next_event(&mut events).await;
    sleep(Duration::from_millis(20)).await;

    let commands = scale.commands_for("COM3");
    assert!(commands.len() >= 3);
    assert_eq!(commands[0], b"\r");
    assert_eq!(commands[1], b"P\r");
    assert_eq!(commands[2], b"Q\r");
}

#[tokio::test]
async fn test_reopening_closes_the_previous_connection_first() {
    let (session, scale, mut events) = setup();
    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();
    session.open(ScaleConnectionConfig::new("COM12")).await.unwrap();

    let first = next_event(&mut events).await;
    assert_eq!(first["connected"], true);
    assert_eq!(first["port"], "COM3");

    let closed = next_event(&mut events).await;
    assert_eq!(closed["type"], "status");
    assert_eq!(closed["connected"], false);
    assert!(closed.get("port").is_none());

    let reopened = next_event(&mut events).await;
    assert_eq!(reopened["connected"], true);
    assert_eq!(reopened["port"], "COM12");

    assert_no_event(&mut events).await;
    assert_eq!(scale.max_live_links.load(Ordering::SeqCst), 1);
    assert_eq!(scale.live_links.load(Ordering::SeqCst), 1);
    assert_eq!(session.connection_state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_polling_stops_when_connection_closes() {
    let (session, scale, _events) = setup();
    let config = ScaleConnectionConfig {
        poll_interval_ms: 100,
        ..ScaleConnectionConfig::new("COM3")
    };
    session.open(config).await.unwrap();

    sleep(Duration::from_millis(450)).await;
    // One P from the wake sequence plus the periodic ones
    assert!(scale.poll_writes() >= 4, "poll writes: {}", scale.poll_writes());

    session.close().await.unwrap();
    let after_close = scale.poll_writes();

    sleep(Duration::from_secs(2)).await;
    assert_eq!(scale.poll_writes(), after_close);
    assert_eq!(scale.live_links.load(Ordering::SeqCst), 0);
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_polling_can_be_stopped_and_restarted() {
    let (session, scale, _events) = setup();
    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();
    sleep(Duration::from_millis(10)).await;

    session.stop_polling().await.unwrap();
    sleep(Duration::from_millis(10)).await;
    let stopped = scale.poll_writes();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(scale.poll_writes(), stopped);

    // Below the floor, clamped
    let interval = session.start_polling(Some(10)).await.unwrap();
    assert_eq!(interval, Duration::from_millis(50));
    sleep(Duration::from_millis(260)).await;
    assert!(scale.poll_writes() >= stopped + 4);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_faults_and_stops_polling() {
    let (session, scale, mut events) = setup();
    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();
    next_event(&mut events).await;

    scale.inject_error("COM3", "device unplugged");

    let error = next_event(&mut events).await;
    assert_eq!(error["type"], "error");
    assert!(error["message"].as_str().unwrap().contains("device unplugged"));
    let status = next_event(&mut events).await;
    assert_eq!(status["connected"], false);

    assert!(matches!(
        session.connection_state(),
        ConnectionState::Faulted(_)
    ));
    assert!(!session.status().connected);

    let after_fault = scale.poll_writes();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(scale.poll_writes(), after_fault);
    assert_eq!(
        session.start_polling(Some(200)).await,
        Err(DomainError::NotConnected)
    );

    // Explicit reopen from the fault
    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();
    let reopened = next_event(&mut events).await;
    assert_eq!(reopened["connected"], true);
    assert_eq!(session.connection_state(), ConnectionState::Open);
}

#[tokio::test]
async fn test_unknown_port_fails_fast_without_state_change() {
    let (session, scale, mut events) = setup();

    let err = session
        .open(ScaleConnectionConfig::new("COM99"))
        .await
        .unwrap_err();

    match err {
        DomainError::PortNotFound { path, available } => {
            assert_eq!(path, "COM99");
            let paths: Vec<_> = available.iter().map(|p| p.path.as_str()).collect();
            assert_eq!(paths, vec!["COM3", "COM12"]);
        }
        other => panic!("Unexpected error: {:?}", other),
    }
    assert_eq!(scale.open_calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn test_unknown_port_keeps_existing_connection() {
    let (session, _scale, mut events) = setup();
    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();
    next_event(&mut events).await;

    assert!(session.open(ScaleConnectionConfig::new("COM99")).await.is_err());
    assert_eq!(session.connection_state(), ConnectionState::Open);
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn test_open_failure_is_broadcast_and_faults() {
    let (session, scale, mut events) = setup();
    *scale.fail_open.lock().unwrap() = Some("Access denied".to_string());

    let err = session.open(ScaleConnectionConfig::new("COM3")).await;
    assert!(matches!(err, Err(DomainError::OpenFailed { .. })));

    let error = next_event(&mut events).await;
    assert_eq!(error["type"], "error");
    assert!(error["message"].as_str().unwrap().contains("Access denied"));
    assert!(matches!(
        session.connection_state(),
        ConnectionState::Faulted(_)
    ));

    session.close().await.unwrap();
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (session, _scale, mut events) = setup();
    session.close().await.unwrap();
    session.close().await.unwrap();
    assert_no_event(&mut events).await;

    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();
    next_event(&mut events).await;
    session.close().await.unwrap();
    session.close().await.unwrap();

    let closed = next_event(&mut events).await;
    assert_eq!(closed["connected"], false);
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn test_tare_offsets_following_readings() {
    let (session, scale, mut events) = setup();
    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();
    next_event(&mut events).await;

    scale.feed("COM3", b"+000001.0 K S\r\n");
    next_event(&mut events).await;

    assert_eq!(session.tare(), 1.0);
    assert_eq!(session.zero_offset_kg(), 1.0);

    scale.feed("COM3", b"+000002.0 K S\r\n+000001.0 K S\r\n");
    let net = next_event(&mut events).await;
    assert_kg(&net["kg"], 1.0);
    assert_kg(&net["grossKg"], 2.0);
    let zero = next_event(&mut events).await;
    assert_eq!(zero["kg"], 0.0);

    assert_eq!(session.clear_tare(), 0.0);
    assert_eq!(session.to_net(2.0), 2.0);
}

#[tokio::test]
async fn test_start_polling_requires_open_connection() {
    let (session, _scale, _events) = setup();
    assert_eq!(
        session.start_polling(None).await,
        Err(DomainError::NotConnected)
    );
    assert!(session.stop_polling().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_close_is_not_held_up_by_a_stalled_wake_write() {
    let (session, scale, mut events) = setup();
    scale.stall_writes.store(true, Ordering::SeqCst);
    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();
    next_event(&mut events).await;
    tokio::task::yield_now().await;

    let started = Instant::now();
    timeout(Duration::from_secs(3), session.close())
        .await
        .expect("close did not complete")
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert_eq!(scale.live_links.load(Ordering::SeqCst), 0);

    // The link slot is free again
    scale.stall_writes.store(false, Ordering::SeqCst);
    session.open(ScaleConnectionConfig::new("COM12")).await.unwrap();
    assert_eq!(session.connection_state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_close_is_not_held_up_by_a_stalled_poll_write() {
    let (session, scale, mut events) = setup();
    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();
    next_event(&mut events).await;
    sleep(Duration::from_millis(10)).await;

    // First poll tick at 200 ms blocks in the driver
    scale.stall_writes.store(true, Ordering::SeqCst);
    sleep(Duration::from_millis(250)).await;

    let started = Instant::now();
    timeout(Duration::from_secs(3), session.close())
        .await
        .expect("close did not complete")
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);

    let closed = next_event(&mut events).await;
    assert_eq!(closed["connected"], false);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_write_does_not_stop_readings() {
    let (session, scale, mut events) = setup();
    scale.stall_writes.store(true, Ordering::SeqCst);
    session.open(ScaleConnectionConfig::new("COM3")).await.unwrap();
    next_event(&mut events).await;

    // Each wake write is abandoned after its timeout, then reads resume
    scale.feed("COM3", b"+000085.9 G S\r\n");
    let payload = timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("Timed out waiting for reading")
        .unwrap();
    let weight: Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(weight["type"], "weight");
    assert_kg(&weight["grossKg"], 0.0859);

    session.close().await.unwrap();
}
