//! Connection management for AMI

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::{
    action::AmiAction,
    constants::{
        BANNER_PREFIX, CONNECT_TIMEOUT_MS, LINE_TERMINATOR, LOGIN_TIMEOUT_MS,
        MAX_EVENT_QUEUE_SIZE, SOCKET_BUF_SIZE,
    },
    error::{AmiError, AmiResult},
    event::AmiEvent,
    protocol::AmiParser,
};

/// Connection status for the AMI session
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionStatus {
    /// AMI session is active.
    Connected,
    /// AMI session ended.
    Disconnected(DisconnectReason),
}

/// Reason for disconnection
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// TCP I/O or protocol error (io::Error is not Clone, so we store the message)
    IoError(String),
    /// Clean EOF on the TCP connection
    ConnectionClosed,
    /// Client called close()
    ClientRequested,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::IoError(msg) => write!(f, "I/O error: {}", msg),
            DisconnectReason::ConnectionClosed => write!(f, "connection closed"),
            DisconnectReason::ClientRequested => write!(f, "client requested disconnect"),
        }
    }
}

/// Establish a TCP connection with a timeout.
async fn tcp_connect_with_timeout(host: &str, port: u16) -> AmiResult<TcpStream> {
    let tcp_result = timeout(
        Duration::from_millis(CONNECT_TIMEOUT_MS),
        TcpStream::connect((host, port)),
    )
    .await;

    match tcp_result {
        Ok(Ok(s)) => {
            debug!("[CONNECT] TCP connection established");
            Ok(s)
        }
        Ok(Err(e)) => {
            warn!("[CONNECT] TCP connect failed: {}", e);
            Err(AmiError::Io(e))
        }
        Err(_) => {
            warn!(
                "[CONNECT] TCP connect timed out after {}ms",
                CONNECT_TIMEOUT_MS
            );
            Err(AmiError::Timeout {
                timeout_ms: CONNECT_TIMEOUT_MS,
            })
        }
    }
}

/// Shared state between AmiClient and the reader task
struct SharedState {
    /// Set once close() has run; makes close idempotent
    closed: AtomicBool,
    /// Set when events have been dropped due to a full queue
    event_overflow: AtomicBool,
    /// Total count of dropped events
    dropped_event_count: AtomicU64,
}

/// Options for AMI connection configuration.
///
/// Controls parameters that are fixed at connection time, such as the event
/// queue capacity. Use [`Default::default()`] for standard settings.
#[derive(Debug, Clone)]
pub struct AmiConnectOptions {
    /// Capacity of the mpsc channel delivering events. Default: 1000.
    pub event_queue_size: usize,
}

impl Default for AmiConnectOptions {
    fn default() -> Self {
        Self {
            event_queue_size: MAX_EVENT_QUEUE_SIZE,
        }
    }
}

/// AMI client handle (Clone + Send)
///
/// Write-only after login: actions are sent without waiting for a reply,
/// because AMI replies arrive interleaved with events on the shared stream
/// and are correlated by `ActionID` (see [`wait_for_answer`]).
///
/// [`wait_for_answer`]: crate::monitor::wait_for_answer
#[derive(Clone)]
pub struct AmiClient {
    writer: Arc<Mutex<OwnedWriteHalf>>,
    shared: Arc<SharedState>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl std::fmt::Debug for AmiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiClient")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Event stream receiver (!Clone)
///
/// Receives parsed blocks (action replies and unsolicited events alike)
/// from a background reader task via a bounded mpsc channel.
///
/// Items are `Result<AmiEvent, AmiError>`. An `Err(AmiError::QueueFull)`
/// indicates that one or more events were dropped because the application
/// fell behind. Use [`AmiClient::dropped_event_count`] for the exact count.
pub struct AmiEventStream {
    rx: mpsc::Receiver<Result<AmiEvent, AmiError>>,
    status_rx: watch::Receiver<ConnectionStatus>,
}

impl std::fmt::Debug for AmiEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiEventStream")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Read the single-line protocol banner (`Asterisk Call Manager/<ver>`).
///
/// The banner has no terminating blank line, so it cannot go through the
/// block parser. Any bytes received after the line terminator are returned
/// for the parser to consume.
async fn read_banner(
    stream: &mut TcpStream,
    read_buffer: &mut [u8],
) -> AmiResult<(String, Vec<u8>)> {
    let mut received: Vec<u8> = Vec::new();

    loop {
        if let Some(pos) = received
            .windows(LINE_TERMINATOR.len())
            .position(|w| w == LINE_TERMINATOR.as_bytes())
        {
            let line = String::from_utf8_lossy(&received[..pos]).into_owned();
            let leftover = received[pos + LINE_TERMINATOR.len()..].to_vec();
            return Ok((line, leftover));
        }

        let read_result = timeout(
            Duration::from_millis(LOGIN_TIMEOUT_MS),
            stream.read(read_buffer),
        )
        .await;

        let bytes_read = match read_result {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(AmiError::Io(e)),
            Err(_) => {
                return Err(AmiError::Timeout {
                    timeout_ms: LOGIN_TIMEOUT_MS,
                })
            }
        };

        if bytes_read == 0 {
            return Err(AmiError::ConnectionClosed);
        }

        received.extend_from_slice(&read_buffer[..bytes_read]);
    }
}

/// Read a single AMI block from the socket into the parser.
///
/// Used during the login handshake (on the unsplit TcpStream), before the
/// reader task takes over. A deadline-bound blocking read replaces the fixed
/// settle delay a polling client would need: it waits exactly as long as the
/// welcome/response bytes take to arrive, up to the login timeout.
async fn recv_block(
    stream: &mut TcpStream,
    parser: &mut AmiParser,
    read_buffer: &mut [u8],
) -> AmiResult<AmiEvent> {
    loop {
        if let Some(event) = parser.parse_block()? {
            trace!("[RECV] Parsed block from buffer: {} fields", event.len());
            return Ok(event);
        }

        trace!("[RECV] Buffer needs more data, reading from socket");
        let read_result = timeout(
            Duration::from_millis(LOGIN_TIMEOUT_MS),
            stream.read(read_buffer),
        )
        .await;

        let bytes_read = match read_result {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(AmiError::Io(e)),
            Err(_) => {
                return Err(AmiError::Timeout {
                    timeout_ms: LOGIN_TIMEOUT_MS,
                })
            }
        };

        trace!("[RECV] Read {} bytes from socket", bytes_read);
        if bytes_read == 0 {
            return Err(AmiError::ConnectionClosed);
        }

        parser.add_data(&read_buffer[..bytes_read])?;
    }
}

/// Perform the login handshake on the stream.
async fn authenticate(
    stream: &mut TcpStream,
    parser: &mut AmiParser,
    read_buffer: &mut [u8],
    username: &str,
    secret: &str,
) -> AmiResult<()> {
    let (banner, leftover) = read_banner(stream, read_buffer).await?;
    if banner.starts_with(BANNER_PREFIX) {
        debug!("[AUTH] Banner: {}", banner);
    } else {
        warn!("[AUTH] Unexpected banner: {}", banner);
    }
    parser.add_data(&leftover)?;

    let login = AmiAction::Login {
        username: username.to_string(),
        secret: secret.to_string(),
    };
    let wire = login.to_wire_format()?;
    debug!("Sending action: Login [REDACTED]");
    stream.write_all(wire.as_bytes()).await.map_err(AmiError::Io)?;

    let response = recv_block(stream, parser, read_buffer).await?;
    if !response.is_success() {
        return Err(AmiError::auth_failed(
            response
                .message()
                .or_else(|| response.response())
                .unwrap_or("Authentication failed")
                .to_string(),
        ));
    }

    debug!("Authentication successful");
    Ok(())
}

/// Try to send an event (or error) to the application via try_send.
///
/// If the channel is full, drop the item, set the overflow flag, and
/// increment the dropped counter. Before each dispatch, check the overflow
/// flag and attempt to deliver a QueueFull error notification first.
fn dispatch_event(
    event_tx: &mpsc::Sender<Result<AmiEvent, AmiError>>,
    shared: &SharedState,
    item: Result<AmiEvent, AmiError>,
) -> bool {
    if shared.event_overflow.load(Ordering::Relaxed) {
        match event_tx.try_send(Err(AmiError::QueueFull)) {
            Ok(()) => {
                shared.event_overflow.store(false, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return false,
            Err(mpsc::error::TrySendError::Full(_)) => {}
        }
    }

    match event_tx.try_send(item) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Closed(_)) => false,
        Err(mpsc::error::TrySendError::Full(_)) => {
            shared.event_overflow.store(true, Ordering::Relaxed);
            shared.dropped_event_count.fetch_add(1, Ordering::Relaxed);
            warn!("Event queue full, dropping event");
            true
        }
    }
}

/// Background reader loop
async fn reader_loop(
    reader: OwnedReadHalf,
    parser: AmiParser,
    shared: Arc<SharedState>,
    status_tx: watch::Sender<ConnectionStatus>,
    event_tx: mpsc::Sender<Result<AmiEvent, AmiError>>,
) {
    let result = std::panic::AssertUnwindSafe(reader_loop_inner(
        reader,
        parser,
        shared,
        status_tx.clone(),
        event_tx,
    ));
    if futures_util::FutureExt::catch_unwind(result).await.is_err() {
        tracing::error!("reader task panicked");
        let _ = status_tx.send(ConnectionStatus::Disconnected(DisconnectReason::IoError(
            "reader task panicked".to_string(),
        )));
    }
}

async fn reader_loop_inner(
    mut reader: OwnedReadHalf,
    mut parser: AmiParser,
    shared: Arc<SharedState>,
    status_tx: watch::Sender<ConnectionStatus>,
    event_tx: mpsc::Sender<Result<AmiEvent, AmiError>>,
) {
    let mut read_buffer = [0u8; SOCKET_BUF_SIZE];

    loop {
        // Drain every complete block already buffered before reading again
        match parser.parse_block() {
            Ok(Some(event)) => {
                if !dispatch_event(&event_tx, &shared, Ok(event)) {
                    debug!("Event channel closed, reader exiting");
                    return;
                }
                continue;
            }
            Ok(None) => {
                // Need more data from socket
            }
            Err(e) => {
                warn!("Parser error: {}", e);
                let _ = status_tx.send(ConnectionStatus::Disconnected(DisconnectReason::IoError(
                    e.to_string(),
                )));
                return;
            }
        }

        match reader.read(&mut read_buffer).await {
            Ok(0) => {
                info!("Connection closed (EOF)");
                let _ = status_tx.send(ConnectionStatus::Disconnected(
                    DisconnectReason::ConnectionClosed,
                ));
                return;
            }
            Ok(n) => {
                if let Err(e) = parser.add_data(&read_buffer[..n]) {
                    warn!("Buffer error: {}", e);
                    let _ = status_tx.send(ConnectionStatus::Disconnected(
                        DisconnectReason::IoError(e.to_string()),
                    ));
                    return;
                }
            }
            Err(e) => {
                warn!("Read error: {}", e);
                let _ = status_tx.send(ConnectionStatus::Disconnected(DisconnectReason::IoError(
                    e.to_string(),
                )));
                return;
            }
        }
    }
}

impl AmiClient {
    /// Connect to the PBX manager port and authenticate.
    ///
    /// The handshake (banner, `Action: Login`, success check) completes
    /// before this returns, so a client in hand is always a logged-in one.
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
    ) -> AmiResult<(Self, AmiEventStream)> {
        Self::connect_with_options(host, port, username, secret, AmiConnectOptions::default())
            .await
    }

    /// Connect with custom options.
    pub async fn connect_with_options(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
        options: AmiConnectOptions,
    ) -> AmiResult<(Self, AmiEventStream)> {
        info!("Connecting to AMI at {}:{}", host, port);

        let mut stream = tcp_connect_with_timeout(host, port).await?;
        let mut parser = AmiParser::new();
        let mut read_buffer = [0u8; SOCKET_BUF_SIZE];

        authenticate(&mut stream, &mut parser, &mut read_buffer, username, secret).await?;

        info!("Successfully connected and authenticated to AMI");
        Ok(Self::split_and_spawn(stream, parser, options))
    }

    fn split_and_spawn(
        stream: TcpStream,
        parser: AmiParser,
        options: AmiConnectOptions,
    ) -> (Self, AmiEventStream) {
        let queue_size = options.event_queue_size.max(1);

        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(SharedState {
            closed: AtomicBool::new(false),
            event_overflow: AtomicBool::new(false),
            dropped_event_count: AtomicU64::new(0),
        });

        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connected);
        let status_rx2 = status_tx.subscribe();
        let (event_tx, event_rx) = mpsc::channel(queue_size);

        tokio::spawn(reader_loop(
            read_half,
            parser,
            shared.clone(),
            status_tx,
            event_tx,
        ));

        let client = AmiClient {
            writer: Arc::new(Mutex::new(write_half)),
            shared,
            status_rx,
        };

        let stream = AmiEventStream {
            rx: event_rx,
            status_rx: status_rx2,
        };

        (client, stream)
    }

    /// Serialize and send an action, without waiting for a reply.
    ///
    /// The reply (if the action produces one) arrives on the shared event
    /// stream, correlated by `ActionID`.
    pub async fn send_action(&self, action: &AmiAction) -> AmiResult<()> {
        if !self.is_connected() {
            return Err(AmiError::NotConnected);
        }

        let wire = action.to_wire_format()?;
        match action {
            AmiAction::Login { username, .. } => {
                debug!("Sending action: Login {}:[REDACTED]", username)
            }
            _ => debug!("Sending action: {:?}", action),
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(wire.as_bytes()).await.map_err(AmiError::Io)?;
        Ok(())
    }

    /// Number of events dropped due to a full event queue.
    pub fn dropped_event_count(&self) -> u64 {
        self.shared.dropped_event_count.load(Ordering::Relaxed)
    }

    /// Whether the connection is alive (not yet disconnected).
    pub fn is_connected(&self) -> bool {
        matches!(*self.status_rx.borrow(), ConnectionStatus::Connected)
    }

    /// Current connection status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    /// End the session: best-effort `Action: Logoff`, then shut down the
    /// write half.
    ///
    /// Never fails and is idempotent: a second call (or a call after the
    /// PBX already dropped the socket) is a no-op. Used on every exit path
    /// of an orchestration run, including error paths.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Client requested disconnect");
        let mut writer = self.writer.lock().await;

        if let Ok(wire) = AmiAction::Logoff.to_wire_format() {
            if let Err(e) = writer.write_all(wire.as_bytes()).await {
                debug!("Logoff write failed (ignored): {}", e);
            }
        }

        if let Err(e) = writer.shutdown().await {
            debug!("Socket shutdown failed (ignored): {}", e);
        }
    }
}

impl AmiEventStream {
    /// Receive the next parsed block, or None if the channel is closed.
    ///
    /// Returns `Err(AmiError::QueueFull)` if events were dropped because the
    /// application was not draining the stream fast enough. This is a
    /// one-time notification per overflow episode; subsequent calls return
    /// real events. Parse errors from the reader task are also surfaced here.
    pub async fn recv(&mut self) -> Option<Result<AmiEvent, AmiError>> {
        self.rx.recv().await
    }

    /// Whether the connection is alive (not yet disconnected).
    pub fn is_connected(&self) -> bool {
        matches!(*self.status_rx.borrow(), ConnectionStatus::Connected)
    }

    /// Current connection status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }
}

impl futures_util::Stream for AmiEventStream {
    type Item = Result<AmiEvent, AmiError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
