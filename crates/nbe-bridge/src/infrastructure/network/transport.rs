//! UDP transport client for the boiler controller.
//!
//! One [`Transport`] owns one UDP socket connected to one controller and
//! multiplexes any number of concurrent callers over it.
//!
//! Architecture:
//! - A background *receive task* is the only reader of the socket.  It
//!   decodes every inbound datagram and hands it to the caller waiting on the
//!   matching sequence number.
//! - The *waiter table* maps wire sequence numbers to waiting callers.  It is
//!   the only state shared between callers and the receive task, and its lock
//!   is held just long enough to insert, look up, or remove one entry.
//! - Each caller transmits its own datagram, then waits on a `oneshot`
//!   channel.  On timeout it retransmits the identical datagram (same sequence
//!   number) up to `max_attempts` times.
//!
//! # Why correlate by sequence number? (for beginners)
//!
//! UDP makes no promise about order or delivery.  A reply to an old,
//! timed-out request can arrive after a newer request was sent, and two
//! replies can arrive in the opposite order to their requests.  The only
//! thing that ties a reply to its request is the echoed header: app id,
//! controller id, function, and sequence number.  A reply that matches no
//! waiting caller is stale and is dropped.
//!
//! # Shutdown
//!
//! [`Transport::close`] marks the table closed, drops every waiting caller's
//! reply channel (each caller then returns [`TransportError::Closed`]),
//! aborts the receive task, and releases the socket.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use nbe_core::protocol::messages::{DEFAULT_APP_ID, DEFAULT_PORT, SEQ_NO_MODULUS};
use nbe_core::protocol::{wire_seq_no, SequenceCounter};
use nbe_core::{
    decode_response, encode_request, AppId, ControllerId, CryptoError, Function, ProtocolError,
    PublicKey, Request, Response,
};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

/// Large enough for any response the three-digit length field allows.
const RECV_BUFFER_SIZE: usize = 2048;

/// Pause after an unexpected socket error so a broken socket cannot spin the task.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Errors returned to callers of the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The local UDP socket could not be bound.
    #[error("failed to bind UDP socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred on the socket.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be encoded or encrypted.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// No matching response arrived after every attempt.
    #[error("no response to {function:?} (seq {seq_no}) after {attempts} attempt(s)")]
    ExhaustedRetries {
        function: Function,
        seq_no: u8,
        attempts: u32,
    },

    /// Every wire sequence number is held by an outstanding call.
    #[error("all {0} sequence numbers are in flight")]
    Busy(usize),

    /// The transport was closed before or while the call was waiting.
    #[error("transport is closed")]
    Closed,

    /// The Discovery response was unusable.
    #[error("discovery failed: {0}")]
    Discovery(String),
}

impl From<CryptoError> for TransportError {
    fn from(e: CryptoError) -> Self {
        TransportError::Protocol(ProtocolError::Crypto(e))
    }
}

/// Connection settings for one controller.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Controller address (default port 8483).
    pub device_addr: SocketAddr,
    /// Identifier this client puts in every header.
    pub app_id: AppId,
    /// Serial number of the controller.
    pub controller_id: ControllerId,
    /// Pin code the controller requires for writes.
    pub pin_code: String,
    /// How long to wait for a response before retransmitting.
    pub timeout: Duration,
    /// Total number of transmissions per call, including the first.
    pub max_attempts: u32,
}

impl TransportConfig {
    /// Settings for `controller_id` at `device_addr` with default timing.
    pub fn new(device_addr: SocketAddr, controller_id: ControllerId) -> Self {
        Self {
            device_addr,
            controller_id,
            ..Default::default()
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            device_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            app_id: DEFAULT_APP_ID,
            controller_id: ControllerId::default(),
            pin_code: String::new(),
            timeout: Duration::from_secs(1),
            max_attempts: 3,
        }
    }
}

/// Serial number and public key from a Discovery response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub serial: String,
    pub public_key: PublicKey,
}

impl DeviceIdentity {
    /// Extracts `serial` and `rsa_key` from a Discovery response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Discovery`] if either entry is missing and
    /// [`TransportError::Protocol`] if the key cannot be parsed.
    pub fn from_response(response: &Response) -> Result<Self, TransportError> {
        if !response.is_success() {
            return Err(TransportError::Discovery(format!(
                "device reported status {}",
                response.status
            )));
        }
        let serial = response
            .get("serial")
            .ok_or_else(|| TransportError::Discovery("response has no serial".into()))?
            .to_wire();
        let rsa_key = response
            .get("rsa_key")
            .ok_or_else(|| TransportError::Discovery("response has no rsa_key".into()))?
            .to_wire();
        Ok(Self {
            serial,
            public_key: PublicKey::from_base64(&rsa_key)?,
        })
    }
}

// ── Waiter table ──────────────────────────────────────────────────────────────

/// A caller blocked on a response.
struct Waiter {
    /// Unique allocation number; guards against removing a successor's entry.
    ticket: u64,
    function: Function,
    reply: oneshot::Sender<Response>,
}

#[derive(Default)]
struct TableState {
    waiters: HashMap<u8, Waiter>,
    closed: bool,
}

/// Outcome of routing one inbound response.
#[derive(Debug, PartialEq, Eq)]
enum Dispatch {
    Delivered,
    /// No caller holds this sequence number for this function.
    Stale,
    /// The caller gave up between lookup and delivery.
    Abandoned,
}

/// Sequence number → waiting caller, guarded by one mutex.
#[derive(Default)]
struct WaiterTable {
    state: Mutex<TableState>,
}

impl WaiterTable {
    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates the next free sequence number and registers a waiter for it.
    fn register(
        &self,
        sequence: &SequenceCounter,
        function: Function,
    ) -> Result<(PendingCall<'_>, oneshot::Receiver<Response>), TransportError> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.waiters.len() >= SEQ_NO_MODULUS as usize {
            return Err(TransportError::Busy(state.waiters.len()));
        }
        // Fewer than 100 entries, so a free wire number exists.
        let (ticket, seq_no) = loop {
            let ticket = sequence.next();
            let seq_no = wire_seq_no(ticket);
            if !state.waiters.contains_key(&seq_no) {
                break (ticket, seq_no);
            }
        };
        let (tx, rx) = oneshot::channel();
        state.waiters.insert(
            seq_no,
            Waiter {
                ticket,
                function,
                reply: tx,
            },
        );
        Ok((
            PendingCall {
                table: self,
                seq_no,
                ticket,
            },
            rx,
        ))
    }

    /// Hands `response` to the caller waiting on its sequence number.
    fn complete(&self, response: Response) -> Dispatch {
        let waiter = {
            let mut state = self.lock();
            match state.waiters.get(&response.seq_no) {
                Some(w) if w.function == response.function => {
                    state.waiters.remove(&response.seq_no)
                }
                _ => None,
            }
        };
        match waiter {
            Some(w) => match w.reply.send(response) {
                Ok(()) => Dispatch::Delivered,
                Err(_) => Dispatch::Abandoned,
            },
            None => Dispatch::Stale,
        }
    }

    /// Removes the entry for `seq_no` if it still belongs to `ticket`.
    fn release(&self, seq_no: u8, ticket: u64) {
        let mut state = self.lock();
        if state.waiters.get(&seq_no).is_some_and(|w| w.ticket == ticket) {
            state.waiters.remove(&seq_no);
        }
    }

    /// Closes the table and drops every waiter.  Returns `None` if already closed.
    fn close(&self) -> Option<usize> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        state.closed = true;
        let pending = state.waiters.len();
        // Dropping the senders wakes every caller with a RecvError.
        state.waiters.clear();
        Some(pending)
    }

    fn len(&self) -> usize {
        self.lock().waiters.len()
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Removes its waiter entry when the call finishes, fails, or is cancelled.
struct PendingCall<'a> {
    table: &'a WaiterTable,
    seq_no: u8,
    ticket: u64,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        self.table.release(self.seq_no, self.ticket);
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// A connection to one controller, shared by any number of concurrent callers.
pub struct Transport {
    config: TransportConfig,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    waiters: Arc<WaiterTable>,
    sequence: SequenceCounter,
    public_key: RwLock<Option<PublicKey>>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Binds a local socket, connects it to the controller, and starts the receive task.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] or [`TransportError::Io`] if the
    /// socket cannot be set up.
    pub async fn connect(config: TransportConfig) -> Result<Self, TransportError> {
        let bind_addr = if config.device_addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| TransportError::BindFailed {
                addr: bind_addr,
                source,
            })?;
        // A connected UDP socket only delivers datagrams from the controller.
        socket.connect(config.device_addr).await?;
        let socket = Arc::new(socket);

        let waiters = Arc::new(WaiterTable::default());
        let receiver = tokio::spawn(receive_loop(
            Arc::clone(&socket),
            Arc::clone(&waiters),
            config.app_id,
            config.controller_id,
        ));

        info!(
            device = %config.device_addr,
            serial = %config.controller_id,
            "transport connected"
        );

        Ok(Self {
            config,
            socket: Mutex::new(Some(socket)),
            waiters,
            sequence: SequenceCounter::new(),
            public_key: RwLock::new(None),
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// The settings this transport was created with.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// The controller's cached public key, if Discovery has run.
    pub fn public_key(&self) -> Option<PublicKey> {
        self.public_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of calls currently waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.waiters.len()
    }

    /// `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.waiters.is_closed()
    }

    /// Sends one logical request and waits for its response.
    ///
    /// Functions that require encryption trigger a Discovery first if the
    /// controller's key is not cached yet.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ExhaustedRetries`] if no matching response
    /// arrives, [`TransportError::Closed`] if the transport shuts down, and
    /// other variants for encoding or socket failures.
    pub async fn send(
        &self,
        function: Function,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Response, TransportError> {
        let key = if function.requires_encryption() {
            Some(self.ensure_public_key().await?)
        } else {
            None
        };
        self.exchange(function, payload.into(), key.as_ref()).await
    }

    /// Runs Discovery, verifies the serial, and caches the controller's public key.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Discovery`] if the response is incomplete or
    /// names a different serial, plus any error from [`send`](Self::send).
    pub async fn discover(&self) -> Result<DeviceIdentity, TransportError> {
        let response = self.exchange(Function::Discovery, Vec::new(), None).await?;
        let identity = DeviceIdentity::from_response(&response)?;
        if identity.serial != self.config.controller_id.as_str() {
            return Err(TransportError::Discovery(format!(
                "expected serial {}, device reports {}",
                self.config.controller_id, identity.serial
            )));
        }
        *self
            .public_key
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(identity.public_key.clone());
        info!(
            serial = %identity.serial,
            key_bits = identity.public_key.modulus_bits(),
            "device discovered; public key cached"
        );
        Ok(identity)
    }

    /// Stops the transport: wakes every waiting caller with
    /// [`TransportError::Closed`], ends the receive task, and releases the socket.
    pub fn close(&self) {
        let Some(pending) = self.waiters.close() else {
            return;
        };
        if let Some(handle) = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        info!(pending, device = %self.config.device_addr, "transport closed");
    }

    async fn ensure_public_key(&self) -> Result<PublicKey, TransportError> {
        if let Some(key) = self.public_key() {
            return Ok(key);
        }
        debug!("no cached public key; running discovery");
        Ok(self.discover().await?.public_key)
    }

    fn socket(&self) -> Result<Arc<UdpSocket>, TransportError> {
        self.socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TransportError::Closed)
    }

    /// Transmits one request and waits, retransmitting on timeout.
    async fn exchange(
        &self,
        function: Function,
        payload: Vec<u8>,
        key: Option<&PublicKey>,
    ) -> Result<Response, TransportError> {
        let (call, mut reply) = self.waiters.register(&self.sequence, function)?;
        let request = Request::new(
            self.config.app_id,
            self.config.controller_id,
            function,
            call.seq_no,
            self.config.pin_code.clone(),
            payload,
        );
        let datagram = encode_request(&request, key)?;
        let socket = self.socket()?;
        let attempts = self.config.max_attempts.max(1);

        for attempt in 1..=attempts {
            if let Err(e) = socket.send(&datagram).await {
                if !is_transient_send_error(&e) {
                    return Err(e.into());
                }
                debug!(?function, seq_no = call.seq_no, "send failed, treating as lost: {e}");
            }
            match time::timeout(self.config.timeout, &mut reply).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(_)) => return Err(TransportError::Closed),
                Err(_) => debug!(?function, seq_no = call.seq_no, attempt, "response timed out"),
            }
        }

        warn!(?function, seq_no = call.seq_no, attempts, "no response from device");
        Err(TransportError::ExhaustedRetries {
            function,
            seq_no: call.seq_no,
            attempts,
        })
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

/// The single reader of the socket: decodes and dispatches inbound datagrams.
async fn receive_loop(
    socket: Arc<UdpSocket>,
    waiters: Arc<WaiterTable>,
    app_id: AppId,
    controller_id: ControllerId,
) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        let len = match socket.recv(&mut buf).await {
            Ok(len) => len,
            Err(e) if is_transient_send_error(&e) => {
                debug!("device unreachable: {e}");
                continue;
            }
            Err(e) => {
                warn!("recv error: {e}");
                time::sleep(RECV_ERROR_BACKOFF).await;
                continue;
            }
        };

        let response = match decode_response(&buf[..len]) {
            Ok(response) => response,
            Err(e) => {
                warn!(len, "dropping malformed datagram: {e}");
                continue;
            }
        };

        if response.app_id != app_id || response.controller_id != controller_id {
            debug!(
                app_id = %response.app_id,
                controller_id = %response.controller_id,
                "dropping response addressed to another client or device"
            );
            continue;
        }

        let seq_no = response.seq_no;
        let function = response.function;
        match waiters.complete(response) {
            Dispatch::Delivered => {}
            Dispatch::Stale => debug!(seq_no, ?function, "stale response discarded"),
            Dispatch::Abandoned => debug!(seq_no, ?function, "caller gave up before response"),
        }
    }
}

/// ICMP "port unreachable" surfaces as `ConnectionRefused` on a connected
/// UDP socket; it means this datagram was lost, not that the socket is broken.
fn is_transient_send_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::WouldBlock
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use nbe_core::{Payload, PrivateKey, Value};

    fn response(function: Function, seq_no: u8) -> Response {
        Response {
            app_id: DEFAULT_APP_ID,
            controller_id: ControllerId::new("ABC123").unwrap(),
            function,
            seq_no,
            status: 0,
            payload: Payload::new(),
        }
    }

    #[test]
    fn test_register_allocates_increasing_sequence_numbers() {
        // Arrange
        let table = WaiterTable::default();
        let counter = SequenceCounter::new();

        // Act
        let (a, _rx_a) = table.register(&counter, Function::GetSetup).unwrap();
        let (b, _rx_b) = table.register(&counter, Function::GetSetup).unwrap();

        // Assert
        assert_eq!((a.seq_no, b.seq_no), (0, 1));
        assert!(b.ticket > a.ticket);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_register_skips_wire_numbers_still_outstanding() {
        // Arrange – seq 0 stays outstanding while the counter wraps past it
        let table = WaiterTable::default();
        let counter = SequenceCounter::new();
        let (held, _rx) = table.register(&counter, Function::GetSetup).unwrap();
        for _ in 1..100 {
            let (call, _rx) = table.register(&counter, Function::GetSetup).unwrap();
            drop(call);
        }

        // Act – ticket 100 maps to wire 0, which is taken
        let (next, _rx_next) = table.register(&counter, Function::GetSetup).unwrap();

        // Assert
        assert_eq!(held.seq_no, 0);
        assert_eq!(next.seq_no, 1);
        assert_eq!(next.ticket, 101);
    }

    #[test]
    fn test_register_reports_busy_when_every_number_is_taken() {
        let table = WaiterTable::default();
        let counter = SequenceCounter::new();
        let held: Vec<_> = (0..100)
            .map(|_| table.register(&counter, Function::GetSetup).unwrap())
            .collect();

        let result = table.register(&counter, Function::GetSetup);

        assert!(matches!(result, Err(TransportError::Busy(100))));
        drop(held);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_complete_delivers_only_to_matching_sequence_number() {
        // Arrange
        let table = WaiterTable::default();
        let counter = SequenceCounter::new();
        let (a, mut rx_a) = table.register(&counter, Function::GetSetup).unwrap();
        let (b, mut rx_b) = table.register(&counter, Function::GetSetup).unwrap();

        // Act
        let outcome = table.complete(response(Function::GetSetup, b.seq_no));

        // Assert
        assert_eq!(outcome, Dispatch::Delivered);
        assert_eq!(rx_b.try_recv().unwrap().seq_no, b.seq_no);
        assert!(rx_a.try_recv().is_err(), "call A must not be satisfied");
        assert_eq!(table.len(), 1);
        drop(a);
    }

    #[test]
    fn test_complete_discards_unknown_sequence_number() {
        let table = WaiterTable::default();
        let counter = SequenceCounter::new();
        let (_a, mut rx_a) = table.register(&counter, Function::GetSetup).unwrap();

        let outcome = table.complete(response(Function::GetSetup, 55));

        assert_eq!(outcome, Dispatch::Stale);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_complete_discards_function_mismatch() {
        let table = WaiterTable::default();
        let counter = SequenceCounter::new();
        let (a, mut rx_a) = table.register(&counter, Function::GetSetup).unwrap();

        let outcome = table.complete(response(Function::GetOperatingData, a.seq_no));

        assert_eq!(outcome, Dispatch::Stale);
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_complete_after_caller_dropped_is_abandoned_or_stale() {
        let table = WaiterTable::default();
        let counter = SequenceCounter::new();
        let (call, rx) = table.register(&counter, Function::GetSetup).unwrap();
        let seq_no = call.seq_no;
        drop(rx);

        assert_eq!(
            table.complete(response(Function::GetSetup, seq_no)),
            Dispatch::Abandoned
        );
        drop(call);
        assert_eq!(
            table.complete(response(Function::GetSetup, seq_no)),
            Dispatch::Stale
        );
    }

    #[test]
    fn test_release_leaves_successor_entry_alone() {
        // Arrange – the first holder of seq 0 was completed, then a later
        // allocation reused wire number 0
        let table = WaiterTable::default();
        let counter = SequenceCounter::new();
        let (first, _rx1) = table.register(&counter, Function::GetSetup).unwrap();
        table.complete(response(Function::GetSetup, 0));
        for _ in 1..100 {
            let (call, _rx) = table.register(&counter, Function::GetSetup).unwrap();
            drop(call);
        }
        let (second, _rx2) = table.register(&counter, Function::GetSetup).unwrap();
        assert_eq!(second.seq_no, first.seq_no);

        // Act
        drop(first);

        // Assert
        assert_eq!(table.len(), 1, "successor's entry must survive");
        drop(second);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_close_wakes_waiters_and_rejects_new_calls() {
        // Arrange
        let table = WaiterTable::default();
        let counter = SequenceCounter::new();
        let (_call, mut rx) = table.register(&counter, Function::GetSetup).unwrap();

        // Act
        let pending = table.close();

        // Assert
        assert_eq!(pending, Some(1));
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
        assert!(matches!(
            table.register(&counter, Function::GetSetup),
            Err(TransportError::Closed)
        ));
        assert_eq!(table.close(), None, "second close is a no-op");
    }

    #[test]
    fn test_is_transient_send_error() {
        use std::io::{Error, ErrorKind};
        assert!(is_transient_send_error(&Error::from(ErrorKind::ConnectionRefused)));
        assert!(!is_transient_send_error(&Error::from(ErrorKind::PermissionDenied)));
    }

    #[test]
    fn test_device_identity_requires_serial_and_key() {
        let mut missing = response(Function::Discovery, 0);
        missing.payload.insert("serial".into(), Value::from("ABC123"));

        assert!(matches!(
            DeviceIdentity::from_response(&missing),
            Err(TransportError::Discovery(_))
        ));
    }

    #[test]
    fn test_device_identity_parses_numeric_serial_and_key() {
        // Arrange
        let key = PrivateKey::generate(1024).unwrap();
        let mut reply = response(Function::Discovery, 0);
        reply.payload.insert("serial".into(), Value::Int(123456));
        reply.payload.insert(
            "rsa_key".into(),
            Value::from(key.public_key().to_base64().unwrap()),
        );

        // Act
        let identity = DeviceIdentity::from_response(&reply).unwrap();

        // Assert
        assert_eq!(identity.serial, "123456");
        assert_eq!(&identity.public_key, key.public_key());
    }

    #[test]
    fn test_transport_config_default_uses_device_port() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.device_addr.port(), 8483);
        assert_eq!(cfg.app_id.as_str(), "nbe-bridge");
        assert_eq!(cfg.max_attempts, 3);
    }

    #[tokio::test]
    async fn test_send_after_close_returns_closed() {
        // Arrange
        let cfg = TransportConfig {
            device_addr: "127.0.0.1:9".parse().unwrap(),
            ..Default::default()
        };
        let transport = Transport::connect(cfg).await.unwrap();

        // Act
        transport.close();
        let result = transport.send(Function::GetSetup, "boiler.*").await;

        // Assert
        assert!(matches!(result, Err(TransportError::Closed)));
        assert!(transport.is_closed());
    }
}
