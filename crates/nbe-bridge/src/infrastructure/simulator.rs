//! A simulated boiler controller speaking the real wire protocol.
//!
//! The simulator binds a UDP socket on localhost, decodes requests with the
//! same codec the bridge uses (decrypting `SetSetup` bodies with its own
//! private key), and answers from an in-memory table of categories.  It backs
//! the end-to-end tests and the binary's `--simulate` mode.
//!
//! Behaviour mirrors the controller as far as the bridge can observe it:
//!
//! | request                     | reply payload                           |
//! |-----------------------------|-----------------------------------------|
//! | Discovery                   | `serial`, `rsa_key` (base64 SPKI)       |
//! | GetSetup `*`                | every `category.key` of every category  |
//! | GetSetup `category.*`       | every `key` of that category            |
//! | GetSetup `category.key`     | that one `key`, or nothing              |
//! | GetOperatingData            | the `operating` category                |
//! | GetAdvancedData             | the `advanced` category                 |
//! | SetSetup `category.key=v`   | `status=ok`; stores `v`, typed as read  |
//!
//! Requests that fail to decode or decrypt, or that name another serial, get
//! no reply at all, as on the real device.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use nbe_core::{
    decode_request, encode_response, ControllerId, CryptoError, FormatError, Function, Payload,
    PrivateKey, PublicKey, Request, Response, RoundedFloat, Value,
};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Modulus size for keys the simulator generates itself.
const SIMULATOR_KEY_BITS: usize = 1024;

/// Errors starting the simulator.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("key error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("invalid serial: {0}")]
    Serial(#[from] FormatError),
}

/// The last write the simulator accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetRecord {
    pub category: String,
    pub key: String,
    pub value: String,
}

struct BoilerState {
    serial: ControllerId,
    key: PrivateKey,
    rsa_key: String,
    data: RwLock<BTreeMap<String, Payload>>,
    requests: AtomicUsize,
    muted: AtomicBool,
    last_set: Mutex<Option<SetRecord>>,
}

/// Handle to a running simulated controller.  Dropping it stops the simulator.
pub struct SimulatedBoiler {
    addr: SocketAddr,
    state: Arc<BoilerState>,
    task: JoinHandle<()>,
}

impl SimulatedBoiler {
    /// Starts a simulator for `serial` with a freshly generated key.
    ///
    /// # Errors
    ///
    /// Fails if the serial does not fit the header, key generation fails, or
    /// the socket cannot be bound.
    pub async fn start(serial: &str) -> Result<Self, SimulatorError> {
        Self::start_with_key(serial, PrivateKey::generate(SIMULATOR_KEY_BITS)?).await
    }

    /// Starts a simulator for `serial` that decrypts with `key`.
    ///
    /// # Errors
    ///
    /// Fails if the serial does not fit the header or the socket cannot be bound.
    pub async fn start_with_key(serial: &str, key: PrivateKey) -> Result<Self, SimulatorError> {
        let serial = ControllerId::new(serial)?;
        let state = Arc::new(BoilerState::new(serial, key)?);
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await?;
        let addr = socket.local_addr()?;

        let task = tokio::spawn(serve(socket, Arc::clone(&state)));

        info!(%addr, serial = %serial, "simulated boiler listening");
        Ok(Self { addr, state, task })
    }

    /// Address the simulator listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn serial(&self) -> ControllerId {
        self.state.serial
    }

    pub fn public_key(&self) -> &PublicKey {
        self.state.key.public_key()
    }

    /// Overwrites one stored value.
    pub fn set_value(&self, category: &str, key: &str, value: impl Into<Value>) {
        self.state
            .data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(category.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Reads one stored value.
    pub fn value(&self, category: &str, key: &str) -> Option<Value> {
        self.state
            .data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(category)
            .and_then(|values| values.get(key))
            .cloned()
    }

    /// Number of datagrams received, including ones that were not answered.
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// While muted the simulator counts requests but never replies.
    pub fn set_muted(&self, muted: bool) {
        self.state.muted.store(muted, Ordering::SeqCst);
    }

    pub fn last_set(&self) -> Option<SetRecord> {
        self.state
            .last_set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stops answering and releases the socket.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for SimulatedBoiler {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(socket: UdpSocket, state: Arc<BoilerState>) {
    let mut buf = vec![0u8; 2048];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                debug!("simulator recv error: {e}");
                continue;
            }
        };
        state.requests.fetch_add(1, Ordering::SeqCst);
        if state.muted.load(Ordering::SeqCst) {
            continue;
        }

        let request = match decode_request(&buf[..len], Some(&state.key)) {
            Ok(request) => request,
            Err(e) => {
                debug!(%peer, "simulator ignoring malformed request: {e}");
                continue;
            }
        };
        if request.controller_id != state.serial {
            debug!(%peer, serial = %request.controller_id, "simulator ignoring request for another serial");
            continue;
        }

        let response = state.handle(&request);
        match encode_response(&response) {
            Ok(bytes) => {
                if let Err(e) = socket.send_to(&bytes, peer).await {
                    debug!(%peer, "simulator send error: {e}");
                }
            }
            Err(e) => debug!("simulator cannot encode response: {e}"),
        }
    }
}

impl BoilerState {
    fn new(serial: ControllerId, key: PrivateKey) -> Result<Self, CryptoError> {
        Ok(Self {
            serial,
            rsa_key: key.public_key().to_base64()?,
            key,
            data: RwLock::new(seed_data()),
            requests: AtomicUsize::new(0),
            muted: AtomicBool::new(false),
            last_set: Mutex::new(None),
        })
    }

    fn handle(&self, request: &Request) -> Response {
        let mut response = Response::reply_to(request);
        let text = String::from_utf8_lossy(&request.payload);

        match request.function {
            Function::Discovery => {
                response
                    .payload
                    .insert("serial".into(), Value::from_wire(self.serial.as_str()));
                response
                    .payload
                    .insert("rsa_key".into(), Value::from_wire(&self.rsa_key));
            }
            Function::GetSetup => response.payload = self.read(&text),
            Function::GetOperatingData => response.payload = self.category("operating"),
            Function::GetAdvancedData => response.payload = self.category("advanced"),
            Function::SetSetup => match parse_write(&text) {
                Some(record) => {
                    self.data
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .entry(record.category.clone())
                        .or_default()
                        .insert(record.key.clone(), Value::from_wire(&record.value));
                    debug!(category = %record.category, key = %record.key, value = %record.value, "simulator stored value");
                    *self.last_set.lock().unwrap_or_else(PoisonError::into_inner) = Some(record);
                    response.payload.insert("status".into(), Value::from("ok"));
                }
                None => response.status = 1,
            },
        }
        response
    }

    fn category(&self, name: &str) -> Payload {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    fn read(&self, path: &str) -> Payload {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        if path == "*" {
            return data
                .iter()
                .flat_map(|(category, values)| {
                    values
                        .iter()
                        .map(move |(key, value)| (format!("{category}.{key}"), value.clone()))
                })
                .collect();
        }
        if let Some(category) = path.strip_suffix(".*") {
            return data.get(category).cloned().unwrap_or_default();
        }
        path.split_once('.')
            .and_then(|(category, key)| {
                let value = data.get(category)?.get(key)?;
                Some(Payload::from([(key.to_string(), value.clone())]))
            })
            .unwrap_or_default()
    }
}

/// Splits `category.key=value`.
fn parse_write(text: &str) -> Option<SetRecord> {
    let (path, value) = text.split_once('=')?;
    let (category, key) = path.split_once('.')?;
    if category.is_empty() || key.is_empty() {
        return None;
    }
    Some(SetRecord {
        category: category.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn float(value: f64) -> Value {
    Value::Float(RoundedFloat::new(value))
}

fn seed_data() -> BTreeMap<String, Payload> {
    let categories: [(&str, Vec<(&str, Value)>); 8] = [
        (
            "boiler",
            vec![
                ("temp", float(65.0)),
                ("diff_under", float(5.0)),
                ("diff_over", float(15.0)),
            ],
        ),
        ("hot_water", vec![("diff_under", float(5.0))]),
        (
            "regulation",
            vec![
                ("boiler_power_min", Value::Int(30)),
                ("boiler_power_max", Value::Int(100)),
            ],
        ),
        ("oxygen", vec![("start_calibrate", Value::Int(0))]),
        ("hopper", vec![("content", float(150.0))]),
        ("misc", vec![("start", Value::Int(0)), ("stop", Value::Int(0))]),
        (
            "operating",
            vec![
                ("boiler_temp", float(62.5)),
                ("dhw_temp_sensor", float(48.5)),
                ("smoke_temp", float(125.3)),
                ("oxygen", float(12.5)),
                ("power_kw", float(15.2)),
                ("power_pct", float(75.0)),
                ("photo_level", float(88.0)),
                ("state", Value::Int(5)),
                ("state_text", Value::from("Power")),
            ],
        ),
        (
            "advanced",
            vec![
                ("fan_speed", Value::Int(2500)),
                ("auger_cycles", Value::Int(120)),
            ],
        ),
    ];
    categories
        .into_iter()
        .map(|(category, values)| {
            let payload = values
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect();
            (category.to_string(), payload)
        })
        .collect()
}
