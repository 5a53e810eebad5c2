//! NBE controller protocol message types.
//!
//! Every datagram starts with the same 19-byte header:
//!
//! ```text
//! [app_id:12][controller_id:6][encryption_marker:1][body:N]
//! ```
//!
//! The body layout differs between requests and responses; see
//! [`crate::protocol::codec`] for the exact offsets.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::domain::value::{Payload, Value};
use crate::protocol::codec::FormatError;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Length of the application identifier field.
pub const APP_ID_LEN: usize = 12;

/// Length of the controller identifier (device serial) field.
pub const CONTROLLER_ID_LEN: usize = 6;

/// Total size of the common header in bytes.
pub const HEADER_SIZE: usize = APP_ID_LEN + CONTROLLER_ID_LEN + 1;

/// Offset of the encryption marker byte.
pub const MARKER_OFFSET: usize = APP_ID_LEN + CONTROLLER_ID_LEN;

/// Marker byte for a plaintext body.
pub const MARKER_PLAIN: u8 = b' ';

/// Marker byte for an RSA-encrypted request body.
pub const MARKER_ENCRYPTED: u8 = b'*';

/// First byte of every body.
pub const START_MARKER: u8 = 0x02;

/// Last byte of every body.
pub const END_MARKER: u8 = 0x04;

/// Width of the pin code field in a request body.
pub const PIN_CODE_LEN: usize = 10;

/// Largest payload the three-digit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = 999;

/// Sequence numbers are two decimal digits on the wire.
pub const SEQ_NO_MODULUS: u64 = 100;

/// Default UDP port the controller listens on.
pub const DEFAULT_PORT: u16 = 8483;

/// Application identifier the bridge announces itself with.
pub const DEFAULT_APP_ID: AppId = FixedAscii(*b"nbe-bridge  ");

// ── Function codes ────────────────────────────────────────────────────────────

/// The operation a request asks the controller to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Function {
    /// Bootstrap: returns the device serial and its RSA public key.
    Discovery = 0,
    /// Reads one key, a category, or every setting.
    GetSetup = 1,
    /// Writes one setting (`category.key=value`).  Always encrypted.
    SetSetup = 2,
    /// Live telemetry.
    GetOperatingData = 4,
    /// Extended telemetry.
    GetAdvancedData = 5,
}

impl Function {
    /// Returns the two-digit wire code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// `true` when requests for this function must be RSA-encrypted.
    ///
    /// Writes carry the pin code, so they never travel in plain text.
    pub fn requires_encryption(self) -> bool {
        matches!(self, Function::SetSetup)
    }
}

impl TryFrom<u8> for Function {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Function::Discovery),
            1 => Ok(Function::GetSetup),
            2 => Ok(Function::SetSetup),
            4 => Ok(Function::GetOperatingData),
            5 => Ok(Function::GetAdvancedData),
            _ => Err(()),
        }
    }
}

// ── Fixed-width identifiers ───────────────────────────────────────────────────

/// A fixed-width ASCII field, right-padded with spaces.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedAscii<const N: usize>([u8; N]);

/// Client application identifier (12 bytes).
pub type AppId = FixedAscii<APP_ID_LEN>;

/// Controller identifier: the device serial number (6 bytes).
pub type ControllerId = FixedAscii<CONTROLLER_ID_LEN>;

impl<const N: usize> FixedAscii<N> {
    /// Pads `text` with spaces to `N` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::FieldTooLong`] if `text` is longer than `N`
    /// bytes and [`FormatError::NonAscii`] if it contains non-ASCII characters.
    pub fn new(text: &str) -> Result<Self, FormatError> {
        if !text.is_ascii() {
            return Err(FormatError::NonAscii { field: "identifier" });
        }
        if text.len() > N {
            return Err(FormatError::FieldTooLong {
                field: "identifier",
                max: N,
                actual: text.len(),
            });
        }
        let mut bytes = [b' '; N];
        bytes[..text.len()].copy_from_slice(text.as_bytes());
        Ok(Self(bytes))
    }

    /// Reads the field from the wire.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::NonAscii`] if any byte is outside ASCII.
    pub fn from_wire(bytes: [u8; N]) -> Result<Self, FormatError> {
        if !bytes.is_ascii() {
            return Err(FormatError::NonAscii { field: "identifier" });
        }
        Ok(Self(bytes))
    }

    /// The padded wire bytes.
    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// The identifier with trailing padding removed.
    pub fn as_str(&self) -> &str {
        // Constructors only admit ASCII, which is always valid UTF-8.
        std::str::from_utf8(&self.0)
            .unwrap_or_default()
            .trim_end_matches(' ')
    }
}

/// An all-blank field.
impl<const N: usize> Default for FixedAscii<N> {
    fn default() -> Self {
        Self([b' '; N])
    }
}

impl<const N: usize> fmt::Display for FixedAscii<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> fmt::Debug for FixedAscii<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

/// A request sent from the bridge to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub app_id: AppId,
    pub controller_id: ControllerId,
    /// Whether the body travels RSA-encrypted (marker `'*'`).
    pub encrypted: bool,
    pub function: Function,
    /// Two-digit wire sequence number (0..=99).
    pub seq_no: u8,
    /// Device pin code, at most [`PIN_CODE_LEN`] ASCII characters.
    pub pin_code: String,
    /// Unix time in seconds when the request was built.
    pub timestamp: u64,
    /// Empty for discovery, a dotted path for reads, `category.key=value` for writes.
    pub payload: Vec<u8>,
}

impl Request {
    /// Builds a request stamped with the current time.
    ///
    /// Encryption is switched on automatically for functions that require it.
    pub fn new(
        app_id: AppId,
        controller_id: ControllerId,
        function: Function,
        seq_no: u8,
        pin_code: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            app_id,
            controller_id,
            encrypted: function.requires_encryption(),
            function,
            seq_no,
            pin_code: pin_code.into(),
            timestamp: unix_time_secs(),
            payload: payload.into(),
        }
    }
}

/// A response from the controller.
///
/// `app_id`, `controller_id`, `function` and `seq_no` echo the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub app_id: AppId,
    pub controller_id: ControllerId,
    pub function: Function,
    pub seq_no: u8,
    /// 0 = success; anything else is a device-reported error.
    pub status: u8,
    pub payload: Payload,
}

impl Response {
    /// Builds a successful, empty reply to `request`.
    pub fn reply_to(request: &Request) -> Self {
        Self {
            app_id: request.app_id,
            controller_id: request.controller_id,
            function: request.function,
            seq_no: request.seq_no,
            status: 0,
            payload: Payload::new(),
        }
    }

    /// `true` when the controller reported success.
    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// `true` when every correlation field echoes `request`.
    pub fn answers(&self, request: &Request) -> bool {
        self.app_id == request.app_id
            && self.controller_id == request.controller_id
            && self.function == request.function
            && self.seq_no == request.seq_no
    }

    /// Looks up a payload entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// Returns the current Unix time in seconds, or 0 if the clock is before 1970.
pub fn unix_time_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
