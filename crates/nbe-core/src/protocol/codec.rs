//! Binary codec for NBE controller datagrams.
//!
//! Header (both directions):
//! ```text
//! [app_id:12][controller_id:6][marker:1]
//! ```
//!
//! Request body (plaintext, or the 64-byte block behind the RSA transform
//! when the marker is `'*'`):
//! ```text
//! [0x02][function:2][seq_no:2][pin_code:10][timestamp:10][reserved:4][len:3][payload:len][0x04]
//! ```
//!
//! Response body (always plaintext):
//! ```text
//! [0x02][function:2][seq_no:2][status:1][len:3][payload:len][0x04]
//! ```
//!
//! Numeric fields are zero-padded ASCII decimal.  The response payload is a
//! list of `key=value` pairs joined by `;`.

use thiserror::Error;

use crate::domain::value::{Payload, Value};
use crate::protocol::crypto::{CryptoError, PrivateKey, PublicKey, CIPHERTEXT_LEN, PLAINTEXT_LEN};
use crate::protocol::messages::{
    AppId, ControllerId, Function, Request, Response, APP_ID_LEN, CONTROLLER_ID_LEN, END_MARKER,
    HEADER_SIZE, MARKER_ENCRYPTED, MARKER_OFFSET, MARKER_PLAIN, MAX_PAYLOAD_LEN, PIN_CODE_LEN,
    SEQ_NO_MODULUS, START_MARKER,
};

// ── Body offsets ──────────────────────────────────────────────────────────────

const FUNCTION_AT: usize = 1;
const SEQ_NO_AT: usize = 3;

const REQ_PIN_AT: usize = 5;
const REQ_TIMESTAMP_AT: usize = REQ_PIN_AT + PIN_CODE_LEN;
const REQ_TIMESTAMP_LEN: usize = 10;
const REQ_RESERVED_AT: usize = REQ_TIMESTAMP_AT + REQ_TIMESTAMP_LEN;
const REQ_RESERVED: &[u8; 4] = b"    ";
const REQ_LEN_AT: usize = REQ_RESERVED_AT + REQ_RESERVED.len();
const REQ_PAYLOAD_AT: usize = REQ_LEN_AT + 3;

const RESP_STATUS_AT: usize = 5;
const RESP_LEN_AT: usize = 6;
const RESP_PAYLOAD_AT: usize = 9;

const MAX_TIMESTAMP: u64 = 9_999_999_999;
const MAX_STATUS: u8 = 9;

/// Errors for datagrams that do not follow the wire format.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The function code is not one this protocol version defines.
    #[error("unknown function code: {0}")]
    UnknownFunction(u8),

    /// The encryption marker is neither `' '` nor `'*'`.
    #[error("unknown encryption marker: 0x{0:02X}")]
    UnknownMarker(u8),

    /// A start or end marker is missing.
    #[error("expected marker 0x{expected:02X} at body offset {offset}, found 0x{found:02X}")]
    MissingMarker { expected: u8, found: u8, offset: usize },

    /// A numeric field holds something other than ASCII digits.
    #[error("{field} is not a decimal number: {text:?}")]
    InvalidNumber { field: &'static str, text: String },

    /// A numeric field is too large for its fixed width.
    #[error("{field} value {value} exceeds maximum {max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        max: u64,
    },

    /// A text field is wider than its fixed width.
    #[error("{field} is {actual} bytes, at most {max} allowed")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// A text field contains non-ASCII bytes.
    #[error("{field} contains non-ASCII bytes")]
    NonAscii { field: &'static str },

    /// The declared payload length does not match the data available.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// The payload could not be parsed as `key=value` pairs.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Any failure of the codec, including the RSA layer for encrypted requests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

// ── Requests ──────────────────────────────────────────────────────────────────

/// Encodes a request datagram.
///
/// When `request.encrypted` is set the body is zero-padded to the 64-byte
/// block and run through the RSA transform with `key`.
///
/// # Errors
///
/// Returns [`ProtocolError::Format`] for fields that do not fit the wire
/// layout and [`ProtocolError::Crypto`] when encryption is required but `key`
/// is `None` or the transform fails.
pub fn encode_request(request: &Request, key: Option<&PublicKey>) -> Result<Vec<u8>, ProtocolError> {
    let body = encode_request_body(request)?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + CIPHERTEXT_LEN.max(body.len()));
    buf.extend_from_slice(request.app_id.as_bytes());
    buf.extend_from_slice(request.controller_id.as_bytes());

    if request.encrypted {
        let key = key.ok_or(CryptoError::MissingPublicKey)?;
        if body.len() > PLAINTEXT_LEN {
            return Err(FormatError::FieldTooLong {
                field: "encrypted body",
                max: PLAINTEXT_LEN,
                actual: body.len(),
            }
            .into());
        }
        let mut block = [0u8; PLAINTEXT_LEN];
        block[..body.len()].copy_from_slice(&body);
        buf.push(MARKER_ENCRYPTED);
        buf.extend_from_slice(&key.encrypt(&block)?);
    } else {
        buf.push(MARKER_PLAIN);
        buf.extend_from_slice(&body);
    }
    Ok(buf)
}

/// Decodes a request datagram (the controller's side of the exchange).
///
/// # Errors
///
/// Returns [`ProtocolError::Format`] for malformed datagrams and
/// [`ProtocolError::Crypto`] if the body is encrypted and `key` is `None` or
/// the decrypted block is invalid.
pub fn decode_request(bytes: &[u8], key: Option<&PrivateKey>) -> Result<Request, ProtocolError> {
    let (app_id, controller_id, marker) = decode_header(bytes)?;
    let rest = &bytes[HEADER_SIZE..];

    let (encrypted, body) = match marker {
        MARKER_PLAIN => (false, decode_request_body(rest)?),
        MARKER_ENCRYPTED => {
            let key = key.ok_or(CryptoError::MissingPrivateKey)?;
            if rest.len() != CIPHERTEXT_LEN {
                return Err(FormatError::PayloadLengthMismatch {
                    declared: CIPHERTEXT_LEN,
                    available: rest.len(),
                }
                .into());
            }
            let block = key.decrypt(rest)?;
            (true, decode_request_body(&block)?)
        }
        other => return Err(FormatError::UnknownMarker(other).into()),
    };

    Ok(Request {
        app_id,
        controller_id,
        encrypted,
        function: body.function,
        seq_no: body.seq_no,
        pin_code: body.pin_code,
        timestamp: body.timestamp,
        payload: body.payload,
    })
}

fn encode_request_body(request: &Request) -> Result<Vec<u8>, FormatError> {
    check_seq_no(request.seq_no)?;
    if !request.pin_code.is_ascii() {
        return Err(FormatError::NonAscii { field: "pin code" });
    }
    if request.pin_code.len() > PIN_CODE_LEN {
        return Err(FormatError::FieldTooLong {
            field: "pin code",
            max: PIN_CODE_LEN,
            actual: request.pin_code.len(),
        });
    }
    if request.timestamp > MAX_TIMESTAMP {
        return Err(FormatError::OutOfRange {
            field: "timestamp",
            value: request.timestamp,
            max: MAX_TIMESTAMP,
        });
    }
    check_payload_len(request.payload.len())?;

    let mut body = Vec::with_capacity(REQ_PAYLOAD_AT + request.payload.len() + 1);
    body.push(START_MARKER);
    body.extend_from_slice(format!("{:02}", request.function.code()).as_bytes());
    body.extend_from_slice(format!("{:02}", request.seq_no).as_bytes());
    body.extend_from_slice(format!("{:<width$}", request.pin_code, width = PIN_CODE_LEN).as_bytes());
    body.extend_from_slice(format!("{:010}", request.timestamp).as_bytes());
    body.extend_from_slice(REQ_RESERVED);
    body.extend_from_slice(format!("{:03}", request.payload.len()).as_bytes());
    body.extend_from_slice(&request.payload);
    body.push(END_MARKER);
    Ok(body)
}

struct RequestBody {
    function: Function,
    seq_no: u8,
    pin_code: String,
    timestamp: u64,
    payload: Vec<u8>,
}

/// Parses a request body.  Bytes after the end marker are padding.
fn decode_request_body(body: &[u8]) -> Result<RequestBody, FormatError> {
    ensure_len(body, REQ_PAYLOAD_AT + 1)?;
    expect_marker(body, 0, START_MARKER)?;

    let function = decode_function(&body[FUNCTION_AT..SEQ_NO_AT])?;
    let seq_no = parse_decimal(&body[SEQ_NO_AT..REQ_PIN_AT], "sequence number")? as u8;

    let pin = &body[REQ_PIN_AT..REQ_TIMESTAMP_AT];
    if !pin.is_ascii() {
        return Err(FormatError::NonAscii { field: "pin code" });
    }
    let pin_code = String::from_utf8_lossy(pin).trim_end_matches(' ').to_string();

    let timestamp = parse_decimal(&body[REQ_TIMESTAMP_AT..REQ_RESERVED_AT], "timestamp")?;
    let payload = slice_payload(body, REQ_LEN_AT, REQ_PAYLOAD_AT)?;

    Ok(RequestBody {
        function,
        seq_no,
        pin_code,
        timestamp,
        payload: payload.to_vec(),
    })
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// Encodes a response datagram (the controller's side of the exchange).
///
/// # Errors
///
/// Returns [`FormatError`] if a field does not fit the wire layout or the
/// payload cannot be written as `key=value` pairs.
pub fn encode_response(response: &Response) -> Result<Vec<u8>, FormatError> {
    check_seq_no(response.seq_no)?;
    if response.status > MAX_STATUS {
        return Err(FormatError::OutOfRange {
            field: "status",
            value: u64::from(response.status),
            max: u64::from(MAX_STATUS),
        });
    }
    let payload = encode_payload(&response.payload)?;
    check_payload_len(payload.len())?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + RESP_PAYLOAD_AT + payload.len() + 1);
    buf.extend_from_slice(response.app_id.as_bytes());
    buf.extend_from_slice(response.controller_id.as_bytes());
    buf.push(MARKER_PLAIN);
    buf.push(START_MARKER);
    buf.extend_from_slice(format!("{:02}", response.function.code()).as_bytes());
    buf.extend_from_slice(format!("{:02}", response.seq_no).as_bytes());
    buf.extend_from_slice(format!("{}", response.status).as_bytes());
    buf.extend_from_slice(format!("{:03}", payload.len()).as_bytes());
    buf.extend_from_slice(payload.as_bytes());
    buf.push(END_MARKER);
    Ok(buf)
}

/// Decodes a response datagram.
///
/// # Errors
///
/// Returns [`FormatError`] if the datagram is shorter than the header, the
/// body layout is wrong, or the payload cannot be parsed.
///
/// # Examples
///
/// ```rust
/// use nbe_core::protocol::codec::{decode_response, encode_response};
/// use nbe_core::protocol::messages::{AppId, ControllerId, Function, Response};
/// use nbe_core::{Payload, Value};
///
/// let mut payload = Payload::new();
/// payload.insert("state".to_string(), Value::Int(5));
/// let original = Response {
///     app_id: AppId::new("nbe-bridge").unwrap(),
///     controller_id: ControllerId::new("ABC123").unwrap(),
///     function: Function::GetOperatingData,
///     seq_no: 7,
///     status: 0,
///     payload,
/// };
/// let bytes = encode_response(&original).unwrap();
/// assert_eq!(decode_response(&bytes).unwrap(), original);
/// ```
pub fn decode_response(bytes: &[u8]) -> Result<Response, FormatError> {
    let (app_id, controller_id, marker) = decode_header(bytes)?;
    if marker != MARKER_PLAIN {
        return Err(FormatError::UnknownMarker(marker));
    }
    let body = &bytes[HEADER_SIZE..];

    ensure_len(body, RESP_PAYLOAD_AT + 1)?;
    expect_marker(body, 0, START_MARKER)?;

    let function = decode_function(&body[FUNCTION_AT..SEQ_NO_AT])?;
    let seq_no = parse_decimal(&body[SEQ_NO_AT..RESP_STATUS_AT], "sequence number")? as u8;
    let status = parse_decimal(&body[RESP_STATUS_AT..RESP_LEN_AT], "status")? as u8;
    let raw = slice_payload(body, RESP_LEN_AT, RESP_PAYLOAD_AT)?;
    let text = std::str::from_utf8(raw)
        .map_err(|e| FormatError::MalformedPayload(format!("payload is not UTF-8: {e}")))?;

    Ok(Response {
        app_id,
        controller_id,
        function,
        seq_no,
        status,
        payload: decode_payload(text)?,
    })
}

// ── Payload text ──────────────────────────────────────────────────────────────

/// Writes a payload as `key=value;key=value`.
///
/// # Errors
///
/// Returns [`FormatError::MalformedPayload`] for keys that are empty or
/// contain `=`/`;`, for values that contain `;`, and for strings whose text
/// would decode as another type (`Value::Str("75")` reads back as an `Int`).
pub fn encode_payload(payload: &Payload) -> Result<String, FormatError> {
    let mut pairs = Vec::with_capacity(payload.len());
    for (key, value) in payload {
        if key.is_empty() || key.contains(['=', ';']) {
            return Err(FormatError::MalformedPayload(format!(
                "key {key:?} cannot be encoded"
            )));
        }
        let text = value.to_wire();
        if text.contains(';') {
            return Err(FormatError::MalformedPayload(format!(
                "value for {key:?} contains ';'"
            )));
        }
        if Value::from_wire(&text) != *value {
            return Err(FormatError::MalformedPayload(format!(
                "value for {key:?} would decode as a different type: {text:?}"
            )));
        }
        pairs.push(format!("{key}={text}"));
    }
    Ok(pairs.join(";"))
}

/// Parses `key=value;key=value` into a typed payload.
///
/// Empty segments (a trailing `;`) are skipped.  A repeated key keeps its
/// last value.
///
/// # Errors
///
/// Returns [`FormatError::MalformedPayload`] for a segment without `=` or
/// with an empty key.
pub fn decode_payload(text: &str) -> Result<Payload, FormatError> {
    let mut payload = Payload::new();
    for segment in text.split(';').filter(|s| !s.is_empty()) {
        let (key, value) = segment.split_once('=').ok_or_else(|| {
            FormatError::MalformedPayload(format!("segment {segment:?} has no '='"))
        })?;
        if key.is_empty() {
            return Err(FormatError::MalformedPayload(format!(
                "segment {segment:?} has an empty key"
            )));
        }
        payload.insert(key.to_string(), Value::from_wire(value));
    }
    Ok(payload)
}

// ── Field helpers ─────────────────────────────────────────────────────────────

fn decode_header(bytes: &[u8]) -> Result<(AppId, ControllerId, u8), FormatError> {
    if bytes.len() < HEADER_SIZE {
        return Err(FormatError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }
    let mut app = [0u8; APP_ID_LEN];
    app.copy_from_slice(&bytes[..APP_ID_LEN]);
    let mut controller = [0u8; CONTROLLER_ID_LEN];
    controller.copy_from_slice(&bytes[APP_ID_LEN..MARKER_OFFSET]);

    Ok((
        AppId::from_wire(app)?,
        ControllerId::from_wire(controller)?,
        bytes[MARKER_OFFSET],
    ))
}

fn ensure_len(body: &[u8], needed: usize) -> Result<(), FormatError> {
    if body.len() < needed {
        return Err(FormatError::InsufficientData {
            needed: HEADER_SIZE + needed,
            available: HEADER_SIZE + body.len(),
        });
    }
    Ok(())
}

fn expect_marker(body: &[u8], offset: usize, expected: u8) -> Result<(), FormatError> {
    match body.get(offset) {
        Some(&found) if found == expected => Ok(()),
        Some(&found) => Err(FormatError::MissingMarker {
            expected,
            found,
            offset,
        }),
        None => Err(FormatError::InsufficientData {
            needed: HEADER_SIZE + offset + 1,
            available: HEADER_SIZE + body.len(),
        }),
    }
}

fn decode_function(field: &[u8]) -> Result<Function, FormatError> {
    let code = parse_decimal(field, "function")? as u8;
    Function::try_from(code).map_err(|_| FormatError::UnknownFunction(code))
}

/// Reads the three-digit length at `len_at` and returns the payload that
/// follows at `payload_at`, checking the end marker behind it.
fn slice_payload(body: &[u8], len_at: usize, payload_at: usize) -> Result<&[u8], FormatError> {
    let declared = parse_decimal(&body[len_at..payload_at], "payload length")? as usize;
    let end = payload_at + declared;
    if body.len() <= end {
        return Err(FormatError::PayloadLengthMismatch {
            declared,
            available: body.len().saturating_sub(payload_at + 1),
        });
    }
    expect_marker(body, end, END_MARKER)?;
    Ok(&body[payload_at..end])
}

fn parse_decimal(field: &[u8], name: &'static str) -> Result<u64, FormatError> {
    if field.is_empty() || !field.iter().all(u8::is_ascii_digit) {
        return Err(FormatError::InvalidNumber {
            field: name,
            text: String::from_utf8_lossy(field).into_owned(),
        });
    }
    Ok(field
        .iter()
        .fold(0u64, |acc, d| acc * 10 + u64::from(d - b'0')))
}

fn check_seq_no(seq_no: u8) -> Result<(), FormatError> {
    if u64::from(seq_no) >= SEQ_NO_MODULUS {
        return Err(FormatError::OutOfRange {
            field: "sequence number",
            value: u64::from(seq_no),
            max: SEQ_NO_MODULUS - 1,
        });
    }
    Ok(())
}

fn check_payload_len(len: usize) -> Result<(), FormatError> {
    if len > MAX_PAYLOAD_LEN {
        return Err(FormatError::FieldTooLong {
            field: "payload",
            max: MAX_PAYLOAD_LEN,
            actual: len,
        });
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
