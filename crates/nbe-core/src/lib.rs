//! # nbe-core
//!
//! Shared library for talking to NBE pellet-boiler controllers: the UDP wire
//! format, the firmware's legacy RSA transform, and the typed values the
//! controller reports.
//!
//! It has no sockets and no async runtime; `nbe-bridge` builds the transport
//! and the polling monitors on top of it.
//!
//! # Architecture overview (for beginners)
//!
//! The controller speaks a small request/response protocol over UDP.  Each
//! datagram has a 19-byte header followed by a body:
//!
//! - **`protocol`** – How bytes travel over the network.  [`Request`]s and
//!   [`Response`]s are encoded into the fixed ASCII layout the firmware
//!   expects, and writes are run through the RSA transform first.
//!
//! - **`domain`** – What the bytes mean once decoded: typed [`Value`]s
//!   (with the precision-fixed [`RoundedFloat`]) and the `category.key`
//!   [`SettingPath`] addressing scheme.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `nbe_core::Value` instead of `nbe_core::domain::value::Value`.
pub use domain::path::{InvalidPath, SettingPath};
pub use domain::value::{Payload, RoundedFloat, Value};
pub use protocol::codec::{
    decode_request, decode_response, encode_request, encode_response, FormatError, ProtocolError,
};
pub use protocol::crypto::{CryptoError, PrivateKey, PublicKey};
pub use protocol::messages::{AppId, ControllerId, Function, Request, Response};
