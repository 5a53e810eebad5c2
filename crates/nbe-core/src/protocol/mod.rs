//! Protocol module: message types, the binary codec, the legacy RSA
//! transform, and sequence numbering.

pub mod codec;
pub mod crypto;
pub mod messages;
pub mod sequence;

pub use codec::{
    decode_request, decode_response, encode_request, encode_response, FormatError, ProtocolError,
};
pub use crypto::{CryptoError, PrivateKey, PublicKey};
pub use messages::*;
pub use sequence::{wire_seq_no, SequenceCounter};
