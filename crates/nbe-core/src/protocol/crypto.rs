//! The controller firmware's legacy RSA transform.
//!
//! This is textbook ("raw") RSA with no padding scheme: the 64-byte request
//! body is read as one big-endian integer `m` and raised to the public
//! exponent, `c = m^e mod n`.  It exists to talk to the firmware, not to
//! protect anything, and must be reproduced bit for bit.
//!
//! # Block sizes
//!
//! - Plaintext: exactly [`PLAINTEXT_LEN`] (64) bytes.
//! - Ciphertext: exactly [`CIPHERTEXT_LEN`] (256) bytes, big-endian and
//!   left-padded with zeros.
//!
//! # Leading zeros (for beginners)
//!
//! Converting bytes to an integer and back loses leading zero bytes: the
//! integer for `[0x00, 0x01]` is just 1, which converts back to `[0x01]`.
//! After decryption the result is therefore left-padded back to 64 bytes.
//! A result *longer* than 64 bytes cannot come from a valid request and is
//! rejected rather than truncated.
//!
//! # Key exchange
//!
//! The controller publishes its public key in the Discovery response as a
//! base64-encoded DER `SubjectPublicKeyInfo`.  [`PublicKey::from_base64`]
//! parses that form.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

/// Size of the logical plaintext block.
pub const PLAINTEXT_LEN: usize = 64;

/// Size of the encrypted block on the wire.
pub const CIPHERTEXT_LEN: usize = 256;

/// Errors raised by the RSA transform and key handling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The key text is not valid base64.
    #[error("public key is not valid base64: {0}")]
    InvalidBase64(String),

    /// The DER structure could not be parsed as an RSA public key.
    #[error("invalid RSA key: {0}")]
    InvalidKey(String),

    /// The plaintext integer is not smaller than the modulus.
    #[error("plaintext does not fit below the key modulus")]
    MessageTooLarge,

    /// The modulus is wider than the fixed ciphertext block.
    #[error("ciphertext of {len} bytes exceeds the {CIPHERTEXT_LEN}-byte block")]
    CiphertextTooLong { len: usize },

    /// The decrypted integer is longer than the logical block (corruption).
    #[error("decrypted block is {len} bytes, expected at most {PLAINTEXT_LEN}")]
    DecryptedTooLong { len: usize },

    /// An encrypted request was built before the device key was known.
    #[error("no public key available for encryption")]
    MissingPublicKey,

    /// An encrypted request arrived at a peer without a private key.
    #[error("no private key available for decryption")]
    MissingPrivateKey,

    /// Key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}

/// An RSA public key `(n, e)` as used by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    n: BigUint,
    e: BigUint,
}

impl PublicKey {
    /// Builds a key from its modulus and public exponent.
    pub fn new(n: BigUint, e: BigUint) -> Self {
        Self { n, e }
    }

    /// Parses a DER-encoded `SubjectPublicKeyInfo`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the DER is not an RSA public key.
    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self::new(key.n().clone(), key.e().clone()))
    }

    /// Parses the base64 form published in the Discovery response.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidBase64`] or [`CryptoError::InvalidKey`].
    pub fn from_base64(text: &str) -> Result<Self, CryptoError> {
        let der = STANDARD
            .decode(text.trim())
            .map_err(|e| CryptoError::InvalidBase64(e.to_string()))?;
        Self::from_der(&der)
    }

    /// Encodes the key as base64 DER `SubjectPublicKeyInfo`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKey`] if the components do not form a valid key.
    pub fn to_base64(&self) -> Result<String, CryptoError> {
        let key = RsaPublicKey::new(self.n.clone(), self.e.clone())
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let der = key
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(STANDARD.encode(der.as_bytes()))
    }

    /// Bit length of the modulus.
    pub fn modulus_bits(&self) -> usize {
        self.n.bits()
    }

    /// Computes `c = m^e mod n` and returns `c` as a 256-byte block.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MessageTooLarge`] if `m >= n` and
    /// [`CryptoError::CiphertextTooLong`] if the modulus is wider than 2048 bits.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let m = BigUint::from_bytes_be(plaintext);
        if m >= self.n {
            return Err(CryptoError::MessageTooLarge);
        }
        let c = m.modpow(&self.e, &self.n).to_bytes_be();
        left_pad(&c, CIPHERTEXT_LEN).ok_or(CryptoError::CiphertextTooLong { len: c.len() })
    }
}

/// The device-side private key `(n, d)`.
///
/// The bridge itself never decrypts; this half exists for the simulated
/// controller and for tests.
#[derive(Debug, Clone)]
pub struct PrivateKey {
    d: BigUint,
    public: PublicKey,
}

impl PrivateKey {
    /// Builds a key from modulus, public exponent, and private exponent.
    pub fn new(n: BigUint, e: BigUint, d: BigUint) -> Self {
        Self {
            d,
            public: PublicKey::new(n, e),
        }
    }

    /// Generates a fresh key pair with a modulus of `bits` bits.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyGeneration`] if the RNG or prime search fails.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        let key = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Ok(Self::new(key.n().clone(), key.e().clone(), key.d().clone()))
    }

    /// The matching public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Computes `m = c^d mod n` and returns the 64-byte logical block.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::DecryptedTooLong`] when the result exceeds
    /// [`PLAINTEXT_LEN`] bytes.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<[u8; PLAINTEXT_LEN], CryptoError> {
        let c = BigUint::from_bytes_be(ciphertext);
        let m = c.modpow(&self.d, &self.public.n).to_bytes_be();
        let padded =
            left_pad(&m, PLAINTEXT_LEN).ok_or(CryptoError::DecryptedTooLong { len: m.len() })?;
        let mut block = [0u8; PLAINTEXT_LEN];
        block.copy_from_slice(&padded);
        Ok(block)
    }
}

/// Left-pads `bytes` with zeros to `width`, or `None` if it is already wider.
fn left_pad(bytes: &[u8], width: usize) -> Option<Vec<u8>> {
    if bytes.len() > width {
        return None;
    }
    let mut out = vec![0u8; width];
    out[width - bytes.len()..].copy_from_slice(bytes);
    Some(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    /// Key generation is slow, so every test shares one key pair.
    fn test_key() -> &'static PrivateKey {
        static KEY: OnceLock<PrivateKey> = OnceLock::new();
        KEY.get_or_init(|| PrivateKey::generate(1024).expect("key generation"))
    }

    fn block(fill: u8) -> [u8; PLAINTEXT_LEN] {
        let mut b = [fill; PLAINTEXT_LEN];
        b[0] = 0x02;
        b
    }

    #[test]
    fn test_encrypt_produces_fixed_size_block() {
        // Arrange
        let key = test_key();

        // Act
        let cipher = key.public_key().encrypt(&block(b'a')).unwrap();

        // Assert
        assert_eq!(cipher.len(), CIPHERTEXT_LEN);
    }

    #[test]
    fn test_decrypt_inverts_encrypt() {
        let key = test_key();
        let plain = block(b'x');

        let cipher = key.public_key().encrypt(&plain).unwrap();
        let decrypted = key.decrypt(&cipher).unwrap();

        assert_eq!(decrypted, plain);
    }

    #[test]
    fn test_decrypt_restores_lost_leading_zeros() {
        // Arrange – the integer round trip drops the three leading zeros
        let key = test_key();
        let mut plain = [0u8; PLAINTEXT_LEN];
        plain[3..].fill(0x5A);

        // Act
        let cipher = key.public_key().encrypt(&plain).unwrap();
        let decrypted = key.decrypt(&cipher).unwrap();

        // Assert
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn test_decrypt_of_all_zero_block() {
        let key = test_key();
        let plain = [0u8; PLAINTEXT_LEN];

        let cipher = key.public_key().encrypt(&plain).unwrap();

        assert_eq!(key.decrypt(&cipher).unwrap(), plain);
    }

    #[test]
    fn test_over_length_decrypted_block_is_rejected() {
        // Arrange – 65 significant bytes encrypt fine but can never be a
        // valid request body
        let key = test_key();
        let mut plain = vec![0x11u8; PLAINTEXT_LEN + 1];
        plain[0] = 0x01;
        let cipher = key.public_key().encrypt(&plain).unwrap();

        // Act
        let result = key.decrypt(&cipher);

        // Assert
        assert_eq!(
            result,
            Err(CryptoError::DecryptedTooLong {
                len: PLAINTEXT_LEN + 1
            })
        );
    }

    #[test]
    fn test_encrypt_rejects_message_not_below_modulus() {
        let key = test_key();
        let too_big = vec![0xFFu8; 200];

        assert_eq!(
            key.public_key().encrypt(&too_big),
            Err(CryptoError::MessageTooLarge)
        );
    }

    #[test]
    fn test_public_key_base64_round_trip() {
        let key = test_key();

        let text = key.public_key().to_base64().unwrap();
        let parsed = PublicKey::from_base64(&text).unwrap();

        assert_eq!(&parsed, key.public_key());
        assert_eq!(parsed.modulus_bits(), 1024);
    }

    #[test]
    fn test_from_base64_rejects_garbage() {
        assert!(matches!(
            PublicKey::from_base64("not base64!"),
            Err(CryptoError::InvalidBase64(_))
        ));
        assert!(matches!(
            PublicKey::from_base64("AAAA"),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_left_pad() {
        assert_eq!(left_pad(&[1, 2], 4), Some(vec![0, 0, 1, 2]));
        assert_eq!(left_pad(&[1, 2, 3], 2), None);
    }
}
