//! P-256 key material for the ECDH key agreement and for VAPID signatures.
use std::fmt;

use aes_gcm::aead::OsRng;
use p256::{
    ecdh::{self, SharedSecret},
    elliptic_curve::{rand_core::CryptoRngCore, sec1::ToEncodedPoint},
    SecretKey,
};

use crate::{base64url, Error, Result};

pub const PUBLIC_KEY_LENGTH: usize = 65;
pub const PRIVATE_KEY_LENGTH: usize = 32;
/// SEC1 tag for an uncompressed point
const UNCOMPRESSED_TAG: u8 = 0x04;

/// An uncompressed P-256 point that is known to lie on the curve.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    point: p256::PublicKey,
    encoded: [u8; PUBLIC_KEY_LENGTH],
}

impl PublicKey {
    /// Strict `0x04 || X || Y` parsing. Compressed points are rejected even though they describe the
    /// same key because Web Push always transmits the uncompressed form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let encoded: [u8; PUBLIC_KEY_LENGTH] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKey("public key must be 65 bytes"))?;

        if encoded[0] != UNCOMPRESSED_TAG {
            return Err(Error::InvalidKey("public key is not an uncompressed point"));
        }

        let point = p256::PublicKey::from_sec1_bytes(&encoded)
            .map_err(|_| Error::InvalidKey("public key is not a point on P-256"))?;

        Ok(Self { point, encoded })
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64url::decode(encoded)?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.encoded
    }

    pub fn to_base64(&self) -> String {
        base64url::encode(self.encoded)
    }

    /// Affine X coordinate
    pub(crate) fn x(&self) -> &[u8] {
        &self.encoded[1..33]
    }

    /// Affine Y coordinate
    pub(crate) fn y(&self) -> &[u8] {
        &self.encoded[33..]
    }

    fn from_point(point: p256::PublicKey) -> Self {
        let mut encoded = [0u8; PUBLIC_KEY_LENGTH];
        encoded.copy_from_slice(point.to_encoded_point(false).as_bytes());
        Self { point, encoded }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_base64()).finish()
    }
}

#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::generate_with(&mut OsRng)
    }

    pub fn generate_with(rng: &mut impl CryptoRngCore) -> Self {
        Self::from_secret(SecretKey::random(rng))
    }

    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PRIVATE_KEY_LENGTH {
            return Err(Error::InvalidKey("private key must be 32 bytes"));
        }

        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| Error::InvalidKey("private key is not a valid P-256 scalar"))?;
        Ok(Self::from_secret(secret))
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64url::decode(encoded)?;
        Self::from_private_bytes(&bytes)
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = PublicKey::from_point(secret.public_key());
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn private_bytes(&self) -> [u8; PRIVATE_KEY_LENGTH] {
        let mut bytes = [0u8; PRIVATE_KEY_LENGTH];
        bytes.copy_from_slice(&self.secret.to_bytes());
        bytes
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// ECDH with the peer's point. The raw secret is the big endian X coordinate of the product.
    pub fn diffie_hellman(&self, peer: &PublicKey) -> SharedSecret {
        ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer.point.as_affine())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
