//! Web Push content encodings. Both turn a plaintext into a single AES-128-GCM record addressed to
//! one subscriber; they differ in key derivation labels, padding layout and where the salt and the
//! ephemeral public key travel.
pub mod aes128gcm;
pub mod aesgcm;

use std::{fmt, str::FromStr};

use serde::Deserialize;

use crate::{
    aead::EncryptedRecord,
    keys::{KeyPair, PublicKey},
    subscription::SubscriberKeys,
    Error, Result,
};

pub const SALT_LENGTH: usize = 16;
/// Push services only have to accept bodies up to this size
pub const MAX_RECORD_SIZE: usize = 4096;
/// Padding target that keeps payloads compatible with older push services
pub const RECOMMENDED_PADDING: usize = 3052;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ContentEncoding {
    /// Legacy draft encoding. Salt and key are sent in the `Encryption` and `Crypto-Key` headers.
    Aesgcm,
    /// RFC 8291. Salt and key are part of the body.
    #[default]
    Aes128gcm,
}

impl ContentEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Aesgcm => "aesgcm",
            ContentEncoding::Aes128gcm => "aes128gcm",
        }
    }

    /// Longest plaintext that still fits in a single record without any padding
    pub fn max_payload_length(&self) -> usize {
        match self {
            ContentEncoding::Aesgcm => aesgcm::MAX_PAYLOAD_LENGTH,
            ContentEncoding::Aes128gcm => aes128gcm::MAX_PAYLOAD_LENGTH,
        }
    }
}

impl fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentEncoding {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        if value.eq_ignore_ascii_case("aes128gcm") {
            Ok(ContentEncoding::Aes128gcm)
        } else if value.eq_ignore_ascii_case("aesgcm") {
            Ok(ContentEncoding::Aesgcm)
        } else {
            Err(Error::UnsupportedEncoding(value.to_owned()))
        }
    }
}

impl TryFrom<String> for ContentEncoding {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// How far plaintexts are padded to hide their length from the push service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    None,
    #[default]
    Recommended,
    /// Pad every message to the largest size the encoding allows
    Max,
    Target(usize),
}

impl Padding {
    /// Plaintext plus zero padding length, not counting the encoding's own framing bytes.
    pub fn target(&self, encoding: ContentEncoding) -> usize {
        match self {
            Padding::None => 0,
            Padding::Recommended => RECOMMENDED_PADDING,
            Padding::Max => encoding.max_payload_length(),
            Padding::Target(target) => *target,
        }
    }
}

/// The per message random values. Production code generates fresh material for every call, tests
/// inject fixed values to reproduce known vectors through the same code path.
#[derive(Debug, Clone)]
pub struct EncryptionMaterial {
    pub salt: [u8; SALT_LENGTH],
    pub server_key: KeyPair,
}

impl EncryptionMaterial {
    pub fn generate() -> Result<Self> {
        let mut salt = [0u8; SALT_LENGTH];
        getrandom::getrandom(&mut salt).map_err(Error::Entropy)?;
        Ok(Self {
            salt,
            server_key: KeyPair::generate(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct EncryptedPayload {
    pub encoding: ContentEncoding,
    pub salt: [u8; SALT_LENGTH],
    pub server_public_key: PublicKey,
    pub record: EncryptedRecord,
}

impl EncryptedPayload {
    /// Request body. `aes128gcm` prefixes the record with its self describing header.
    pub fn body(&self) -> Vec<u8> {
        match self.encoding {
            ContentEncoding::Aesgcm => self.record.to_bytes(),
            ContentEncoding::Aes128gcm => {
                let header = aes128gcm::create_content_encoding_header(
                    &self.salt,
                    aes128gcm::RECORD_SIZE,
                    &self.server_public_key,
                );
                let mut body = Vec::with_capacity(header.len() + self.record.wire_len());
                body.extend_from_slice(&header);
                body.extend_from_slice(&self.record.ciphertext);
                body.extend_from_slice(&self.record.tag);
                body
            }
        }
    }

    pub fn body_length(&self) -> usize {
        match self.encoding {
            ContentEncoding::Aesgcm => self.record.wire_len(),
            ContentEncoding::Aes128gcm => aes128gcm::HEADER_LENGTH + self.record.wire_len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoder {
    encoding: ContentEncoding,
    padding: Padding,
}

impl Encoder {
    pub fn new(encoding: ContentEncoding, padding: Padding) -> Result<Self> {
        let target = padding.target(encoding);
        let limit = encoding.max_payload_length();
        if target > limit {
            return Err(Error::InvalidPadding { target, limit });
        }

        Ok(Self { encoding, padding })
    }

    /// Encoder with the recommended padding, which is valid for every encoding.
    pub fn default_for(encoding: ContentEncoding) -> Self {
        Self {
            encoding,
            padding: Padding::default(),
        }
    }

    pub fn encoding(&self) -> ContentEncoding {
        self.encoding
    }

    pub fn padding(&self) -> Padding {
        self.padding
    }

    /// Encrypts with a fresh salt and ephemeral server key pair.
    pub fn encode(&self, plaintext: &[u8], keys: &SubscriberKeys) -> Result<EncryptedPayload> {
        self.check_length(plaintext)?;
        let material = EncryptionMaterial::generate()?;
        self.encode_with(plaintext, keys, &material)
    }

    pub fn encode_with(
        &self,
        plaintext: &[u8],
        keys: &SubscriberKeys,
        material: &EncryptionMaterial,
    ) -> Result<EncryptedPayload> {
        self.check_length(plaintext)?;
        if keys.auth.is_empty() {
            return Err(Error::MissingKey("auth"));
        }

        let target = self.padding.target(self.encoding);
        let payload = match self.encoding {
            ContentEncoding::Aesgcm => aesgcm::encrypt(plaintext, target, keys, material)?,
            ContentEncoding::Aes128gcm => aes128gcm::encrypt(plaintext, target, keys, material)?,
        };

        tracing::debug!(
            "Encrypted {} byte payload with {} into a {} byte body",
            plaintext.len(),
            self.encoding,
            payload.body_length()
        );
        Ok(payload)
    }

    fn check_length(&self, plaintext: &[u8]) -> Result<()> {
        let limit = self.encoding.max_payload_length();
        if plaintext.len() > limit {
            return Err(Error::PayloadTooLarge {
                length: plaintext.len(),
                limit,
            });
        }

        Ok(())
    }
}

/// Reverses [`Encoder::encode`] with the subscriber's private key.
pub fn decrypt(
    payload: &EncryptedPayload,
    receiver: &KeyPair,
    authentication_secret: &[u8],
) -> Result<Vec<u8>> {
    match payload.encoding {
        ContentEncoding::Aesgcm => aesgcm::decrypt(
            &payload.body(),
            &payload.salt,
            &payload.server_public_key,
            receiver,
            authentication_secret,
        ),
        ContentEncoding::Aes128gcm => {
            aes128gcm::decrypt(&payload.body(), receiver, authentication_secret)
        }
    }
}
