//! AES-128-GCM with an empty associated data field, the only AEAD Web Push uses.
use aes_gcm::{
    aead::{AeadInPlace, KeyInit},
    Aes128Gcm, Key, Nonce, Tag,
};

use crate::{Error, Result};

pub const KEY_LENGTH: usize = 16;
pub const NONCE_LENGTH: usize = 12;
pub const TAG_LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedRecord {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LENGTH],
}

impl EncryptedRecord {
    /// Length of `ciphertext || tag`. Never less than [`TAG_LENGTH`].
    pub fn wire_len(&self) -> usize {
        self.ciphertext.len() + TAG_LENGTH
    }

    /// `ciphertext || tag` as it appears on the wire
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.wire_len());
        bytes.extend_from_slice(&self.ciphertext);
        bytes.extend_from_slice(&self.tag);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TAG_LENGTH {
            return Err(Error::MalformedPayload("record is shorter than the tag"));
        }

        let (ciphertext, tag) = bytes.split_at(bytes.len() - TAG_LENGTH);
        let mut tag_bytes = [0u8; TAG_LENGTH];
        tag_bytes.copy_from_slice(tag);
        Ok(Self {
            ciphertext: ciphertext.to_vec(),
            tag: tag_bytes,
        })
    }
}

/// Encrypts in place so the padded plaintext buffer becomes the ciphertext without another copy.
pub fn encrypt(
    key: &[u8; KEY_LENGTH],
    nonce: &[u8; NONCE_LENGTH],
    plaintext: Vec<u8>,
) -> Result<EncryptedRecord> {
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));
    let mut buffer = plaintext;
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), b"", &mut buffer)
        .map_err(|_| Error::Encryption)?;

    let mut tag_bytes = [0u8; TAG_LENGTH];
    tag_bytes.copy_from_slice(&tag);
    Ok(EncryptedRecord {
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

pub fn decrypt(
    key: &[u8; KEY_LENGTH],
    nonce: &[u8; NONCE_LENGTH],
    record: &EncryptedRecord,
) -> Result<Vec<u8>> {
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));
    let mut buffer = record.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            &mut buffer,
            Tag::from_slice(&record.tag),
        )
        .map_err(|_| Error::AuthenticationFailed)?;

    Ok(buffer)
}
