//! Legacy `aesgcm` encoding from draft-ietf-webpush-encryption-04. Still required by some older
//! user agents. Unlike `aes128gcm` the salt and the ephemeral key are carried in request headers.
use super::{ContentEncoding, EncryptedPayload, EncryptionMaterial, MAX_RECORD_SIZE, SALT_LENGTH};
use crate::{
    aead::{self, EncryptedRecord, KEY_LENGTH, NONCE_LENGTH, TAG_LENGTH},
    key_derivation,
    keys::{KeyPair, PublicKey, PUBLIC_KEY_LENGTH},
    subscription::SubscriberKeys,
    Error, Result,
};

const AUTH_INFO: &[u8; 23] = b"Content-Encoding: auth\x00";
const CONTENT_ENCRYPTION_KEY_INFO: &[u8; 25] = b"Content-Encoding: aesgcm\x00";
const NONCE_INFO: &[u8; 24] = b"Content-Encoding: nonce\x00";
const CURVE_LABEL: &[u8; 6] = b"P-256\x00";

/// Big endian length of the zero padding in front of the plaintext
const PADDING_LENGTH_SIZE: usize = size_of::<u16>();
pub const MAX_PAYLOAD_LENGTH: usize = MAX_RECORD_SIZE - PADDING_LENGTH_SIZE - TAG_LENGTH;

const KEY_LENGTH_PREFIX: [u8; 2] = (PUBLIC_KEY_LENGTH as u16).to_be_bytes();
const CONTEXT_LENGTH: usize =
    CURVE_LABEL.len() + (KEY_LENGTH_PREFIX.len() + PUBLIC_KEY_LENGTH) * 2;

/// `"P-256\0" || len(ua) || ua || len(as) || as` binding the record to both parties
fn create_context(
    user_agent_public_key: &PublicKey,
    application_server_public_key: &PublicKey,
) -> [u8; CONTEXT_LENGTH] {
    let mut context = [0u8; CONTEXT_LENGTH];
    let parts: [&[u8]; 5] = [
        CURVE_LABEL.as_slice(),
        &KEY_LENGTH_PREFIX,
        user_agent_public_key.as_bytes(),
        &KEY_LENGTH_PREFIX,
        application_server_public_key.as_bytes(),
    ];

    let mut offset = 0;
    for part in parts {
        context[offset..offset + part.len()].copy_from_slice(part);
        offset += part.len();
    }
    context
}

struct ContentKeys {
    content_encryption_key: [u8; KEY_LENGTH],
    nonce: [u8; NONCE_LENGTH],
}

fn create_content_keys(
    ecdh_secret: &[u8],
    authentication_secret: &[u8],
    salt: &[u8; SALT_LENGTH],
    user_agent_public_key: &PublicKey,
    application_server_public_key: &PublicKey,
) -> Result<ContentKeys> {
    let input_keying_material: [u8; 32] = key_derivation::extract_expand(
        authentication_secret,
        ecdh_secret,
        &[AUTH_INFO.as_slice()],
    )?;

    let context = create_context(user_agent_public_key, application_server_public_key);
    let pseudo_random_key = key_derivation::extract(salt, &input_keying_material);
    let content_encryption_key = key_derivation::expand(
        &pseudo_random_key,
        &[CONTENT_ENCRYPTION_KEY_INFO.as_slice(), context.as_slice()],
    )?;
    let nonce = key_derivation::expand(
        &pseudo_random_key,
        &[NONCE_INFO.as_slice(), context.as_slice()],
    )?;

    Ok(ContentKeys {
        content_encryption_key,
        nonce,
    })
}

/// `len(padding) || 0x00 * len(padding) || plaintext`
fn pad(plaintext: &[u8], target: usize) -> Vec<u8> {
    let padding_length = target.saturating_sub(plaintext.len());
    let mut padded =
        Vec::with_capacity(PADDING_LENGTH_SIZE + padding_length + plaintext.len() + TAG_LENGTH);
    // Targets are capped at the maximum payload length so this never truncates
    padded.extend_from_slice(&(padding_length as u16).to_be_bytes());
    padded.resize(PADDING_LENGTH_SIZE + padding_length, 0);
    padded.extend_from_slice(plaintext);
    padded
}

fn unpad(padded: Vec<u8>) -> Result<Vec<u8>> {
    if padded.len() < PADDING_LENGTH_SIZE {
        return Err(Error::MalformedPayload("record is shorter than the padding length"));
    }

    let padding_length = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    let plaintext_start = PADDING_LENGTH_SIZE + padding_length;
    let Some(padding) = padded.get(PADDING_LENGTH_SIZE..plaintext_start) else {
        return Err(Error::MalformedPayload("padding is longer than the record"));
    };
    if padding.iter().any(|byte| *byte != 0) {
        return Err(Error::MalformedPayload("padding contains non zero bytes"));
    }

    Ok(padded[plaintext_start..].to_vec())
}

pub(super) fn encrypt(
    plaintext: &[u8],
    target: usize,
    keys: &SubscriberKeys,
    material: &EncryptionMaterial,
) -> Result<EncryptedPayload> {
    if target > MAX_PAYLOAD_LENGTH {
        return Err(Error::InvalidPadding {
            target,
            limit: MAX_PAYLOAD_LENGTH,
        });
    }

    let padded = pad(plaintext, target);
    if padded.len() + TAG_LENGTH > MAX_RECORD_SIZE {
        return Err(Error::PayloadTooLarge {
            length: plaintext.len(),
            limit: MAX_PAYLOAD_LENGTH,
        });
    }

    let application_server_public_key = material.server_key.public_key();
    let ecdh_secret = material.server_key.diffie_hellman(&keys.p256dh);
    let content_keys = create_content_keys(
        ecdh_secret.raw_secret_bytes(),
        &keys.auth,
        &material.salt,
        &keys.p256dh,
        application_server_public_key,
    )?;

    let record = aead::encrypt(
        &content_keys.content_encryption_key,
        &content_keys.nonce,
        padded,
    )?;

    Ok(EncryptedPayload {
        encoding: ContentEncoding::Aesgcm,
        salt: material.salt,
        server_public_key: application_server_public_key.clone(),
        record,
    })
}

/// Decrypts an `aesgcm` body. The salt comes from the `Encryption` header and the sender key from
/// the `dh` parameter of `Crypto-Key`.
pub fn decrypt(
    body: &[u8],
    salt: &[u8; SALT_LENGTH],
    application_server_public_key: &PublicKey,
    receiver: &KeyPair,
    authentication_secret: &[u8],
) -> Result<Vec<u8>> {
    if body.len() > MAX_RECORD_SIZE {
        return Err(Error::MalformedPayload(
            "only single record messages are supported",
        ));
    }
    let record = EncryptedRecord::from_bytes(body)?;

    let ecdh_secret = receiver.diffie_hellman(application_server_public_key);
    let content_keys = create_content_keys(
        ecdh_secret.raw_secret_bytes(),
        authentication_secret,
        salt,
        receiver.public_key(),
        application_server_public_key,
    )?;

    let padded = aead::decrypt(
        &content_keys.content_encryption_key,
        &content_keys.nonce,
        &record,
    )?;
    unpad(padded)
}
