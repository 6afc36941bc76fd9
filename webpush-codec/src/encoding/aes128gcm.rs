//! `aes128gcm` content encoding (RFC 8188) with the Web Push key derivation of RFC 8291.
use super::{EncryptedPayload, EncryptionMaterial, MAX_RECORD_SIZE, SALT_LENGTH};
use crate::{
    aead::{self, EncryptedRecord, KEY_LENGTH, NONCE_LENGTH, TAG_LENGTH},
    key_derivation,
    keys::{KeyPair, PublicKey, PUBLIC_KEY_LENGTH},
    subscription::SubscriberKeys,
    Error, Result,
};

const KEY_INFO: &[u8; 14] = b"WebPush: info\x00";
const CONTENT_ENCRYPTION_KEY_INFO: &[u8; 28] = b"Content-Encoding: aes128gcm\x00";
const NONCE_INFO: &[u8; 24] = b"Content-Encoding: nonce\x00";

const PADDING_DELIMITER: u8 = 0x01;
const LAST_PADDING_DELIMITER: u8 = 0x02;
/// A single record is always sent, so the record size is the largest body push services accept
pub const RECORD_SIZE: u32 = MAX_RECORD_SIZE as u32;

const RECORD_SIZE_LENGTH: usize = size_of::<u32>();
const KEY_ID_LENGTH_LENGTH: usize = size_of::<u8>();
pub const HEADER_LENGTH: usize =
    SALT_LENGTH + RECORD_SIZE_LENGTH + KEY_ID_LENGTH_LENGTH + PUBLIC_KEY_LENGTH;
/// Room left for the plaintext once the header, delimiter and tag are accounted for
pub const MAX_PAYLOAD_LENGTH: usize = MAX_RECORD_SIZE - HEADER_LENGTH - 1 - TAG_LENGTH;

const KEY_INFO_LENGTH: usize = KEY_INFO.len() + PUBLIC_KEY_LENGTH * 2;
fn create_key_info(
    user_agent_public_key: &PublicKey,
    application_server_public_key: &PublicKey,
) -> [u8; KEY_INFO_LENGTH] {
    let mut key_info = [0u8; KEY_INFO_LENGTH];
    key_info[..KEY_INFO.len()].copy_from_slice(KEY_INFO);
    key_info[KEY_INFO.len()..KEY_INFO.len() + PUBLIC_KEY_LENGTH]
        .copy_from_slice(user_agent_public_key.as_bytes());
    key_info[KEY_INFO.len() + PUBLIC_KEY_LENGTH..]
        .copy_from_slice(application_server_public_key.as_bytes());
    key_info
}

pub(crate) fn create_content_encoding_header(
    salt: &[u8; SALT_LENGTH],
    record_size: u32,
    key_id: &PublicKey,
) -> [u8; HEADER_LENGTH] {
    const {
        assert!(
            PUBLIC_KEY_LENGTH <= u8::MAX as usize,
            "Public key can not be longer than 255 because the length field is only one byte long"
        );
    }

    let mut header = [0; HEADER_LENGTH];
    header[..SALT_LENGTH].copy_from_slice(salt);
    header[SALT_LENGTH..SALT_LENGTH + RECORD_SIZE_LENGTH]
        .copy_from_slice(&record_size.to_be_bytes());
    header[SALT_LENGTH + RECORD_SIZE_LENGTH] = PUBLIC_KEY_LENGTH as u8;
    header[SALT_LENGTH + RECORD_SIZE_LENGTH + KEY_ID_LENGTH_LENGTH..]
        .copy_from_slice(key_id.as_bytes());
    header
}

/// The auth secret bound input keying material
fn create_input_keying_material(
    ecdh_secret: &[u8],
    authentication_secret: &[u8],
    user_agent_public_key: &PublicKey,
    application_server_public_key: &PublicKey,
) -> Result<[u8; 32]> {
    let key_info = create_key_info(user_agent_public_key, application_server_public_key);
    // # HKDF-Extract(salt=auth_secret, IKM=ecdh_secret)
    // # HKDF-Expand(PRK_key, key_info, L_key=32)
    key_derivation::extract_expand(authentication_secret, ecdh_secret, &[key_info.as_slice()])
}

struct ContentKeys {
    content_encryption_key: [u8; KEY_LENGTH],
    nonce: [u8; NONCE_LENGTH],
}

fn create_content_keys(
    salt: &[u8; SALT_LENGTH],
    input_keying_material: &[u8; 32],
) -> Result<ContentKeys> {
    // # HKDF-Extract(salt, IKM)
    let pseudo_random_key = key_derivation::extract(salt, input_keying_material);
    // # HKDF-Expand(PRK, cek_info, L_cek=16)
    let content_encryption_key =
        key_derivation::expand(&pseudo_random_key, &[CONTENT_ENCRYPTION_KEY_INFO.as_slice()])?;
    // # HKDF-Expand(PRK, nonce_info, L_nonce=12)
    let nonce = key_derivation::expand(&pseudo_random_key, &[NONCE_INFO.as_slice()])?;

    Ok(ContentKeys {
        content_encryption_key,
        nonce,
    })
}

/// `plaintext || 0x02 || 0x00 * n` so the padded length reaches `target + 1`
fn pad(plaintext: &[u8], target: usize) -> Vec<u8> {
    let padding_length = target.saturating_sub(plaintext.len());
    let mut padded = Vec::with_capacity(plaintext.len() + 1 + padding_length + TAG_LENGTH);
    padded.extend_from_slice(plaintext);
    padded.push(LAST_PADDING_DELIMITER);
    padded.resize(padded.len() + padding_length, 0);
    padded
}

fn unpad(mut padded: Vec<u8>) -> Result<Vec<u8>> {
    let Some(delimiter_index) = padded.iter().rposition(|byte| *byte != 0) else {
        return Err(Error::MalformedPayload("record has no padding delimiter"));
    };

    match padded[delimiter_index] {
        LAST_PADDING_DELIMITER => {
            padded.truncate(delimiter_index);
            Ok(padded)
        }
        PADDING_DELIMITER => Err(Error::MalformedPayload(
            "only single record messages are supported",
        )),
        _ => Err(Error::MalformedPayload("record has no padding delimiter")),
    }
}

pub(super) fn encrypt(
    plaintext: &[u8],
    target: usize,
    keys: &SubscriberKeys,
    material: &EncryptionMaterial,
) -> Result<EncryptedPayload> {
    let padded = pad(plaintext, target);
    let body_length = HEADER_LENGTH + padded.len() + TAG_LENGTH;
    if body_length > MAX_RECORD_SIZE {
        return Err(Error::PayloadTooLarge {
            length: plaintext.len(),
            limit: MAX_PAYLOAD_LENGTH,
        });
    }

    let application_server_public_key = material.server_key.public_key();
    let ecdh_secret = material.server_key.diffie_hellman(&keys.p256dh);
    let input_keying_material = create_input_keying_material(
        ecdh_secret.raw_secret_bytes(),
        &keys.auth,
        &keys.p256dh,
        application_server_public_key,
    )?;
    let content_keys = create_content_keys(&material.salt, &input_keying_material)?;

    let record = aead::encrypt(
        &content_keys.content_encryption_key,
        &content_keys.nonce,
        padded,
    )?;

    Ok(EncryptedPayload {
        encoding: super::ContentEncoding::Aes128gcm,
        salt: material.salt,
        server_public_key: application_server_public_key.clone(),
        record,
    })
}

/// Decrypts a complete `aes128gcm` body. Everything except the receiver's keys is read from the
/// body header.
pub fn decrypt(body: &[u8], receiver: &KeyPair, authentication_secret: &[u8]) -> Result<Vec<u8>> {
    if body.len() < SALT_LENGTH + RECORD_SIZE_LENGTH + KEY_ID_LENGTH_LENGTH {
        return Err(Error::MalformedPayload("body is shorter than the header"));
    }

    let mut salt = [0u8; SALT_LENGTH];
    salt.copy_from_slice(&body[..SALT_LENGTH]);
    let mut record_size = [0u8; RECORD_SIZE_LENGTH];
    record_size.copy_from_slice(&body[SALT_LENGTH..SALT_LENGTH + RECORD_SIZE_LENGTH]);
    let record_size = u32::from_be_bytes(record_size) as usize;

    let key_id_start = SALT_LENGTH + RECORD_SIZE_LENGTH + KEY_ID_LENGTH_LENGTH;
    let key_id_length = body[SALT_LENGTH + RECORD_SIZE_LENGTH] as usize;
    let Some(key_id) = body.get(key_id_start..key_id_start + key_id_length) else {
        return Err(Error::MalformedPayload("body is shorter than the key id"));
    };
    let application_server_public_key = PublicKey::from_bytes(key_id)?;

    let record = &body[key_id_start + key_id_length..];
    if record.len() > record_size {
        return Err(Error::MalformedPayload(
            "only single record messages are supported",
        ));
    }
    if record.len() <= TAG_LENGTH {
        return Err(Error::MalformedPayload("record is too short"));
    }
    let record = EncryptedRecord::from_bytes(record)?;

    let ecdh_secret = receiver.diffie_hellman(&application_server_public_key);
    let input_keying_material = create_input_keying_material(
        ecdh_secret.raw_secret_bytes(),
        authentication_secret,
        receiver.public_key(),
        &application_server_public_key,
    )?;
    let content_keys = create_content_keys(&salt, &input_keying_material)?;

    let padded = aead::decrypt(
        &content_keys.content_encryption_key,
        &content_keys.nonce,
        &record,
    )?;
    unpad(padded)
}
