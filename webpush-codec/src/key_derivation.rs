//! HKDF-SHA256 (RFC 5869) restricted to a single expansion block.
use hkdf::Hkdf;
use sha2::Sha256;

use crate::{Error, Result};

/// Output size of HMAC-SHA256 and therefore the most a single expansion can produce
pub const BLOCK_LENGTH: usize = 32;

/// `PRK = HMAC-SHA256(key = salt, message = ikm)`
pub fn extract(salt: &[u8], ikm: &[u8]) -> [u8; BLOCK_LENGTH] {
    let (pseudo_random_key, _) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    let mut bytes = [0u8; BLOCK_LENGTH];
    bytes.copy_from_slice(&pseudo_random_key);
    bytes
}

/// First `N` bytes of `HMAC-SHA256(key = prk, message = info || 0x01)`. The info is passed in parts
/// so callers don't need to concatenate labels and key material first.
pub fn expand<const N: usize>(
    pseudo_random_key: &[u8; BLOCK_LENGTH],
    info: &[&[u8]],
) -> Result<[u8; N]> {
    const {
        assert!(
            N <= BLOCK_LENGTH,
            "Derived keys must fit in one HMAC-SHA256 block"
        )
    };

    let hkdf = Hkdf::<Sha256>::from_prk(pseudo_random_key).map_err(|_| Error::KeyDerivation)?;
    let mut output = [0u8; N];
    hkdf.expand_multi_info(info, &mut output)
        .map_err(|_| Error::KeyDerivation)?;
    Ok(output)
}

pub fn extract_expand<const N: usize>(
    salt: &[u8],
    ikm: &[u8],
    info: &[&[u8]],
) -> Result<[u8; N]> {
    expand(&extract(salt, ikm), info)
}
