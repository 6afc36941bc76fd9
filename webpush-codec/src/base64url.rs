//! Unpadded base64url as used by browsers for subscription keys and by JWTs.
use base64::prelude::*;

use crate::Result;

pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes unpadded base64url. Trailing `=` padding is tolerated because some user agents still
/// emit it for subscription keys.
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    let trimmed = encoded.trim_end_matches('=');
    Ok(BASE64_URL_SAFE_NO_PAD.decode(trimmed)?)
}
