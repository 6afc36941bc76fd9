//! Message encryption for the Web Push protocol.
//!
//! Payloads are encrypted for a single subscriber with either the RFC 8291 `aes128gcm` content
//! encoding or the legacy `aesgcm` draft encoding, and requests are authenticated with VAPID
//! (RFC 8292). [`PushRequestBuilder`] combines both into an [`http::Request`] ready to be sent with
//! any HTTP client.
pub mod aead;
pub mod base64url;
pub mod encoding;
mod error;
pub mod key_derivation;
pub mod keys;
pub mod notification;
pub mod request;
pub mod subscription;
pub mod vapid;

pub use encoding::{decrypt, ContentEncoding, EncryptedPayload, Encoder, Padding};
pub use error::{Error, Result};
pub use keys::{KeyPair, PublicKey};
pub use notification::{Notification, Urgency};
pub use request::{Extension, PushRequestBuilder};
pub use subscription::{SubscriberKeys, Subscription};
pub use vapid::{HeaderCache, MemoryCache, Subject, VapidHeader, VapidSigner};
