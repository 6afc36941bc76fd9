use serde::Deserialize;

use crate::{base64url, encoding::ContentEncoding, keys::PublicKey, Error, Result};

mod public_key {
    use serde::Deserialize;

    use crate::keys::PublicKey;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<PublicKey>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let Some(string) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };

        PublicKey::from_base64(&string)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

mod authentication_secret {
    use serde::Deserialize;

    use crate::base64url;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let Some(string) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };

        base64url::decode(&string)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// The user agent's key material from `PushSubscription.getKey()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberKeys {
    pub p256dh: PublicKey,
    /// Usually 16 bytes
    pub auth: Vec<u8>,
}

impl SubscriberKeys {
    pub fn from_base64(p256dh: &str, auth: &str) -> Result<Self> {
        let keys = Self {
            p256dh: PublicKey::from_base64(p256dh)?,
            auth: base64url::decode(auth)?,
        };
        if keys.auth.is_empty() {
            return Err(Error::MissingKey("auth"));
        }

        Ok(keys)
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
struct Keys {
    #[serde(default, deserialize_with = "public_key::deserialize")]
    p256dh: Option<PublicKey>,
    #[serde(default, deserialize_with = "authentication_secret::deserialize")]
    auth: Option<Vec<u8>>,
}

/// A push subscription as serialized by `PushSubscription.toJSON()`. The content encoding is not
/// part of the browser's JSON and falls back to `aes128gcm`.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub endpoint: String,
    #[serde(default)]
    pub content_encoding: ContentEncoding,
    #[serde(default)]
    keys: Keys,
}

impl Subscription {
    pub fn new(
        endpoint: impl Into<String>,
        content_encoding: ContentEncoding,
        keys: Option<SubscriberKeys>,
    ) -> Self {
        let keys = match keys {
            Some(SubscriberKeys { p256dh, auth }) => Keys {
                p256dh: Some(p256dh),
                auth: Some(auth),
            },
            None => Keys::default(),
        };

        Self {
            endpoint: endpoint.into(),
            content_encoding,
            keys,
        }
    }

    /// Both keys are required before a payload can be encrypted for this subscription.
    pub fn keys(&self) -> Result<SubscriberKeys> {
        let p256dh = self.keys.p256dh.clone().ok_or(Error::MissingKey("p256dh"))?;
        let auth = match &self.keys.auth {
            Some(auth) if !auth.is_empty() => auth.clone(),
            _ => return Err(Error::MissingKey("auth")),
        };

        Ok(SubscriberKeys { p256dh, auth })
    }
}
