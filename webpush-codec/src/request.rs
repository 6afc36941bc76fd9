//! Assembles the HTTP request a push service expects. Sending it is left to the caller's client.
use http::{
    header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE},
    HeaderMap, HeaderName, HeaderValue, Method, Request,
};

use crate::{
    base64url,
    encoding::{ContentEncoding, Encoder, Padding},
    notification::{Notification, DEFAULT_TTL},
    subscription::Subscription,
    vapid::VapidSigner,
    Error, Result,
};

const TTL: HeaderName = HeaderName::from_static("ttl");
const TOPIC: HeaderName = HeaderName::from_static("topic");
const URGENCY: HeaderName = HeaderName::from_static("urgency");
const ENCRYPTION: HeaderName = HeaderName::from_static("encryption");
const CRYPTO_KEY: HeaderName = HeaderName::from_static("crypto-key");

const OCTET_STREAM: HeaderValue = HeaderValue::from_static("application/octet-stream");
const MAX_TOPIC_LENGTH: usize = 32;

/// Adds headers derived from the notification. Extensions run in the order they were added to the
/// builder and may overwrite headers set by earlier ones.
pub trait Extension: Send + Sync {
    fn extend(&self, notification: &Notification, headers: &mut HeaderMap) -> Result<()>;
}

/// Sets `TTL`, falling back to a default when the notification has none.
#[derive(Debug, Clone, Copy)]
pub struct TtlExtension {
    default_ttl: u32,
}

impl TtlExtension {
    pub fn new(default_ttl: u32) -> Self {
        Self { default_ttl }
    }
}

impl Default for TtlExtension {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl Extension for TtlExtension {
    fn extend(&self, notification: &Notification, headers: &mut HeaderMap) -> Result<()> {
        let ttl = notification.ttl.unwrap_or(self.default_ttl);
        headers.insert(TTL, HeaderValue::from(ttl));
        Ok(())
    }
}

/// Sets `Topic` so the push service can replace an undelivered message with a newer one.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicExtension;

impl Extension for TopicExtension {
    fn extend(&self, notification: &Notification, headers: &mut HeaderMap) -> Result<()> {
        let Some(topic) = &notification.topic else {
            return Ok(());
        };

        let is_base64url = topic
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_');
        if topic.is_empty() || topic.len() > MAX_TOPIC_LENGTH || !is_base64url {
            return Err(Error::InvalidTopic(topic.clone()));
        }

        headers.insert(TOPIC, HeaderValue::from_str(topic)?);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UrgencyExtension;

impl Extension for UrgencyExtension {
    fn extend(&self, notification: &Notification, headers: &mut HeaderMap) -> Result<()> {
        if let Some(urgency) = notification.urgency {
            headers.insert(URGENCY, HeaderValue::from_static(urgency.as_str()));
        }
        Ok(())
    }
}

pub struct PushRequestBuilder {
    signer: Option<VapidSigner>,
    padding: Padding,
    extensions: Vec<Box<dyn Extension>>,
}

impl Default for PushRequestBuilder {
    /// Recommended padding, no VAPID and the `TTL`, `Topic` and `Urgency` extensions
    fn default() -> Self {
        Self {
            signer: None,
            padding: Padding::default(),
            extensions: vec![
                Box::new(TtlExtension::default()),
                Box::new(TopicExtension),
                Box::new(UrgencyExtension),
            ],
        }
    }
}

impl PushRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signer(self, signer: VapidSigner) -> Self {
        Self {
            signer: Some(signer),
            ..self
        }
    }

    pub fn with_padding(self, padding: Padding) -> Self {
        Self { padding, ..self }
    }

    /// Appends an extension after the existing ones
    pub fn with_extension(mut self, extension: impl Extension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// Builds the `POST` request for one subscription. Every call encrypts with fresh key
    /// material.
    pub fn build(
        &self,
        subscription: &Subscription,
        notification: &Notification,
    ) -> Result<Request<Vec<u8>>> {
        let encoding = subscription.content_encoding;
        let mut headers = HeaderMap::new();
        let mut crypto_key = Vec::new();

        let body = match &notification.payload {
            Some(payload) => {
                let keys = subscription.keys()?;
                let encrypted = Encoder::new(encoding, self.padding)?.encode(payload, &keys)?;

                headers.insert(CONTENT_TYPE, OCTET_STREAM);
                headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding.as_str()));
                if encoding == ContentEncoding::Aesgcm {
                    let salt = format!("salt={}", base64url::encode(encrypted.salt));
                    headers.insert(ENCRYPTION, HeaderValue::from_str(&salt)?);
                    crypto_key.push(format!("dh={}", encrypted.server_public_key.to_base64()));
                }
                encrypted.body()
            }
            None => Vec::new(),
        };
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        for extension in &self.extensions {
            extension.extend(notification, &mut headers)?;
        }

        if let Some(signer) = &self.signer {
            let vapid = signer.header(&subscription.endpoint, encoding)?;
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&vapid.authorization(encoding))?,
            );
            if encoding == ContentEncoding::Aesgcm {
                crypto_key.push(vapid.crypto_key());
            }
        }

        if !crypto_key.is_empty() {
            headers.insert(CRYPTO_KEY, HeaderValue::from_str(&crypto_key.join(";"))?);
        }

        tracing::debug!(
            "Built {encoding} push request with a {} byte body and {} headers",
            body.len(),
            headers.len()
        );

        let mut request = Request::builder()
            .method(Method::POST)
            .uri(subscription.endpoint.as_str())
            .body(body)?;
        *request.headers_mut() = headers;
        Ok(request)
    }
}
