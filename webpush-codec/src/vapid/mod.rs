//! Voluntary Application Server Identification for Web Push (VAPID) based on RFC8292.
mod cache;

use std::{fmt, str::FromStr, sync::Arc};

pub use cache::{HeaderCache, MemoryCache};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use url::Url;

use crate::{
    base64url,
    encoding::ContentEncoding,
    keys::{KeyPair, PublicKey},
    Error, Result,
};

const JWT_INFO: &str = r#"{"typ":"JWT","alg":"ES256"}"#;

pub const DEFAULT_LIFETIME: Duration = Duration::hours(1);
/// Push services reject tokens valid for more than 24 hours. Half of that leaves room for clock skew.
pub const MAX_LIFETIME: Duration = Duration::hours(12);
const MIN_LIFETIME: Duration = Duration::minutes(5);
pub const DEFAULT_CACHE_LIFETIME: Duration = Duration::minutes(30);
/// A cached header is evicted at least this long before its token expires
const CACHE_EXPIRY_MARGIN: Duration = Duration::minutes(1);

/// Contact for the push service operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// Address without the `mailto:` scheme
    Email(String),
    Https(String),
}

impl Subject {
    pub fn parse(value: &str) -> Result<Self> {
        if let Some(email) = value.strip_prefix("mailto:") {
            if email.contains('@') {
                return Ok(Subject::Email(email.to_owned()));
            }
        } else if value.starts_with("https:") {
            if let Ok(url) = Url::parse(value) {
                if url.host_str().is_some() {
                    return Ok(Subject::Https(value.to_owned()));
                }
            }
        }

        Err(Error::InvalidSubject(value.to_owned()))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Email(email) => write!(f, "mailto:{email}"),
            Subject::Https(https) => f.write_str(https),
        }
    }
}

impl FromStr for Subject {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

/// JWT claims set. `exp` is a unix timestamp in seconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VapidClaims {
    pub aud: String,
    pub exp: i64,
    pub sub: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VapidHeader {
    pub token: String,
    /// Base64url encoded uncompressed public key of the signer
    pub public_key: String,
}

impl VapidHeader {
    /// `Authorization` header value in the shape the content encoding's push services expect
    pub fn authorization(&self, encoding: ContentEncoding) -> String {
        match encoding {
            ContentEncoding::Aesgcm => format!("WebPush {}", self.token),
            ContentEncoding::Aes128gcm => {
                format!("vapid t={}, k={}", self.token, self.public_key)
            }
        }
    }

    /// `Crypto-Key` parameter carrying the signing key for `aesgcm`
    pub fn crypto_key(&self) -> String {
        format!("p256ecdsa={}", self.public_key)
    }
}

/// `scheme://host[:port]` of the push service endpoint
pub fn audience(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint).map_err(|_| Error::InvalidAudience(endpoint.to_owned()))?;
    let Some(host) = url.host_str() else {
        return Err(Error::InvalidAudience(endpoint.to_owned()));
    };

    Ok(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}

#[cfg(test)]
thread_local! {
    static SIGNATURES: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// Signs the claims as a compact ES256 JWT. Signatures are deterministic (RFC 6979).
pub fn compute_header(key: &KeyPair, claims: &VapidClaims) -> Result<VapidHeader> {
    #[cfg(test)]
    SIGNATURES.with(|count| count.set(count.get() + 1));

    let jwt_info = base64url::encode(JWT_INFO);
    let jwt_data = base64url::encode(serde_json::to_vec(claims)?);
    let signing_material = format!("{jwt_info}.{jwt_data}");

    let signing_key = SigningKey::from(key.secret());
    let signature: Signature = signing_key.sign(signing_material.as_bytes());
    let signature = base64url::encode(signature.to_bytes());

    Ok(VapidHeader {
        token: format!("{signing_material}.{signature}"),
        public_key: key.public_key().to_base64(),
    })
}

/// Checks the signature and expiration of a token and returns its claims.
pub fn verify(token: &str, public_key: &PublicKey) -> Result<VapidClaims> {
    let decoding_key = DecodingKey::from_ec_components(
        &base64url::encode(public_key.x()),
        &base64url::encode(public_key.y()),
    )
    .map_err(|_| Error::InvalidKey("public key can not be used for ES256"))?;

    let mut validation = Validation::new(Algorithm::ES256);
    validation.validate_aud = false;

    let data = jsonwebtoken::decode::<VapidClaims>(token, &decoding_key, &validation).map_err(
        |error| {
            tracing::debug!("Rejected VAPID token: {error}");
            Error::AuthenticationFailed
        },
    )?;

    Ok(data.claims)
}

/// Headers are only interchangeable for the same signing key, subject, audience and encoding.
/// The public key has a fixed length, the remaining fields are separated by `0x00`.
fn cache_key(
    public_key: &PublicKey,
    subject: &str,
    audience: &str,
    encoding: ContentEncoding,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(public_key.as_bytes());
    hasher.update(subject.as_bytes());
    hasher.update([0]);
    hasher.update(audience.as_bytes());
    hasher.update([0]);
    hasher.update(encoding.as_str().as_bytes());
    base64url::encode(hasher.finalize())
}

/// Produces VAPID headers for a fixed application server identity. Cheap to clone and share
/// between tasks.
#[derive(Clone)]
pub struct VapidSigner {
    key: Arc<KeyPair>,
    subject: Subject,
    lifetime: Duration,
    cache: Option<Arc<dyn HeaderCache>>,
    cache_lifetime: Duration,
}

impl VapidSigner {
    pub fn new(key: KeyPair, subject: Subject) -> Self {
        Self {
            key: Arc::new(key),
            subject,
            lifetime: DEFAULT_LIFETIME,
            cache: None,
            cache_lifetime: DEFAULT_CACHE_LIFETIME,
        }
    }

    /// Token lifetime, clamped between five minutes and [`MAX_LIFETIME`]
    pub fn with_lifetime(self, lifetime: Duration) -> Self {
        Self {
            lifetime: lifetime.clamp(MIN_LIFETIME, MAX_LIFETIME),
            ..self
        }
    }

    pub fn with_cache(self, cache: Arc<dyn HeaderCache>) -> Self {
        Self {
            cache: Some(cache),
            ..self
        }
    }

    pub fn with_cache_lifetime(self, cache_lifetime: Duration) -> Self {
        Self {
            cache_lifetime,
            ..self
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        self.key.public_key()
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Header for the push service behind `endpoint`, served from the cache when possible.
    pub fn header(&self, endpoint: &str, encoding: ContentEncoding) -> Result<VapidHeader> {
        self.header_at(endpoint, encoding, OffsetDateTime::now_utc())
    }

    fn header_at(
        &self,
        endpoint: &str,
        encoding: ContentEncoding,
        now: OffsetDateTime,
    ) -> Result<VapidHeader> {
        let audience = audience(endpoint)?;
        let claims = self.claims(audience, now);

        let Some(cache) = &self.cache else {
            return compute_header(&self.key, &claims);
        };

        let key = cache_key(self.key.public_key(), &claims.sub, &claims.aud, encoding);
        match cache.get(&key) {
            Ok(Some(header)) => {
                tracing::debug!("Using cached VAPID header for {}", claims.aud);
                return Ok(header);
            }
            Ok(None) => tracing::debug!("No cached VAPID header for {}", claims.aud),
            Err(error) => {
                tracing::warn!("{error}. Signing VAPID header without cache");
                return compute_header(&self.key, &claims);
            }
        }

        let header = compute_header(&self.key, &claims)?;
        let expires_at = (now + self.cache_lifetime).min(now + self.lifetime - CACHE_EXPIRY_MARGIN);
        if expires_at > now {
            if let Err(error) = cache.set(&key, header.clone(), expires_at) {
                tracing::warn!("{error}. VAPID header for {} was not cached", claims.aud);
            }
        }

        Ok(header)
    }

    fn claims(&self, audience: String, now: OffsetDateTime) -> VapidClaims {
        VapidClaims {
            aud: audience,
            exp: (now + self.lifetime).unix_timestamp(),
            sub: self.subject.to_string(),
        }
    }
}

impl fmt::Debug for VapidSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapidSigner")
            .field("public_key", self.key.public_key())
            .field("subject", &self.subject)
            .field("lifetime", &self.lifetime)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const APPLICATION_SERVER_PRIVATE_KEY: &str = "yfWPiYE-n46HLnH0KqZOF1fJJU3MYrct3AELtAQ-oRw";
    const APPLICATION_SERVER_PUBLIC_KEY: &str = "BP4z9KsN6nGRTbVYI_c7VJSPQTBtkgcy27mlmlMoZIIg\
                                                 Dll6e3vCYLocInmYWAmS6TlzAC8wEqKK6PBru3jl7A8";
    const ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send/some-registration-id";

    fn key_pair() -> KeyPair {
        KeyPair::from_base64(APPLICATION_SERVER_PRIVATE_KEY).unwrap()
    }

    fn signer() -> VapidSigner {
        VapidSigner::new(key_pair(), Subject::Https("https://example.com".to_owned()))
    }

    /// Signatures computed on the current thread so far
    fn signatures() -> usize {
        SIGNATURES.with(|count| count.get())
    }

    /// Counts how many headers were stored
    #[derive(Default)]
    struct CountingCache {
        inner: MemoryCache,
        stored: AtomicUsize,
        last_expiry: parking_lot::Mutex<Option<OffsetDateTime>>,
    }

    impl HeaderCache for CountingCache {
        fn get(&self, key: &str) -> Result<Option<VapidHeader>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, header: VapidHeader, expires_at: OffsetDateTime) -> Result<()> {
            self.stored.fetch_add(1, Ordering::SeqCst);
            *self.last_expiry.lock() = Some(expires_at);
            self.inner.set(key, header, expires_at)
        }
    }

    struct UnavailableCache;

    impl HeaderCache for UnavailableCache {
        fn get(&self, _key: &str) -> Result<Option<VapidHeader>> {
            Err(Error::CacheUnavailable("connection refused".to_owned()))
        }

        fn set(&self, _key: &str, _header: VapidHeader, _expires_at: OffsetDateTime) -> Result<()> {
            Err(Error::CacheUnavailable("connection refused".to_owned()))
        }
    }

    #[test]
    fn can_create_authorization_header() {
        // Arrange
        let claims = VapidClaims {
            aud: "https://fcm.googleapis.com".to_owned(),
            exp: (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp(),
            sub: "mailto:example@example.com".to_owned(),
        };

        // Act
        let header = compute_header(&key_pair(), &claims).unwrap();
        let verified = verify(&header.token, key_pair().public_key()).unwrap();

        // Assert
        assert_eq!(APPLICATION_SERVER_PUBLIC_KEY, header.public_key);
        assert!(header.token.starts_with("eyJ0eXAiOiJKV1QiLCJhbGciOiJFUzI1NiJ9."));
        assert_eq!(claims, verified);
    }

    #[test]
    fn payload_is_compact_json() {
        let claims = VapidClaims {
            aud: "https://push.example.net".to_owned(),
            exp: 1_733_602_102,
            sub: "mailto:push@example.com".to_owned(),
        };

        let header = compute_header(&key_pair(), &claims).unwrap();
        let payload = header.token.split('.').nth(1).unwrap();

        assert_eq!(
            r#"{"aud":"https://push.example.net","exp":1733602102,"sub":"mailto:push@example.com"}"#,
            String::from_utf8(base64url::decode(payload).unwrap()).unwrap()
        );
    }

    #[test]
    fn signatures_are_deterministic() {
        let claims = VapidClaims {
            aud: "https://push.example.net".to_owned(),
            exp: 1_733_602_102,
            sub: "mailto:push@example.com".to_owned(),
        };

        let first = compute_header(&key_pair(), &claims).unwrap();
        let second = compute_header(&key_pair(), &claims).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn verify_rejects_tampered_or_foreign_tokens() {
        // Arrange
        let claims = VapidClaims {
            aud: "https://fcm.googleapis.com".to_owned(),
            exp: (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp(),
            sub: "mailto:example@example.com".to_owned(),
        };
        let header = compute_header(&key_pair(), &claims).unwrap();
        let mut parts: Vec<&str> = header.token.split('.').collect();
        let forged_claims = VapidClaims {
            aud: "https://evil.example".to_owned(),
            ..claims
        };
        let forged_payload = base64url::encode(serde_json::to_vec(&forged_claims).unwrap());
        parts[1] = forged_payload.as_str();
        let forged = parts.join(".");

        // Act
        let tampered = verify(&forged, key_pair().public_key());
        let foreign = verify(&header.token, KeyPair::generate().public_key());

        // Assert
        assert!(matches!(tampered, Err(Error::AuthenticationFailed)));
        assert!(matches!(foreign, Err(Error::AuthenticationFailed)));
    }

    #[test]
    fn verify_rejects_expired_tokens() {
        let claims = VapidClaims {
            aud: "https://fcm.googleapis.com".to_owned(),
            exp: (OffsetDateTime::now_utc() - Duration::hours(1)).unix_timestamp(),
            sub: "mailto:example@example.com".to_owned(),
        };
        let header = compute_header(&key_pair(), &claims).unwrap();

        assert!(matches!(
            verify(&header.token, key_pair().public_key()),
            Err(Error::AuthenticationFailed)
        ));
    }

    #[test]
    fn audience_is_the_endpoint_origin() {
        assert_eq!("https://fcm.googleapis.com", audience(ENDPOINT).unwrap());
        assert_eq!(
            "https://updates.push.services.mozilla.com",
            audience("https://updates.push.services.mozilla.com:443/wpush/v2/abc").unwrap()
        );
        assert_eq!(
            "http://localhost:8080",
            audience("http://localhost:8080/push?id=1").unwrap()
        );
    }

    #[test]
    fn audience_requires_scheme_and_host() {
        for endpoint in ["not a url", "/relative/path", "mailto:someone@example.com"] {
            assert!(matches!(
                audience(endpoint),
                Err(Error::InvalidAudience(_))
            ));
        }
    }

    #[test]
    fn header_shape_depends_on_encoding() {
        let header = VapidHeader {
            token: "a.b.c".to_owned(),
            public_key: "KEY".to_owned(),
        };

        assert_eq!("WebPush a.b.c", header.authorization(ContentEncoding::Aesgcm));
        assert_eq!(
            "vapid t=a.b.c, k=KEY",
            header.authorization(ContentEncoding::Aes128gcm)
        );
        assert_eq!("p256ecdsa=KEY", header.crypto_key());
    }

    #[test]
    fn can_parse_subjects() {
        assert_eq!(
            Subject::Email("example@example.com".to_owned()),
            Subject::parse("mailto:example@example.com").unwrap()
        );
        assert_eq!(
            "https://example.com/contact",
            Subject::parse("https://example.com/contact")
                .unwrap()
                .to_string()
        );
        for invalid in ["example@example.com", "mailto:", "http://example.com", "https://"] {
            assert!(matches!(
                Subject::parse(invalid),
                Err(Error::InvalidSubject(_))
            ));
        }
    }

    #[test]
    fn lifetime_is_clamped() {
        assert_eq!(DEFAULT_LIFETIME, signer().lifetime());
        assert_eq!(
            MAX_LIFETIME,
            signer().with_lifetime(Duration::hours(48)).lifetime()
        );
    }

    #[test]
    fn expiration_follows_the_lifetime() {
        // Arrange
        let now = OffsetDateTime::now_utc();
        let signer = signer().with_lifetime(Duration::days(2));

        // Act
        let header = signer
            .header_at(ENDPOINT, ContentEncoding::Aes128gcm, now)
            .unwrap();
        let claims = verify(&header.token, signer.public_key()).unwrap();

        // Assert
        assert_eq!((now + MAX_LIFETIME).unix_timestamp(), claims.exp);
        assert_eq!("https://fcm.googleapis.com", claims.aud);
        assert_eq!("https://example.com", claims.sub);
    }

    #[test]
    fn cache_serves_repeated_requests_for_the_same_origin() {
        // Arrange
        let cache = Arc::new(CountingCache::default());
        let signer = signer().with_cache(cache.clone());
        let now = OffsetDateTime::now_utc();
        let signatures_before = signatures();

        // Act
        let first = signer
            .header_at(ENDPOINT, ContentEncoding::Aes128gcm, now)
            .unwrap();
        let second = signer
            .header_at(
                "https://fcm.googleapis.com/fcm/send/another-registration-id",
                ContentEncoding::Aes128gcm,
                now + Duration::minutes(5),
            )
            .unwrap();

        // Assert
        assert_eq!(first, second);
        assert_eq!(1, signatures() - signatures_before);
        assert_eq!(1, cache.stored.load(Ordering::SeqCst));
    }

    #[test]
    fn signers_sharing_a_cache_keep_their_own_headers() {
        // Arrange
        let cache = Arc::new(MemoryCache::new());
        let subject = Subject::Email("push@example.com".to_owned());
        let signers = [
            VapidSigner::new(KeyPair::generate(), subject.clone()),
            VapidSigner::new(KeyPair::generate(), subject),
            VapidSigner::new(key_pair(), Subject::Email("ops@example.com".to_owned())),
            signer(),
        ]
        .map(|signer| signer.with_cache(cache.clone()));

        // Act
        let headers: Vec<VapidHeader> = signers
            .iter()
            .map(|signer| {
                signer
                    .header(ENDPOINT, ContentEncoding::Aes128gcm)
                    .unwrap()
            })
            .collect();

        // Assert
        for (signer, header) in signers.iter().zip(&headers) {
            assert_eq!(signer.public_key().to_base64(), header.public_key);
            let claims = verify(&header.token, signer.public_key()).unwrap();
            assert_eq!(signer.subject().to_string(), claims.sub);
        }
        assert_eq!(4, cache.len());
    }

    #[test]
    fn cache_is_keyed_by_origin_and_encoding() {
        let cache = Arc::new(CountingCache::default());
        let signer = signer().with_cache(cache.clone());

        signer.header(ENDPOINT, ContentEncoding::Aes128gcm).unwrap();
        signer.header(ENDPOINT, ContentEncoding::Aesgcm).unwrap();
        signer
            .header(
                "https://updates.push.services.mozilla.com/wpush/v2/abc",
                ContentEncoding::Aes128gcm,
            )
            .unwrap();

        assert_eq!(3, cache.stored.load(Ordering::SeqCst));
        assert_eq!(3, cache.inner.len());
    }

    #[test]
    fn cached_entries_expire_before_the_token() {
        // Arrange
        let cache = Arc::new(CountingCache::default());
        let signer = signer()
            .with_lifetime(Duration::minutes(10))
            .with_cache(cache.clone())
            .with_cache_lifetime(Duration::hours(1));
        let now = OffsetDateTime::now_utc();

        // Act
        let header = signer
            .header_at(ENDPOINT, ContentEncoding::Aes128gcm, now)
            .unwrap();

        // Assert
        let claims = verify(&header.token, signer.public_key()).unwrap();
        let expires_at = (*cache.last_expiry.lock()).unwrap();
        assert_eq!(now + Duration::minutes(9), expires_at);
        assert!(expires_at.unix_timestamp() < claims.exp);
    }

    #[test]
    fn unavailable_cache_falls_back_to_signing() {
        let signer = signer().with_cache(Arc::new(UnavailableCache));
        let signatures_before = signatures();

        let first = signer.header(ENDPOINT, ContentEncoding::Aes128gcm).unwrap();
        signer.header(ENDPOINT, ContentEncoding::Aes128gcm).unwrap();

        assert!(verify(&first.token, signer.public_key()).is_ok());
        assert_eq!(2, signatures() - signatures_before);
    }

    #[test]
    fn invalid_endpoint_is_not_signed() {
        assert!(matches!(
            signer().header("not a url", ContentEncoding::Aes128gcm),
            Err(Error::InvalidAudience(_))
        ));
    }
}
