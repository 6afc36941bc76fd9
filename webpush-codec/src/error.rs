use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid key: {0}")]
    InvalidKey(&'static str),
    #[error("Subscription is missing the {0} key")]
    MissingKey(&'static str),
    #[error("Unsupported content encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("Payload of {length} bytes exceeds the limit of {limit} bytes")]
    PayloadTooLarge { length: usize, limit: usize },
    #[error("Can not derive an audience from endpoint {0:?}")]
    InvalidAudience(String),
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),
    #[error("VAPID subject must be a mailto: or https: URI, got {0:?}")]
    InvalidSubject(String),
    #[error("Padding target of {target} bytes exceeds the maximum of {limit} bytes")]
    InvalidPadding { target: usize, limit: usize },
    #[error("Malformed payload: {0}")]
    MalformedPayload(&'static str),
    #[error("Topic must be at most 32 base64url characters, got {0:?}")]
    InvalidTopic(String),
    #[error("Error reading from the random source: {0}")]
    Entropy(getrandom::Error),
    #[error("Error deriving key material")]
    KeyDerivation,
    #[error("Error encrypting record")]
    Encryption,
    #[error("Error decoding base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Error encoding JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Error building request: {0}")]
    Http(#[from] http::Error),
    #[error("Invalid header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),
}
