use std::env;

use tracing_subscriber::{layer::SubscriberExt, registry, util::SubscriberInitExt};
use webpush_codec::{base64url, KeyPair, Result};

const PRIVATE_KEY_VARIABLE: &str = "VAPID_PRIVATE_KEY";

/// Prints the application server key to hand to `PushManager.subscribe()`. Generates a new VAPID
/// key pair when none is configured.
fn main() -> Result<()> {
    registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=debug", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    match env::var(PRIVATE_KEY_VARIABLE) {
        Ok(private_key) => {
            let key_pair = KeyPair::from_base64(private_key.trim())?;
            tracing::debug!("Loaded VAPID key from {PRIVATE_KEY_VARIABLE}");
            println!("public key: {}", key_pair.public_key().to_base64());
        }
        Err(error) => {
            tracing::info!("{PRIVATE_KEY_VARIABLE} not usable ({error}). Generating a new key pair");
            let key_pair = KeyPair::generate();
            println!("{PRIVATE_KEY_VARIABLE}={}", base64url::encode(key_pair.private_bytes()));
            println!("public key: {}", key_pair.public_key().to_base64());
        }
    }

    Ok(())
}
