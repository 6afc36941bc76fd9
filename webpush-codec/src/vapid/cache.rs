use std::collections::HashMap;

use parking_lot::Mutex;
use time::OffsetDateTime;

use super::VapidHeader;
use crate::Result;

/// Storage for signed VAPID headers. Implementations report outages as
/// [`Error::CacheUnavailable`](crate::Error::CacheUnavailable); the signer then signs directly.
pub trait HeaderCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<VapidHeader>>;

    fn set(&self, key: &str, header: VapidHeader, expires_at: OffsetDateTime) -> Result<()>;
}

struct Entry {
    header: VapidHeader,
    expires_at: OffsetDateTime,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl HeaderCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<VapidHeader>> {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };

        if entry.expires_at <= OffsetDateTime::now_utc() {
            entries.remove(key);
            return Ok(None);
        }

        Ok(Some(entry.header.clone()))
    }

    /// Also drops every expired entry, so origins that are never requested again don't linger.
    fn set(&self, key: &str, header: VapidHeader, expires_at: OffsetDateTime) -> Result<()> {
        let now = OffsetDateTime::now_utc();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(key.to_owned(), Entry { header, expires_at });
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use time::Duration;

    fn header(token: &str) -> VapidHeader {
        VapidHeader {
            token: token.to_owned(),
            public_key: "key".to_owned(),
        }
    }

    #[test]
    fn returns_stored_header_until_it_expires() {
        // Arrange
        let cache = MemoryCache::new();
        let now = OffsetDateTime::now_utc();

        // Act
        cache
            .set("fresh", header("a"), now + Duration::minutes(30))
            .unwrap();
        cache
            .set("stale", header("b"), now - Duration::seconds(1))
            .unwrap();

        // Assert
        assert_eq!(Some(header("a")), cache.get("fresh").unwrap());
        assert_eq!(None, cache.get("stale").unwrap());
        assert_eq!(None, cache.get("missing").unwrap());
        assert_eq!(1, cache.len());
    }

    #[test]
    fn set_drops_expired_entries_of_other_keys() {
        // Arrange
        let cache = MemoryCache::new();
        let now = OffsetDateTime::now_utc();
        cache
            .set("abandoned", header("a"), now - Duration::seconds(1))
            .unwrap();
        cache
            .set("live", header("b"), now + Duration::minutes(30))
            .unwrap();

        // Act
        cache
            .set("new", header("c"), now + Duration::minutes(30))
            .unwrap();

        // Assert
        assert_eq!(2, cache.len());
        assert_eq!(Some(header("b")), cache.get("live").unwrap());
        assert_eq!(Some(header("c")), cache.get("new").unwrap());
    }

    #[test]
    fn set_replaces_existing_entry() {
        let cache = MemoryCache::new();
        let expires_at = OffsetDateTime::now_utc() + Duration::minutes(5);

        cache.set("origin", header("a"), expires_at).unwrap();
        cache.set("origin", header("b"), expires_at).unwrap();

        assert_eq!(Some(header("b")), cache.get("origin").unwrap());
    }
}
