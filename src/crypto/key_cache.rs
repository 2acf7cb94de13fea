//! Short-lived secret cache with an explicit time-to-live.
//!
//! Expiry is checked on every access; there is no background timer.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use zeroize::Zeroizing;

struct CachedSecret {
    secret: Zeroizing<Vec<u8>>,
    inserted_at: Instant,
    ttl: Duration,
}

impl CachedSecret {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= self.ttl
    }
}

/// Holds at most one secret together with its insertion time and TTL.
#[derive(Default)]
pub struct KeyCache {
    entry: Mutex<Option<CachedSecret>>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `secret`, replacing any previous entry.
    pub fn set(&self, secret: &[u8], ttl: Duration) {
        self.set_at(secret, ttl, Instant::now());
    }

    /// Return the secret if it has not expired. An expired entry is dropped.
    pub fn get(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.get_at(Instant::now())
    }

    /// Drop the cached secret.
    pub fn clear(&self) {
        *self.entry.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn set_at(&self, secret: &[u8], ttl: Duration, now: Instant) {
        *self.entry.lock().unwrap_or_else(|e| e.into_inner()) = Some(CachedSecret {
            secret: Zeroizing::new(secret.to_vec()),
            inserted_at: now,
            ttl,
        });
    }

    fn get_at(&self, now: Instant) -> Option<Zeroizing<Vec<u8>>> {
        let mut entry = self.entry.lock().unwrap_or_else(|e| e.into_inner());
        match entry.as_ref() {
            Some(cached) if cached.is_expired(now) => {
                *entry = None;
                None
            }
            Some(cached) => Some(cached.secret.clone()),
            None => None,
        }
    }
}

impl std::fmt::Debug for KeyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCache").finish_non_exhaustive()
    }
}
