//! Password acquisition capability.

use crate::crypto::KeyCache;
use crate::error::Result;
use std::time::Duration;
use zeroize::Zeroizing;

/// Supplies the raw password bytes on demand.
pub trait PasswordProvider {
    fn password(&self) -> Result<Zeroizing<Vec<u8>>>;
}

impl<F> PasswordProvider for F
where
    F: Fn() -> Vec<u8>,
{
    fn password(&self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new(self()))
    }
}

/// Serves the password from a [`KeyCache`], asking `inner` only on a miss.
pub struct CachingProvider<'a, P> {
    inner: P,
    cache: &'a KeyCache,
    ttl: Duration,
}

impl<'a, P: PasswordProvider> CachingProvider<'a, P> {
    pub fn new(inner: P, cache: &'a KeyCache, ttl: Duration) -> Self {
        Self { inner, cache, ttl }
    }
}

impl<P: PasswordProvider> PasswordProvider for CachingProvider<'_, P> {
    fn password(&self) -> Result<Zeroizing<Vec<u8>>> {
        if let Some(cached) = self.cache.get() {
            return Ok(cached);
        }
        let password = self.inner.password()?;
        self.cache.set(&password, self.ttl);
        Ok(password)
    }
}
