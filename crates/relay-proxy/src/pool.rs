//! Pool of reusable upstream client handles

use crate::client::UpstreamClient;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// Client pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolConfig {
    /// Maximum idle handles kept for reuse
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,

    /// Idle handles older than this are discarded instead of reused
    #[serde(default = "default_idle_timeout", with = "humantime_serde")]
    pub idle_timeout: Duration,
}

fn default_max_idle() -> usize {
    64
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(90)
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: default_max_idle(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

struct IdleClient<C> {
    client: C,
    since: Instant,
}

type Factory<C> = Box<dyn Fn() -> C + Send + Sync>;

/// Store of reusable client handles.
///
/// [`acquire`](Self::acquire) never waits: it reuses an idle handle or builds
/// a new one. Handles go back to the pool when the returned guard is dropped,
/// with their backend address cleared.
pub struct ClientPool<C: UpstreamClient> {
    config: PoolConfig,
    // ordered oldest first
    idle: Mutex<Vec<IdleClient<C>>>,
    factory: Factory<C>,
    created: AtomicUsize,
}

impl<C: UpstreamClient> ClientPool<C> {
    /// Create a pool that builds new handles with `factory`
    pub fn new(config: PoolConfig, factory: impl Fn() -> C + Send + Sync + 'static) -> Self {
        Self {
            config,
            idle: Mutex::new(Vec::new()),
            factory: Box::new(factory),
            created: AtomicUsize::new(0),
        }
    }

    /// Check out a handle
    pub fn acquire(&self) -> PooledClient<'_, C> {
        let reused = {
            let mut idle = self.idle.lock();
            let expired = idle
                .iter()
                .position(|entry| entry.since.elapsed() < self.config.idle_timeout)
                .unwrap_or(idle.len());
            if expired > 0 {
                trace!(count = expired, "Evicting expired pooled clients");
                idle.drain(..expired);
            }
            idle.pop().map(|entry| entry.client)
        };

        let client = match reused {
            Some(client) => {
                trace!("Reusing pooled client");
                client
            }
            None => {
                let total = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(total, "Creating pooled client");
                (self.factory)()
            }
        };

        PooledClient {
            pool: self,
            client: Some(client),
        }
    }

    /// Return a handle to the pool
    fn release(&self, mut client: C) {
        client.clear_address();

        let mut idle = self.idle.lock();
        if idle.len() >= self.config.max_idle {
            trace!(max_idle = self.config.max_idle, "Pool full, dropping client");
            return;
        }
        idle.push(IdleClient {
            client,
            since: Instant::now(),
        });
    }

    /// Number of handles waiting for reuse
    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Number of handles built since the pool was created
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// Get configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<C: UpstreamClient> fmt::Debug for ClientPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPool")
            .field("config", &self.config)
            .field("idle", &self.idle_count())
            .field("created", &self.created_count())
            .finish()
    }
}

/// A checked-out client handle.
///
/// Dropping the guard returns the handle to its pool, on success, error, and
/// unwinding paths alike.
pub struct PooledClient<'a, C: UpstreamClient> {
    pool: &'a ClientPool<C>,
    client: Option<C>,
}

impl<C: UpstreamClient> Deref for PooledClient<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.client
            .as_ref()
            .expect("pooled client is present until dropped")
    }
}

impl<C: UpstreamClient> DerefMut for PooledClient<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.client
            .as_mut()
            .expect("pooled client is present until dropped")
    }
}

impl<C: UpstreamClient> Drop for PooledClient<'_, C> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(client);
        }
    }
}

impl<C: UpstreamClient> fmt::Debug for PooledClient<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledClient")
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::Target;
    use crate::testing::MockUpstream;

    fn pool(config: PoolConfig) -> (MockUpstream, ClientPool<crate::testing::MockClient>) {
        let upstream = MockUpstream::new();
        let pool = ClientPool::new(config, upstream.factory());
        (upstream, pool)
    }

    #[test]
    fn test_pool_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_idle, 64);
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_acquire_creates_then_reuses() {
        let (_upstream, pool) = pool(PoolConfig::default());

        let first_id = {
            let client = pool.acquire();
            client.id()
        };
        assert_eq!(pool.created_count(), 1);
        assert_eq!(pool.idle_count(), 1);

        let client = pool.acquire();
        assert_eq!(client.id(), first_id);
        assert_eq!(pool.created_count(), 1);
        assert_eq!(pool.idle_count(), 0);
    }

    #[test]
    fn test_concurrent_holders_get_distinct_handles() {
        let (_upstream, pool) = pool(PoolConfig::default());

        let a = pool.acquire();
        let b = pool.acquire();
        assert_ne!(a.id(), b.id());
        assert_eq!(pool.created_count(), 2);

        drop(a);
        drop(b);
        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn test_release_clears_address() {
        let (_upstream, pool) = pool(PoolConfig::default());

        {
            let mut client = pool.acquire();
            client.set_address(Target::parse("backend:8080").unwrap());
            assert!(client.address().is_some());
        }

        let client = pool.acquire();
        assert!(client.address().is_none());
    }

    #[test]
    fn test_max_idle_caps_pool() {
        let (_upstream, pool) = pool(PoolConfig {
            max_idle: 2,
            ..Default::default()
        });

        let held: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        assert_eq!(pool.created_count(), 5);
        drop(held);

        assert_eq!(pool.idle_count(), 2);
    }

    #[test]
    fn test_expired_handles_not_reused() {
        let (_upstream, pool) = pool(PoolConfig {
            max_idle: 8,
            idle_timeout: Duration::ZERO,
        });

        drop(pool.acquire());
        assert_eq!(pool.idle_count(), 1);

        let client = pool.acquire();
        assert_eq!(pool.created_count(), 2);
        assert_eq!(pool.idle_count(), 0);
        drop(client);
    }

    #[test]
    fn test_release_on_panic() {
        let (_upstream, pool) = pool(PoolConfig::default());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _client = pool.acquire();
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(pool.idle_count(), 1);
    }
}
