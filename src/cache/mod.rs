//! # Cache Module
//!
//! Response cache sitting between the HTTP handlers and the osu! API.
//!
//! Entries live in four independent pools, one per resource class, because
//! their volatility differs by orders of magnitude: beatmap metadata barely
//! changes, while a leaderboard moves minute to minute. Each pool has its own
//! default TTL and callers may override it per entry.
//!
//! ## Pools
//!
//! | Pool | Default TTL | Contents |
//! |------|-------------|----------|
//! | [`CachePool::Token`] | ~58 min | application bearer token, recent user refreshes |
//! | [`CachePool::Beatmap`] | 2 h | beatmap metadata, search pages |
//! | [`CachePool::User`] | 30 min | `/me` profiles |
//! | [`CachePool::Leaderboard`] | 10 min | score listings and scan reports |
//!
//! Expiry is passive: an entry past its TTL is treated as absent on read and
//! is never handed out stale. The periodic [`ResourceCache::sweep`] exists
//! only to reclaim memory.
//!
//! Only normalized values are stored, never raw upstream payloads.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! let cache = ResourceCache::new(PoolTtls::default());
//! cache.set(CachePool::Beatmap, &keys::beatmap(75), beatmap, None);
//!
//! if let Some(hit) = cache.get::<Beatmap>(CachePool::Beatmap, &keys::beatmap(75)) {
//!     println!("{}", hit.title);
//! }
//! ```

pub mod keys;
pub mod ttl_cache;

use serde::Serialize;
use std::{any::Any, collections::BTreeMap, fmt, sync::Arc, time::Duration};
use tracing::{debug, info};
use ttl_cache::{CacheMetrics, TtlCache};

type Shared = Arc<dyn Any + Send + Sync>;

/// Resource class a cache entry is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePool {
    Token,
    Beatmap,
    User,
    Leaderboard,
}

impl CachePool {
    pub const ALL: [CachePool; 4] = [
        CachePool::Token,
        CachePool::Beatmap,
        CachePool::User,
        CachePool::Leaderboard,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CachePool::Token => "token",
            CachePool::Beatmap => "beatmap",
            CachePool::User => "user",
            CachePool::Leaderboard => "leaderboard",
        }
    }
}

impl fmt::Display for CachePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Default TTL per pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolTtls {
    pub token: Duration,
    pub beatmap: Duration,
    pub user: Duration,
    pub leaderboard: Duration,
}

impl Default for PoolTtls {
    fn default() -> Self {
        Self {
            token: Duration::from_secs(3500),
            beatmap: Duration::from_secs(7200),
            user: Duration::from_secs(1800),
            leaderboard: Duration::from_secs(600),
        }
    }
}

/// Pooled, type-erased response cache shared by every request.
#[derive(Debug, Clone)]
pub struct ResourceCache {
    tokens: TtlCache<String, Shared>,
    beatmaps: TtlCache<String, Shared>,
    users: TtlCache<String, Shared>,
    leaderboards: TtlCache<String, Shared>,
}

impl ResourceCache {
    pub fn new(ttls: PoolTtls) -> Self {
        info!(
            "🗄️ Cache pools ready (token {}, beatmap {}, user {}, leaderboard {})",
            humantime::format_duration(ttls.token),
            humantime::format_duration(ttls.beatmap),
            humantime::format_duration(ttls.user),
            humantime::format_duration(ttls.leaderboard),
        );

        Self {
            tokens: TtlCache::new(ttls.token),
            beatmaps: TtlCache::new(ttls.beatmap),
            users: TtlCache::new(ttls.user),
            leaderboards: TtlCache::new(ttls.leaderboard),
        }
    }

    fn pool(&self, pool: CachePool) -> &TtlCache<String, Shared> {
        match pool {
            CachePool::Token => &self.tokens,
            CachePool::Beatmap => &self.beatmaps,
            CachePool::User => &self.users,
            CachePool::Leaderboard => &self.leaderboards,
        }
    }

    /// Returns the fresh value stored under `key`, or `None` on a miss.
    ///
    /// A value stored under the same key with a different type also counts
    /// as a miss.
    pub fn get<T>(&self, pool: CachePool, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let Some(shared) = self.pool(pool).get(key) else {
            debug!("❌ Cache miss [{}] {}", pool, key);
            return None;
        };

        match shared.downcast_ref::<T>() {
            Some(value) => {
                debug!("✅ Cache hit [{}] {}", pool, key);
                Some(value.clone())
            }
            None => {
                debug!("⚠️ Cache type mismatch [{}] {}", pool, key);
                None
            }
        }
    }

    /// Stores `value` with the pool's default TTL unless `ttl` overrides it.
    pub fn set<T>(&self, pool: CachePool, key: &str, value: T, ttl: Option<Duration>)
    where
        T: Send + Sync + 'static,
    {
        let cache = self.pool(pool);
        let ttl = ttl.unwrap_or_else(|| cache.default_ttl());
        cache.insert_with_ttl(key.to_string(), Arc::new(value), ttl);
    }

    /// Evicts one entry. Returns whether anything was stored under `key`.
    pub fn invalidate(&self, pool: CachePool, key: &str) -> bool {
        self.pool(pool).remove(key).is_some()
    }

    /// Drops expired entries from every pool.
    pub fn sweep(&self) -> usize {
        CachePool::ALL
            .iter()
            .map(|pool| self.pool(*pool).cleanup_expired())
            .sum()
    }

    pub fn metrics(&self) -> BTreeMap<CachePool, CacheMetrics> {
        CachePool::ALL
            .iter()
            .map(|pool| (*pool, self.pool(*pool).metrics()))
            .collect()
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(PoolTtls::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    #[derive(Debug, Clone, PartialEq)]
    struct Fake(u32);

    #[tokio::test(start_paused = true)]
    async fn every_pool_honours_its_own_ttl() {
        let cache = ResourceCache::default();
        let ttls = PoolTtls::default();

        for pool in CachePool::ALL {
            cache.set(pool, "k", Fake(1), None);
        }

        time::advance(ttls.leaderboard - Duration::from_secs(1)).await;
        for pool in CachePool::ALL {
            assert_eq!(cache.get::<Fake>(pool, "k"), Some(Fake(1)), "{pool}");
        }

        time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get::<Fake>(CachePool::Leaderboard, "k"), None);
        assert_eq!(cache.get::<Fake>(CachePool::User, "k"), Some(Fake(1)));

        time::advance(ttls.user).await;
        assert_eq!(cache.get::<Fake>(CachePool::User, "k"), None);
        assert_eq!(cache.get::<Fake>(CachePool::Token, "k"), Some(Fake(1)));

        time::advance(ttls.token).await;
        assert_eq!(cache.get::<Fake>(CachePool::Token, "k"), None);
        assert_eq!(cache.get::<Fake>(CachePool::Beatmap, "k"), Some(Fake(1)));

        time::advance(ttls.beatmap).await;
        assert_eq!(cache.get::<Fake>(CachePool::Beatmap, "k"), None);
    }

    #[tokio::test]
    async fn pools_are_independent() {
        let cache = ResourceCache::default();
        cache.set(CachePool::Beatmap, "same", Fake(1), None);
        cache.set(CachePool::Leaderboard, "same", Fake(2), None);

        assert!(cache.invalidate(CachePool::Beatmap, "same"));
        assert_eq!(cache.get::<Fake>(CachePool::Beatmap, "same"), None);
        assert_eq!(cache.get::<Fake>(CachePool::Leaderboard, "same"), Some(Fake(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_override_extends_freshness() {
        let cache = ResourceCache::default();
        cache.set(
            CachePool::Leaderboard,
            "long",
            Fake(3),
            Some(Duration::from_secs(3600)),
        );

        time::advance(Duration::from_secs(1200)).await;
        assert_eq!(cache.get::<Fake>(CachePool::Leaderboard, "long"), Some(Fake(3)));
    }

    #[tokio::test]
    async fn wrong_type_is_a_miss() {
        let cache = ResourceCache::default();
        cache.set(CachePool::User, "k", Fake(1), None);

        assert_eq!(cache.get::<String>(CachePool::User, "k"), None);
    }

    #[tokio::test]
    async fn invalidate_missing_key_reports_false() {
        let cache = ResourceCache::default();
        assert!(!cache.invalidate(CachePool::User, "nope"));
    }

    #[derive(Clone, Default)]
    struct LogSink(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for LogSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn debug_logs_never_contain_access_tokens() {
        let sink = LogSink::default();
        let writer = sink.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let cache = ResourceCache::default();
            let key = keys::profile("SECRET-ACCESS-TOKEN");
            assert_eq!(cache.get::<u32>(CachePool::User, &key), None);
            cache.set(CachePool::User, &key, 7_u32, None);
            assert_eq!(cache.get::<u32>(CachePool::User, &key), Some(7));
        });

        let logs = String::from_utf8(sink.0.lock().clone()).expect("utf8 logs");
        assert!(logs.contains("Cache miss [user] me:"), "{logs}");
        assert!(logs.contains("Cache hit [user] me:"), "{logs}");
        assert!(!logs.contains("SECRET-ACCESS-TOKEN"), "{logs}");
    }
}
