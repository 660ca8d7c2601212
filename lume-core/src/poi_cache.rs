//! Memoised, request-coalescing POI lookups.
//!
//! Coordinates are quantised to a fixed number of decimal places before they
//! are used as cache keys. Each key is either resolved (to a name or to
//! "nothing here") or pending, in which case every caller awaits the same
//! shared in-flight lookup. Failures and timeouts resolve to `None` and are
//! cached like any other answer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use geo::Coord;
use log::debug;

use crate::services::PoiLookup;

/// Decimal places kept when quantising coordinates into cache keys.
pub const KEY_PRECISION: i32 = 4;

/// Default upper bound for a single external lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Quantised coordinate used as a cache key.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use lume_core::CoordKey;
///
/// let a = CoordKey::from_coord(Coord { x: 13.40001, y: 52.52004 });
/// let b = CoordKey::from_coord(Coord { x: 13.40004, y: 52.51996 });
/// assert_eq!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordKey {
    lat: i64,
    lon: i64,
}

impl CoordKey {
    /// Round `location` to [`KEY_PRECISION`] decimal places.
    #[must_use]
    pub fn from_coord(location: Coord<f64>) -> Self {
        let scale = 10_f64.powi(KEY_PRECISION);
        Self {
            lat: quantise(location.y, scale),
            lon: quantise(location.x, scale),
        }
    }
}

fn quantise(value: f64, scale: f64) -> i64 {
    // `as` saturates on overflow and maps NaN to zero.
    (value * scale).round() as i64
}

type SharedLookup = Shared<BoxFuture<'static, Option<String>>>;

enum CacheEntry {
    Pending(SharedLookup),
    Resolved(Option<String>),
}

/// Key-based memoisation of nearest-name lookups.
///
/// Cloning the surrounding [`Arc`] shares the cache between sampler runs and
/// fallback lookups of one simulation. Independent simulations should build
/// their own cache.
pub struct PoiCache {
    lookup: Arc<dyn PoiLookup>,
    entries: Mutex<HashMap<CoordKey, CacheEntry>>,
    timeout: Duration,
}

impl std::fmt::Debug for PoiCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoiCache")
            .field("lookup", &"<dyn PoiLookup>")
            .field("entries", &self.lock_entries().len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PoiCache {
    /// Create a cache in front of `lookup` with the default timeout.
    pub fn new(lookup: Arc<dyn PoiLookup>) -> Self {
        Self::with_timeout(lookup, DEFAULT_LOOKUP_TIMEOUT)
    }

    /// Create a cache whose external lookups give up after `timeout`.
    pub fn with_timeout(lookup: Arc<dyn PoiLookup>, timeout: Duration) -> Self {
        Self {
            lookup,
            entries: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Resolve the nearest POI name around `location`.
    ///
    /// Resolved keys answer immediately. Pending keys attach to the in-flight
    /// lookup. Otherwise exactly one external lookup is issued. Must be
    /// awaited inside a Tokio runtime because the timeout uses Tokio's timer.
    pub async fn lookup(&self, location: Coord<f64>) -> Option<String> {
        let key = CoordKey::from_coord(location);
        let pending = {
            let mut entries = self.lock_entries();
            match entries.get(&key) {
                Some(CacheEntry::Resolved(name)) => return name.clone(),
                Some(CacheEntry::Pending(shared)) => shared.clone(),
                None => {
                    let shared = self.dispatch(location);
                    entries.insert(key, CacheEntry::Pending(shared.clone()));
                    shared
                }
            }
        };

        let name = pending.await;
        self.lock_entries()
            .insert(key, CacheEntry::Resolved(name.clone()));
        name
    }

    /// Resolved value for `location`, if any; pending keys report `None`.
    #[must_use]
    pub fn cached(&self, location: Coord<f64>) -> Option<Option<String>> {
        match self.lock_entries().get(&CoordKey::from_coord(location)) {
            Some(CacheEntry::Resolved(name)) => Some(name.clone()),
            Some(CacheEntry::Pending(_)) | None => None,
        }
    }

    /// Number of keys known to the cache, pending or resolved.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Whether the cache has seen no keys yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn dispatch(&self, location: Coord<f64>) -> SharedLookup {
        let lookup = Arc::clone(&self.lookup);
        let timeout = self.timeout;
        async move {
            match tokio::time::timeout(timeout, lookup.nearest_name(location)).await {
                Ok(Ok(name)) => name,
                Ok(Err(err)) => {
                    debug!("POI lookup at {location:?} failed: {err}");
                    None
                }
                Err(_) => {
                    debug!("POI lookup at {location:?} timed out after {timeout:?}");
                    None
                }
            }
        }
        .boxed()
        .shared()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<CoordKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubPoiLookup;
    use rstest::rstest;

    const HERE: Coord<f64> = Coord { x: 13.405, y: 52.52 };

    #[rstest]
    #[case(Coord { x: 13.40504, y: 52.52004 }, true)]
    #[case(Coord { x: 13.40506, y: 52.52 }, false)]
    #[case(Coord { x: 13.405, y: -52.52 }, false)]
    fn quantises_to_four_decimals(#[case] other: Coord<f64>, #[case] same: bool) {
        assert_eq!(CoordKey::from_coord(HERE) == CoordKey::from_coord(other), same);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_lookups_share_one_call() {
        let stub = Arc::new(
            StubPoiLookup::named("Brandenburger Tor").with_delay(Duration::from_millis(50)),
        );
        let cache = PoiCache::new(stub.clone());

        let (first, second) = tokio::join!(cache.lookup(HERE), cache.lookup(HERE));

        assert_eq!(stub.calls(), 1);
        assert_eq!(first.as_deref(), Some("Brandenburger Tor"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn resolved_entries_skip_the_service() {
        let stub = Arc::new(StubPoiLookup::named("Alexanderplatz"));
        let cache = PoiCache::new(stub.clone());

        cache.lookup(HERE).await;
        let again = cache.lookup(Coord { x: 13.40501, y: 52.52001 }).await;

        assert_eq!(stub.calls(), 1);
        assert_eq!(again.as_deref(), Some("Alexanderplatz"));
        assert_eq!(cache.cached(HERE), Some(Some("Alexanderplatz".to_owned())));
    }

    #[tokio::test]
    async fn failures_are_cached_as_absent() {
        let stub = Arc::new(StubPoiLookup::failing());
        let cache = PoiCache::new(stub.clone());

        assert_eq!(cache.lookup(HERE).await, None);
        assert_eq!(cache.lookup(HERE).await, None);

        assert_eq!(stub.calls(), 1);
        assert_eq!(cache.cached(HERE), Some(None));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_lookups_time_out_to_absent() {
        let stub = Arc::new(StubPoiLookup::named("Too late").with_delay(Duration::from_secs(60)));
        let cache = PoiCache::with_timeout(stub.clone(), Duration::from_secs(1));

        assert_eq!(cache.lookup(HERE).await, None);
        assert_eq!(cache.cached(HERE), Some(None));
    }

    #[tokio::test]
    async fn distinct_keys_issue_distinct_calls() {
        let stub = Arc::new(StubPoiLookup::named("Somewhere"));
        let cache = PoiCache::new(stub.clone());

        cache.lookup(HERE).await;
        cache.lookup(Coord { x: 0.0, y: 0.0 }).await;

        assert_eq!(stub.calls(), 2);
        assert_eq!(cache.len(), 2);
    }
}
