//! Kilometre sampling of a route and background POI resolution.
//!
//! [`sample_points`] walks a [`Route`] once and emits a [`PoiSample`] every
//! time the travelled distance crosses a multiple of the sampling interval.
//! [`PoiSampler`] resolves those samples through the shared [`PoiCache`] on
//! the Tokio runtime, pacing dispatches so the lookup service is not flooded.
//!
//! Results travel back to the playback controller as [`Resolution`]
//! messages. Every run is tagged with a generation number; planning a new
//! route bumps the generation, which stops older runs from dispatching and
//! lets the controller discard their late answers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use geo::Coord;
use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::poi_cache::PoiCache;
use crate::route::Route;

/// Default sampling interval in metres.
pub const KILOMETRE: f64 = 1_000.0;

/// Default delay between two sampler dispatches.
pub const DEFAULT_PACING: Duration = Duration::from_millis(200);

/// A synthetic point on the route at a kilometre boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoiSample {
    /// 1-based kilometre index.
    pub kilometre: u32,
    /// Segment containing the crossing.
    pub segment: usize,
    /// Fraction of `segment` at which the crossing happens.
    pub fraction: f64,
    /// Interpolated crossing point, equal to `route.point_at(segment, fraction)`.
    pub location: Coord<f64>,
}

/// Walk `route` and emit a sample every `interval` metres.
///
/// Non-positive or NaN intervals produce no samples.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use lume_core::{Route, sample_points};
///
/// # fn main() -> Result<(), lume_core::RouteError> {
/// // Roughly 1.1 km and 2.2 km along the equator.
/// let route = Route::new(vec![
///     Coord { x: 0.0, y: 0.0 },
///     Coord { x: 0.01, y: 0.0 },
///     Coord { x: 0.03, y: 0.0 },
/// ])?;
/// let samples = sample_points(&route, 1_000.0);
/// let kilometres: Vec<u32> = samples.iter().map(|s| s.kilometre).collect();
/// assert_eq!(kilometres, vec![1, 2, 3]);
/// assert_eq!(samples[0].segment, 0);
/// # Ok(())
/// # }
/// ```
#[must_use]
pub fn sample_points(route: &Route, interval: f64) -> Vec<PoiSample> {
    if interval.is_nan() || interval <= 0.0 {
        return Vec::new();
    }

    let mut samples = Vec::new();
    // Distance travelled since the previous sample.
    let mut carried = 0.0;
    for (segment, &length) in route.segment_lengths().iter().enumerate() {
        let mut consumed = 0.0;
        while carried + (length - consumed) >= interval {
            consumed += interval - carried;
            carried = 0.0;
            let fraction = if length > 0.0 { consumed / length } else { 0.0 };
            let Some(location) = route.point_at(segment, fraction) else {
                break;
            };
            let kilometre = u32::try_from(samples.len() + 1).unwrap_or(u32::MAX);
            samples.push(PoiSample {
                kilometre,
                segment,
                fraction,
                location,
            });
        }
        carried += length - consumed;
    }
    samples
}

/// Kilometre index to resolved POI name.
///
/// A missing entry means "not resolved yet"; `Some(None)` records that the
/// lookup finished without finding a name. Entries are written once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpcomingPoiTable {
    entries: HashMap<u32, Option<String>>,
}

impl UpcomingPoiTable {
    /// Store `name` for `kilometre` unless the slot is already taken.
    ///
    /// Returns `true` when the entry was written.
    pub fn record(&mut self, kilometre: u32, name: Option<String>) -> bool {
        if self.entries.contains_key(&kilometre) {
            return false;
        }
        self.entries.insert(kilometre, name);
        true
    }

    /// Entry for `kilometre`: `None` while unresolved, `Some(None)` when
    /// resolved without a name.
    #[must_use]
    pub fn get(&self, kilometre: u32) -> Option<Option<&str>> {
        self.entries.get(&kilometre).map(Option::as_deref)
    }

    /// Number of resolved kilometres, with or without a name.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no kilometre has been resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Named entries ordered by kilometre.
    #[must_use]
    pub fn named(&self) -> Vec<(u32, &str)> {
        let mut named: Vec<(u32, &str)> = self
            .entries
            .iter()
            .filter_map(|(km, name)| name.as_deref().map(|n| (*km, n)))
            .collect();
        named.sort_unstable_by_key(|(km, _)| *km);
        named
    }

    /// Forget every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Why a lookup was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOrigin {
    /// Pre-sampled kilometre boundary.
    Sampled,
    /// On-the-spot lookup when playback reached a kilometre the sampler had
    /// not resolved yet.
    Fallback,
}

/// Outcome of one lookup, delivered to the playback controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Sampler generation that issued the lookup.
    pub generation: u64,
    /// Kilometre the lookup belongs to.
    pub kilometre: u32,
    /// Resolved name, `None` when nothing was found or the lookup failed.
    pub name: Option<String>,
    /// Why the lookup was issued.
    pub origin: ResolutionOrigin,
}

/// Dispatches POI lookups for route samples on the Tokio runtime.
#[derive(Debug, Clone)]
pub struct PoiSampler {
    cache: Arc<PoiCache>,
    generation: Arc<AtomicU64>,
    pacing: Duration,
    results: UnboundedSender<Resolution>,
}

impl PoiSampler {
    /// Create a sampler that reports to `results`.
    pub fn new(
        cache: Arc<PoiCache>,
        pacing: Duration,
        results: UnboundedSender<Resolution>,
    ) -> Self {
        Self {
            cache,
            generation: Arc::new(AtomicU64::new(0)),
            pacing,
            results,
        }
    }

    /// Cache shared by every run of this sampler.
    #[must_use]
    pub fn cache(&self) -> &Arc<PoiCache> {
        &self.cache
    }

    /// Generation of the most recent run.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether `generation` still belongs to the most recent run.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    /// Supersede every earlier run and return the new generation.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Resolve `samples` for `generation`, one dispatch per pacing interval.
    ///
    /// Stops dispatching as soon as a newer generation starts. Lookups that
    /// are already in flight finish and report back; the controller drops
    /// them.
    pub async fn run(self, generation: u64, samples: Vec<PoiSample>) {
        for (index, sample) in samples.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.pacing).await;
            }
            if !self.is_current(generation) {
                debug!(
                    "sampler run {generation} superseded before kilometre {}",
                    sample.kilometre
                );
                return;
            }
            if self
                .dispatch(
                    generation,
                    sample.kilometre,
                    sample.location,
                    ResolutionOrigin::Sampled,
                )
                .is_none()
            {
                return;
            }
        }
    }

    /// Spawn [`PoiSampler::run`] on the ambient Tokio runtime.
    ///
    /// Returns `None`, after logging, when no runtime is available.
    pub fn spawn(&self, generation: u64, samples: Vec<PoiSample>) -> Option<JoinHandle<()>> {
        let Ok(handle) = Handle::try_current() else {
            warn!("no Tokio runtime available; skipping POI sampling");
            return None;
        };
        Some(handle.spawn(self.clone().run(generation, samples)))
    }

    /// Look up `location` for `kilometre` right away.
    pub fn lookup_now(
        &self,
        generation: u64,
        kilometre: u32,
        location: Coord<f64>,
    ) -> Option<JoinHandle<()>> {
        self.dispatch(generation, kilometre, location, ResolutionOrigin::Fallback)
    }

    fn dispatch(
        &self,
        generation: u64,
        kilometre: u32,
        location: Coord<f64>,
        origin: ResolutionOrigin,
    ) -> Option<JoinHandle<()>> {
        let Ok(handle) = Handle::try_current() else {
            warn!("no Tokio runtime available; skipping POI lookup for kilometre {kilometre}");
            return None;
        };
        let cache = Arc::clone(&self.cache);
        let results = self.results.clone();
        Some(handle.spawn(async move {
            let name = cache.lookup(location).await;
            let resolution = Resolution {
                generation,
                kilometre,
                name,
                origin,
            };
            if results.send(resolution).is_err() {
                debug!("playback controller gone; dropping POI for kilometre {kilometre}");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubPoiLookup, equator_waypoints};
    use rstest::rstest;
    use tokio::sync::mpsc;

    fn route(lengths: &[f64]) -> Route {
        Route::new(equator_waypoints(lengths)).expect("valid test route")
    }

    #[rstest]
    fn samples_cross_segment_boundaries() {
        let route = route(&[600.0, 900.0]);
        let samples = sample_points(&route, KILOMETRE);

        assert_eq!(samples.len(), 1);
        let sample = samples[0];
        assert_eq!(sample.kilometre, 1);
        assert_eq!(sample.segment, 1);
        assert!((sample.fraction - 400.0 / 900.0).abs() < 1e-9);
        assert_eq!(
            route.point_at(sample.segment, sample.fraction),
            Some(sample.location)
        );
        let along = route
            .distance_at(sample.segment, sample.fraction)
            .expect("segment exists");
        assert!((along - 1_000.0).abs() < 1e-6);
    }

    #[rstest]
    fn long_segments_yield_several_samples() {
        let route = route(&[3_500.0]);
        let samples = sample_points(&route, KILOMETRE);

        let kilometres: Vec<u32> = samples.iter().map(|s| s.kilometre).collect();
        assert_eq!(kilometres, vec![1, 2, 3]);
        assert!(samples.iter().all(|s| s.segment == 0));
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.0)]
    #[case(f64::NAN)]
    fn degenerate_intervals_sample_nothing(#[case] interval: f64) {
        assert!(sample_points(&route(&[5_000.0]), interval).is_empty());
    }

    #[rstest]
    fn short_routes_sample_nothing() {
        assert!(sample_points(&route(&[400.0, 0.0, 500.0]), KILOMETRE).is_empty());
    }

    #[rstest]
    fn table_keeps_the_first_answer() {
        let mut table = UpcomingPoiTable::default();
        assert!(table.record(1, Some("Rathaus".to_owned())));
        assert!(!table.record(1, Some("Markt".to_owned())));
        assert!(table.record(2, None));

        assert_eq!(table.get(1), Some(Some("Rathaus")));
        assert_eq!(table.get(2), Some(None));
        assert_eq!(table.get(3), None);
        assert_eq!(table.named(), vec![(1, "Rathaus")]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_reports_every_sample() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cache = Arc::new(PoiCache::new(Arc::new(StubPoiLookup::named("Dom"))));
        let sampler = PoiSampler::new(cache, DEFAULT_PACING, tx);
        let generation = sampler.next_generation();
        let samples = sample_points(&route(&[2_500.0]), KILOMETRE);

        sampler.clone().run(generation, samples).await;
        drop(sampler);

        let mut kilometres = Vec::new();
        while let Some(resolution) = rx.recv().await {
            assert_eq!(resolution.generation, generation);
            assert_eq!(resolution.origin, ResolutionOrigin::Sampled);
            assert_eq!(resolution.name.as_deref(), Some("Dom"));
            kilometres.push(resolution.kilometre);
        }
        kilometres.sort_unstable();
        assert_eq!(kilometres, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_runs_stop_dispatching() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let stub = Arc::new(StubPoiLookup::named("Dom"));
        let cache = Arc::new(PoiCache::new(stub.clone()));
        let sampler = PoiSampler::new(cache, Duration::from_secs(1), tx);
        let stale = sampler.next_generation();
        let samples = sample_points(&route(&[10_500.0]), KILOMETRE);

        let run = sampler.spawn(stale, samples).expect("runtime is available");
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let fresh = sampler.next_generation();
        run.await.expect("sampler task completes");

        assert!(!sampler.is_current(stale));
        assert!(sampler.is_current(fresh));
        assert_eq!(stub.calls(), 2);
    }

    #[rstest]
    fn spawning_without_a_runtime_is_skipped() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let cache = Arc::new(PoiCache::new(Arc::new(StubPoiLookup::nothing())));
        let sampler = PoiSampler::new(cache, DEFAULT_PACING, tx);

        assert!(sampler.spawn(1, Vec::new()).is_none());
        assert!(sampler.lookup_now(1, 1, Coord { x: 0.0, y: 0.0 }).is_none());
    }
}
