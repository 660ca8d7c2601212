//! Deterministic collaborators and recorders used by unit and behaviour
//! tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use geo::Coord;

use crate::playback::{EventSink, Narrator, PlaybackEvent};
use crate::poi_cache::CoordKey;
use crate::route::EARTH_RADIUS_M;
use crate::services::{
    LookupError, PlaceDescriber, PlaceDescription, PoiLookup, RoutePlan, RouteSource,
};

/// Waypoints along the equator whose segments have the given lengths in
/// metres.
///
/// Great-circle distance along the equator is exact, which makes segment
/// lengths predictable in tests.
#[must_use]
pub fn equator_waypoints(segment_lengths: &[f64]) -> Vec<Coord<f64>> {
    let mut travelled = 0.0;
    let mut waypoints = vec![Coord { x: 0.0, y: 0.0 }];
    for length in segment_lengths {
        travelled += length;
        waypoints.push(Coord {
            x: (travelled / EARTH_RADIUS_M).to_degrees(),
            y: 0.0,
        });
    }
    waypoints
}

#[derive(Debug, Clone)]
enum StubAnswer {
    Named(String),
    Nothing,
    Fail,
    ByKey(HashMap<CoordKey, String>),
}

/// Stub [`PoiLookup`] that counts calls and answers from configuration.
#[derive(Debug)]
pub struct StubPoiLookup {
    answer: StubAnswer,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubPoiLookup {
    fn with_answer(answer: StubAnswer) -> Self {
        Self {
            answer,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer every lookup with `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self::with_answer(StubAnswer::Named(name.into()))
    }

    /// Report that nothing is named anywhere.
    #[must_use]
    pub fn nothing() -> Self {
        Self::with_answer(StubAnswer::Nothing)
    }

    /// Fail every lookup with a network error.
    #[must_use]
    pub fn failing() -> Self {
        Self::with_answer(StubAnswer::Fail)
    }

    /// Answer per quantised location; unknown locations have no name.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = (Coord<f64>, S)>,
        S: Into<String>,
    {
        let table = names
            .into_iter()
            .map(|(coord, name)| (CoordKey::from_coord(coord), name.into()))
            .collect();
        Self::with_answer(StubAnswer::ByKey(table))
    }

    /// Sleep for `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of lookups issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PoiLookup for StubPoiLookup {
    async fn nearest_name(&self, location: Coord<f64>) -> Result<Option<String>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.answer {
            StubAnswer::Named(name) => Ok(Some(name.clone())),
            StubAnswer::Nothing => Ok(None),
            StubAnswer::Fail => Err(LookupError::Network {
                url: "http://poi.invalid".to_owned(),
                message: "connection refused".to_owned(),
            }),
            StubAnswer::ByKey(table) => Ok(table.get(&CoordKey::from_coord(location)).cloned()),
        }
    }
}

/// Stub [`RouteSource`] returning a fixed plan or error.
#[derive(Debug, Clone)]
pub struct StubRouteSource {
    response: Result<RoutePlan, LookupError>,
}

impl StubRouteSource {
    /// Return `plan` for every request.
    #[must_use]
    pub fn with_plan(plan: RoutePlan) -> Self {
        Self { response: Ok(plan) }
    }

    /// Fail every request with `error`.
    #[must_use]
    pub fn with_error(error: LookupError) -> Self {
        Self {
            response: Err(error),
        }
    }
}

#[async_trait]
impl RouteSource for StubRouteSource {
    async fn fetch_route(
        &self,
        _from: Coord<f64>,
        _to: Coord<f64>,
    ) -> Result<RoutePlan, LookupError> {
        self.response.clone()
    }
}

/// Stub [`PlaceDescriber`] answering from a fixed table.
#[derive(Debug, Default)]
pub struct StubDescriber {
    summaries: HashMap<String, String>,
    calls: AtomicUsize,
}

impl StubDescriber {
    /// Describe each `(name, summary)` pair in German; other names are not
    /// found.
    #[must_use]
    pub fn with_summaries<I, N, S>(summaries: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        Self {
            summaries: summaries
                .into_iter()
                .map(|(name, summary)| (name.into(), summary.into()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `describe` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlaceDescriber for StubDescriber {
    async fn describe(&self, name: &str) -> Result<PlaceDescription, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.summaries
            .get(name)
            .map(|summary| PlaceDescription {
                summary: summary.clone(),
                language: "de".to_owned(),
            })
            .ok_or_else(|| LookupError::NotFound {
                query: name.to_owned(),
            })
    }
}

/// [`EventSink`] that keeps every event; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<PlaybackEvent>>>,
}

impl RecordingSink {
    /// Snapshot of the events emitted so far.
    #[must_use]
    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Count events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&PlaybackEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: PlaybackEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// [`Narrator`] that keeps every line; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingNarrator {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingNarrator {
    /// Snapshot of the lines spoken so far.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Narrator for RecordingNarrator {
    fn say(&mut self, text: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_owned());
    }
}
