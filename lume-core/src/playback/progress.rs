//! Position along a route and the pure advancement step.

use geo::Coord;
use thiserror::Error;

use crate::route::Route;

/// Result of one advancement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The agent is somewhere inside a segment.
    Moving,
    /// The end of the last segment was reached.
    Arrived,
}

/// Progress that no longer fits the route it is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProgressError {
    /// The current segment does not exist on the route.
    #[error("segment {segment} is outside a route of {segments} segments")]
    SegmentOutOfRange { segment: usize, segments: usize },
}

/// Where the agent is: a segment, the distance into it, and what was
/// already covered.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Progress {
    segment: usize,
    offset: f64,
    completed: f64,
    last_kilometre: u32,
}

impl Progress {
    /// Index of the current segment.
    #[must_use]
    pub const fn segment(&self) -> usize {
        self.segment
    }

    /// Metres travelled inside the current segment.
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    /// Metres travelled since the start of the route.
    #[must_use]
    pub fn travelled(&self) -> f64 {
        self.completed + self.offset
    }

    /// Highest kilometre index already announced.
    #[must_use]
    pub const fn last_kilometre(&self) -> u32 {
        self.last_kilometre
    }

    /// Fraction of the current segment covered; zero-length segments
    /// report zero.
    #[must_use]
    pub fn fraction(&self, route: &Route) -> f64 {
        match route.segment_length(self.segment) {
            Some(length) if length > 0.0 => self.offset / length,
            _ => 0.0,
        }
    }

    /// Interpolated position, `None` when the segment is out of range.
    #[must_use]
    pub fn position(&self, route: &Route) -> Option<Coord<f64>> {
        route.point_at(self.segment, self.fraction(route))
    }

    /// Move `distance` metres forward, rolling over as many segments as
    /// the distance spans.
    ///
    /// Negative and NaN distances move nothing. On arrival the progress
    /// rests at the end of the last segment.
    ///
    /// # Errors
    /// Returns [`ProgressError::SegmentOutOfRange`] when the current segment
    /// does not exist on `route`.
    pub fn advance(&mut self, route: &Route, distance: f64) -> Result<Step, ProgressError> {
        let mut into_segment = self.offset + distance.max(0.0);
        loop {
            let length =
                route
                    .segment_length(self.segment)
                    .ok_or(ProgressError::SegmentOutOfRange {
                        segment: self.segment,
                        segments: route.segment_count(),
                    })?;
            if into_segment < length {
                self.offset = into_segment;
                return Ok(Step::Moving);
            }
            if self.segment + 1 >= route.segment_count() {
                self.offset = length;
                return Ok(Step::Arrived);
            }
            into_segment -= length;
            self.completed += length;
            self.segment += 1;
        }
    }

    /// Kilometre indices newly crossed at `travelled` metres, in order.
    ///
    /// Each index is handed out once per playback.
    pub fn take_kilometres(&mut self, travelled: f64, interval: f64) -> Vec<u32> {
        // `as` saturates: negative or NaN distances map to zero.
        let current = (travelled / interval).floor() as u32;
        if current <= self.last_kilometre {
            return Vec::new();
        }
        let crossed = (self.last_kilometre + 1..=current).collect();
        self.last_kilometre = current;
        crossed
    }
}
