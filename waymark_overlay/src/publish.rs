// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Debounced publication of overlay frames.
//!
//! Geometry is recomputed on every resize, scroll, mutation, and step change,
//! but most recomputations differ from the previous one by fractions of a
//! pixel (sub-pixel layout reflow). Publishing each of them makes the bubble
//! visibly jitter. [`FramePublisher`] sits between computation and rendering:
//! it suppresses changes under a pixel epsilon entirely, publishes structural
//! changes (highlight or placement region) immediately, and rate-limits pure
//! bubble drift with a cool-down window after each publish.
//!
//! The publisher never owns a timer. When it defers a frame it reports
//! [`PublishDecision::Deferred`]; the caller schedules a retry for when the
//! cool-down lapses and offers a freshly computed frame then.

use kurbo::Rect;

use crate::bubble::BubblePlacement;

/// A complete overlay frame: the published geometry truth for one instant.
///
/// Consumers must treat each published frame as the complete current state,
/// not a delta — a later frame can legitimately revert to an earlier value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OverlayFrame {
    /// Highlight rectangle, if the step has a highlighted target.
    pub highlight: Option<Rect>,
    /// Bubble placement.
    pub bubble: BubblePlacement,
}

/// Outcome of offering a computed frame to the publisher.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PublishDecision {
    /// The frame differs meaningfully from the last published one; render it.
    Publish(OverlayFrame),
    /// The frame moved the bubble, but inside the cool-down window. Offer a
    /// fresh frame once the cool-down lapses.
    Deferred,
    /// The frame is within the epsilon of the last published one; drop it.
    Unchanged,
}

/// Changes smaller than this many pixels are not worth a re-render.
pub const PUBLISH_EPSILON: f64 = 2.0;

/// Minimum milliseconds between two published bubble moves.
pub const COOLDOWN_MS: u64 = 300;

/// Debouncing gate between geometry computation and rendering.
#[derive(Clone, Debug)]
pub struct FramePublisher {
    epsilon: f64,
    cooldown_ms: u64,
    last: Option<(OverlayFrame, u64)>,
}

impl Default for FramePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePublisher {
    /// A publisher with the default epsilon and cool-down.
    pub fn new() -> Self {
        Self::with_thresholds(PUBLISH_EPSILON, COOLDOWN_MS)
    }

    /// A publisher with explicit thresholds (used by tests and tuning).
    pub fn with_thresholds(epsilon: f64, cooldown_ms: u64) -> Self {
        Self {
            epsilon,
            cooldown_ms,
            last: None,
        }
    }

    /// The last frame handed out for rendering, if any.
    pub fn last_published(&self) -> Option<&OverlayFrame> {
        self.last.as_ref().map(|(f, _)| f)
    }

    /// Forget the published state. Call on step change and teardown so the
    /// next step's first frame is never debounced against the previous
    /// step's geometry.
    pub fn reset(&mut self) {
        self.last = None;
    }

    /// Milliseconds until the cool-down lapses, measured at `now_ms`.
    /// Zero when publishing is currently unrestricted.
    pub fn cooldown_remaining(&self, now_ms: u64) -> u64 {
        match &self.last {
            Some((_, at)) => self.cooldown_ms.saturating_sub(now_ms.saturating_sub(*at)),
            None => 0,
        }
    }

    /// Offer a freshly computed frame.
    pub fn offer(&mut self, frame: OverlayFrame, now_ms: u64) -> PublishDecision {
        let Some((prev, published_at)) = &self.last else {
            self.last = Some((frame, now_ms));
            return PublishDecision::Publish(frame);
        };

        let structural = prev.bubble.region != frame.bubble.region
            || highlight_changed(prev.highlight, frame.highlight, self.epsilon);
        let drifted = !structural && placement_delta(&prev.bubble, &frame.bubble) > self.epsilon;

        if !structural && !drifted {
            return PublishDecision::Unchanged;
        }
        if drifted && now_ms.saturating_sub(*published_at) < self.cooldown_ms {
            return PublishDecision::Deferred;
        }
        self.last = Some((frame, now_ms));
        PublishDecision::Publish(frame)
    }
}

fn highlight_changed(prev: Option<Rect>, next: Option<Rect>, epsilon: f64) -> bool {
    match (prev, next) {
        (None, None) => false,
        (Some(a), Some(b)) => rect_delta(a, b) > epsilon,
        _ => true,
    }
}

fn placement_delta(a: &BubblePlacement, b: &BubblePlacement) -> f64 {
    let mut d = delta(a.origin.x, b.origin.x);
    d = d.max(delta(a.origin.y, b.origin.y));
    d = d.max(delta(a.size.width, b.size.width));
    d.max(delta(a.size.height, b.size.height))
}

fn rect_delta(a: Rect, b: Rect) -> f64 {
    let mut d = delta(a.x0, b.x0);
    d = d.max(delta(a.y0, b.y0));
    d = d.max(delta(a.x1, b.x1));
    d.max(delta(a.y1, b.y1))
}

// Core-only absolute difference; `f64::abs` needs std or libm.
fn delta(a: f64, b: f64) -> f64 {
    if a > b { a - b } else { b - a }
}
