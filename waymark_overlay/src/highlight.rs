// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Highlight rectangle computation.

use kurbo::Rect;

/// Compute the highlight rectangle for a resolved target.
///
/// The target's world-space bounding box is padded by `padding` on every side
/// and clamped into `container` (container-relative rendering is the caller's
/// concern; both inputs share one coordinate space). Returns `None` when the
/// padded box does not intersect the container at all — a target scrolled
/// fully out of view is presented without a highlight rather than with a
/// zero-area sliver.
pub fn compute_highlight(target_bounds: Rect, container: Rect, padding: f64) -> Option<Rect> {
    let padded = target_bounds.inflate(padding, padding);
    let clamped = padded.intersect(container);
    if clamped.width() <= 0.0 || clamped.height() <= 0.0 {
        return None;
    }
    Some(clamped)
}
