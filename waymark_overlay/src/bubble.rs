// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bubble placement: ranked candidate regions around the highlight.
//!
//! ## Ranking
//!
//! Candidates are evaluated in a fixed order — below the highlight, above it,
//! pinned to the container top, centered, pinned to the container bottom —
//! and the first candidate that fits inside the container without touching
//! the highlight wins. With no highlight, the bubble is centered.
//!
//! Edge-relative placement (full-region highlights and steps that opt in)
//! uses a larger gap and, when the highlight covers more than half the
//! container height, prefers the pinned-bottom slot first.
//!
//! ## The degenerate escape hatch
//!
//! A highlight can cover so much of the container that no in-container slot
//! avoids it. The bubble is then parked just below the container's bottom
//! edge: overlapping the highlight is never acceptable, staying inside the
//! container is merely preferred.

use kurbo::{Point, Rect, Size};

/// Candidate regions for the bubble, in ranking order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BubbleRegion {
    /// Directly below the highlight.
    Below,
    /// Directly above the highlight.
    Above,
    /// Pinned to the container's top edge.
    PinnedTop,
    /// Centered in the container.
    Centered,
    /// Pinned to the container's bottom edge.
    PinnedBottom,
    /// Parked below the container; only used when every in-container slot
    /// would touch the highlight.
    Offstage,
}

/// A computed bubble placement.
///
/// Purely derived data; recomputed wholesale on every geometry-affecting
/// event and compared by [`FramePublisher`](crate::publish::FramePublisher)
/// before being re-rendered.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BubblePlacement {
    /// The region that won the ranking.
    pub region: BubbleRegion,
    /// Top-left corner, in the container's coordinate space.
    pub origin: Point,
    /// The bubble size used for the computation.
    pub size: Size,
}

impl BubblePlacement {
    /// The occupied rectangle.
    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.origin, self.size)
    }
}

/// Per-step context influencing the ranking.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PlacementContext {
    /// Compute placement relative to the highlight edges with a larger gap,
    /// and prefer the pinned-bottom slot for tall highlights. Set for
    /// full-region highlights and for steps that opt in.
    pub edge_relative: bool,
}

/// Gap between the bubble and the highlight or container edges.
pub const GAP: f64 = 12.0;

/// Gap used for edge-relative placement.
pub const FULL_REGION_GAP: f64 = 24.0;

/// Compute the bubble placement for the current step.
///
/// `highlight` is the already clamped highlight rectangle (see
/// [`compute_highlight`](crate::highlight::compute_highlight)), or `None`
/// when the step has no target, in which case the bubble is centered. The
/// returned placement never intersects the highlight.
pub fn compute_bubble(
    highlight: Option<Rect>,
    container: Rect,
    bubble_size: Size,
    ctx: PlacementContext,
) -> BubblePlacement {
    let Some(hl) = highlight else {
        return centered(container, bubble_size);
    };
    let gap = if ctx.edge_relative { FULL_REGION_GAP } else { GAP };

    let prefer_bottom = ctx.edge_relative && hl.height() > container.height() / 2.0;
    let ranked: [BubbleRegion; 5] = if prefer_bottom {
        [
            BubbleRegion::PinnedBottom,
            BubbleRegion::Below,
            BubbleRegion::Above,
            BubbleRegion::PinnedTop,
            BubbleRegion::Centered,
        ]
    } else {
        [
            BubbleRegion::Below,
            BubbleRegion::Above,
            BubbleRegion::PinnedTop,
            BubbleRegion::Centered,
            BubbleRegion::PinnedBottom,
        ]
    };

    for region in ranked {
        if let Some(placement) = try_region(region, hl, container, bubble_size, gap) {
            return placement;
        }
    }

    // Nothing fits beside the highlight; park below the container.
    BubblePlacement {
        region: BubbleRegion::Offstage,
        origin: Point::new(
            clamp_x(hl.center().x - bubble_size.width / 2.0, container, bubble_size),
            container.y1 + gap,
        ),
        size: bubble_size,
    }
}

fn centered(container: Rect, size: Size) -> BubblePlacement {
    let c = container.center();
    BubblePlacement {
        region: BubbleRegion::Centered,
        origin: Point::new(c.x - size.width / 2.0, c.y - size.height / 2.0),
        size,
    }
}

/// Horizontal position centered over `x`, clamped so the bubble stays inside
/// the container where it can.
fn clamp_x(x: f64, container: Rect, size: Size) -> f64 {
    let max = container.x1 - size.width - GAP;
    let min = container.x0 + GAP;
    if max < min {
        // Bubble wider than the container; align to the left edge.
        return container.x0;
    }
    x.clamp(min, max)
}

fn try_region(
    region: BubbleRegion,
    hl: Rect,
    container: Rect,
    size: Size,
    gap: f64,
) -> Option<BubblePlacement> {
    let x_over_hl = clamp_x(hl.center().x - size.width / 2.0, container, size);
    let x_centered = clamp_x(container.center().x - size.width / 2.0, container, size);
    let origin = match region {
        BubbleRegion::Below => Point::new(x_over_hl, hl.y1 + gap),
        BubbleRegion::Above => Point::new(x_over_hl, hl.y0 - gap - size.height),
        BubbleRegion::PinnedTop => Point::new(x_centered, container.y0 + gap),
        BubbleRegion::Centered => Point::new(
            x_centered,
            container.center().y - size.height / 2.0,
        ),
        BubbleRegion::PinnedBottom => Point::new(x_centered, container.y1 - gap - size.height),
        BubbleRegion::Offstage => return None,
    };
    let rect = Rect::from_origin_size(origin, size);
    if !contains(container, rect) {
        return None;
    }
    if overlaps(rect, hl) {
        return None;
    }
    Some(BubblePlacement {
        region,
        origin,
        size,
    })
}

fn contains(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.y0 >= outer.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

fn overlaps(a: Rect, b: Rect) -> bool {
    let i = a.intersect(b);
    i.width() > 0.0 && i.height() > 0.0
}
