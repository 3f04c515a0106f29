// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Waymark Overlay: pure geometry for guided-tour overlays.
//!
//! ## Overview
//!
//! This crate computes the two derived values a tour overlay renders: the
//! highlight rectangle drawn around the current step's target, and the
//! placement of the instructional bubble next to it. It performs no UI work
//! and holds no element handles — callers feed it world-space rectangles (for
//! example from a box tree or from platform bounding boxes) and render
//! whatever it returns.
//!
//! ## Recompute, never patch
//!
//! Both outputs are recomputed idempotently from current inputs on every
//! geometry-affecting event (resize, scroll, mutation, step change) and
//! replaced wholesale. Incremental patching of a previous value is a source
//! of stale-state bugs and is deliberately not offered.
//!
//! ## Placement
//!
//! [`compute_bubble`](crate::bubble::compute_bubble) evaluates a ranked list
//! of candidate regions — below the highlight, above it, pinned to the
//! container top, centered, pinned to the bottom — and picks the first with
//! enough room. The bubble never intersects the highlight; see the module
//! docs for the one degenerate escape hatch.
//!
//! ## Debounced publication
//!
//! Rendering every recomputation causes visible jitter from sub-pixel layout
//! reflow. [`FramePublisher`](crate::publish::FramePublisher) suppresses
//! insignificant changes (a pixel epsilon) and rate-limits bubble movement
//! with a cool-down window, so consumers re-render only when something
//! meaningfully moved.
//!
//! This crate is `no_std`.

#![no_std]

pub mod bubble;
pub mod highlight;
pub mod publish;

pub use bubble::{BubblePlacement, BubbleRegion, PlacementContext, compute_bubble};
pub use highlight::compute_highlight;
pub use publish::{FramePublisher, OverlayFrame, PublishDecision};
