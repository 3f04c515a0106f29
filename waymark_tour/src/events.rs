// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Notifications exchanged with the host.

use crate::definition::StepId;

/// Notifications the engine produces for the host.
///
/// Hosts consume these to coordinate surrounding UI, e.g. hiding a floating
/// assistant while a tour is active.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TourEvent {
    /// A tour started (fresh or resumed).
    Started,
    /// The engine moved to a new step.
    StepChanged(StepId),
    /// The current step's advance condition timed out. The tour is still
    /// alive on the same step; the host should surface a skip affordance.
    Stalled(StepId),
    /// The tour completed after user confirmation.
    Completed,
    /// The user (or host) skipped out of the tour.
    Skipped,
}

/// Lifecycle signals the host may emit to force-interrupt a tour.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostSignal {
    /// Dismiss the overlay now (counts as a skip when skipping is allowed,
    /// otherwise as an abort without recording completion).
    Dismiss,
}
