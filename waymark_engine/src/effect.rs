// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Effects: the commands the orchestrator asks the host to execute.
//!
//! The engine computes; the host executes. Every orchestrator entry point
//! returns a sequence of [`Effect`] values describing timers to (re)schedule,
//! overlay frames to render, UI marks to apply, and notifications to deliver.
//! This keeps the engine single-threaded, non-blocking, and fully
//! deterministic under test: a test host executes effects by hand and feeds
//! the resulting callbacks straight back in.
//!
//! ## Timer contract
//!
//! Timers are identified by [`TimerSlot`] — one named slot per concern, never
//! an anonymous closure. Scheduling an already-scheduled slot replaces its
//! deadline. After `Cancel { slot }`, the host must not deliver a fire for
//! that slot until it is scheduled again; the orchestrator additionally drops
//! stale fires for slots it no longer considers scheduled.

use waymark_overlay::OverlayFrame;
use waymark_tour::events::TourEvent;

/// Named timer slots, one per orchestrator concern.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TimerSlot {
    /// Settle delay before resolving a step's target.
    Settle,
    /// Fixed-interval poll for observer-unfriendly conditions.
    Poll,
    /// Bound on the current step's advance-condition watch.
    Timeout,
    /// Short settle after a condition matched, before advancing.
    SatisfiedSettle,
    /// Retry of a bubble publication deferred by the cool-down window.
    Cooldown,
    /// Bound on waiting for an expected navigation.
    Navigation,
    /// Idle-time speculative resolution of the next step's target.
    PreResolve,
}

impl TimerSlot {
    /// All slots, for bulk cancellation at teardown.
    pub const ALL: [Self; 7] = [
        Self::Settle,
        Self::Poll,
        Self::Timeout,
        Self::SatisfiedSettle,
        Self::Cooldown,
        Self::Navigation,
        Self::PreResolve,
    ];
}

/// A command for the host to execute, in order.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect<E> {
    /// Arrange for [`timer_fired`](crate::orchestrator::Orchestrator::timer_fired)
    /// to be called for `slot` after `delay_ms`.
    Schedule {
        /// The slot to (re)schedule.
        slot: TimerSlot,
        /// Delay in milliseconds.
        delay_ms: u64,
    },
    /// Cancel a pending timer; a no-op if none is pending.
    Cancel {
        /// The slot to cancel.
        slot: TimerSlot,
    },
    /// Render this overlay frame, replacing the previous one wholesale.
    PublishFrame(OverlayFrame),
    /// Remove the overlay (highlight and bubble) entirely.
    ClearFrame,
    /// Mark the element as interaction-priority (visual emphasis and event
    /// routing) for the duration of the step.
    MarkPriority(E),
    /// Clear a previous priority mark.
    ClearPriority(E),
    /// Move focus to the bubble (the focus trap caught a focus change
    /// landing outside the allowed regions).
    RedirectFocus,
    /// Deliver a notification to the host.
    Notify(TourEvent),
}
