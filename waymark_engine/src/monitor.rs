// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Condition watching: observer batches, a polling second path, and a bound.
//!
//! ## One watch, three ways out
//!
//! A watch is armed for the current step's advance condition and ends in
//! exactly one of three ways: the predicate becomes true under a mutation
//! batch, the predicate becomes true under a poll tick (only for conditions
//! registered as polled), or the timeout elapses. A match does not report
//! immediately — it schedules a short settle so the host UI finishes the
//! mutation that made the predicate true — and reports exactly once when the
//! settle fires. A timeout cancels the watch silently: the step does *not*
//! auto-advance, the user keeps the manual path.
//!
//! ## Cancellation
//!
//! [`Monitor::cancel`] is idempotent and must be called on step exit, tour
//! abort, and engine teardown. A dangling watch is the single most important
//! resource leak in this engine: observers left armed across steps compound
//! and eventually double-fire advances. The orchestrator owns that
//! discipline; this type just makes every path safe to call twice.

use waymark_tour::definition::ConditionSpec;

use crate::error::TourError;
use crate::ui::{PredicateTable, UiTree};

/// Fixed interval of the polling second path.
pub const POLL_INTERVAL_MS: u64 = 600;

/// Default watch bound when the condition does not override it.
pub const DEFAULT_TIMEOUT_MS: u64 = 18_000;

/// Lower clamp for per-condition timeout overrides.
pub const MIN_TIMEOUT_MS: u64 = 12_000;

/// Upper clamp for per-condition timeout overrides.
pub const MAX_TIMEOUT_MS: u64 = 25_000;

/// Settle delay between a predicate match and the satisfied report.
pub const SATISFIED_SETTLE_MS: u64 = 150;

/// What the orchestrator should do after feeding the monitor an input.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WatchStatus {
    /// Nothing changed; keep waiting.
    Pending,
    /// The predicate matched; schedule the satisfied-settle timer.
    ScheduleSettle,
}

/// Timer plan returned by [`Monitor::arm`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WatchPlan {
    /// Bound to schedule on the timeout slot.
    pub timeout_ms: u64,
    /// Whether to run the fixed-interval poll for this condition.
    pub poll: bool,
}

#[derive(Clone, Debug)]
struct Watch {
    spec: ConditionSpec,
    timeout_ms: u64,
    polled: bool,
    satisfied: bool,
}

/// The per-step condition watch.
#[derive(Clone, Debug, Default)]
pub struct Monitor {
    watch: Option<Watch>,
}

impl Monitor {
    /// A monitor with no active watch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a watch is currently armed.
    pub fn is_armed(&self) -> bool {
        self.watch.is_some()
    }

    /// Arm a watch for `spec`.
    ///
    /// Returns the timer plan, or [`TourError::UnknownPredicate`] when the
    /// host never registered the condition — the step then falls back to
    /// manual advancement and the content bug is logged once, here.
    ///
    /// The orchestrator guarantees the previous step's watch was cancelled
    /// first; a double arm is the same invariant violation as a gate
    /// conflict and asserts in debug builds.
    pub fn arm<U: UiTree>(
        &mut self,
        table: &PredicateTable<U>,
        spec: &ConditionSpec,
    ) -> Result<WatchPlan, TourError> {
        debug_assert!(self.watch.is_none(), "watch armed while one is active");
        if !table.contains(&spec.name) {
            log::error!("step condition `{}` has no registered predicate", spec.name);
            return Err(TourError::UnknownPredicate {
                name: spec.name.clone(),
            });
        }
        let timeout_ms = spec
            .timeout_ms
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
        let polled = table.is_polled(&spec.name);
        self.watch = Some(Watch {
            spec: spec.clone(),
            timeout_ms,
            polled,
            satisfied: false,
        });
        Ok(WatchPlan {
            timeout_ms,
            poll: polled,
        })
    }

    /// Cancel the active watch, if any. Idempotent.
    pub fn cancel(&mut self) {
        self.watch = None;
    }

    /// Evaluate the predicate against the tree after a mutation batch.
    pub fn on_mutations<U: UiTree>(&mut self, ui: &U, table: &PredicateTable<U>) -> WatchStatus {
        self.evaluate(ui, table)
    }

    /// Evaluate on a poll tick. Only conditions registered as polled are
    /// evaluated here; the orchestrator does not even schedule the poll
    /// otherwise.
    pub fn on_poll<U: UiTree>(&mut self, ui: &U, table: &PredicateTable<U>) -> WatchStatus {
        let polled = self.watch.as_ref().is_some_and(|w| w.polled);
        if !polled {
            return WatchStatus::Pending;
        }
        self.evaluate(ui, table)
    }

    /// The satisfied-settle timer fired. Returns true exactly once per
    /// matched watch; the watch is consumed.
    pub fn settle_fired(&mut self) -> bool {
        match &self.watch {
            Some(w) if w.satisfied => {
                self.watch = None;
                true
            }
            _ => false,
        }
    }

    /// The timeout timer fired. Consumes the watch and returns the error to
    /// log, unless a match already won the race (the settle is pending and
    /// will advance the step; the timeout loses).
    pub fn timeout_fired(&mut self) -> Option<TourError> {
        match &self.watch {
            Some(w) if !w.satisfied => {
                let err = TourError::ConditionTimeout {
                    name: w.spec.name.clone(),
                    timeout_ms: w.timeout_ms,
                };
                self.watch = None;
                Some(err)
            }
            _ => None,
        }
    }

    fn evaluate<U: UiTree>(&mut self, ui: &U, table: &PredicateTable<U>) -> WatchStatus {
        let Some(w) = &mut self.watch else {
            return WatchStatus::Pending;
        };
        if w.satisfied {
            // Already matched; the settle timer owns the next move.
            return WatchStatus::Pending;
        }
        if table.evaluate(ui, &w.spec).unwrap_or(false) {
            w.satisfied = true;
            return WatchStatus::ScheduleSettle;
        }
        WatchStatus::Pending
    }
}
