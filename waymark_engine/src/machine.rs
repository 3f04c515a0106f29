// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The step state machine: the single gatekeeper of tour progress.
//!
//! No component advances a tour except through [`Machine::advance_from`], and
//! that transition is strictly forward: callers state which step they believe
//! is current, and a stale belief — a late observer firing after the step
//! already moved — is rejected instead of producing a duplicate or backward
//! transition.
//!
//! ## Persistence
//!
//! Every transition persists [`TourProgress`] except entering the terminal
//! step's awaiting-confirm phase, which intentionally records the *previous*
//! step id: a reload mid-exit must not re-present a step the engine was
//! already leaving. Terminal transitions clear the record and set the
//! completed flag. Store failures are logged and tolerated — a lost write
//! costs resume fidelity, never correctness.

use waymark_tour::definition::{StepId, TourDefinition};
use waymark_tour::progress::{
    ProgressState, ProgressStore, TourProgress, completed_key, progress_key,
};

use crate::error::TourError;

/// Lifecycle phase of a running tour.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TourPhase {
    /// No tour has been started.
    NotStarted,
    /// The given step is being presented.
    InProgress(StepId),
    /// The terminal step is presented; completion awaits user confirmation.
    AwaitingConfirm(StepId),
    /// The tour finished. Terminal.
    Completed,
    /// The tour was skipped. Terminal.
    Skipped,
}

impl TourPhase {
    /// The step being presented, if any.
    pub fn step(self) -> Option<StepId> {
        match self {
            Self::InProgress(s) | Self::AwaitingConfirm(s) => Some(s),
            _ => None,
        }
    }

    /// True for `Completed` and `Skipped`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

/// Forward-only step state machine with persisted progress.
#[derive(Clone, Debug)]
pub struct Machine {
    phase: TourPhase,
}

impl Machine {
    /// Build the machine for `tour`, consulting the store for prior state.
    /// The definition must have passed [`TourDefinition::validate`].
    ///
    /// A set completed flag yields an already-completed machine (the host
    /// decides whether to offer a restart by clearing the store). An
    /// existing progress record resumes at the recorded step or later —
    /// never earlier, even if the content changed underneath the record.
    pub fn resume_or_start<S: ProgressStore>(
        tour: &TourDefinition,
        store: &mut S,
        now_ms: u64,
    ) -> Result<Self, TourError> {
        if store.get(&completed_key(&tour.id))?.as_deref() == Some("true") {
            return Ok(Self {
                phase: TourPhase::Completed,
            });
        }

        let recorded = store
            .get(&progress_key(&tour.id))?
            .and_then(|v| TourProgress::from_json(&v));

        let machine = match recorded {
            Some(p) if p.state == ProgressState::AwaitingConfirm => {
                // The record holds the step *before* the terminal one.
                let last = tour.last_step().expect("validated tour has steps");
                Self {
                    phase: TourPhase::AwaitingConfirm(last),
                }
            }
            Some(p) if p.state == ProgressState::InProgress => {
                let resumed = tour
                    .steps
                    .iter()
                    .map(|s| s.id)
                    .find(|id| *id >= p.current_step)
                    .or_else(|| tour.last_step())
                    .expect("validated tour has steps");
                let phase = if tour.step(resumed).is_some_and(|s| s.is_terminal) {
                    TourPhase::AwaitingConfirm(resumed)
                } else {
                    TourPhase::InProgress(resumed)
                };
                Self { phase }
            }
            // Terminal states never persist a record; treat leftovers as fresh.
            _ => {
                let first = tour.first_step().expect("validated tour has steps");
                let phase = if tour.step(first).is_some_and(|s| s.is_terminal) {
                    TourPhase::AwaitingConfirm(first)
                } else {
                    TourPhase::InProgress(first)
                };
                let mut machine = Self { phase };
                machine.persist(tour, store, now_ms);
                machine
            }
        };
        Ok(machine)
    }

    /// The current phase.
    pub fn phase(&self) -> TourPhase {
        self.phase
    }

    /// Advance past `from`, which the caller believes is the current step.
    ///
    /// Valid only while `InProgress(from)`; anything else — a terminal
    /// phase, awaiting-confirm, or a stale `from` — is an
    /// [`TourError::InvalidTransition`]. On success the machine is either
    /// `InProgress` on the next step or `AwaitingConfirm` on the terminal
    /// step, and progress is persisted.
    pub fn advance_from<S: ProgressStore>(
        &mut self,
        tour: &TourDefinition,
        store: &mut S,
        from: StepId,
        now_ms: u64,
    ) -> Result<TourPhase, TourError> {
        let cur = match self.phase {
            TourPhase::InProgress(s) => s,
            other => {
                return Err(TourError::InvalidTransition {
                    from: other.step().unwrap_or(from),
                    to: from,
                });
            }
        };
        if cur != from {
            return Err(TourError::InvalidTransition { from: cur, to: from });
        }
        let Some(next) = tour.step_after(cur) else {
            return Err(TourError::InvalidTransition { from: cur, to: cur });
        };
        debug_assert!(next.id > cur, "step ids are strictly increasing");

        if next.is_terminal {
            self.phase = TourPhase::AwaitingConfirm(next.id);
            // Persist the step we are leaving, not the one we are entering.
            self.persist_record(tour, store, cur, ProgressState::AwaitingConfirm, now_ms);
        } else {
            self.phase = TourPhase::InProgress(next.id);
            self.persist(tour, store, now_ms);
        }
        Ok(self.phase)
    }

    /// Confirm completion from the awaiting-confirm phase. Returns whether
    /// the tour completed; any other phase is a no-op.
    pub fn confirm<S: ProgressStore>(&mut self, tour: &TourDefinition, store: &mut S) -> bool {
        if !matches!(self.phase, TourPhase::AwaitingConfirm(_)) {
            return false;
        }
        self.phase = TourPhase::Completed;
        self.finalize(tour, store);
        true
    }

    /// Skip out of the tour. Valid from any non-terminal phase; returns
    /// whether a skip happened.
    pub fn skip<S: ProgressStore>(&mut self, tour: &TourDefinition, store: &mut S) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = TourPhase::Skipped;
        self.finalize(tour, store);
        true
    }

    fn persist<S: ProgressStore>(&self, tour: &TourDefinition, store: &mut S, now_ms: u64) {
        if let Some(step) = self.phase.step() {
            let state = match self.phase {
                TourPhase::AwaitingConfirm(_) => ProgressState::AwaitingConfirm,
                _ => ProgressState::InProgress,
            };
            self.persist_record(tour, store, step, state, now_ms);
        }
    }

    fn persist_record<S: ProgressStore>(
        &self,
        tour: &TourDefinition,
        store: &mut S,
        step: StepId,
        state: ProgressState,
        now_ms: u64,
    ) {
        let record = TourProgress {
            tour_id: tour.id.clone(),
            current_step: step,
            state,
            updated_at_ms: now_ms,
        };
        if let Err(e) = store.set(&progress_key(&tour.id), &record.to_json()) {
            log::warn!("failed to persist tour progress: {e}");
        }
    }

    /// Clear the record and set the completed flag; both terminal exits do
    /// this so a finished or dismissed tour is not re-presented.
    fn finalize<S: ProgressStore>(&self, tour: &TourDefinition, store: &mut S) {
        if let Err(e) = store.remove(&progress_key(&tour.id)) {
            log::warn!("failed to clear tour progress: {e}");
        }
        if let Err(e) = store.set(&completed_key(&tour.id), "true") {
            log::warn!("failed to set tour completed flag: {e}");
        }
    }
}
