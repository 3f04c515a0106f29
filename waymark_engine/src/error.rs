// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error taxonomy for the tour engine.
//!
//! Only [`TourError::GateConflict`] indicates a broken engine invariant; it
//! asserts in debug builds. Everything else is a recoverable condition that
//! keeps the tour alive: resolution and navigation failures degrade to a
//! centered bubble, timeouts stall the current step awaiting a manual skip.
//! No error from this crate is ever allowed to unwind into the host.

use waymark_tour::definition::{DefinitionError, StepId};
use waymark_tour::progress::StoreError;

/// Errors surfaced by the tour engine.
#[derive(Debug, thiserror::Error)]
pub enum TourError {
    /// No lookup strategy matched a visible, non-zero-area element.
    /// Non-fatal: the step degrades to a centered bubble.
    #[error("no lookup strategy matched a visible target for step {step}")]
    ResolutionFailure {
        /// The step whose target could not be found.
        step: StepId,
    },
    /// The advance condition never became true within its bound.
    /// Non-fatal: the tour stalls on the current step awaiting manual action.
    #[error("advance condition `{name}` timed out after {timeout_ms} ms")]
    ConditionTimeout {
        /// Symbolic condition name.
        name: String,
        /// The bound that elapsed.
        timeout_ms: u64,
    },
    /// The view a step requires never appeared. Treated like a resolution
    /// failure once its own timeout elapses.
    #[error("expected view `{expected}` never appeared")]
    NavigationMismatch {
        /// The expected view path.
        expected: String,
    },
    /// A second gate was armed while one was active. This breaks the
    /// serialization guarantee that no two steps' handlers coexist, so it
    /// fails loudly in development.
    #[error("interaction gate is already armed")]
    GateConflict,
    /// A transition that is not strictly forward, or from the wrong phase.
    #[error("invalid step transition from {from} to {to}")]
    InvalidTransition {
        /// The step the machine was actually on.
        from: StepId,
        /// The step the caller tried to move to.
        to: StepId,
    },
    /// A step names a condition the host never registered.
    #[error("no predicate registered for condition `{name}`")]
    UnknownPredicate {
        /// The unregistered condition name.
        name: String,
    },
    /// The tour definition failed validation at start.
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    /// The progress store failed. Logged and tolerated everywhere except at
    /// tour start, where resume state cannot be determined.
    #[error(transparent)]
    Store(#[from] StoreError),
}
