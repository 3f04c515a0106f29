// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Waymark Engine: a guided-tour overlay engine for host UIs it does not control.
//!
//! ## Overview
//!
//! The engine drives a multi-step walkthrough on top of a live, independently
//! re-rendering UI: it locates each step's target element by heuristic
//! descriptors, keeps a highlight and instructional bubble aligned without
//! flicker, suppresses interaction with everything except the target and the
//! bubble, detects step completion by observing host mutations (with a
//! polling fallback and a bound), and persists progress across reloads.
//!
//! ## Pieces
//!
//! - [`resolve::Resolver`] — ordered lookup strategies → a live element, with
//!   a revalidated per-step cache and speculative prefetch.
//! - [`monitor::Monitor`] — the advance-condition watch: observer batches, a
//!   poll tick for observer-unfriendly conditions, and a timeout.
//! - [`gate::Gate`] — the capture-phase allow list and focus trap.
//! - [`machine::Machine`] — the forward-only step state machine and the only
//!   writer of persisted progress.
//! - [`orchestrator::Orchestrator`] — wires the above per step and owns the
//!   single active `(target, gate, watch)` triple.
//!
//! ## Host integration
//!
//! The host implements [`ui::UiTree`] over its widget tree and a
//! `ProgressStore` over any key-value storage, injects a
//! [`ui::PredicateTable`] mapping its condition vocabulary to predicates, and
//! feeds the orchestrator events: input (through the gate), mutation batches,
//! navigation changes, viewport changes, and timer fires. Every call returns
//! [`effect::Effect`]s to execute in order; the engine itself never blocks,
//! spawns, or touches the UI directly.
//!
//! The engine is deliberately vocabulary-free: selectors are host-interpreted
//! strings, conditions are host-registered predicates, and navigation paths
//! are opaque. See `waymark_tour` for the content model and the
//! [`adapters`] module for an in-memory reference host.

pub mod adapters;
pub mod effect;
pub mod error;
pub mod gate;
pub mod machine;
pub mod monitor;
pub mod orchestrator;
pub mod resolve;
pub mod ui;

pub use effect::{Effect, TimerSlot};
pub use error::TourError;
pub use gate::Verdict;
pub use machine::TourPhase;
pub use orchestrator::Orchestrator;
pub use ui::{EventKinds, InputEvent, MutationBatch, MutationKinds, PredicateTable, UiTree};
