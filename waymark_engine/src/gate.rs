// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The interaction gate: a capture-phase allow list over the whole surface.
//!
//! ## Overview
//!
//! While a step is presented, the host routes every input event through
//! [`Gate::filter`] before its own dispatch. Events whose target sits inside
//! an allowed subtree — the resolved element, widened to its near ancestry
//! for composite controls — or whose position lands inside the allowed
//! region (the bubble) pass through untouched, so the host's own handlers
//! still fire. Everything else is suppressed: the host must prevent and stop
//! the event, including immediate propagation. Focus changes landing outside
//! the allow list are redirected back to the bubble instead of suppressed.
//!
//! ## Single owner
//!
//! Gate instances are not composable: exactly one may be armed at a time,
//! and the orchestrator serializes disarm-before-arm across steps. Arming an
//! armed gate means that serialization broke; it asserts in debug builds and
//! reports [`TourError::GateConflict`] in release.
//!
//! Containment is decided by walking the event target's ancestry, the same
//! root-ward path reconstruction the engine uses everywhere it needs
//! hierarchy without owning the tree.

use kurbo::Rect;

use crate::error::TourError;
use crate::ui::{EventKinds, InputEvent, UiTree};

/// What a step allows through while the gate is armed.
#[derive(Clone, Debug, PartialEq)]
pub struct AllowSpec<E> {
    /// Roots of allowed subtrees (typically the resolved target, plus its
    /// near ancestry for widened steps).
    pub subtrees: Vec<E>,
    /// Allowed geometric region: the bubble's rectangle. Checked against the
    /// event position, since the bubble is host-rendered and may not be
    /// reachable as an element handle.
    pub region: Option<Rect>,
}

impl<E> Default for AllowSpec<E> {
    fn default() -> Self {
        Self {
            subtrees: Vec::new(),
            region: None,
        }
    }
}

/// Gate decision for one input event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// Deliver the event normally.
    PassThrough,
    /// Prevent and stop the event, including immediate propagation.
    Suppress,
    /// Drop the focus change and move focus to the bubble instead.
    RedirectFocus,
}

/// The interaction-suppression boundary active while a step is presented.
#[derive(Clone, Debug, Default)]
pub struct Gate<E> {
    armed: Option<AllowSpec<E>>,
}

impl<E: Copy + Eq + core::fmt::Debug> Gate<E> {
    /// A disarmed gate.
    pub fn new() -> Self {
        Self { armed: None }
    }

    /// Whether the gate is currently armed.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Arm the gate with an allow list.
    pub fn arm(&mut self, allow: AllowSpec<E>) -> Result<(), TourError> {
        if self.armed.is_some() {
            debug_assert!(false, "interaction gate armed twice");
            return Err(TourError::GateConflict);
        }
        self.armed = Some(allow);
        Ok(())
    }

    /// Replace the allowed region (the bubble moved). A no-op when the gate
    /// is not armed; this is not a second arm.
    pub fn update_region(&mut self, region: Option<Rect>) {
        if let Some(allow) = &mut self.armed {
            allow.region = region;
        }
    }

    /// The currently allowed region, if armed.
    pub fn region(&self) -> Option<Rect> {
        self.armed.as_ref().and_then(|a| a.region)
    }

    /// Disarm, restoring the pre-arm state exactly. Idempotent.
    pub fn disarm(&mut self) {
        self.armed = None;
    }

    /// Decide what happens to one capture-phase event.
    pub fn filter<U: UiTree<Elem = E>>(&self, ui: &U, ev: &InputEvent<E>) -> Verdict {
        let Some(allow) = &self.armed else {
            return Verdict::PassThrough;
        };

        let in_subtree = ev
            .target
            .is_some_and(|t| in_allowed_subtree(ui, t, &allow.subtrees));
        let in_region = match (ev.position, allow.region) {
            (Some(p), Some(r)) => r.contains(p),
            _ => false,
        };
        if in_subtree || in_region {
            return Verdict::PassThrough;
        }
        if ev.kinds.contains(EventKinds::FOCUS) {
            return Verdict::RedirectFocus;
        }
        Verdict::Suppress
    }
}

/// Walk `target`'s ancestry root-ward and check membership in `roots`.
pub(crate) fn in_allowed_subtree<U: UiTree>(ui: &U, target: U::Elem, roots: &[U::Elem]) -> bool {
    let mut cur = Some(target);
    while let Some(el) = cur {
        if roots.contains(&el) {
            return true;
        }
        cur = ui.parent_of(el);
    }
    false
}

/// Allowed subtree roots for a resolved target: the element itself, widened
/// to its two nearest ancestors when the step asks for it. Composite
/// controls (a file input inside its labelled button) live within a couple
/// of levels of the element a descriptor finds.
pub(crate) fn allow_roots<U: UiTree>(ui: &U, target: U::Elem, widen: bool) -> Vec<U::Elem> {
    let mut roots = vec![target];
    if widen {
        let mut cur = target;
        for _ in 0..2 {
            match ui.parent_of(cur) {
                Some(p) => {
                    roots.push(p);
                    cur = p;
                }
                None => break,
            }
        }
    }
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mem::{MemElem, MemNodeSpec, MemUi};
    use kurbo::Point;

    struct Fixture {
        ui: MemUi,
        target: MemElem,
        sibling: MemElem,
        child_of_target: MemElem,
    }

    fn fixture() -> Fixture {
        let mut ui = MemUi::new(Rect::new(0.0, 0.0, 800.0, 600.0));
        let root = ui.insert(None, MemNodeSpec::default().bounds(ui.viewport()));
        // Interpose a panel so widening by two levels stays short of the root.
        let panel = ui.insert(
            Some(root),
            MemNodeSpec::default().bounds(Rect::new(0.0, 0.0, 400.0, 600.0)),
        );
        let target = ui.insert(
            Some(panel),
            MemNodeSpec::default().bounds(Rect::new(10.0, 10.0, 110.0, 60.0)),
        );
        let child_of_target = ui.insert(
            Some(target),
            MemNodeSpec::default().bounds(Rect::new(20.0, 20.0, 60.0, 40.0)),
        );
        let sibling = ui.insert(
            Some(root),
            MemNodeSpec::default().bounds(Rect::new(200.0, 10.0, 300.0, 60.0)),
        );
        Fixture {
            ui,
            target,
            sibling,
            child_of_target,
        }
    }

    fn pointer(target: Option<MemElem>) -> InputEvent<MemElem> {
        InputEvent {
            kinds: EventKinds::POINTER,
            target,
            position: None,
        }
    }

    #[test]
    fn disarmed_gate_passes_everything() {
        let f = fixture();
        let gate: Gate<MemElem> = Gate::new();
        assert_eq!(gate.filter(&f.ui, &pointer(Some(f.sibling))), Verdict::PassThrough);
    }

    #[test]
    fn target_subtree_passes_everything_else_suppressed() {
        let f = fixture();
        let mut gate = Gate::new();
        gate.arm(AllowSpec {
            subtrees: vec![f.target],
            region: None,
        })
        .unwrap();

        assert_eq!(gate.filter(&f.ui, &pointer(Some(f.target))), Verdict::PassThrough);
        // Containment covers descendants of the allowed root.
        assert_eq!(
            gate.filter(&f.ui, &pointer(Some(f.child_of_target))),
            Verdict::PassThrough
        );
        assert_eq!(gate.filter(&f.ui, &pointer(Some(f.sibling))), Verdict::Suppress);
        // No target, no position: nothing qualifies it.
        assert_eq!(gate.filter(&f.ui, &pointer(None)), Verdict::Suppress);
    }

    #[test]
    fn bubble_region_passes_by_position() {
        let f = fixture();
        let mut gate = Gate::new();
        gate.arm(AllowSpec {
            subtrees: vec![f.target],
            region: Some(Rect::new(400.0, 400.0, 680.0, 520.0)),
        })
        .unwrap();

        let inside = InputEvent {
            kinds: EventKinds::POINTER,
            target: Some(f.sibling),
            position: Some(Point::new(450.0, 450.0)),
        };
        assert_eq!(gate.filter(&f.ui, &inside), Verdict::PassThrough);

        let outside = InputEvent {
            kinds: EventKinds::POINTER,
            target: Some(f.sibling),
            position: Some(Point::new(100.0, 450.0)),
        };
        assert_eq!(gate.filter(&f.ui, &outside), Verdict::Suppress);
    }

    #[test]
    fn focus_outside_is_redirected_not_suppressed() {
        let f = fixture();
        let mut gate = Gate::new();
        gate.arm(AllowSpec {
            subtrees: vec![f.target],
            region: None,
        })
        .unwrap();

        let focus = InputEvent {
            kinds: EventKinds::FOCUS,
            target: Some(f.sibling),
            position: None,
        };
        assert_eq!(gate.filter(&f.ui, &focus), Verdict::RedirectFocus);
        // Focus landing on the target passes.
        let focus_in = InputEvent {
            kinds: EventKinds::FOCUS,
            target: Some(f.target),
            position: None,
        };
        assert_eq!(gate.filter(&f.ui, &focus_in), Verdict::PassThrough);
    }

    #[test]
    fn second_arm_is_a_conflict() {
        let f = fixture();
        let mut gate = Gate::new();
        gate.arm(AllowSpec {
            subtrees: vec![f.target],
            region: None,
        })
        .unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut g = gate.clone();
            g.arm(AllowSpec::default())
        }));
        if cfg!(debug_assertions) {
            assert!(result.is_err(), "debug builds assert on a double arm");
        } else {
            assert!(matches!(result.unwrap(), Err(TourError::GateConflict)));
        }
    }

    #[test]
    fn disarm_is_idempotent_and_restores_passthrough() {
        let f = fixture();
        let mut gate = Gate::new();
        gate.arm(AllowSpec {
            subtrees: vec![f.target],
            region: None,
        })
        .unwrap();
        gate.disarm();
        gate.disarm();
        assert!(!gate.is_armed());
        assert_eq!(gate.filter(&f.ui, &pointer(Some(f.sibling))), Verdict::PassThrough);
        // Disarm-then-arm is legal: this is the per-step cycle.
        gate.arm(AllowSpec {
            subtrees: vec![f.sibling],
            region: None,
        })
        .unwrap();
        assert_eq!(gate.filter(&f.ui, &pointer(Some(f.target))), Verdict::Suppress);
    }

    #[test]
    fn widened_roots_cover_near_ancestry() {
        let f = fixture();
        let narrow = allow_roots(&f.ui, f.child_of_target, false);
        assert_eq!(narrow, vec![f.child_of_target]);
        let wide = allow_roots(&f.ui, f.child_of_target, true);
        // Two ancestor levels: the target and the panel above it, not the root.
        assert_eq!(wide.len(), 3);
        assert!(wide.contains(&f.target));
        // With the widened roots, the target's *other* descendants pass too.
        let mut gate = Gate::new();
        gate.arm(AllowSpec {
            subtrees: wide,
            region: None,
        })
        .unwrap();
        assert_eq!(gate.filter(&f.ui, &pointer(Some(f.target))), Verdict::PassThrough);
        assert_eq!(gate.filter(&f.ui, &pointer(Some(f.sibling))), Verdict::Suppress);
    }

    #[test]
    fn update_region_tracks_a_moving_bubble() {
        let f = fixture();
        let mut gate = Gate::new();
        gate.arm(AllowSpec {
            subtrees: vec![],
            region: Some(Rect::new(0.0, 0.0, 100.0, 100.0)),
        })
        .unwrap();
        let at = |x: f64, y: f64| InputEvent::<MemElem> {
            kinds: EventKinds::POINTER,
            target: None,
            position: Some(Point::new(x, y)),
        };
        assert_eq!(gate.filter(&f.ui, &at(50.0, 50.0)), Verdict::PassThrough);
        gate.update_region(Some(Rect::new(500.0, 500.0, 600.0, 560.0)));
        assert_eq!(gate.filter(&f.ui, &at(50.0, 50.0)), Verdict::Suppress);
        assert_eq!(gate.filter(&f.ui, &at(550.0, 530.0)), Verdict::PassThrough);
    }
}
