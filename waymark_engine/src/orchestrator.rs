// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The orchestrator: the per-step cycle that wires everything together.
//!
//! ## The cycle
//!
//! On every `(step, view path)` change: wait for any required navigation,
//! settle, resolve the target, compute and publish geometry, arm the gate
//! scoped to the target and bubble, and arm the watch for the step's advance
//! condition. On watch satisfaction — or a qualifying gated interaction for
//! steps without a condition — disarm both and advance the state machine,
//! then repeat.
//!
//! ## Serialization invariant
//!
//! The orchestrator owns the single active `(target, gate, watch)` triple.
//! It disarms all three and cancels every timer slot before arming anything
//! for the next step, so no two steps' handlers are ever simultaneously
//! active — the property that prevents duplicate-advance races. All
//! disarm/cancel paths are idempotent, including abnormal exits (the host
//! navigating away on its own, or the container unmounting mid-step).
//!
//! ## Degradation
//!
//! Resolution failures and navigation timeouts keep the tour alive with a
//! centered bubble and a bubble-only gate; condition timeouts stall the step
//! and notify the host so it can surface a skip affordance. Only an explicit
//! skip, dismiss, or confirmation tears the overlay down.

use std::collections::BTreeSet;

use kurbo::Size;
use waymark_overlay::{
    FramePublisher, OverlayFrame, PlacementContext, PublishDecision, compute_bubble,
    compute_highlight,
};
use waymark_tour::definition::{HighlightKind, Step, TourDefinition};
use waymark_tour::events::{HostSignal, TourEvent};
use waymark_tour::progress::ProgressStore;

use crate::effect::{Effect, TimerSlot};
use crate::error::TourError;
use crate::gate::{AllowSpec, Gate, Verdict, allow_roots, in_allowed_subtree};
use crate::machine::{Machine, TourPhase};
use crate::monitor::{Monitor, POLL_INTERVAL_MS, SATISFIED_SETTLE_MS, WatchStatus};
use crate::resolve::{ResolvedTarget, Resolver, usable};
use crate::ui::{InputEvent, MutationBatch, MutationKinds, PredicateTable, UiTree};

/// Padding around a target's bounding box in the highlight rectangle.
pub const HIGHLIGHT_PADDING: f64 = 8.0;

/// Bound on waiting for an expected navigation before degrading.
pub const NAV_TIMEOUT_MS: u64 = 20_000;

/// Idle delay before speculatively resolving the next step's target.
pub const PRE_RESOLVE_DELAY_MS: u64 = 1_000;

/// Nominal bubble size used until the host reports the measured one.
pub const DEFAULT_BUBBLE_SIZE: Size = Size::new(320.0, 140.0);

/// Where the orchestrator is within the current step's cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Stage {
    /// No step is being presented (terminal, or between teardown and begin).
    Idle,
    /// The step requires a view the host is not on.
    WaitingNavigation,
    /// The settle timer is pending; nothing is armed yet.
    Settling,
    /// Target resolved (or degraded), gate and watch armed.
    Presenting,
}

/// Top-level tour controller.
///
/// Owns the progress store, the state machine, and the single active
/// `(target, gate, watch)` triple; borrows the host's [`UiTree`] per call.
/// Every entry point returns [`Effect`]s for the host to execute in order.
pub struct Orchestrator<U: UiTree, S> {
    tour: TourDefinition,
    predicates: PredicateTable<U>,
    store: S,
    machine: Machine,
    resolver: Resolver<U::Elem>,
    monitor: Monitor,
    gate: Gate<U::Elem>,
    publisher: FramePublisher,
    bubble_size: Size,
    view_path: Option<String>,
    stage: Stage,
    target: Option<ResolvedTarget<U::Elem>>,
    target_roots: Vec<U::Elem>,
    advances_on_interaction: bool,
    scheduled: BTreeSet<TimerSlot>,
}

impl<U: UiTree, S> core::fmt::Debug for Orchestrator<U, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("tour", &self.tour.id)
            .field("phase", &self.machine.phase())
            .field("stage", &self.stage)
            .field("target", &self.target)
            .field("scheduled", &self.scheduled)
            .finish_non_exhaustive()
    }
}

impl<U: UiTree, S: ProgressStore> Orchestrator<U, S> {
    /// Start (or resume) a tour.
    ///
    /// Validates the definition, consults the store, and — unless the tour
    /// is already recorded as finished — emits the start notifications and
    /// the first step's cycle. A finished tour yields an orchestrator in a
    /// terminal phase and no effects; the host presents nothing.
    pub fn start(
        tour: TourDefinition,
        predicates: PredicateTable<U>,
        mut store: S,
        ui: &U,
        initial_path: Option<&str>,
        now_ms: u64,
    ) -> Result<(Self, Vec<Effect<U::Elem>>), TourError> {
        tour.validate()?;
        let machine = Machine::resume_or_start(&tour, &mut store, now_ms)?;
        let mut orchestrator = Self {
            tour,
            predicates,
            store,
            machine,
            resolver: Resolver::new(),
            monitor: Monitor::new(),
            gate: Gate::new(),
            publisher: FramePublisher::new(),
            bubble_size: DEFAULT_BUBBLE_SIZE,
            view_path: initial_path.map(str::to_owned),
            stage: Stage::Idle,
            target: None,
            target_roots: Vec::new(),
            advances_on_interaction: false,
            scheduled: BTreeSet::new(),
        };
        if orchestrator.machine.phase().is_terminal() {
            return Ok((orchestrator, Vec::new()));
        }
        let mut effects = vec![Effect::Notify(TourEvent::Started)];
        if let Some(step) = orchestrator.machine.phase().step() {
            effects.push(Effect::Notify(TourEvent::StepChanged(step)));
        }
        effects.append(&mut orchestrator.begin_step(ui, now_ms));
        Ok((orchestrator, effects))
    }

    /// The machine's current phase.
    pub fn phase(&self) -> TourPhase {
        self.machine.phase()
    }

    /// Whether the engine is holding for a navigation the step requires.
    pub fn waiting_for_navigation(&self) -> bool {
        self.stage == Stage::WaitingNavigation
    }

    /// The progress store, e.g. for host inspection in tests.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The host reports a view-path change.
    pub fn navigation_changed(
        &mut self,
        ui: &U,
        path: &str,
        now_ms: u64,
    ) -> Vec<Effect<U::Elem>> {
        let changed = self.view_path.as_deref() != Some(path);
        self.view_path = Some(path.to_owned());
        let mut effects = Vec::new();
        match self.stage {
            Stage::WaitingNavigation => {
                let Some(step) = self.current_step_cloned() else {
                    return effects;
                };
                let expected = step
                    .requires_navigation
                    .as_ref()
                    .map(|n| n.expected_path.as_str());
                if expected == Some(path) {
                    self.cancel(&mut effects, TimerSlot::Navigation);
                    self.stage = Stage::Settling;
                    self.schedule(
                        &mut effects,
                        TimerSlot::Settle,
                        Resolver::<U::Elem>::settle_delay(&step),
                    );
                }
            }
            Stage::Presenting => {
                // The navigation itself may satisfy the step's condition;
                // give the watch first claim before restarting the cycle.
                if self.monitor.on_mutations(ui, &self.predicates) == WatchStatus::ScheduleSettle {
                    self.schedule(&mut effects, TimerSlot::SatisfiedSettle, SATISFIED_SETTLE_MS);
                } else if changed {
                    // The host navigated away mid-step on its own.
                    let mut torn = self.teardown_step();
                    effects.append(&mut torn);
                    effects.append(&mut self.begin_step(ui, now_ms));
                }
            }
            Stage::Settling if changed => {
                let mut torn = self.teardown_step();
                effects.append(&mut torn);
                effects.append(&mut self.begin_step(ui, now_ms));
            }
            _ => {}
        }
        effects
    }

    /// The host reports a batch of UI mutations.
    pub fn mutations(
        &mut self,
        ui: &U,
        batch: &MutationBatch,
        now_ms: u64,
    ) -> Vec<Effect<U::Elem>> {
        let mut effects = Vec::new();
        if self.stage != Stage::Presenting {
            return effects;
        }
        if self.monitor.on_mutations(ui, &self.predicates) == WatchStatus::ScheduleSettle {
            self.schedule(&mut effects, TimerSlot::SatisfiedSettle, SATISFIED_SETTLE_MS);
        }
        // Control-value-only batches cannot move geometry.
        if batch
            .kinds
            .intersects(MutationKinds::SUBTREE | MutationKinds::ATTRIBUTE | MutationKinds::TEXT)
        {
            self.refresh_geometry(ui, now_ms, &mut effects);
        }
        effects
    }

    /// The host reports a viewport change (resize or scroll).
    pub fn viewport_changed(&mut self, ui: &U, now_ms: u64) -> Vec<Effect<U::Elem>> {
        let mut effects = Vec::new();
        self.refresh_geometry(ui, now_ms, &mut effects);
        effects
    }

    /// The host measured the rendered bubble.
    pub fn set_bubble_size(&mut self, ui: &U, size: Size, now_ms: u64) -> Vec<Effect<U::Elem>> {
        self.bubble_size = size;
        let mut effects = Vec::new();
        self.refresh_geometry(ui, now_ms, &mut effects);
        effects
    }

    /// A scheduled timer slot fired. Fires for slots the orchestrator no
    /// longer considers scheduled are dropped — a cancelled concern stays
    /// cancelled even if the host's cancellation raced the fire.
    pub fn timer_fired(&mut self, ui: &U, slot: TimerSlot, now_ms: u64) -> Vec<Effect<U::Elem>> {
        if !self.scheduled.remove(&slot) {
            return Vec::new();
        }
        match slot {
            TimerSlot::Settle => self.present_step(ui, now_ms),
            TimerSlot::Poll => {
                let mut effects = Vec::new();
                if self.monitor.on_poll(ui, &self.predicates) == WatchStatus::ScheduleSettle {
                    self.schedule(&mut effects, TimerSlot::SatisfiedSettle, SATISFIED_SETTLE_MS);
                }
                if self.monitor.is_armed() {
                    self.schedule(&mut effects, TimerSlot::Poll, POLL_INTERVAL_MS);
                }
                effects
            }
            TimerSlot::Timeout => {
                let mut effects = Vec::new();
                if let Some(err) = self.monitor.timeout_fired() {
                    log::warn!("{err}; tour stalls awaiting manual action");
                    self.cancel(&mut effects, TimerSlot::Poll);
                    if let Some(step) = self.machine.phase().step() {
                        effects.push(Effect::Notify(TourEvent::Stalled(step)));
                    }
                }
                effects
            }
            TimerSlot::SatisfiedSettle => {
                if self.monitor.settle_fired() {
                    self.do_advance(ui, now_ms)
                } else {
                    Vec::new()
                }
            }
            TimerSlot::Cooldown => {
                let mut effects = Vec::new();
                self.refresh_geometry(ui, now_ms, &mut effects);
                effects
            }
            TimerSlot::Navigation => {
                if self.stage != Stage::WaitingNavigation {
                    return Vec::new();
                }
                if let Some(step) = self.current_step_cloned() {
                    if let Some(nav) = &step.requires_navigation {
                        log::warn!(
                            "{}; presenting step {} degraded",
                            TourError::NavigationMismatch {
                                expected: nav.expected_path.clone(),
                            },
                            step.id
                        );
                    }
                }
                // Degrade like a resolution failure: a centered bubble on
                // whatever view the host is on. A later navigation event
                // restarts the cycle properly.
                self.present_step(ui, now_ms)
            }
            TimerSlot::PreResolve => {
                if let Some(cur) = self.machine.phase().step() {
                    if let Some(next) = self.tour.step_after(cur) {
                        self.resolver.prefetch(ui, next);
                    }
                }
                Vec::new()
            }
        }
    }

    /// Route one capture-phase input event through the gate.
    ///
    /// The verdict must be applied synchronously by the host (suppress,
    /// pass, or redirect focus); the effects are the usual asynchronous
    /// follow-up. For steps without an advance condition, a qualifying
    /// interaction with the resolved target advances the tour exactly once.
    pub fn input_event(
        &mut self,
        ui: &U,
        ev: &InputEvent<U::Elem>,
        now_ms: u64,
    ) -> (Verdict, Vec<Effect<U::Elem>>) {
        let verdict = self.gate.filter(ui, ev);
        let mut effects = Vec::new();
        if verdict == Verdict::RedirectFocus {
            effects.push(Effect::RedirectFocus);
        }
        if verdict == Verdict::PassThrough
            && self.stage == Stage::Presenting
            && self.advances_on_interaction
            && ev.kinds.is_activation()
            && ev
                .target
                .is_some_and(|t| in_allowed_subtree(ui, t, &self.target_roots))
        {
            effects.append(&mut self.do_advance(ui, now_ms));
        }
        (verdict, effects)
    }

    /// The user confirmed the terminal step; complete the tour.
    pub fn confirm_finish(&mut self) -> Vec<Effect<U::Elem>> {
        if !matches!(self.machine.phase(), TourPhase::AwaitingConfirm(_)) {
            return Vec::new();
        }
        let mut effects = self.teardown_step();
        if self.machine.confirm(&self.tour, &mut self.store) {
            self.publisher.reset();
            self.resolver.clear();
            effects.push(Effect::ClearFrame);
            effects.push(Effect::Notify(TourEvent::Completed));
        }
        effects
    }

    /// The user skipped out. A no-op when the tour's options forbid it.
    pub fn skip(&mut self) -> Vec<Effect<U::Elem>> {
        if !self.tour.options.allow_skip {
            log::debug!("skip requested but tour {} forbids skipping", self.tour.id);
            return Vec::new();
        }
        self.force_skip()
    }

    /// A lifecycle signal from the host.
    pub fn host_signal(&mut self, signal: HostSignal) -> Vec<Effect<U::Elem>> {
        match signal {
            // A host-initiated dismiss bypasses the allow_skip option.
            HostSignal::Dismiss => self.force_skip(),
        }
    }

    /// Tear everything down without recording a terminal state, e.g. when
    /// the engine's container unmounts. Progress stays for a later resume.
    pub fn teardown(&mut self) -> Vec<Effect<U::Elem>> {
        let mut effects = self.teardown_step();
        self.publisher.reset();
        self.resolver.clear();
        effects.push(Effect::ClearFrame);
        effects
    }

    // --- per-step cycle internals ---

    fn force_skip(&mut self) -> Vec<Effect<U::Elem>> {
        if self.machine.phase().is_terminal() {
            return Vec::new();
        }
        let mut effects = self.teardown_step();
        if self.machine.skip(&self.tour, &mut self.store) {
            self.publisher.reset();
            self.resolver.clear();
            effects.push(Effect::ClearFrame);
            effects.push(Effect::Notify(TourEvent::Skipped));
        }
        effects
    }

    /// Enter the cycle for the machine's current step.
    fn begin_step(&mut self, ui: &U, now_ms: u64) -> Vec<Effect<U::Elem>> {
        let mut effects = Vec::new();
        let Some(step) = self.current_step_cloned() else {
            return effects;
        };
        self.publisher.reset();
        if let Some(nav) = &step.requires_navigation {
            if self.view_path.as_deref() != Some(nav.expected_path.as_str()) {
                self.stage = Stage::WaitingNavigation;
                let frame = self.neutral_frame(ui);
                self.offer_frame(frame, now_ms, &mut effects, false);
                self.schedule(&mut effects, TimerSlot::Navigation, NAV_TIMEOUT_MS);
                return effects;
            }
        }
        self.stage = Stage::Settling;
        self.schedule(
            &mut effects,
            TimerSlot::Settle,
            Resolver::<U::Elem>::settle_delay(&step),
        );
        effects
    }

    /// Resolve, compute geometry, and arm the gate and watch.
    fn present_step(&mut self, ui: &U, now_ms: u64) -> Vec<Effect<U::Elem>> {
        let mut effects = Vec::new();
        let Some(step) = self.current_step_cloned() else {
            return effects;
        };
        self.stage = Stage::Presenting;
        self.target = None;
        self.target_roots.clear();

        if step.target.is_some() {
            match self.resolver.resolve(ui, &step) {
                Ok(t) => {
                    effects.push(Effect::MarkPriority(t.element));
                    self.target_roots = allow_roots(ui, t.element, step.widen_gate);
                    self.target = Some(t);
                }
                Err(e) => log::warn!("{e}; presenting step {} without a highlight", step.id),
            }
        }

        let frame = self.compute_frame(ui, &step);
        self.offer_frame(frame, now_ms, &mut effects, false);

        // Gate after geometry, so the bubble region is known.
        let allow = AllowSpec {
            subtrees: self.target_roots.clone(),
            region: Some(frame.bubble.rect()),
        };
        if self.gate.arm(allow.clone()).is_err() {
            // Serialization broke somewhere upstream; recover in release.
            log::error!("gate conflict at step {}; rearming", step.id);
            self.gate.disarm();
            let _ = self.gate.arm(allow);
        }

        let terminal_presentation = matches!(self.machine.phase(), TourPhase::AwaitingConfirm(_));
        let mut condition_armed = false;
        if !terminal_presentation {
            if let Some(cond) = &step.advance_when {
                match self.monitor.arm(&self.predicates, cond) {
                    Ok(plan) => {
                        condition_armed = true;
                        self.schedule(&mut effects, TimerSlot::Timeout, plan.timeout_ms);
                        if plan.poll {
                            self.schedule(&mut effects, TimerSlot::Poll, POLL_INTERVAL_MS);
                        }
                    }
                    // Logged at arm; the step falls back to manual advance.
                    Err(_) => {}
                }
            }
        }
        self.advances_on_interaction = !terminal_presentation && !condition_armed;

        if self.tour.step_after(step.id).is_some() {
            self.schedule(&mut effects, TimerSlot::PreResolve, PRE_RESOLVE_DELAY_MS);
        }
        effects
    }

    /// Disarm the active triple and cancel every timer slot. Idempotent.
    fn teardown_step(&mut self) -> Vec<Effect<U::Elem>> {
        let mut effects = Vec::new();
        if let Some(t) = self.target.take() {
            effects.push(Effect::ClearPriority(t.element));
        }
        self.target_roots.clear();
        self.advances_on_interaction = false;
        self.gate.disarm();
        self.monitor.cancel();
        for slot in TimerSlot::ALL {
            self.cancel(&mut effects, slot);
        }
        self.stage = Stage::Idle;
        effects
    }

    /// Advance the machine past the current step and begin the next cycle.
    /// The previous step's gate and watch are fully disarmed first.
    fn do_advance(&mut self, ui: &U, now_ms: u64) -> Vec<Effect<U::Elem>> {
        let TourPhase::InProgress(from) = self.machine.phase() else {
            return Vec::new();
        };
        let mut effects = self.teardown_step();
        self.resolver.invalidate(from);
        match self
            .machine
            .advance_from(&self.tour, &mut self.store, from, now_ms)
        {
            Ok(phase) => {
                if let Some(step) = phase.step() {
                    effects.push(Effect::Notify(TourEvent::StepChanged(step)));
                }
                effects.append(&mut self.begin_step(ui, now_ms));
            }
            Err(e) => log::debug!("advance rejected: {e}"),
        }
        effects
    }

    /// Recompute geometry from current inputs and offer it for publication.
    fn refresh_geometry(&mut self, ui: &U, now_ms: u64, effects: &mut Vec<Effect<U::Elem>>) {
        match self.stage {
            Stage::Presenting => {
                let Some(step) = self.current_step_cloned() else {
                    return;
                };
                let stale = self.target.as_ref().is_some_and(|t| !usable(ui, t.element));
                if stale {
                    self.re_resolve(ui, &step, effects);
                }
                let frame = self.compute_frame(ui, &step);
                self.offer_frame(frame, now_ms, effects, true);
            }
            Stage::WaitingNavigation => {
                let frame = self.neutral_frame(ui);
                self.offer_frame(frame, now_ms, effects, false);
            }
            _ => {}
        }
    }

    /// The tracked element was detached or collapsed; find its successor and
    /// re-scope the gate, or degrade to a bubble-only allow list.
    fn re_resolve(&mut self, ui: &U, step: &Step, effects: &mut Vec<Effect<U::Elem>>) {
        if let Some(old) = self.target.take() {
            effects.push(Effect::ClearPriority(old.element));
        }
        self.target_roots.clear();
        self.resolver.invalidate(step.id);
        if step.target.is_some() {
            match self.resolver.resolve(ui, step) {
                Ok(t) => {
                    effects.push(Effect::MarkPriority(t.element));
                    self.target_roots = allow_roots(ui, t.element, step.widen_gate);
                    self.target = Some(t);
                }
                Err(e) => log::warn!("{e}; step {} continues without a highlight", step.id),
            }
        }
        let region = self.gate.region();
        self.gate.disarm();
        let _ = self.gate.arm(AllowSpec {
            subtrees: self.target_roots.clone(),
            region,
        });
    }

    fn compute_frame(&self, ui: &U, step: &Step) -> OverlayFrame {
        let container = ui.viewport();
        let highlight = match step.highlight {
            HighlightKind::None => None,
            HighlightKind::Box | HighlightKind::FullRegion => {
                self.target.as_ref().and_then(|t| {
                    usable(ui, t.element).then(|| ui.bounds(t.element)).and_then(
                        |bounds| compute_highlight(bounds, container, HIGHLIGHT_PADDING),
                    )
                })
            }
        };
        let ctx = PlacementContext {
            edge_relative: matches!(step.highlight, HighlightKind::FullRegion),
        };
        OverlayFrame {
            highlight,
            bubble: compute_bubble(highlight, container, self.bubble_size, ctx),
        }
    }

    fn neutral_frame(&self, ui: &U) -> OverlayFrame {
        OverlayFrame {
            highlight: None,
            bubble: compute_bubble(
                None,
                ui.viewport(),
                self.bubble_size,
                PlacementContext::default(),
            ),
        }
    }

    fn offer_frame(
        &mut self,
        frame: OverlayFrame,
        now_ms: u64,
        effects: &mut Vec<Effect<U::Elem>>,
        update_gate: bool,
    ) {
        match self.publisher.offer(frame, now_ms) {
            PublishDecision::Publish(f) => {
                if update_gate {
                    self.gate.update_region(Some(f.bubble.rect()));
                }
                effects.push(Effect::PublishFrame(f));
            }
            PublishDecision::Deferred => {
                let delay = self.publisher.cooldown_remaining(now_ms).max(1);
                self.schedule(effects, TimerSlot::Cooldown, delay);
            }
            PublishDecision::Unchanged => {}
        }
    }

    fn current_step_cloned(&self) -> Option<Step> {
        let id = self.machine.phase().step()?;
        self.tour.step(id).cloned()
    }

    fn schedule(&mut self, effects: &mut Vec<Effect<U::Elem>>, slot: TimerSlot, delay_ms: u64) {
        self.scheduled.insert(slot);
        effects.push(Effect::Schedule { slot, delay_ms });
    }

    fn cancel(&mut self, effects: &mut Vec<Effect<U::Elem>>, slot: TimerSlot) {
        if self.scheduled.remove(&slot) {
            effects.push(Effect::Cancel { slot });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mem::{MemElem, MemNodeSpec, MemUi};
    use crate::resolve::{NAV_SETTLE_MS, SETTLE_MS};
    use crate::ui::EventKinds;
    use kurbo::{Point, Rect};
    use waymark_tour::definition::{
        ConditionSpec, NavigationExpectation, StepId, TargetDescriptor, TourId, TourOptions,
    };
    use waymark_tour::progress::{MemStore, TourProgress, completed_key, progress_key};

    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    struct App {
        ui: MemUi,
        root: MemElem,
        compose: MemElem,
        sidebar: MemElem,
    }

    /// The host app on its "/feed" view: a compose button and a sidebar.
    fn feed_app() -> App {
        let mut ui = MemUi::new(VIEWPORT);
        let root = ui.insert(None, MemNodeSpec::default().bounds(VIEWPORT));
        let compose = ui.insert(
            Some(root),
            MemNodeSpec::default()
                .bounds(Rect::new(300.0, 40.0, 420.0, 80.0))
                .selector("#compose")
                .text("Compose")
                .interactive(),
        );
        let sidebar = ui.insert(
            Some(root),
            MemNodeSpec::default()
                .bounds(Rect::new(0.0, 0.0, 200.0, 600.0))
                .selector("#sidebar")
                .interactive(),
        );
        App {
            ui,
            root,
            compose,
            sidebar,
        }
    }

    /// Mount the "/pets" view content into the same tree.
    fn mount_pets(app: &mut App) -> MemElem {
        app.ui.insert(
            Some(app.root),
            MemNodeSpec::default()
                .bounds(Rect::new(300.0, 120.0, 420.0, 160.0))
                .selector("#add-pet")
                .text("Add a pet")
                .interactive(),
        )
    }

    fn step(id: u32) -> Step {
        Step {
            id: StepId(id),
            title: format!("step {id}"),
            instruction: String::new(),
            target: None,
            highlight: HighlightKind::None,
            advance_when: None,
            requires_navigation: None,
            widen_gate: false,
            is_terminal: false,
        }
    }

    /// Step 1: click compose (interaction advance). Step 2: on /pets, add a
    /// pet (observed condition). Step 3: terminal wrap-up.
    fn demo_tour() -> TourDefinition {
        let mut s1 = step(1);
        s1.target = Some(TargetDescriptor::selector("#compose"));
        s1.highlight = HighlightKind::Box;
        let mut s2 = step(2);
        s2.target = Some(TargetDescriptor::selector("#add-pet"));
        s2.highlight = HighlightKind::Box;
        s2.requires_navigation = Some(NavigationExpectation {
            expected_path: "/pets".into(),
        });
        s2.advance_when = Some(ConditionSpec::named("pet-added"));
        let mut s3 = step(3);
        s3.is_terminal = true;
        TourDefinition {
            id: TourId("welcome".into()),
            title: "Welcome".into(),
            steps: vec![s1, s2, s3],
            options: TourOptions::default(),
        }
    }

    fn predicates() -> PredicateTable<MemUi> {
        let mut t = PredicateTable::new();
        t.register("pet-added", |ui: &MemUi, _| ui.select("#pet-card").is_some());
        t
    }

    fn scheduled_delay(effects: &[Effect<MemElem>], slot: TimerSlot) -> Option<u64> {
        effects.iter().find_map(|e| match e {
            Effect::Schedule { slot: s, delay_ms } if *s == slot => Some(*delay_ms),
            _ => None,
        })
    }

    fn notified(effects: &[Effect<MemElem>], ev: &TourEvent) -> bool {
        effects.iter().any(|e| matches!(e, Effect::Notify(n) if n == ev))
    }

    fn published(effects: &[Effect<MemElem>]) -> Option<OverlayFrame> {
        effects.iter().rev().find_map(|e| match e {
            Effect::PublishFrame(f) => Some(*f),
            _ => None,
        })
    }

    fn click(target: MemElem) -> InputEvent<MemElem> {
        InputEvent {
            kinds: EventKinds::POINTER,
            target: Some(target),
            position: None,
        }
    }

    type Orch = Orchestrator<MemUi, MemStore>;

    fn start_demo(app: &App) -> (Orch, Vec<Effect<MemElem>>) {
        Orchestrator::start(
            demo_tour(),
            predicates(),
            MemStore::new(),
            &app.ui,
            Some("/feed"),
            0,
        )
        .unwrap()
    }

    #[test]
    fn start_emits_notifications_and_settles() {
        let app = feed_app();
        let (orch, effects) = start_demo(&app);
        assert_eq!(orch.phase(), TourPhase::InProgress(StepId(1)));
        assert!(notified(&effects, &TourEvent::Started));
        assert!(notified(&effects, &TourEvent::StepChanged(StepId(1))));
        assert_eq!(scheduled_delay(&effects, TimerSlot::Settle), Some(SETTLE_MS));
        // Nothing is presented until the settle elapses.
        assert!(published(&effects).is_none());
    }

    #[test]
    fn full_walkthrough() {
        let mut app = feed_app();
        let (mut orch, _) = start_demo(&app);

        // Step 1 presents with a highlight over the compose button.
        let fx = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);
        assert!(fx.contains(&Effect::MarkPriority(app.compose)));
        let frame = published(&fx).expect("step 1 publishes a frame");
        let hl = frame.highlight.expect("step 1 highlights its target");
        assert!(hl.contains(Point::new(360.0, 60.0)));
        assert!(frame.bubble.rect().intersect(hl).height() <= 0.0);

        // The sidebar is gated off; the target passes and advances.
        let (v, _) = orch.input_event(&app.ui, &click(app.sidebar), 200);
        assert_eq!(v, Verdict::Suppress);
        let (v, fx) = orch.input_event(&app.ui, &click(app.compose), 210);
        assert_eq!(v, Verdict::PassThrough);
        assert!(notified(&fx, &TourEvent::StepChanged(StepId(2))));
        assert!(fx.contains(&Effect::ClearPriority(app.compose)));

        // Step 2 requires /pets; the engine holds with a centered,
        // highlight-free bubble until the host navigates.
        assert!(orch.waiting_for_navigation());
        let frame = published(&fx).expect("waiting state publishes a neutral frame");
        assert_eq!(frame.highlight, None);
        assert_eq!(scheduled_delay(&fx, TimerSlot::Navigation), Some(NAV_TIMEOUT_MS));

        // Host navigates; the longer navigation settle applies.
        let add_pet = mount_pets(&mut app);
        let fx = orch.navigation_changed(&app.ui, "/pets", 1_000);
        assert!(!orch.waiting_for_navigation());
        assert_eq!(scheduled_delay(&fx, TimerSlot::Settle), Some(NAV_SETTLE_MS));

        let fx = orch.timer_fired(&app.ui, TimerSlot::Settle, 1_000 + NAV_SETTLE_MS);
        assert!(fx.contains(&Effect::MarkPriority(add_pet)));
        let timeout = scheduled_delay(&fx, TimerSlot::Timeout).expect("condition watch armed");
        assert!((crate::monitor::MIN_TIMEOUT_MS..=crate::monitor::MAX_TIMEOUT_MS)
            .contains(&timeout));

        // The user adds a pet; the observer sees it and the settle advances.
        app.ui.insert(
            Some(app.root),
            MemNodeSpec::default()
                .bounds(Rect::new(300.0, 200.0, 500.0, 260.0))
                .selector("#pet-card"),
        );
        let fx = orch.mutations(
            &app.ui,
            &MutationBatch {
                kinds: MutationKinds::SUBTREE,
            },
            2_000,
        );
        assert_eq!(
            scheduled_delay(&fx, TimerSlot::SatisfiedSettle),
            Some(SATISFIED_SETTLE_MS)
        );
        let fx = orch.timer_fired(&app.ui, TimerSlot::SatisfiedSettle, 2_150);
        assert!(notified(&fx, &TourEvent::StepChanged(StepId(3))));
        assert_eq!(orch.phase(), TourPhase::AwaitingConfirm(StepId(3)));

        // The awaiting-confirm record intentionally holds the previous step.
        let record = orch
            .store()
            .get(&progress_key(&TourId("welcome".into())))
            .unwrap()
            .and_then(|v| TourProgress::from_json(&v))
            .unwrap();
        assert_eq!(record.current_step, StepId(2));

        // Terminal step presents centered; confirmation completes the tour.
        let fx = orch.timer_fired(&app.ui, TimerSlot::Settle, 2_300);
        assert_eq!(published(&fx).unwrap().highlight, None);
        let fx = orch.confirm_finish();
        assert!(notified(&fx, &TourEvent::Completed));
        assert!(fx.contains(&Effect::ClearFrame));
        assert_eq!(orch.phase(), TourPhase::Completed);
        assert_eq!(
            orch.store()
                .get(&completed_key(&TourId("welcome".into())))
                .unwrap()
                .as_deref(),
            Some("true")
        );
    }

    #[test]
    fn duplicate_interaction_advances_exactly_once() {
        let app = feed_app();
        let (mut orch, _) = start_demo(&app);
        let _ = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);

        let (_, fx1) = orch.input_event(&app.ui, &click(app.compose), 200);
        assert!(notified(&fx1, &TourEvent::StepChanged(StepId(2))));
        // Duplicate delivery of the same event: the previous step's gate and
        // stage are gone, so nothing advances again.
        let (_, fx2) = orch.input_event(&app.ui, &click(app.compose), 201);
        assert!(fx2.iter().all(|e| !matches!(e, Effect::Notify(TourEvent::StepChanged(_)))));
        assert_eq!(orch.phase(), TourPhase::InProgress(StepId(2)));
    }

    #[test]
    fn condition_timeout_stalls_without_advancing() {
        let mut app = feed_app();
        let mut tour = demo_tour();
        // Rewrite step 1 to hang on a condition that never fires.
        tour.steps[0].advance_when = Some(ConditionSpec::named("pet-added"));
        let (mut orch, _) = Orchestrator::start(
            tour,
            predicates(),
            MemStore::new(),
            &app.ui,
            Some("/feed"),
            0,
        )
        .unwrap();
        let fx = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);
        let bound = scheduled_delay(&fx, TimerSlot::Timeout).unwrap();
        assert_eq!(bound, crate::monitor::DEFAULT_TIMEOUT_MS);

        let fx = orch.timer_fired(&app.ui, TimerSlot::Timeout, bound + SETTLE_MS);
        assert!(notified(&fx, &TourEvent::Stalled(StepId(1))));
        assert_eq!(orch.phase(), TourPhase::InProgress(StepId(1)));

        // The dead watch stays dead: satisfying the condition now is inert.
        app.ui
            .insert(Some(app.root), MemNodeSpec::default().selector("#pet-card"));
        let fx = orch.mutations(
            &app.ui,
            &MutationBatch {
                kinds: MutationKinds::SUBTREE,
            },
            30_000,
        );
        assert_eq!(scheduled_delay(&fx, TimerSlot::SatisfiedSettle), None);
        assert_eq!(orch.phase(), TourPhase::InProgress(StepId(1)));

        // The manual escape still works.
        let fx = orch.skip();
        assert!(notified(&fx, &TourEvent::Skipped));
        assert_eq!(orch.phase(), TourPhase::Skipped);
    }

    #[test]
    fn resume_lands_on_the_recorded_step() {
        let app = feed_app();
        let (mut orch, _) = start_demo(&app);
        let _ = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);
        let _ = orch.input_event(&app.ui, &click(app.compose), 200);
        assert_eq!(orch.phase(), TourPhase::InProgress(StepId(2)));
        let store = orch.store().clone();
        drop(orch);

        // "Reload": a new engine over the persisted store resumes at step 2
        // (or later — never earlier).
        let (orch, effects) = Orchestrator::start(
            demo_tour(),
            predicates(),
            store,
            &app.ui,
            Some("/feed"),
            9_000,
        )
        .unwrap();
        assert_eq!(orch.phase(), TourPhase::InProgress(StepId(2)));
        assert!(notified(&effects, &TourEvent::StepChanged(StepId(2))));
        assert!(orch.waiting_for_navigation());
    }

    #[test]
    fn completed_flag_keeps_the_engine_dormant() {
        let app = feed_app();
        let mut store = MemStore::new();
        store
            .set(&completed_key(&TourId("welcome".into())), "true")
            .unwrap();
        let (orch, effects) = Orchestrator::start(
            demo_tour(),
            predicates(),
            store,
            &app.ui,
            Some("/feed"),
            0,
        )
        .unwrap();
        assert_eq!(orch.phase(), TourPhase::Completed);
        assert!(effects.is_empty());
    }

    #[test]
    fn stale_timer_fires_are_dropped() {
        let app = feed_app();
        let (mut orch, _) = start_demo(&app);
        // Teardown cancels the settle; a racing fire must be ignored.
        let fx = orch.teardown();
        assert!(fx.contains(&Effect::Cancel {
            slot: TimerSlot::Settle
        }));
        let fx = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);
        assert!(fx.is_empty());
        // Teardown is idempotent.
        let fx = orch.teardown();
        assert!(!fx.iter().any(|e| matches!(e, Effect::Cancel { .. })));
    }

    #[test]
    fn navigation_timeout_degrades_to_centered_presentation() {
        let app = feed_app();
        let (mut orch, _) = start_demo(&app);
        let _ = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);
        let (_, fx) = orch.input_event(&app.ui, &click(app.compose), 200);
        assert!(orch.waiting_for_navigation());
        assert!(scheduled_delay(&fx, TimerSlot::Navigation).is_some());

        // The expected view never appears; the step presents degraded on the
        // current view. Its target is not mounted, so the centered neutral
        // frame already showing stays the published truth.
        let fx = orch.timer_fired(&app.ui, TimerSlot::Navigation, NAV_TIMEOUT_MS + 300);
        assert!(!orch.waiting_for_navigation());
        assert!(published(&fx).is_none());
        assert_eq!(orch.phase(), TourPhase::InProgress(StepId(2)));
        // The condition watch is armed even in the degraded presentation.
        assert!(scheduled_delay(&fx, TimerSlot::Timeout).is_some());
    }

    #[test]
    fn focus_outside_allowed_regions_is_redirected() {
        let app = feed_app();
        let (mut orch, _) = start_demo(&app);
        let _ = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);
        let focus = InputEvent {
            kinds: EventKinds::FOCUS,
            target: Some(app.sidebar),
            position: None,
        };
        let (v, fx) = orch.input_event(&app.ui, &focus, 300);
        assert_eq!(v, Verdict::RedirectFocus);
        assert!(fx.contains(&Effect::RedirectFocus));
    }

    #[test]
    fn dismiss_signal_skips_regardless_of_options() {
        let app = feed_app();
        let mut tour = demo_tour();
        tour.options = TourOptions { allow_skip: false };
        let (mut orch, _) = Orchestrator::start(
            tour,
            predicates(),
            MemStore::new(),
            &app.ui,
            Some("/feed"),
            0,
        )
        .unwrap();
        // The option blocks a user skip...
        assert!(orch.skip().is_empty());
        // ...but not a host-initiated dismiss.
        let fx = orch.host_signal(HostSignal::Dismiss);
        assert!(notified(&fx, &TourEvent::Skipped));
        assert!(fx.contains(&Effect::ClearFrame));
    }

    #[test]
    fn sub_epsilon_jitter_publishes_nothing_new() {
        let mut app = feed_app();
        let (mut orch, _) = start_demo(&app);
        let fx = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);
        assert!(published(&fx).is_some());

        // A 1 px layout reflow right after the publish: no new frame, no
        // cool-down retry, nothing.
        app.ui
            .set_bounds(app.compose, Rect::new(301.0, 41.0, 421.0, 81.0));
        let fx = orch.mutations(
            &app.ui,
            &MutationBatch {
                kinds: MutationKinds::SUBTREE,
            },
            SETTLE_MS + 20,
        );
        assert!(published(&fx).is_none());
        assert_eq!(scheduled_delay(&fx, TimerSlot::Cooldown), None);
    }

    #[test]
    fn rapid_bubble_resizes_are_rate_limited_then_flushed() {
        let app = feed_app();
        let (mut orch, _) = start_demo(&app);
        let _ = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);

        // The host measures the real bubble right after the first publish:
        // same placement region and highlight, meaningfully different box —
        // deferred into the cool-down window instead of published.
        let fx = orch.set_bubble_size(&app.ui, Size::new(320.0, 180.0), SETTLE_MS + 30);
        assert!(published(&fx).is_none());
        let delay = scheduled_delay(&fx, TimerSlot::Cooldown).expect("deferred publish retries");

        // Once the cool-down lapses the deferred geometry goes out.
        let fx = orch.timer_fired(&app.ui, TimerSlot::Cooldown, SETTLE_MS + 30 + delay);
        let frame = published(&fx).expect("cool-down flush publishes");
        assert_eq!(frame.bubble.size.height, 180.0);
    }

    #[test]
    fn detached_target_is_re_resolved_mid_step() {
        let mut app = feed_app();
        let (mut orch, _) = start_demo(&app);
        let _ = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);

        // The host re-renders the button: old handle dies, new one mounts
        // elsewhere.
        app.ui.remove(app.compose);
        let replacement = app.ui.insert(
            Some(app.root),
            MemNodeSpec::default()
                .bounds(Rect::new(500.0, 300.0, 620.0, 340.0))
                .selector("#compose")
                .interactive(),
        );
        let fx = orch.mutations(
            &app.ui,
            &MutationBatch {
                kinds: MutationKinds::SUBTREE,
            },
            SETTLE_MS + 400,
        );
        assert!(fx.contains(&Effect::ClearPriority(app.compose)));
        assert!(fx.contains(&Effect::MarkPriority(replacement)));
        // The replacement now gates and advances like the original.
        let (v, fx) = orch.input_event(&app.ui, &click(replacement), SETTLE_MS + 500);
        assert_eq!(v, Verdict::PassThrough);
        assert!(notified(&fx, &TourEvent::StepChanged(StepId(2))));
    }

    #[test]
    fn unregistered_condition_falls_back_to_manual_advance() {
        let app = feed_app();
        let mut tour = demo_tour();
        tour.steps[0].advance_when = Some(ConditionSpec::named("never-registered"));
        let (mut orch, _) = Orchestrator::start(
            tour,
            predicates(),
            MemStore::new(),
            &app.ui,
            Some("/feed"),
            0,
        )
        .unwrap();
        let fx = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);
        // No watch, no timeout bound.
        assert_eq!(scheduled_delay(&fx, TimerSlot::Timeout), None);
        // Interaction still moves the tour along.
        let (_, fx) = orch.input_event(&app.ui, &click(app.compose), 500);
        assert!(notified(&fx, &TourEvent::StepChanged(StepId(2))));
    }

    #[test]
    fn pre_resolve_primes_the_next_step() {
        let mut app = feed_app();
        let (mut orch, _) = start_demo(&app);
        let fx = orch.timer_fired(&app.ui, TimerSlot::Settle, SETTLE_MS);
        assert_eq!(
            scheduled_delay(&fx, TimerSlot::PreResolve),
            Some(PRE_RESOLVE_DELAY_MS)
        );
        // Next step's target is already mounted (e.g. same-page steps).
        let add_pet = mount_pets(&mut app);
        let fx = orch.timer_fired(&app.ui, TimerSlot::PreResolve, SETTLE_MS + PRE_RESOLVE_DELAY_MS);
        assert!(fx.is_empty(), "prefetch is invisible to the host");
        let _ = add_pet;
    }
}
