// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A tour that spans a navigation and advances on an observed condition.
//!
//! Step 1 waits for the host to navigate to `/pets`; step 2 watches for a
//! pet card appearing in the tree; step 3 wraps up. The example simulates
//! the host: it mounts the new view, reports the navigation, mutates the
//! tree, and fires the timers the engine schedules.
//!
//! Run:
//! - `cargo run -p waymark_demos --example navigation_tour`

use kurbo::Rect;
use waymark_engine::adapters::mem::{MemElem, MemNodeSpec, MemUi};
use waymark_engine::{Effect, MutationBatch, MutationKinds, Orchestrator, PredicateTable, TimerSlot};
use waymark_overlay::BubbleRegion;
use waymark_tour::definition::{
    ConditionSpec, HighlightKind, NavigationExpectation, Step, StepId, TargetDescriptor,
    TourDefinition, TourId, TourOptions,
};
use waymark_tour::progress::MemStore;

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

fn main() {
    let mut ui = MemUi::new(Rect::new(0.0, 0.0, 800.0, 600.0));
    let root = ui.insert(None, MemNodeSpec::default().bounds(ui.viewport()));

    let mut s1 = step(1);
    s1.target = Some(TargetDescriptor::selector("#add-pet"));
    s1.highlight = HighlightKind::Box;
    s1.requires_navigation = Some(NavigationExpectation {
        expected_path: "/pets".into(),
    });
    s1.advance_when = Some(ConditionSpec::named("pet-added"));
    let mut s2 = step(2);
    s2.is_terminal = true;
    let tour = TourDefinition {
        id: TourId("pets".into()),
        title: "Pet care".into(),
        steps: vec![s1, s2],
        options: TourOptions::default(),
    };

    let mut predicates = PredicateTable::new();
    predicates.register("pet-added", |ui: &MemUi, _| ui.select("#pet-card").is_some());

    let mut now = 0_u64;
    let (mut orch, fx) = Orchestrator::start(
        tour,
        predicates,
        MemStore::new(),
        &ui,
        Some("/feed"),
        now,
    )
    .expect("valid tour");
    run_effects(&fx);
    assert!(orch.waiting_for_navigation());
    println!("engine holds: step 1 wants /pets, host is on /feed");

    // The host navigates and mounts the pets view.
    now += 2_000;
    ui.insert(
        Some(root),
        MemNodeSpec::default()
            .bounds(Rect::new(300.0, 120.0, 420.0, 160.0))
            .selector("#add-pet")
            .text("Add a pet")
            .interactive(),
    );
    run_effects(&orch.navigation_changed(&ui, "/pets", now));

    // Fire the navigation settle; the step presents with a highlight.
    now += 600;
    run_effects(&orch.timer_fired(&ui, TimerSlot::Settle, now));

    // The user adds a pet; the observer fires, the settle advances.
    now += 3_000;
    ui.insert(
        Some(root),
        MemNodeSpec::default()
            .bounds(Rect::new(300.0, 200.0, 500.0, 260.0))
            .selector("#pet-card"),
    );
    let batch = MutationBatch {
        kinds: MutationKinds::SUBTREE,
    };
    run_effects(&orch.mutations(&ui, &batch, now));
    now += 150;
    run_effects(&orch.timer_fired(&ui, TimerSlot::SatisfiedSettle, now));

    // Terminal step: present and confirm.
    now += 120;
    run_effects(&orch.timer_fired(&ui, TimerSlot::Settle, now));
    run_effects(&orch.confirm_finish());
    println!("final phase: {:?}", orch.phase());
}

/// Print each effect the way a host would render or schedule it. The timer
/// fires themselves are driven explicitly by `main`.
fn run_effects(effects: &[Effect<MemElem>]) {
    for e in effects {
        match e {
            Effect::Schedule { slot, delay_ms } => {
                println!("schedule {slot:?} in {delay_ms} ms");
            }
            Effect::Cancel { slot } => println!("cancel {slot:?}"),
            Effect::PublishFrame(f) => {
                let region = f.bubble.region;
                let pinned = matches!(region, BubbleRegion::Centered);
                println!(
                    "render: highlight={:?} bubble={region:?}{}",
                    f.highlight,
                    if pinned { " (neutral)" } else { "" }
                );
            }
            Effect::ClearFrame => println!("render: overlay cleared"),
            Effect::MarkPriority(el) => println!("mark priority on {el:?}"),
            Effect::ClearPriority(el) => println!("clear priority on {el:?}"),
            Effect::RedirectFocus => println!("focus -> bubble"),
            Effect::Notify(ev) => println!("notify: {ev:?}"),
        }
    }
}
