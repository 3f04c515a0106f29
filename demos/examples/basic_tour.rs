// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A two-step tour over the in-memory UI, driven to completion by hand.
//!
//! This example plays the host: it executes the effects the orchestrator
//! returns (here, just firing the scheduled timers in order) and prints what
//! a real host would render.
//!
//! Run:
//! - `cargo run -p waymark_demos --example basic_tour`

use kurbo::Rect;
use waymark_engine::adapters::mem::{MemNodeSpec, MemUi};
use waymark_engine::{Effect, Orchestrator, PredicateTable, TimerSlot};
use waymark_engine::{EventKinds, InputEvent};
use waymark_tour::definition::{
    HighlightKind, Step, StepId, TargetDescriptor, TourDefinition, TourId, TourOptions,
};
use waymark_tour::progress::MemStore;

fn main() {
    // The host application: a viewport with one prominent button.
    let mut ui = MemUi::new(Rect::new(0.0, 0.0, 800.0, 600.0));
    let root = ui.insert(None, MemNodeSpec::default().bounds(ui.viewport()));
    let compose = ui.insert(
        Some(root),
        MemNodeSpec::default()
            .bounds(Rect::new(300.0, 40.0, 420.0, 80.0))
            .selector("#compose")
            .text("Compose")
            .interactive(),
    );

    let tour = TourDefinition {
        id: TourId("basics".into()),
        title: "The basics".into(),
        steps: vec![
            Step {
                id: StepId(1),
                title: "Compose".into(),
                instruction: "Click the compose button to write your first post.".into(),
                target: Some(TargetDescriptor::selector("#compose")),
                highlight: HighlightKind::Box,
                advance_when: None,
                requires_navigation: None,
                widen_gate: false,
                is_terminal: false,
            },
            Step {
                id: StepId(2),
                title: "All set".into(),
                instruction: "That's it — enjoy!".into(),
                target: None,
                highlight: HighlightKind::None,
                advance_when: None,
                requires_navigation: None,
                widen_gate: false,
                is_terminal: true,
            },
        ],
        options: TourOptions::default(),
    };

    let mut now = 0_u64;
    let (mut orch, effects) =
        Orchestrator::start(tour, PredicateTable::new(), MemStore::new(), &ui, None, now)
            .expect("valid tour");
    let mut pending = run_effects(&effects);

    // Fire the settle timer the start scheduled.
    while let Some((slot, delay)) = pending.pop() {
        now += delay;
        let fx = orch.timer_fired(&ui, slot, now);
        pending.extend(run_effects(&fx));
        if slot == TimerSlot::Settle {
            break;
        }
    }

    // The user clicks the highlighted button.
    now += 500;
    let (verdict, fx) = orch.input_event(
        &ui,
        &InputEvent {
            kinds: EventKinds::POINTER,
            target: Some(compose),
            position: None,
        },
        now,
    );
    println!("click on #compose -> {verdict:?}");
    let mut pending = run_effects(&fx);

    // Present the terminal step, then confirm.
    while let Some((slot, delay)) = pending.pop() {
        now += delay;
        let fx = orch.timer_fired(&ui, slot, now);
        pending.extend(run_effects(&fx));
    }
    now += 1_000;
    let fx = orch.confirm_finish();
    run_effects(&fx);
    println!("final phase: {:?}", orch.phase());
}

/// Execute effects the way a host would; returns timers to fire.
fn run_effects(
    effects: &[Effect<waymark_engine::adapters::mem::MemElem>],
) -> Vec<(TimerSlot, u64)> {
    let mut timers = Vec::new();
    for e in effects {
        match e {
            Effect::Schedule { slot, delay_ms } => timers.push((*slot, *delay_ms)),
            Effect::Cancel { slot } => timers.retain(|(s, _)| s != slot),
            Effect::PublishFrame(f) => {
                println!("render: highlight={:?} bubble={:?}", f.highlight, f.bubble.region);
            }
            Effect::ClearFrame => println!("render: overlay cleared"),
            Effect::MarkPriority(el) => println!("mark priority on {el:?}"),
            Effect::ClearPriority(el) => println!("clear priority on {el:?}"),
            Effect::RedirectFocus => println!("focus -> bubble"),
            Effect::Notify(ev) => println!("notify: {ev:?}"),
        }
    }
    timers
}
