// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tour and step definitions: the read-only document the engine walks.

use serde::{Deserialize, Serialize};

/// Identifier of a tour, unique within the host's content registry.
///
/// Progress-store keys are namespaced by this id, so it must be stable across
/// releases of the host for resume to work.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TourId(pub String);

impl core::fmt::Display for TourId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a step within a tour.
///
/// ## Semantics
///
/// - Ids are 1-based and strictly increasing in definition order.
/// - Id order defines the only valid traversal order: the state machine never
///   moves to an id less than or equal to the current one.
/// - Ids are persisted in [`TourProgress`](crate::progress::TourProgress) and
///   must therefore stay stable across content edits that intend to preserve
///   in-flight progress.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u32);

impl core::fmt::Display for StepId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the current step's target is visually distinguished.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    /// No highlight; the bubble is placed in a neutral centered position.
    None,
    /// The target's padded bounding box.
    #[default]
    Box,
    /// The whole region occupied by the target (e.g. an image); bubble
    /// placement is computed relative to the highlight edges with a larger
    /// gap.
    FullRegion,
}

/// One lookup strategy for locating a live UI element.
///
/// Strategies are tried in declared order by the target resolver; the first
/// strategy yielding a currently visible, non-zero-area element wins.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStrategy {
    /// A host-interpreted selector string (the primary, most precise lookup).
    Selector(String),
    /// Match on an attribute name/value pair.
    Attribute {
        /// Attribute name.
        name: String,
        /// Expected attribute value.
        value: String,
    },
    /// Match the first element whose visible text contains the needle.
    TextContains(String),
}

/// Ordered heuristics for locating a step's target element.
///
/// Resolution order: `strategies`, then `fallbacks`, then the `keywords`
/// last resort (first visible interactive element whose text contains one of
/// the keywords). Descriptors are never persisted.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Primary strategies, in declared order.
    pub strategies: Vec<LookupStrategy>,
    /// Fallback strategies tried when no primary strategy matches.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<LookupStrategy>,
    /// Last-resort keywords for the interactive-element heuristic.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl TargetDescriptor {
    /// A descriptor consisting of a single selector strategy.
    pub fn selector(sel: impl Into<String>) -> Self {
        Self {
            strategies: vec![LookupStrategy::Selector(sel.into())],
            fallbacks: Vec::new(),
            keywords: Vec::new(),
        }
    }
}

/// A symbolic advance condition plus optional parameters.
///
/// The engine ships no built-in predicates: `name` is resolved against a
/// predicate table injected by the host, keeping the engine decoupled from
/// any specific host UI vocabulary.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    /// Symbolic predicate name, e.g. `"menu-opened"` or `"image-added"`.
    pub name: String,
    /// Expected view path, for navigation-shaped conditions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_path: Option<String>,
    /// Minimum count parameter, for conditions that watch a collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_count: Option<u32>,
    /// Per-step override of the watch timeout, in milliseconds. The engine
    /// clamps this into its supported range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ConditionSpec {
    /// A condition with the given symbolic name and no parameters.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Declares that a step only makes sense on a particular host view.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NavigationExpectation {
    /// The view path the host must report before the step is presented.
    pub expected_path: String,
}

/// One unit of guidance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    /// 1-based, strictly increasing id; defines traversal order.
    pub id: StepId,
    /// Short heading shown in the bubble.
    pub title: String,
    /// Instructional body text shown in the bubble.
    pub instruction: String,
    /// How to locate the element this step points at. `None` for steps that
    /// only present text (the bubble is centered, nothing is highlighted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetDescriptor>,
    /// Highlight treatment for the resolved target.
    #[serde(default)]
    pub highlight: HighlightKind,
    /// Condition that, once satisfied, advances past this step. `None` means
    /// the step advances on a qualifying interaction with the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance_when: Option<ConditionSpec>,
    /// View the host must be on before this step is presented.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_navigation: Option<NavigationExpectation>,
    /// Widen the interaction gate to the resolved element's whole ancestry.
    /// For steps whose purpose is a composite control (e.g. a file picker)
    /// where the literal resolved element is too narrow an allow list.
    #[serde(default)]
    pub widen_gate: bool,
    /// Marks the tour's final step. Reaching it awaits explicit user
    /// confirmation instead of auto-completing.
    #[serde(default)]
    pub is_terminal: bool,
}

/// Tour-wide options.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TourOptions {
    /// Whether the user may skip out of the tour before completing it.
    pub allow_skip: bool,
}

impl Default for TourOptions {
    fn default() -> Self {
        Self { allow_skip: true }
    }
}

/// A named, ordered sequence of steps presented as an overlay guide.
///
/// Loaded once per tour start and treated as read-only for the tour's
/// lifetime. Call [`TourDefinition::validate`] after deserializing a
/// host-supplied document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TourDefinition {
    /// Stable tour id; namespaces the progress-store keys.
    pub id: TourId,
    /// Human-readable title.
    pub title: String,
    /// Steps in traversal order.
    pub steps: Vec<Step>,
    /// Tour-wide options.
    #[serde(default)]
    pub options: TourOptions,
}

/// Validation failures for a [`TourDefinition`].
#[derive(Debug, thiserror::Error, Eq, PartialEq)]
pub enum DefinitionError {
    /// The tour has no steps.
    #[error("tour {0} has no steps")]
    Empty(TourId),
    /// Step ids must start at 1 and strictly increase.
    #[error("step ids must be 1-based and strictly increasing; step at position {position} has id {id}")]
    NonMonotonicIds {
        /// Zero-based position of the offending step.
        position: usize,
        /// The offending id.
        id: StepId,
    },
    /// Exactly the last step must be marked terminal.
    #[error("step {id} is mismarked terminal (only the last step may be)")]
    TerminalMismarked {
        /// The offending id.
        id: StepId,
    },
}

impl TourDefinition {
    /// Validate the structural invariants of the definition.
    ///
    /// - At least one step.
    /// - Step ids are 1-based and strictly increasing in order.
    /// - The last step, and only the last step, is marked terminal.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::Empty(self.id.clone()));
        }
        let mut prev: Option<StepId> = None;
        for (position, step) in self.steps.iter().enumerate() {
            let floor = prev.map_or(1, |p| p.0 + 1);
            if step.id.0 < floor {
                return Err(DefinitionError::NonMonotonicIds {
                    position,
                    id: step.id,
                });
            }
            if position == 0 && step.id.0 != 1 {
                return Err(DefinitionError::NonMonotonicIds { position, id: step.id });
            }
            let is_last = position + 1 == self.steps.len();
            if step.is_terminal != is_last {
                return Err(DefinitionError::TerminalMismarked { id: step.id });
            }
            prev = Some(step.id);
        }
        Ok(())
    }

    /// Look up a step by id.
    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// The step following `id` in traversal order, if any.
    pub fn step_after(&self, id: StepId) -> Option<&Step> {
        let pos = self.steps.iter().position(|s| s.id == id)?;
        self.steps.get(pos + 1)
    }

    /// Id of the first step.
    pub fn first_step(&self) -> Option<StepId> {
        self.steps.first().map(|s| s.id)
    }

    /// Id of the terminal step.
    pub fn last_step(&self) -> Option<StepId> {
        self.steps.last().map(|s| s.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn tour(ids: &[u32]) -> TourDefinition {
        let mut steps: Vec<Step> = ids.iter().map(|&i| step(i)).collect();
        if let Some(last) = steps.last_mut() {
            last.is_terminal = true;
        }
        TourDefinition {
            id: TourId("t".into()),
            title: "t".into(),
            steps,
            options: TourOptions::default(),
        }
    }

    #[test]
    fn valid_definition_passes() {
        assert_eq!(tour(&[1, 2, 3]).validate(), Ok(()));
    }

    #[test]
    fn gaps_are_allowed_but_order_is_not_negotiable() {
        // Ids may skip values (content edits delete steps) as long as they
        // strictly increase from 1.
        assert_eq!(tour(&[1, 3, 7]).validate(), Ok(()));
        assert!(matches!(
            tour(&[1, 3, 2]).validate(),
            Err(DefinitionError::NonMonotonicIds { position: 2, .. })
        ));
    }

    #[test]
    fn first_id_must_be_one() {
        assert!(matches!(
            tour(&[2, 3]).validate(),
            Err(DefinitionError::NonMonotonicIds { position: 0, .. })
        ));
    }

    #[test]
    fn duplicate_ids_rejected() {
        assert!(matches!(
            tour(&[1, 2, 2]).validate(),
            Err(DefinitionError::NonMonotonicIds { position: 2, .. })
        ));
    }

    #[test]
    fn empty_tour_rejected() {
        assert!(matches!(tour(&[]).validate(), Err(DefinitionError::Empty(_))));
    }

    #[test]
    fn terminal_must_be_last() {
        let mut t = tour(&[1, 2, 3]);
        t.steps[0].is_terminal = true;
        assert!(matches!(
            t.validate(),
            Err(DefinitionError::TerminalMismarked { id: StepId(1) })
        ));

        let mut t = tour(&[1, 2, 3]);
        t.steps[2].is_terminal = false;
        assert!(matches!(
            t.validate(),
            Err(DefinitionError::TerminalMismarked { id: StepId(3) })
        ));
    }

    #[test]
    fn step_navigation_helpers() {
        let t = tour(&[1, 2, 5]);
        assert_eq!(t.first_step(), Some(StepId(1)));
        assert_eq!(t.last_step(), Some(StepId(5)));
        assert_eq!(t.step_after(StepId(2)).map(|s| s.id), Some(StepId(5)));
        assert_eq!(t.step_after(StepId(5)).map(|s| s.id), None);
        assert!(t.step(StepId(2)).is_some());
        assert!(t.step(StepId(4)).is_none());
    }

    #[test]
    fn definition_json_round_trip() {
        let mut t = tour(&[1, 2]);
        t.steps[0].target = Some(TargetDescriptor {
            strategies: vec![
                LookupStrategy::Selector("#compose".into()),
                LookupStrategy::Attribute {
                    name: "role".into(),
                    value: "button".into(),
                },
            ],
            fallbacks: vec![LookupStrategy::TextContains("Compose".into())],
            keywords: vec!["compose".into(), "new post".into()],
        });
        t.steps[0].advance_when = Some(ConditionSpec {
            name: "editor-opened".into(),
            expected_path: None,
            min_count: None,
            timeout_ms: Some(15_000),
        });
        t.steps[1].requires_navigation = Some(NavigationExpectation {
            expected_path: "/feed".into(),
        });
        let json = serde_json::to_string(&t).unwrap();
        let back: TourDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back.steps[0].target, t.steps[0].target);
        assert_eq!(back.steps[0].advance_when, t.steps[0].advance_when);
        assert_eq!(back.steps[1].requires_navigation, t.steps[1].requires_navigation);
        assert_eq!(back.validate(), Ok(()));
    }
}
