// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host capabilities: the live UI the engine queries, the inputs the host
//! feeds it, and the injected predicate table.
//!
//! ## Overview
//!
//! The engine does not control the UI it walks over. Everything it knows
//! arrives through the read-only [`UiTree`] queries and through explicit
//! inputs the host pushes at the orchestrator: input events (routed through
//! the gate at capture phase), batched mutation notifications, navigation
//! changes, and timer fires. A platform without a structural-mutation API can
//! satisfy the same interface by pushing synthetic batches from a poll loop.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use kurbo::{Point, Rect};
use waymark_tour::definition::ConditionSpec;

bitflags::bitflags! {
    /// Classes of input events routed through the interaction gate.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EventKinds: u8 {
        /// Mouse/pen pointer events (down, up, move, click).
        const POINTER      = 0b0000_0001;
        /// Touch events.
        const TOUCH        = 0b0000_0010;
        /// Keyboard events.
        const KEY          = 0b0000_0100;
        /// Context-menu invocation.
        const CONTEXT_MENU = 0b0000_1000;
        /// Focus movement.
        const FOCUS        = 0b0001_0000;
        /// Scroll/wheel events.
        const SCROLL       = 0b0010_0000;
    }
}

impl EventKinds {
    /// Event classes that count as a deliberate interaction with the target
    /// for steps that advance on interaction rather than on a condition.
    pub fn is_activation(self) -> bool {
        self.intersects(Self::POINTER | Self::TOUCH | Self::KEY)
    }
}

bitflags::bitflags! {
    /// Classes of UI mutations reported in a [`MutationBatch`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MutationKinds: u8 {
        /// Nodes were added, removed, or moved.
        const SUBTREE       = 0b0000_0001;
        /// An attribute changed.
        const ATTRIBUTE     = 0b0000_0010;
        /// Text content changed.
        const TEXT          = 0b0000_0100;
        /// A form-control value changed. Structural observers typically do
        /// not see these; conditions that depend on them register as polled.
        const CONTROL_VALUE = 0b0000_1000;
    }
}

/// One input event, as delivered to the gate at capture phase.
#[derive(Clone, Copy, Debug)]
pub struct InputEvent<E> {
    /// Event classes this event belongs to.
    pub kinds: EventKinds,
    /// The element the event targets, if the host resolved one.
    pub target: Option<E>,
    /// World-space position for pointer-shaped events.
    pub position: Option<Point>,
}

/// A batch of UI mutations observed by the host since the last report.
///
/// Coarse by design: the engine re-queries the tree rather than interpreting
/// individual records, so a batch only says which classes of change occurred.
#[derive(Clone, Copy, Debug)]
pub struct MutationBatch {
    /// Classes of mutation present in the batch.
    pub kinds: MutationKinds,
}

impl Default for MutationBatch {
    fn default() -> Self {
        Self {
            kinds: MutationKinds::empty(),
        }
    }
}

/// The live UI tree the engine queries.
///
/// All queries are read-only; the engine requests UI mutations (priority
/// marking, focus moves) through [`Effect`](crate::effect::Effect) values the
/// host executes. `Elem` is a small copyable handle; hosts with recycled
/// slots should use generational handles so a stale `Elem` never aliases a
/// live element.
pub trait UiTree {
    /// Element handle type.
    type Elem: Copy + Eq + core::fmt::Debug;

    /// Resolve a host-interpreted selector string to an element.
    fn select(&self, selector: &str) -> Option<Self::Elem>;
    /// Find an element by attribute name/value.
    fn find_attribute(&self, name: &str, value: &str) -> Option<Self::Elem>;
    /// Find an element whose visible text contains `needle`.
    fn find_text(&self, needle: &str) -> Option<Self::Elem>;
    /// All currently interactive (clickable/focusable) elements.
    fn interactive_elements(&self) -> Vec<Self::Elem>;
    /// Visible text of an element, if it has any.
    fn text_of(&self, el: Self::Elem) -> Option<String>;
    /// World-space bounding box. Unspecified for detached elements; callers
    /// check [`UiTree::is_attached`] first.
    fn bounds(&self, el: Self::Elem) -> Rect;
    /// The container viewport all overlay geometry is computed against.
    fn viewport(&self) -> Rect;
    /// Whether the handle still refers to a live, attached element.
    fn is_attached(&self, el: Self::Elem) -> bool;
    /// Whether the element is currently visible.
    fn is_visible(&self, el: Self::Elem) -> bool;
    /// Parent of an element, or `None` at the root. Ancestry must be
    /// acyclic.
    fn parent_of(&self, el: Self::Elem) -> Option<Self::Elem>;
}

type Predicate<U> = Box<dyn Fn(&U, &ConditionSpec) -> bool>;

struct PredicateEntry<U> {
    predicate: Predicate<U>,
    polled: bool,
}

/// Injected mapping from symbolic condition names to predicates.
///
/// The engine ships with no built-in predicates; the host registers one per
/// condition name its tour content uses, closing over whatever services it
/// needs. The [`ConditionSpec`] is passed through so one predicate can serve
/// parameterized conditions (expected path, minimum count).
///
/// Conditions whose truth lives in form-control values rather than tree
/// structure are invisible to structural observers; register those with
/// [`PredicateTable::register_polled`] so the monitor also evaluates them on
/// its poll tick.
pub struct PredicateTable<U> {
    entries: HashMap<String, PredicateEntry<U>>,
}

impl<U> core::fmt::Debug for PredicateTable<U> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PredicateTable")
            .field("names", &names)
            .finish_non_exhaustive()
    }
}

impl<U> Default for PredicateTable<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> PredicateTable<U> {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a predicate evaluated on mutation batches.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        predicate: impl Fn(&U, &ConditionSpec) -> bool + 'static,
    ) {
        self.entries.insert(
            name.into(),
            PredicateEntry {
                predicate: Box::new(predicate),
                polled: false,
            },
        );
    }

    /// Register a predicate evaluated on mutation batches *and* on the
    /// monitor's fixed-interval poll tick.
    pub fn register_polled(
        &mut self,
        name: impl Into<String>,
        predicate: impl Fn(&U, &ConditionSpec) -> bool + 'static,
    ) {
        self.entries.insert(
            name.into(),
            PredicateEntry {
                predicate: Box::new(predicate),
                polled: true,
            },
        );
    }

    /// Whether a predicate is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Whether the predicate under `name` also wants poll-tick evaluation.
    pub fn is_polled(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|e| e.polled)
    }

    /// Evaluate the predicate for `spec` against the current tree.
    ///
    /// Returns `None` when no predicate is registered. A panicking predicate
    /// is caught, logged, and treated as false: host mistakes must never
    /// crash the application out of an observer callback.
    pub fn evaluate(&self, ui: &U, spec: &ConditionSpec) -> Option<bool> {
        let entry = self.entries.get(&spec.name)?;
        match catch_unwind(AssertUnwindSafe(|| (entry.predicate)(ui, spec))) {
            Ok(v) => Some(v),
            Err(_) => {
                log::error!("predicate `{}` panicked; treating as false", spec.name);
                Some(false)
            }
        }
    }
}
