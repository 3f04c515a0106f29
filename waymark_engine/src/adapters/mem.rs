// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An in-memory element tree implementing [`UiTree`].
//!
//! Storage is a slot arena with generation counters: removing an element
//! frees its slot, and reusing the slot bumps the generation, so a stale
//! [`MemElem`] can never alias a live element. This mirrors how the engine
//! expects real hosts to hand out handles — a tour tracks elements across
//! re-renders that destroy and recreate them, and handle staleness must be
//! detectable, not undefined.

use std::collections::BTreeMap;

use kurbo::Rect;

use crate::ui::UiTree;

/// Handle to an element in a [`MemUi`].
///
/// Slot index plus generation. Stale handles (the slot was freed or reused)
/// are reported dead by [`MemUi::is_alive`] and by every [`UiTree`] query.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MemElem(u32, u32);

impl MemElem {
    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Builder-style description of a node to insert.
#[derive(Clone, Debug, Default)]
pub struct MemNodeSpec {
    bounds: Rect,
    visible: Option<bool>,
    interactive: bool,
    selector: Option<String>,
    attrs: BTreeMap<String, String>,
    text: Option<String>,
}

impl MemNodeSpec {
    /// Set the world-space bounds.
    pub fn bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }

    /// Set visibility (default: visible).
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    /// Mark the node interactive (clickable/focusable).
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Set the selector string [`UiTree::select`] matches exactly.
    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    /// Add an attribute.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Set the visible text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

#[derive(Clone, Debug)]
struct MemNode {
    generation: u32,
    parent: Option<MemElem>,
    children: Vec<MemElem>,
    bounds: Rect,
    visible: bool,
    interactive: bool,
    selector: Option<String>,
    attrs: BTreeMap<String, String>,
    text: Option<String>,
}

/// In-memory UI tree for demos and tests.
#[derive(Clone, Debug, Default)]
pub struct MemUi {
    nodes: Vec<Option<MemNode>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    viewport: Rect,
}

impl MemUi {
    /// An empty tree with the given viewport.
    pub fn new(viewport: Rect) -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            viewport,
        }
    }

    /// Insert a node under `parent` (or as a root).
    pub fn insert(&mut self, parent: Option<MemElem>, spec: MemNodeSpec) -> MemElem {
        let node = MemNode {
            generation: 0, // patched below
            parent,
            children: Vec::new(),
            bounds: spec.bounds,
            visible: spec.visible.unwrap_or(true),
            interactive: spec.interactive,
            selector: spec.selector,
            attrs: spec.attrs,
            text: spec.text,
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(MemNode { generation, ..node });
            #[allow(
                clippy::cast_possible_truncation,
                reason = "MemElem uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(MemNode { generation, ..node }));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "MemElem uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let el = MemElem(idx, generation);
        if let Some(p) = parent {
            if let Some(pn) = self.node_mut(p) {
                pn.children.push(el);
            }
        }
        el
    }

    /// Remove an element and its subtree. Stale handles are ignored.
    pub fn remove(&mut self, el: MemElem) {
        if !self.is_alive(el) {
            return;
        }
        if let Some(parent) = self.node(el).and_then(|n| n.parent) {
            if let Some(pn) = self.node_mut(parent) {
                pn.children.retain(|c| *c != el);
            }
        }
        let children = self.node(el).map(|n| n.children.clone()).unwrap_or_default();
        for child in children {
            self.remove(child);
        }
        self.nodes[el.idx()] = None;
        self.free_list.push(el.idx());
    }

    /// Whether the handle refers to a live node.
    pub fn is_alive(&self, el: MemElem) -> bool {
        self.nodes
            .get(el.idx())
            .and_then(|n| n.as_ref())
            .map(|n| n.generation == el.1)
            .unwrap_or(false)
    }

    /// Current root elements.
    pub fn roots(&self) -> Vec<MemElem> {
        self.live()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(el, _)| el)
            .collect()
    }

    /// Update an element's bounds.
    pub fn set_bounds(&mut self, el: MemElem, bounds: Rect) {
        if let Some(n) = self.node_mut(el) {
            n.bounds = bounds;
        }
    }

    /// Update an element's visibility.
    pub fn set_visible(&mut self, el: MemElem, visible: bool) {
        if let Some(n) = self.node_mut(el) {
            n.visible = visible;
        }
    }

    /// Update an element's text.
    pub fn set_text(&mut self, el: MemElem, text: impl Into<String>) {
        if let Some(n) = self.node_mut(el) {
            n.text = Some(text.into());
        }
    }

    /// Set an attribute.
    pub fn set_attr(&mut self, el: MemElem, name: impl Into<String>, value: impl Into<String>) {
        if let Some(n) = self.node_mut(el) {
            n.attrs.insert(name.into(), value.into());
        }
    }

    /// Replace the viewport (a resize).
    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
    }

    fn node(&self, el: MemElem) -> Option<&MemNode> {
        let n = self.nodes.get(el.idx())?.as_ref()?;
        (n.generation == el.1).then_some(n)
    }

    fn node_mut(&mut self, el: MemElem) -> Option<&mut MemNode> {
        let n = self.nodes.get_mut(el.idx())?.as_mut()?;
        (n.generation == el.1).then_some(n)
    }

    /// Iterate live nodes in slot order (stable for deterministic queries).
    fn live(&self) -> impl Iterator<Item = (MemElem, &MemNode)> {
        self.nodes.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref().map(|n| {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "MemElem uses 32-bit indices by design."
                )]
                let el = MemElem(i as u32, n.generation);
                (el, n)
            })
        })
    }
}

impl UiTree for MemUi {
    type Elem = MemElem;

    fn select(&self, selector: &str) -> Option<MemElem> {
        self.live()
            .find(|(_, n)| n.selector.as_deref() == Some(selector))
            .map(|(el, _)| el)
    }

    fn find_attribute(&self, name: &str, value: &str) -> Option<MemElem> {
        self.live()
            .find(|(_, n)| n.attrs.get(name).map(String::as_str) == Some(value))
            .map(|(el, _)| el)
    }

    fn find_text(&self, needle: &str) -> Option<MemElem> {
        self.live()
            .find(|(_, n)| n.text.as_deref().is_some_and(|t| t.contains(needle)))
            .map(|(el, _)| el)
    }

    fn interactive_elements(&self) -> Vec<MemElem> {
        self.live()
            .filter(|(_, n)| n.interactive)
            .map(|(el, _)| el)
            .collect()
    }

    fn text_of(&self, el: MemElem) -> Option<String> {
        self.node(el).and_then(|n| n.text.clone())
    }

    fn bounds(&self, el: MemElem) -> Rect {
        self.node(el).map(|n| n.bounds).unwrap_or(Rect::ZERO)
    }

    fn viewport(&self) -> Rect {
        self.viewport
    }

    fn is_attached(&self, el: MemElem) -> bool {
        self.is_alive(el)
    }

    fn is_visible(&self, el: MemElem) -> bool {
        self.node(el).is_some_and(|n| n.visible)
    }

    fn parent_of(&self, el: MemElem) -> Option<MemElem> {
        self.node(el).and_then(|n| n.parent)
    }
}
