// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Target resolution: turning a step's descriptor into a live element.
//!
//! ## Strategy order
//!
//! A [`TargetDescriptor`] declares its lookup strategies in priority order;
//! the first strategy yielding a usable element wins. "Usable" means
//! attached, visible, and non-zero-area — a matched but collapsed element is
//! as good as no match. After the declared strategies and fallbacks, a
//! last-resort heuristic scans interactive elements for the descriptor's
//! keywords. Exhausting everything is a
//! [`ResolutionFailure`](crate::error::TourError::ResolutionFailure); the
//! step then degrades to a centered bubble and the tour continues.
//!
//! ## Cache
//!
//! The resolver keeps one cache entry per step id so the orchestrator can
//! pre-resolve the *next* step's target in idle time. Cached handles are
//! revalidated (still attached, still non-zero-area) before reuse and
//! discarded otherwise — the host may destroy any element at any time.

use std::collections::HashMap;

use kurbo::Rect;
use waymark_tour::definition::{LookupStrategy, Step, StepId, TargetDescriptor};

use crate::error::TourError;
use crate::ui::UiTree;

/// Settle delay before resolving, letting host re-renders finish.
pub const SETTLE_MS: u64 = 120;

/// Settle delay when the step expects a navigation; a freshly mounted view
/// needs noticeably longer before its elements report stable geometry.
pub const NAV_SETTLE_MS: u64 = 600;

/// A resolved target: a live element handle plus the bounds it had at
/// resolution time. Transient, step-scoped; bounds are re-queried on every
/// geometry recomputation, this copy only records what resolution saw.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResolvedTarget<E> {
    /// The live element handle.
    pub element: E,
    /// World-space bounds at resolution time.
    pub bounds: Rect,
}

/// Step-scoped target resolver with a speculative per-step cache.
#[derive(Clone, Debug, Default)]
pub struct Resolver<E> {
    cache: HashMap<StepId, E>,
}

impl<E: Copy + Eq + core::fmt::Debug> Resolver<E> {
    /// An empty resolver.
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Settle delay to wait before resolving `step`.
    pub fn settle_delay(step: &Step) -> u64 {
        if step.requires_navigation.is_some() {
            NAV_SETTLE_MS
        } else {
            SETTLE_MS
        }
    }

    /// Resolve the target for `step`, consulting the cache first.
    pub fn resolve<U: UiTree<Elem = E>>(
        &mut self,
        ui: &U,
        step: &Step,
    ) -> Result<ResolvedTarget<E>, TourError> {
        let Some(descriptor) = &step.target else {
            return Err(TourError::ResolutionFailure { step: step.id });
        };

        if let Some(&cached) = self.cache.get(&step.id) {
            if usable(ui, cached) {
                return Ok(ResolvedTarget {
                    element: cached,
                    bounds: ui.bounds(cached),
                });
            }
            // Detached or collapsed since it was cached.
            self.cache.remove(&step.id);
        }

        match Self::search(ui, descriptor) {
            Some(element) => {
                self.cache.insert(step.id, element);
                Ok(ResolvedTarget {
                    element,
                    bounds: ui.bounds(element),
                })
            }
            None => Err(TourError::ResolutionFailure { step: step.id }),
        }
    }

    /// Speculatively resolve `step`'s target into the cache. Failures are
    /// silent: the prefetch is an optimization, the real resolution will
    /// retry everything.
    pub fn prefetch<U: UiTree<Elem = E>>(&mut self, ui: &U, step: &Step) {
        if self.cache.contains_key(&step.id) {
            return;
        }
        let Some(descriptor) = &step.target else {
            return;
        };
        if let Some(element) = Self::search(ui, descriptor) {
            log::debug!("prefetched target for step {}", step.id);
            self.cache.insert(step.id, element);
        }
    }

    /// Drop the cache entry for one step.
    pub fn invalidate(&mut self, step: StepId) {
        self.cache.remove(&step);
    }

    /// Drop every cache entry. Called at tour teardown.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    fn search<U: UiTree<Elem = E>>(ui: &U, descriptor: &TargetDescriptor) -> Option<E> {
        for strategy in descriptor.strategies.iter().chain(&descriptor.fallbacks) {
            if let Some(el) = Self::try_strategy(ui, strategy).filter(|&el| usable(ui, el)) {
                return Some(el);
            }
        }
        if !descriptor.keywords.is_empty() {
            return Self::keyword_heuristic(ui, &descriptor.keywords);
        }
        None
    }

    fn try_strategy<U: UiTree<Elem = E>>(ui: &U, strategy: &LookupStrategy) -> Option<E> {
        match strategy {
            LookupStrategy::Selector(sel) => ui.select(sel),
            LookupStrategy::Attribute { name, value } => ui.find_attribute(name, value),
            LookupStrategy::TextContains(needle) => ui.find_text(needle),
        }
    }

    /// Last resort: the first visible interactive element whose text
    /// contains one of the keywords (case-insensitive).
    fn keyword_heuristic<U: UiTree<Elem = E>>(ui: &U, keywords: &[String]) -> Option<E> {
        ui.interactive_elements().into_iter().find(|&el| {
            if !usable(ui, el) {
                return false;
            }
            let Some(text) = ui.text_of(el) else {
                return false;
            };
            let text = text.to_lowercase();
            keywords.iter().any(|k| text.contains(&k.to_lowercase()))
        })
    }
}

/// Attached, visible, and non-zero-area.
pub(crate) fn usable<U: UiTree>(ui: &U, el: U::Elem) -> bool {
    if !ui.is_attached(el) || !ui.is_visible(el) {
        return false;
    }
    let b = ui.bounds(el);
    b.width() > 0.0 && b.height() > 0.0
}
