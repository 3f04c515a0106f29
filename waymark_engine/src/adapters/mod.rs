// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adapters bridging concrete UI representations to [`UiTree`](crate::ui::UiTree).
//!
//! Hosts normally implement the trait directly over their own widget tree;
//! the in-memory adapter here exists for demos, tests, and as a reference
//! implementation of the handle-liveness rules.

pub mod mem;
