// Copyright 2025 the Waymark Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Waymark Tour: content model for guided-tour overlays.
//!
//! ## Overview
//!
//! This crate defines the data the tour engine consumes and the one record it
//! persists. A [`TourDefinition`](crate::definition::TourDefinition) is a
//! read-only, versionable document supplied by the host: an ordered list of
//! [`Step`](crate::definition::Step)s, each with an optional
//! [`TargetDescriptor`](crate::definition::TargetDescriptor) (how to find the
//! element the step points at), an optional
//! [`ConditionSpec`](crate::definition::ConditionSpec) (when to advance), and
//! presentation hints.
//!
//! [`TourProgress`](crate::progress::TourProgress) is the only state that
//! survives a reload. It is stored as a JSON string value in a host-provided
//! key-value [`ProgressStore`](crate::progress::ProgressStore), under keys
//! namespaced by tour id.
//!
//! The engine itself lives in `waymark_engine`; this crate has no behavior
//! beyond validation and (de)serialization, so hosts and authoring pipelines
//! can depend on it without pulling in the engine.

pub mod definition;
pub mod events;
pub mod progress;
