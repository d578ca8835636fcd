// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device tracking.
//!
//! - [`TrackedState`] - The last device list, keyed by serial
//! - [`reconcile`] - Pure diff of a state and a new device list
//! - [`Tracker`] - Runs the read loop and publishes events to subscribers
//! - [`EventStream`] - Async stream view of a tracker's events
//!
//! # Lifecycle
//!
//! A tracker is [`TrackerState::Running`] from construction until its read
//! loop exits, either because [`Tracker::stop`] was called or because the
//! connection failed. It then becomes [`TrackerState::Stopped`] for good and
//! emits `end` exactly once.

mod device_tracker;
mod event_stream;
mod reconciler;
mod tracked_state;

pub use device_tracker::{Tracker, TrackerExit, TrackerState};
pub use event_stream::EventStream;
pub use reconciler::{Reconciliation, reconcile};
pub use tracked_state::TrackedState;
