// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Diffing of consecutive device lists.
//!
//! [`reconcile`] compares the tracked state with a fresh device list and
//! returns the state to track next together with the events describing the
//! difference. It performs no I/O and never fails.
//!
//! # Event order
//!
//! 1. For each device of the new list, in listing order: `add` or `change`,
//!    followed by `online` or `offline` depending on the new status.
//! 2. For each device that vanished, in previous listing order: `remove`,
//!    followed by `offline` unless the device was already offline.
//! 3. The change set, when requested.

use crate::event::{ChangeSet, TrackerEvent};
use crate::types::Device;

use super::TrackedState;

/// Result of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// The state to track from now on; equal to the new device list.
    pub state: TrackedState,
    /// The events of this pass, in delivery order.
    pub events: Vec<TrackerEvent>,
}

/// Compares `previous` with `snapshot` and returns the next state and the
/// events of the pass.
///
/// When `with_change_set` is `true` a [`TrackerEvent::ChangeSet`] is appended
/// after every per-device event, even if the pass changed nothing.
///
/// # Examples
///
/// ```
/// use adb_tracker::tracker::{TrackedState, reconcile};
/// use adb_tracker::event::EventKind;
/// use adb_tracker::types::{Device, DeviceStatus};
///
/// let first = reconcile(
///     &TrackedState::new(),
///     vec![Device::new("a", DeviceStatus::Device)],
///     false,
/// );
/// let kinds: Vec<_> = first.events.iter().map(|e| e.kind()).collect();
/// assert_eq!(kinds, [EventKind::Add, EventKind::Online]);
///
/// let second = reconcile(&first.state, vec![], false);
/// let kinds: Vec<_> = second.events.iter().map(|e| e.kind()).collect();
/// assert_eq!(kinds, [EventKind::Remove, EventKind::Offline]);
/// assert!(second.state.is_empty());
/// ```
#[must_use]
pub fn reconcile(
    previous: &TrackedState,
    snapshot: Vec<Device>,
    with_change_set: bool,
) -> Reconciliation {
    let state = TrackedState::from_snapshot(snapshot);
    let mut events = Vec::new();
    let mut change_set = with_change_set.then(ChangeSet::new);
    let mut matched = vec![false; previous.len()];

    for device in &state {
        match previous.position(device.id.as_str()) {
            Some(position) => {
                matched[position] = true;
                let old = &previous.as_slice()[position];
                if !device.status_differs(old) {
                    continue;
                }
                if let Some(set) = change_set.as_mut() {
                    set.changed.push(device.clone());
                }
                events.push(TrackerEvent::Changed {
                    new: device.clone(),
                    old: old.clone(),
                });
            }
            None => {
                if let Some(set) = change_set.as_mut() {
                    set.added.push(device.clone());
                }
                events.push(TrackerEvent::Added(device.clone()));
            }
        }
        events.push(TrackerEvent::presence(device.clone()));
    }

    let vanished = previous
        .iter()
        .zip(&matched)
        .filter_map(|(device, &seen)| (!seen).then_some(device));

    for device in vanished {
        if let Some(set) = change_set.as_mut() {
            set.removed.push(device.clone());
        }
        events.push(TrackerEvent::Removed(device.clone()));
        if device.is_online() {
            events.push(TrackerEvent::Offline(device.clone()));
        }
    }

    if let Some(set) = change_set {
        events.push(TrackerEvent::ChangeSet(set));
    }

    Reconciliation { state, events }
}
