// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for tracker subscriptions.
//!
//! This module provides the core types for managing subscription callbacks:
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackRegistry`] - Registry for storing and dispatching callbacks

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::Error;
use crate::event::{ChangeSet, EventKind, TrackerEvent};
use crate::types::Device;

/// Unique identifier for a subscription.
///
/// This ID is returned when creating a subscription and can be used to
/// unsubscribe later. IDs grow monotonically within a registry, so they also
/// encode registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Creates a new subscription ID with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Callback receiving a single device (add, remove, online, offline).
type DeviceCallback = Arc<dyn Fn(&Device) + Send + Sync>;

/// Callback receiving the new and the old device value.
type ChangeCallback = Arc<dyn Fn(&Device, &Device) + Send + Sync>;

/// Callback receiving the summary of a reconciliation pass.
type ChangeSetCallback = Arc<dyn Fn(&ChangeSet) + Send + Sync>;

/// Callback for the end of the tracker.
type EndCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback receiving a read loop failure.
type ErrorCallback = Arc<dyn Fn(&Arc<Error>) + Send + Sync>;

type Slot<C> = RwLock<BTreeMap<SubscriptionId, C>>;

/// Registry for managing tracker subscription callbacks.
///
/// Callbacks of one kind are invoked in registration order. Dispatch works on
/// a copy of the callback list, so a callback may subscribe or unsubscribe
/// while it runs; a callback registered during a dispatch is not invoked for
/// the event being dispatched.
///
/// The registry itself holds no device state and therefore never replays
/// anything; replay is performed by the [`Tracker`](crate::Tracker) before it
/// hands a callback to the registry.
pub struct CallbackRegistry {
    /// Counter for generating unique subscription IDs.
    next_id: AtomicU64,
    add_callbacks: Slot<DeviceCallback>,
    remove_callbacks: Slot<DeviceCallback>,
    online_callbacks: Slot<DeviceCallback>,
    offline_callbacks: Slot<DeviceCallback>,
    change_callbacks: Slot<ChangeCallback>,
    change_set_callbacks: Slot<ChangeSetCallback>,
    end_callbacks: Slot<EndCallback>,
    error_callbacks: Slot<ErrorCallback>,
}

impl CallbackRegistry {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            add_callbacks: RwLock::new(BTreeMap::new()),
            remove_callbacks: RwLock::new(BTreeMap::new()),
            online_callbacks: RwLock::new(BTreeMap::new()),
            offline_callbacks: RwLock::new(BTreeMap::new()),
            change_callbacks: RwLock::new(BTreeMap::new()),
            change_set_callbacks: RwLock::new(BTreeMap::new()),
            end_callbacks: RwLock::new(BTreeMap::new()),
            error_callbacks: RwLock::new(BTreeMap::new()),
        }
    }

    /// Generates a new unique subscription ID.
    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Registers a callback for added devices.
    pub fn on_add<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.add_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for removed devices.
    pub fn on_remove<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.remove_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for devices coming online.
    pub fn on_online<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.online_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for devices going offline.
    pub fn on_offline<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.offline_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for status changes.
    ///
    /// The callback receives the new device value first, then the old one.
    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device, &Device) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.change_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for per-pass change sets.
    pub fn on_change_set<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.change_set_callbacks
            .write()
            .insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for the end of the tracker.
    pub fn on_end<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.end_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for read loop failures.
    pub fn on_error<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_shared_error(move |err| callback(err.as_ref()))
    }

    /// Registers a callback that keeps a handle on the failure.
    pub(crate) fn on_shared_error<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Arc<Error>) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.error_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    // =========================================================================
    // Unsubscription
    // =========================================================================

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.add_callbacks.write().remove(&id).is_some()
            || self.remove_callbacks.write().remove(&id).is_some()
            || self.online_callbacks.write().remove(&id).is_some()
            || self.offline_callbacks.write().remove(&id).is_some()
            || self.change_callbacks.write().remove(&id).is_some()
            || self.change_set_callbacks.write().remove(&id).is_some()
            || self.end_callbacks.write().remove(&id).is_some()
            || self.error_callbacks.write().remove(&id).is_some()
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.add_callbacks.write().clear();
        self.remove_callbacks.write().clear();
        self.online_callbacks.write().clear();
        self.offline_callbacks.write().clear();
        self.change_callbacks.write().clear();
        self.change_set_callbacks.write().clear();
        self.end_callbacks.write().clear();
        self.error_callbacks.write().clear();
    }

    // =========================================================================
    // Dispatch methods
    // =========================================================================

    /// Dispatches an event to every callback registered for its kind.
    ///
    /// Callbacks run synchronously on the calling thread, in registration
    /// order. A panicking callback unwinds out of this method.
    pub fn dispatch(&self, event: &TrackerEvent) {
        self.dispatch_until(event, SubscriptionId::new(u64::MAX));
    }

    /// Returns the ID the next registration will receive.
    ///
    /// Passing it to [`dispatch_until`](Self::dispatch_until) excludes every
    /// callback registered from now on.
    #[must_use]
    pub fn watermark(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.load(Ordering::Relaxed))
    }

    /// Dispatches an event to the callbacks registered before `limit`.
    pub fn dispatch_until(&self, event: &TrackerEvent, limit: SubscriptionId) {
        match event {
            TrackerEvent::Added(device) => {
                Self::dispatch_device(&self.add_callbacks, device, limit);
            }
            TrackerEvent::Removed(device) => {
                Self::dispatch_device(&self.remove_callbacks, device, limit);
            }
            TrackerEvent::Online(device) => {
                Self::dispatch_device(&self.online_callbacks, device, limit);
            }
            TrackerEvent::Offline(device) => {
                Self::dispatch_device(&self.offline_callbacks, device, limit);
            }
            TrackerEvent::Changed { new, old } => {
                for callback in snapshot(&self.change_callbacks, limit) {
                    callback(new, old);
                }
            }
            TrackerEvent::ChangeSet(set) => {
                for callback in snapshot(&self.change_set_callbacks, limit) {
                    callback(set);
                }
            }
            TrackerEvent::End => {
                for callback in snapshot(&self.end_callbacks, limit) {
                    callback();
                }
            }
            TrackerEvent::Error(err) => {
                for callback in snapshot(&self.error_callbacks, limit) {
                    callback(err);
                }
            }
        }
    }

    fn dispatch_device(slot: &Slot<DeviceCallback>, device: &Device, limit: SubscriptionId) {
        for callback in snapshot(slot, limit) {
            callback(device);
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns the number of callbacks registered for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Add => self.add_callbacks.read().len(),
            EventKind::Remove => self.remove_callbacks.read().len(),
            EventKind::Online => self.online_callbacks.read().len(),
            EventKind::Offline => self.offline_callbacks.read().len(),
            EventKind::Change => self.change_callbacks.read().len(),
            EventKind::ChangeSet => self.change_set_callbacks.read().len(),
            EventKind::End => self.end_callbacks.read().len(),
            EventKind::Error => self.error_callbacks.read().len(),
        }
    }

    /// Returns `true` if at least one callback is registered for `kind`.
    #[must_use]
    pub fn has_subscribers(&self, kind: EventKind) -> bool {
        self.subscriber_count(kind) > 0
    }

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        EventKind::ALL
            .iter()
            .map(|kind| self.subscriber_count(*kind))
            .sum()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

/// Copies the callbacks out so none of them runs under the lock.
fn snapshot<C: Clone>(slot: &Slot<C>, limit: SubscriptionId) -> Vec<C> {
    slot.read().range(..limit).map(|(_, c)| c.clone()).collect()
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callback_count())
            .finish_non_exhaustive()
    }
}
