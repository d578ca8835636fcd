// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for types that emit tracker events.

use crate::error::Error;
use crate::event::ChangeSet;
use crate::subscription::SubscriptionId;
use crate::types::Device;

/// Trait for types that support tracker event subscriptions.
///
/// Callbacks are invoked synchronously on the task that produces the event,
/// in registration order. A callback that panics terminates the producer
/// (see [`Tracker`](crate::Tracker) for how the failure is reported).
///
/// # Examples
///
/// ```no_run
/// use adb_tracker::AdbServer;
/// use adb_tracker::subscription::Subscribable;
///
/// # async fn example() -> adb_tracker::Result<()> {
/// let server = AdbServer::builder().build()?;
/// let tracker = server.track_devices().await?;
///
/// // Devices already known are replayed before this returns
/// let sub_id = tracker.on_add(|device| {
///     println!("{} attached ({})", device.id, device.status);
/// });
///
/// tracker.on_change(|new, old| {
///     println!("{}: {} -> {}", new.id, old.status, new.status);
/// });
///
/// tracker.unsubscribe(sub_id);
/// # Ok(())
/// # }
/// ```
pub trait Subscribable {
    /// Subscribes to added devices.
    ///
    /// Every currently known device is replayed to the callback before this
    /// method returns.
    fn on_add<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static;

    /// Subscribes to removed devices.
    fn on_remove<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static;

    /// Subscribes to devices coming online.
    ///
    /// Every currently known device that is not offline is replayed to the
    /// callback before this method returns.
    fn on_online<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static;

    /// Subscribes to devices going offline, including devices that
    /// disappear while online.
    ///
    /// Every currently known offline device is replayed to the callback
    /// before this method returns.
    fn on_offline<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static;

    /// Subscribes to status changes.
    ///
    /// The callback receives the new device value, then the old one.
    fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device, &Device) + Send + Sync + 'static;

    /// Subscribes to the per-pass summary of added, removed and changed
    /// devices.
    fn on_change_set<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static;

    /// Subscribes to the end of tracking.
    fn on_end<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static;

    /// Subscribes to read loop failures.
    fn on_error<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Error) + Send + Sync + 'static;

    /// Removes a subscription.
    ///
    /// Returns `true` if the subscription existed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
