// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Last known device list.

use std::collections::HashMap;

use crate::types::{Device, DeviceId};

/// The device list as of the most recent reconciliation.
///
/// A `TrackedState` is immutable once built: the tracker replaces it wholesale
/// after every pass instead of editing it, so a state handed out by
/// [`Tracker::devices`](crate::Tracker::devices) never changes underneath its
/// holder. Iteration follows the order in which devices were listed.
///
/// # Examples
///
/// ```
/// use adb_tracker::tracker::TrackedState;
/// use adb_tracker::types::{Device, DeviceStatus};
///
/// let state = TrackedState::from_snapshot(vec![
///     Device::new("a", DeviceStatus::Device),
///     Device::new("b", DeviceStatus::Offline),
/// ]);
///
/// assert_eq!(state.len(), 2);
/// assert!(state.get("b").is_some_and(|d| d.is_offline()));
/// assert_eq!(state.online().count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedState {
    devices: Vec<Device>,
    index: HashMap<DeviceId, usize>,
}

impl TrackedState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from a device list.
    ///
    /// Device lists are expected to hold each serial once. Should a serial
    /// repeat, the later entry replaces the earlier one in its position.
    #[must_use]
    pub fn from_snapshot(snapshot: impl IntoIterator<Item = Device>) -> Self {
        let snapshot = snapshot.into_iter();
        let mut devices = Vec::with_capacity(snapshot.size_hint().0);
        let mut index = HashMap::with_capacity(devices.capacity());

        for device in snapshot {
            if let Some(&position) = index.get(&device.id) {
                devices[position] = device;
            } else {
                index.insert(device.id.clone(), devices.len());
                devices.push(device);
            }
        }

        Self { devices, index }
    }

    /// Returns the device with the given serial.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Device> {
        self.position(id).map(|position| &self.devices[position])
    }

    /// Returns the listing position of the device with the given serial.
    #[must_use]
    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Returns `true` if a device with the given serial is tracked.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Returns the number of tracked devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` if no device is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterates over all devices in listing order.
    pub fn iter(&self) -> std::slice::Iter<'_, Device> {
        self.devices.iter()
    }

    /// Iterates over the devices that are not offline.
    pub fn online(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|device| device.is_online())
    }

    /// Iterates over the offline devices.
    pub fn offline(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|device| device.is_offline())
    }

    /// Returns the devices as a slice in listing order.
    #[must_use]
    pub fn as_slice(&self) -> &[Device] {
        &self.devices
    }
}

impl<'a> IntoIterator for &'a TrackedState {
    type Item = &'a Device;
    type IntoIter = std::slice::Iter<'a, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Device> for TrackedState {
    fn from_iter<I: IntoIterator<Item = Device>>(iter: I) -> Self {
        Self::from_snapshot(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceStatus;

    #[test]
    fn empty_state() {
        let state = TrackedState::new();
        assert!(state.is_empty());
        assert!(state.get("a").is_none());
    }

    #[test]
    fn keeps_listing_order() {
        let state: TrackedState = ["c", "a", "b"]
            .into_iter()
            .map(|id| Device::new(id, DeviceStatus::Device))
            .collect();

        let ids: Vec<_> = state.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        assert_eq!(state.position("a"), Some(1));
    }

    #[test]
    fn repeated_serial_replaces_in_place() {
        let state = TrackedState::from_snapshot(vec![
            Device::new("a", DeviceStatus::Offline),
            Device::new("b", DeviceStatus::Device),
            Device::new("a", DeviceStatus::Device),
        ]);

        assert_eq!(state.len(), 2);
        assert_eq!(state.as_slice()[0], Device::new("a", DeviceStatus::Device));
    }

    #[test]
    fn online_offline_partition() {
        let state = TrackedState::from_snapshot(vec![
            Device::new("a", DeviceStatus::Device),
            Device::new("b", DeviceStatus::Offline),
            Device::new("c", DeviceStatus::Unauthorized),
        ]);

        let online: Vec<_> = state.online().map(|d| d.id.as_str()).collect();
        let offline: Vec<_> = state.offline().map(|d| d.id.as_str()).collect();
        assert_eq!(online, ["a", "c"]);
        assert_eq!(offline, ["b"]);
        assert!(state.contains("c"));
    }
}
