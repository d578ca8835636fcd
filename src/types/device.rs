// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device snapshot value.

use serde::{Deserialize, Serialize};

use super::{DeviceId, DeviceStatus};

/// A device as it appeared in one device list.
///
/// Devices are plain values: two snapshots of the same device are matched by
/// [`id`](Self::id), and a change is a differing [`status`](Self::status).
/// The optional [`details`](Self::details) are only filled in by long-format
/// listings and never take part in change detection.
///
/// # Examples
///
/// ```
/// use adb_tracker::types::{Device, DeviceStatus};
///
/// let device = Device::new("emulator-5554", DeviceStatus::Device);
/// assert!(device.is_online());
/// assert_eq!(device.id.as_str(), "emulator-5554");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Serial of the device.
    pub id: DeviceId,
    /// Status reported by the server.
    pub status: DeviceStatus,
    /// Extra fields from a long-format listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<DeviceDetails>,
}

impl Device {
    /// Creates a device without long-format details.
    #[must_use]
    pub fn new(id: impl Into<DeviceId>, status: impl Into<DeviceStatus>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
            details: None,
        }
    }

    /// Attaches long-format details.
    #[must_use]
    pub fn with_details(mut self, details: DeviceDetails) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns `true` unless the device is offline.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.status.is_online()
    }

    /// Returns `true` if the device is offline.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.status.is_offline()
    }

    /// Returns the device path (for example `usb:1-1`) if known.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.details.as_ref().and_then(|d| d.path.as_deref())
    }

    /// Returns `true` if `other` describes the same device with a different
    /// status.
    #[must_use]
    pub(crate) fn status_differs(&self, other: &Self) -> bool {
        self.status != other.status
    }
}

/// Fields reported by `host:devices-l` and `host:track-devices-l`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDetails {
    /// Device path, such as `usb:1-1`.
    pub path: Option<String>,
    /// Product name (`product:`).
    pub product: Option<String>,
    /// Model name (`model:`).
    pub model: Option<String>,
    /// Device name (`device:`).
    pub device: Option<String>,
    /// Transport identifier assigned by the server (`transport_id:`).
    pub transport_id: Option<u32>,
}

impl DeviceDetails {
    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_device_is_not_online() {
        let device = Device::new("a", DeviceStatus::Offline);
        assert!(device.is_offline());
        assert!(!device.is_online());
    }

    #[test]
    fn status_difference_ignores_details() {
        let plain = Device::new("a", DeviceStatus::Device);
        let detailed = Device::new("a", DeviceStatus::Device).with_details(DeviceDetails {
            model: Some("Pixel_7".to_string()),
            ..DeviceDetails::default()
        });
        assert!(!plain.status_differs(&detailed));
        assert!(plain.status_differs(&Device::new("a", DeviceStatus::Offline)));

        let raw_offline = Device::new("a", DeviceStatus::Other("offline".to_string()));
        assert!(raw_offline.is_offline());
        assert!(!raw_offline.status_differs(&Device::new("a", DeviceStatus::Offline)));
    }

    #[test]
    fn path_comes_from_details() {
        let device = Device::new("a", DeviceStatus::Device).with_details(DeviceDetails {
            path: Some("usb:1-1".to_string()),
            ..DeviceDetails::default()
        });
        assert_eq!(device.path(), Some("usb:1-1"));
        assert_eq!(Device::new("b", DeviceStatus::Device).path(), None);
    }

    #[test]
    fn json_omits_missing_details() {
        let json = serde_json::to_value(Device::new("a", DeviceStatus::Unauthorized)).unwrap();
        assert_eq!(json, serde_json::json!({ "id": "a", "status": "unauthorized" }));
    }
}
