// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection status reported for a device.

use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Status of a device as reported by the ADB server.
///
/// The tracker treats statuses opaquely except for [`DeviceStatus::Offline`],
/// which decides whether a device counts as online. Unrecognized statuses are
/// preserved in [`DeviceStatus::Other`] so that a change between two unknown
/// values is still detected.
///
/// # Examples
///
/// ```
/// use adb_tracker::types::DeviceStatus;
///
/// let status: DeviceStatus = "unauthorized".parse().unwrap();
/// assert_eq!(status, DeviceStatus::Unauthorized);
/// assert!(status.is_online());
/// assert!(!DeviceStatus::Offline.is_online());
/// ```
#[derive(Debug, Clone)]
pub enum DeviceStatus {
    /// The device is connected and ready.
    Device,
    /// The device is not responding.
    Offline,
    /// USB debugging has not been authorized on the device.
    Unauthorized,
    /// Authorization is in progress.
    Authorizing,
    /// The server is still connecting to the device.
    Connecting,
    /// The device is in bootloader mode.
    Bootloader,
    /// The device is in recovery mode.
    Recovery,
    /// The device is in rescue mode.
    Rescue,
    /// The device is in sideload mode.
    Sideload,
    /// The entry is the host itself.
    Host,
    /// The server lacks permission to open the device.
    NoPermissions,
    /// The server reports the state as unknown.
    Unknown,
    /// Any other status string.
    Other(String),
}

impl DeviceStatus {
    /// Returns the status string as sent by the server.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Device => "device",
            Self::Offline => "offline",
            Self::Unauthorized => "unauthorized",
            Self::Authorizing => "authorizing",
            Self::Connecting => "connecting",
            Self::Bootloader => "bootloader",
            Self::Recovery => "recovery",
            Self::Rescue => "rescue",
            Self::Sideload => "sideload",
            Self::Host => "host",
            Self::NoPermissions => "no permissions",
            Self::Unknown => "unknown",
            Self::Other(s) => s,
        }
    }

    /// Returns `true` for every status except [`DeviceStatus::Offline`].
    #[must_use]
    pub fn is_online(&self) -> bool {
        !self.is_offline()
    }

    /// Returns `true` if the status is [`DeviceStatus::Offline`], however
    /// it was constructed.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.as_str() == "offline"
    }
}

// Statuses compare by wire string so `Other("offline")` and `Offline` are
// the same status.
impl PartialEq for DeviceStatus {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for DeviceStatus {}

impl Hash for DeviceStatus {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s {
            "device" => Self::Device,
            "offline" => Self::Offline,
            "unauthorized" => Self::Unauthorized,
            "authorizing" => Self::Authorizing,
            "connecting" => Self::Connecting,
            "bootloader" => Self::Bootloader,
            "recovery" => Self::Recovery,
            "rescue" => Self::Rescue,
            "sideload" => Self::Sideload,
            "host" => Self::Host,
            "unknown" => Self::Unknown,
            // adb appends a hint after this one, e.g. "no permissions (...)"
            s if s.starts_with("no permissions") => Self::NoPermissions,
            other => Self::Other(other.to_string()),
        };
        Ok(status)
    }
}

impl From<&str> for DeviceStatus {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl Serialize for DeviceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeviceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}
