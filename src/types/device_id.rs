// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identifier type.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a device attached to the ADB server.
///
/// This is the serial number reported by the server (for example
/// `emulator-5554` or `192.168.1.20:5555`). It is unique within a single
/// device list.
///
/// # Examples
///
/// ```
/// use adb_tracker::types::DeviceId;
///
/// let id = DeviceId::from("emulator-5554");
/// assert_eq!(id.as_str(), "emulator-5554");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Creates a device identifier from a serial.
    #[must_use]
    pub fn new(serial: impl Into<String>) -> Self {
        Self(serial.into())
    }

    /// Returns the serial as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the serial designates a network-attached device
    /// (`host:port`).
    #[must_use]
    pub fn is_network(&self) -> bool {
        self.0
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
    }

    /// Returns `true` if the serial designates a local emulator.
    #[must_use]
    pub fn is_emulator(&self) -> bool {
        self.0.starts_with("emulator-")
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(serial: &str) -> Self {
        Self(serial.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(serial: String) -> Self {
        Self(serial)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality() {
        assert_eq!(DeviceId::from("abc"), DeviceId::new("abc".to_string()));
        assert_ne!(DeviceId::from("abc"), DeviceId::from("abd"));
    }

    #[test]
    fn debug_format() {
        let id = DeviceId::from("emulator-5554");
        assert_eq!(format!("{id:?}"), "DeviceId(emulator-5554)");
    }

    #[test]
    fn display_format() {
        let id = DeviceId::from("0123456789ABCDEF");
        assert_eq!(id.to_string(), "0123456789ABCDEF");
    }

    #[test]
    fn network_and_emulator_detection() {
        assert!(DeviceId::from("192.168.1.20:5555").is_network());
        assert!(!DeviceId::from("192.168.1.20:abc").is_network());
        assert!(!DeviceId::from("emulator-5554").is_network());
        assert!(DeviceId::from("emulator-5554").is_emulator());
        assert!(!DeviceId::from("R58M123").is_emulator());
    }

    #[test]
    fn lookup_by_str() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(DeviceId::from("serial"), 1);
        assert_eq!(map.get("serial"), Some(&1));
    }

    #[test]
    fn serializes_as_plain_string() {
        let json = serde_json::to_string(&DeviceId::from("serial")).unwrap();
        assert_eq!(json, "\"serial\"");
    }
}
