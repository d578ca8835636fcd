// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tracker event types.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::types::Device;

use super::ChangeSet;

/// The kinds of event a tracker emits.
///
/// Subscribing to [`Add`](Self::Add), [`Online`](Self::Online) or
/// [`Offline`](Self::Offline) replays the current state to the new
/// subscriber; the other kinds describe transitions only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A device appeared.
    Add,
    /// A device disappeared.
    Remove,
    /// A device is present and not offline.
    Online,
    /// A device went offline or disappeared.
    Offline,
    /// A device changed status.
    Change,
    /// Summary of one reconciliation pass.
    ChangeSet,
    /// The tracker stopped.
    End,
    /// The read loop failed.
    Error,
}

impl EventKind {
    /// All event kinds, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Add,
        Self::Remove,
        Self::Online,
        Self::Offline,
        Self::Change,
        Self::ChangeSet,
        Self::End,
        Self::Error,
    ];

    /// Returns the event name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Change => "change",
            Self::ChangeSet => "changeSet",
            Self::End => "end",
            Self::Error => "error",
        }
    }

    /// Returns `true` if subscribing to this kind replays current state.
    #[must_use]
    pub const fn replays_state(&self) -> bool {
        matches!(self, Self::Add | Self::Online | Self::Offline)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events emitted by a tracker.
///
/// # Examples
///
/// ```
/// use adb_tracker::event::{EventKind, TrackerEvent};
/// use adb_tracker::types::{Device, DeviceStatus};
///
/// let event = TrackerEvent::Added(Device::new("emulator-5554", DeviceStatus::Device));
/// assert_eq!(event.kind(), EventKind::Add);
/// assert_eq!(event.device().map(|d| d.id.as_str()), Some("emulator-5554"));
/// ```
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// A device appeared.
    Added(Device),
    /// A device disappeared.
    Removed(Device),
    /// A device is online.
    Online(Device),
    /// A device is offline.
    Offline(Device),
    /// A device changed status.
    Changed {
        /// The device with its new status.
        new: Device,
        /// The device with its previous status.
        old: Device,
    },
    /// Summary of one reconciliation pass.
    ChangeSet(ChangeSet),
    /// The tracker stopped; no further events follow.
    End,
    /// The read loop failed.
    Error(Arc<Error>),
}

impl TrackerEvent {
    /// Returns the kind of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Added(_) => EventKind::Add,
            Self::Removed(_) => EventKind::Remove,
            Self::Online(_) => EventKind::Online,
            Self::Offline(_) => EventKind::Offline,
            Self::Changed { .. } => EventKind::Change,
            Self::ChangeSet(_) => EventKind::ChangeSet,
            Self::End => EventKind::End,
            Self::Error(_) => EventKind::Error,
        }
    }

    /// Returns the device this event is about, if any.
    ///
    /// For [`Changed`](Self::Changed) this is the new device value.
    #[must_use]
    pub fn device(&self) -> Option<&Device> {
        match self {
            Self::Added(device)
            | Self::Removed(device)
            | Self::Online(device)
            | Self::Offline(device)
            | Self::Changed { new: device, .. } => Some(device),
            Self::ChangeSet(_) | Self::End | Self::Error(_) => None,
        }
    }

    /// Creates the online or offline event matching the device status.
    #[must_use]
    pub(crate) fn presence(device: Device) -> Self {
        if device.is_offline() {
            Self::Offline(device)
        } else {
            Self::Online(device)
        }
    }
}

impl fmt::Display for TrackerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changed { new, old } => {
                write!(f, "change {} ({} -> {})", new.id, old.status, new.status)
            }
            Self::ChangeSet(set) => write!(
                f,
                "changeSet (+{} -{} ~{})",
                set.added.len(),
                set.removed.len(),
                set.changed.len()
            ),
            Self::Error(err) => write!(f, "error: {err}"),
            Self::End => f.write_str("end"),
            other => match other.device() {
                Some(device) => write!(f, "{} {} ({})", other.kind(), device.id, device.status),
                None => f.write_str(other.kind().as_str()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceStatus;

    #[test]
    fn kind_mapping() {
        let device = Device::new("a", DeviceStatus::Device);
        assert_eq!(TrackerEvent::Added(device.clone()).kind(), EventKind::Add);
        assert_eq!(TrackerEvent::Removed(device.clone()).kind(), EventKind::Remove);
        assert_eq!(
            TrackerEvent::Changed {
                new: device.clone(),
                old: device,
            }
            .kind(),
            EventKind::Change
        );
        assert_eq!(TrackerEvent::End.kind(), EventKind::End);
    }

    #[test]
    fn presence_follows_offline_rule() {
        let online = TrackerEvent::presence(Device::new("a", DeviceStatus::Unauthorized));
        assert_eq!(online.kind(), EventKind::Online);

        let offline = TrackerEvent::presence(Device::new("a", DeviceStatus::Offline));
        assert_eq!(offline.kind(), EventKind::Offline);
    }

    #[test]
    fn only_state_kinds_replay() {
        let replaying: Vec<_> = EventKind::ALL
            .iter()
            .filter(|kind| kind.replays_state())
            .collect();
        assert_eq!(
            replaying,
            [&EventKind::Add, &EventKind::Online, &EventKind::Offline]
        );
    }

    #[test]
    fn display_change() {
        let event = TrackerEvent::Changed {
            new: Device::new("a", DeviceStatus::Offline),
            old: Device::new("a", DeviceStatus::Device),
        };
        assert_eq!(event.to_string(), "change a (device -> offline)");
    }

    #[test]
    fn display_device_event() {
        let event = TrackerEvent::Added(Device::new("a", DeviceStatus::Device));
        assert_eq!(event.to_string(), "add a (device)");
    }
}
