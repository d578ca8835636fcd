// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events produced by the device tracker.
//!
//! Each reconciliation pass yields an ordered list of [`TrackerEvent`]s.
//! Callbacks subscribe per [`EventKind`]; [`ChangeSet`] summarises one pass.
//!
//! # Examples
//!
//! ```
//! use adb_tracker::event::{EventKind, TrackerEvent};
//! use adb_tracker::types::{Device, DeviceStatus};
//!
//! let event = TrackerEvent::Added(Device::new("emulator-5554", DeviceStatus::Device));
//! assert_eq!(event.kind(), EventKind::Add);
//! assert_eq!(event.kind().as_str(), "add");
//! ```

mod change_set;
mod tracker_event;

pub use change_set::ChangeSet;
pub use tracker_event::{EventKind, TrackerEvent};
