// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types describing devices attached to an ADB server.
//!
//! # Types
//!
//! - [`DeviceId`] - Serial number identifying a device
//! - [`DeviceStatus`] - Status string reported by the server
//! - [`Device`] - One entry of a device list
//! - [`DeviceDetails`] - Extra fields of long-format listings

mod device;
mod device_id;
mod device_status;

pub use device::{Device, DeviceDetails};
pub use device_id::DeviceId;
pub use device_status::DeviceStatus;
