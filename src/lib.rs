// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `adb_tracker` - Watch the devices attached to an ADB server.
//!
//! The [`Tracker`] pulls complete device lists from an ADB server
//! connection, diffs each list against the previous one and notifies
//! subscribers of the difference.
//!
//! # Events
//!
//! | Event       | Emitted when                                        | Replayed on subscribe |
//! |-------------|-----------------------------------------------------|-----------------------|
//! | `add`       | a serial appears                                    | every known device    |
//! | `remove`    | a serial disappears                                 | no                    |
//! | `online`    | a device appears or changes to a non-offline status | non-offline devices   |
//! | `offline`   | a device goes offline or disappears while online    | offline devices       |
//! | `change`    | the status of a known serial changes                | no                    |
//! | `changeSet` | after every pass, summarising it                    | no                    |
//! | `error`     | the read loop fails while running                   | no                    |
//! | `end`       | the read loop has exited (exactly once)             | no                    |
//!
//! # Quick Start
//!
//! ```no_run
//! use adb_tracker::{AdbServer, Subscribable};
//!
//! #[tokio::main]
//! async fn main() -> adb_tracker::Result<()> {
//!     let server = AdbServer::builder().build()?;
//!     let tracker = server.track_devices().await?;
//!
//!     tracker.on_online(|device| println!("{} ready", device.id));
//!     tracker.on_offline(|device| println!("{} gone", device.id));
//!     tracker.on_error(|err| eprintln!("tracking failed: {err}"));
//!
//!     tracker.join().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Async stream
//!
//! ```no_run
//! use adb_tracker::{AdbServer, TrackerEvent};
//!
//! #[tokio::main]
//! async fn main() -> adb_tracker::Result<()> {
//!     let tracker = AdbServer::from_env()?.track_devices().await?;
//!     let mut events = tracker.events();
//!
//!     while let Some(event) = events.recv().await {
//!         if let TrackerEvent::ChangeSet(set) = event {
//!             println!("{} devices changed", set.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Custom sources
//!
//! Anything implementing [`protocol::SnapshotSource`] can feed a tracker,
//! which is how the tests drive it without a server.

pub mod error;
pub mod event;
pub mod protocol;
pub mod subscription;
pub mod tracker;
pub mod types;

pub use error::{Error, ParseError, ProtocolError, Result};
pub use event::{ChangeSet, EventKind, TrackerEvent};
pub use protocol::{ConnectionCloser, SnapshotSource};
#[cfg(feature = "tcp")]
pub use protocol::{AdbServer, AdbServerBuilder, ServerConfig};
pub use subscription::{CallbackRegistry, Subscribable, SubscriptionId};
pub use tracker::{EventStream, TrackedState, Tracker, TrackerExit, TrackerState};
pub use types::{Device, DeviceDetails, DeviceId, DeviceStatus};
