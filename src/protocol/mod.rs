// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ADB host protocol plumbing used by the tracker.
//!
//! The tracker only depends on the [`SnapshotSource`] trait: something that
//! yields complete device lists and can be closed from another task. This
//! module also provides the implementation backed by a real ADB server
//! connection.
//!
//! # Components
//!
//! - [`AdbConnection`]: length-prefixed request/reply framing over any async stream
//! - [`DeviceListing`]: the server services that produce device lists
//! - [`DeviceListSource`]: a [`SnapshotSource`] reading one listing from a connection
//! - [`AdbServer`]: TCP entry point (requires the `tcp` feature)

mod connection;
mod device_list;
#[cfg(feature = "tcp")]
mod server;

pub use connection::AdbConnection;
pub use device_list::{DeviceListSource, DeviceListing, parse_device_list};
#[cfg(feature = "tcp")]
pub use server::{AdbServer, AdbServerBuilder, DEFAULT_PORT, ServerConfig};

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::Result;
use crate::types::Device;

/// A producer of complete device lists.
///
/// Implementations wrap a single server connection. The tracker calls
/// [`next_snapshot`](Self::next_snapshot) in a loop and, when asked to stop,
/// uses the [`ConnectionCloser`] returned by [`closer`](Self::closer) to make
/// the pending call fail. Once `next_snapshot` has failed the source is not
/// used again apart from a final [`close`](Self::close).
pub trait SnapshotSource: Send + 'static {
    /// Waits for the next complete device list.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure. A connection that ends in the
    /// middle of a reply must be reported as
    /// [`ProtocolError::PrematureEof`](crate::ProtocolError::PrematureEof),
    /// and a call interrupted by the closer as
    /// [`ProtocolError::Closed`](crate::ProtocolError::Closed).
    fn next_snapshot(&mut self) -> impl Future<Output = Result<Vec<Device>>> + Send;

    /// Returns a handle that terminates the connection from any task.
    fn closer(&self) -> ConnectionCloser;

    /// Closes the underlying connection.
    ///
    /// Closing twice is allowed.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport could not be shut down cleanly.
    /// Callers treat this as best effort.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Cloneable handle that closes a connection.
///
/// Closing is idempotent and never fails. Readers race their I/O against
/// [`closed`](Self::closed) so that a pending read returns as soon as the
/// handle is triggered.
///
/// # Examples
///
/// ```
/// use adb_tracker::protocol::ConnectionCloser;
///
/// # #[tokio::main]
/// # async fn main() {
/// let closer = ConnectionCloser::new();
/// let handle = closer.clone();
///
/// handle.close();
/// closer.closed().await;
/// assert!(closer.is_closed());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionCloser {
    signal: Arc<watch::Sender<bool>>,
}

impl ConnectionCloser {
    /// Creates a handle in the open state.
    #[must_use]
    pub fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
        }
    }

    /// Marks the connection as closed and wakes every pending reader.
    pub fn close(&self) {
        let was_closed = self.signal.send_replace(true);
        if !was_closed {
            tracing::debug!("Connection close requested");
        }
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.signal.borrow()
    }

    /// Completes once the connection has been closed.
    pub async fn closed(&self) {
        let mut rx = self.signal.subscribe();
        // The sender lives as long as `self`, so this only returns on close
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for ConnectionCloser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn closer_starts_open() {
        assert!(!ConnectionCloser::new().is_closed());
    }

    #[test]
    fn close_is_idempotent_and_shared() {
        let closer = ConnectionCloser::new();
        let clone = closer.clone();

        clone.close();
        clone.close();

        assert!(closer.is_closed());
    }

    #[tokio::test]
    async fn closed_wakes_pending_waiter() {
        let closer = ConnectionCloser::new();
        let waiter = closer.clone();

        let task = tokio::spawn(async move { waiter.closed().await });
        tokio::task::yield_now().await;
        closer.close();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter should wake up")
            .unwrap();
    }

    #[tokio::test]
    async fn closed_returns_immediately_after_close() {
        let closer = ConnectionCloser::new();
        closer.close();
        tokio::time::timeout(Duration::from_millis(100), closer.closed())
            .await
            .expect("already closed");
    }
}
