// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The device tracker and its read loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::event::{ChangeSet, EventKind, TrackerEvent};
use crate::protocol::{ConnectionCloser, SnapshotSource};
use crate::subscription::{CallbackRegistry, Subscribable, SubscriptionId};
use crate::types::Device;

use super::{EventStream, Reconciliation, TrackedState, reconcile};

/// Lifecycle state of a [`Tracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerState {
    /// The read loop is pulling device lists.
    Running,
    /// The tracker was stopped or its connection failed. Terminal.
    Stopped,
}

/// How the read loop of a [`Tracker`] ended without escalating.
#[derive(Debug, Clone)]
pub enum TrackerExit {
    /// The tracker was stopped explicitly.
    Stopped,
    /// The loop failed; the failure was delivered to `error` subscribers.
    Failed(Arc<Error>),
}

impl TrackerExit {
    /// Returns the failure that ended the loop, if any.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Stopped => None,
            Self::Failed(err) => Some(err),
        }
    }
}

/// State shared between a [`Tracker`] handle and its read loop.
pub(super) struct Shared {
    pub(super) registry: CallbackRegistry,
    state: RwLock<Arc<TrackedState>>,
    lifecycle: RwLock<TrackerState>,
    /// Serializes reconciliation passes with subscribe-and-replay so a new
    /// subscriber never sees a device twice or misses one.
    pub(super) gate: ReentrantMutex<()>,
    /// Set once `end` has been emitted.
    pub(super) finished: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            registry: CallbackRegistry::new(),
            state: RwLock::new(Arc::new(TrackedState::new())),
            lifecycle: RwLock::new(TrackerState::Running),
            gate: ReentrantMutex::new(()),
            finished: AtomicBool::new(false),
        }
    }

    fn is_stopped(&self) -> bool {
        *self.lifecycle.read() == TrackerState::Stopped
    }

    fn current(&self) -> Arc<TrackedState> {
        Arc::clone(&self.state.read())
    }

    /// Replays tracked devices matching `filter` to `callback`, then hands
    /// the callback to `register`.
    ///
    /// Runs under the gate, so no pass can slip in between replay and
    /// registration.
    fn subscribe_replaying<F, R>(
        &self,
        callback: F,
        filter: fn(&Device) -> bool,
        register: R,
    ) -> SubscriptionId
    where
        R: FnOnce(&CallbackRegistry, F) -> SubscriptionId,
        F: Fn(&Device),
    {
        let _gate = self.gate.lock();
        let state = self.current();
        for device in state.iter().filter(|device| filter(device)) {
            callback(device);
        }
        register(&self.registry, callback)
    }

    /// Runs one reconciliation pass and dispatches its events.
    ///
    /// The new state is published before the first callback runs. Replaying
    /// callbacks registered during the pass already saw the new state and
    /// skip the rest of the pass; other kinds receive the remaining events.
    fn apply_snapshot(&self, snapshot: Vec<Device>) -> Result<()> {
        let _gate = self.gate.lock();
        let limit = self.registry.watermark();
        let with_change_set = self.registry.has_subscribers(EventKind::ChangeSet);

        let previous = self.current();
        let Reconciliation { state, events } = reconcile(&previous, snapshot, with_change_set);
        tracing::debug!(
            devices = state.len(),
            events = events.len(),
            "Reconciled device list"
        );
        *self.state.write() = Arc::new(state);

        for event in &events {
            std::panic::catch_unwind(AssertUnwindSafe(|| {
                if event.kind().replays_state() {
                    self.registry.dispatch_until(event, limit);
                } else {
                    self.registry.dispatch(event);
                }
            }))
            .map_err(|payload| {
                Error::SubscriberPanicked(panic_message(payload.as_ref()))
            })?;
        }
        Ok(())
    }

    /// Delivers `error` or `end`. A panicking handler is logged; handlers
    /// registered after it miss the event.
    fn emit_terminal(&self, event: &TrackerEvent) {
        let _gate = self.gate.lock();
        let delivered = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.registry.dispatch(event);
        }));
        if let Err(payload) = delivered {
            tracing::warn!(
                event = %event.kind(),
                panic = %panic_message(payload.as_ref()),
                "Subscriber panicked while handling terminal event"
            );
        }
        if matches!(event, TrackerEvent::End) {
            self.finished.store(true, Ordering::Release);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Read loop: pull, reconcile, dispatch, until the source fails or the
/// tracker is stopped.
async fn read_loop<S: SnapshotSource>(shared: Arc<Shared>, mut source: S) -> Result<TrackerExit> {
    let outcome = loop {
        if shared.is_stopped() {
            break Ok(());
        }
        let snapshot = match source.next_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => break Err(e),
        };
        if let Err(e) = shared.apply_snapshot(snapshot) {
            break Err(e);
        }
    };

    let exit = match outcome {
        Ok(()) => Ok(TrackerExit::Stopped),
        Err(e) if shared.is_stopped() => {
            tracing::debug!(error = %e, "Discarding read failure after stop");
            Ok(TrackerExit::Stopped)
        }
        Err(e) => {
            tracing::error!(error = %e, "Device tracker failed");
            let escalate = e.is_premature_eof();
            let err = Arc::new(e);
            shared.emit_terminal(&TrackerEvent::Error(Arc::clone(&err)));
            if escalate {
                Err(Error::ConnectionClosed)
            } else {
                Ok(TrackerExit::Failed(err))
            }
        }
    };

    *shared.lifecycle.write() = TrackerState::Stopped;
    if let Err(e) = source.close().await {
        tracing::debug!(error = %e, "Ignoring close failure");
    }
    shared.emit_terminal(&TrackerEvent::End);
    tracing::info!("Device tracker ended");

    exit
}

/// Tracks the devices of one [`SnapshotSource`] and notifies subscribers of
/// every change.
///
/// The read loop runs on its own tokio task from construction on. Each
/// device list is diffed against the previous one and the resulting events
/// are delivered synchronously, in order, to the callbacks registered through
/// [`Subscribable`].
///
/// Subscribing to `add`, `online` or `offline` replays the matching devices
/// already known before the method returns, so late subscribers see the same
/// device set as early ones.
///
/// A callback may subscribe while a pass is being delivered. The state is
/// already the new one at that point: an `add`, `online` or `offline`
/// subscriber gets its replay and then skips the rest of the pass, while
/// `remove`, `change`, `changeSet`, `error` and `end` subscribers receive
/// the events of the pass that have not been delivered yet.
///
/// # Failures
///
/// - [`stop`](Self::stop) ends the loop silently: no `error`, one `end`.
/// - Any other failure is delivered to `error` subscribers, then `end`
///   follows. A connection that ends in the middle of a reply is escalated:
///   [`join`](Self::join) returns [`Error::ConnectionClosed`].
/// - A callback that panics during a pass ends the loop with
///   [`Error::SubscriberPanicked`].
///
/// Dropping the tracker stops it.
pub struct Tracker {
    shared: Arc<Shared>,
    closer: ConnectionCloser,
    task: Mutex<Option<JoinHandle<Result<TrackerExit>>>>,
}

impl Tracker {
    /// Starts tracking `source`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    #[must_use]
    pub fn new<S: SnapshotSource>(source: S) -> Self {
        let shared = Arc::new(Shared::new());
        let closer = source.closer();
        let task = tokio::spawn(read_loop(Arc::clone(&shared), source));

        tracing::debug!("Device tracker started");
        Self {
            shared,
            closer,
            task: Mutex::new(Some(task)),
        }
    }

    /// Stops the tracker by closing its connection.
    ///
    /// The read failure caused by the close is not reported to `error`
    /// subscribers; `end` is emitted once the loop has exited. Calling this
    /// more than once has no further effect.
    pub fn stop(&self) {
        {
            let mut lifecycle = self.shared.lifecycle.write();
            if *lifecycle == TrackerState::Stopped {
                return;
            }
            *lifecycle = TrackerState::Stopped;
        }
        tracing::info!("Stopping device tracker");
        self.closer.close();
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> TrackerState {
        *self.shared.lifecycle.read()
    }

    /// Returns `true` while the read loop runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == TrackerState::Running
    }

    /// Returns `true` once `end` has been emitted.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    /// Returns the devices from the last completed pass.
    #[must_use]
    pub fn devices(&self) -> Arc<TrackedState> {
        self.shared.current()
    }

    /// Returns the number of callbacks subscribed to `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.shared.registry.subscriber_count(kind)
    }

    /// Returns an async stream of this tracker's events.
    ///
    /// The stream starts with the replay of the known devices: every
    /// `add`, then `online` for devices that are not offline, then
    /// `offline` for the others. It yields `None` after `end`.
    #[must_use]
    pub fn events(&self) -> EventStream {
        EventStream::subscribe(self, &self.shared)
    }

    /// Waits for the read loop to exit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the connection ended in the
    /// middle of a reply, and [`Error::TaskFailed`] if the loop task was
    /// cancelled or already joined.
    pub async fn join(&self) -> Result<TrackerExit> {
        let task = self
            .task
            .lock()
            .take()
            .ok_or_else(|| Error::TaskFailed("tracker already joined".to_string()))?;

        task.await.map_err(|e| {
            if e.is_panic() {
                Error::TaskFailed(format!("read loop panicked: {e}"))
            } else {
                Error::TaskFailed(format!("read loop cancelled: {e}"))
            }
        })?
    }
}

impl Subscribable for Tracker {
    fn on_add<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static,
    {
        self.shared
            .subscribe_replaying(callback, |_| true, CallbackRegistry::on_add)
    }

    fn on_remove<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static,
    {
        self.shared.registry.on_remove(callback)
    }

    fn on_online<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static,
    {
        self.shared.subscribe_replaying(
            callback,
            |device| !device.is_offline(),
            CallbackRegistry::on_online,
        )
    }

    fn on_offline<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device) + Send + Sync + 'static,
    {
        self.shared
            .subscribe_replaying(callback, Device::is_offline, CallbackRegistry::on_offline)
    }

    fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Device, &Device) + Send + Sync + 'static,
    {
        self.shared.registry.on_change(callback)
    }

    fn on_change_set<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + Send + Sync + 'static,
    {
        self.shared.registry.on_change_set(callback)
    }

    fn on_end<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.registry.on_end(callback)
    }

    fn on_error<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.shared.registry.on_error(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.registry.unsubscribe(id)
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("state", &self.state())
            .field("devices", &self.shared.current().len())
            .field("registry", &self.shared.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceStatus;
    use std::sync::atomic::AtomicU32;

    fn device(id: &str, status: DeviceStatus) -> Device {
        Device::new(id, status)
    }

    #[test]
    fn panic_message_extracts_strings() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }

    #[test]
    fn apply_snapshot_publishes_state_before_dispatch() {
        let shared = Arc::new(Shared::new());
        let seen = Arc::new(AtomicU32::new(0));

        let shared_clone = Arc::clone(&shared);
        let seen_clone = Arc::clone(&seen);
        shared.registry.on_add(move |_| {
            let len = shared_clone.current().len();
            seen_clone.store(u32::try_from(len).unwrap(), Ordering::SeqCst);
        });

        shared
            .apply_snapshot(vec![
                device("a", DeviceStatus::Device),
                device("b", DeviceStatus::Offline),
            ])
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn apply_snapshot_reports_panicking_subscriber() {
        let shared = Shared::new();
        shared.registry.on_online(|_| panic!("subscriber exploded"));

        let err = shared
            .apply_snapshot(vec![device("a", DeviceStatus::Device)])
            .unwrap_err();
        assert!(
            matches!(err, Error::SubscriberPanicked(ref message) if message == "subscriber exploded")
        );
        // State still reflects the pass
        assert!(shared.current().contains("a"));
    }

    #[test]
    fn subscriber_added_mid_pass_skips_rest_of_pass() {
        let shared = Arc::new(Shared::new());
        let late_adds = Arc::new(Mutex::new(Vec::new()));

        let shared_clone = Arc::clone(&shared);
        let late_clone = Arc::clone(&late_adds);
        let registered = AtomicBool::new(false);
        shared.registry.on_add(move |_| {
            if registered.swap(true, Ordering::SeqCst) {
                return;
            }
            let late = Arc::clone(&late_clone);
            shared_clone.subscribe_replaying(
                move |device: &Device| late.lock().push(device.id.to_string()),
                |_| true,
                CallbackRegistry::on_add,
            );
        });

        shared
            .apply_snapshot(vec![
                device("a", DeviceStatus::Device),
                device("b", DeviceStatus::Device),
            ])
            .unwrap();

        // Replay covered both devices; the pass did not deliver "b" again
        assert_eq!(*late_adds.lock(), ["a", "b"]);
    }

    #[test]
    fn remove_subscriber_added_mid_pass_sees_later_removal() {
        let shared = Arc::new(Shared::new());
        shared
            .apply_snapshot(vec![
                device("a", DeviceStatus::Device),
                device("b", DeviceStatus::Device),
            ])
            .unwrap();

        let removed = Arc::new(Mutex::new(Vec::new()));
        let shared_clone = Arc::clone(&shared);
        let removed_clone = Arc::clone(&removed);
        shared.registry.on_add(move |added| {
            if added.id.as_str() != "c" {
                return;
            }
            let sink = Arc::clone(&removed_clone);
            shared_clone
                .registry
                .on_remove(move |device| sink.lock().push(device.id.to_string()));
        });

        shared
            .apply_snapshot(vec![
                device("a", DeviceStatus::Device),
                device("c", DeviceStatus::Device),
            ])
            .unwrap();
        assert_eq!(*removed.lock(), ["b"]);
    }

    #[test]
    fn terminal_panic_is_contained() {
        let shared = Shared::new();
        shared.registry.on_end(|| panic!("end handler exploded"));

        shared.emit_terminal(&TrackerEvent::End);
        assert!(shared.finished.load(Ordering::Acquire));
    }

    #[test]
    fn exit_error_accessor() {
        assert!(TrackerExit::Stopped.error().is_none());
        let exit = TrackerExit::Failed(Arc::new(Error::ConnectionClosed));
        assert!(matches!(exit.error(), Some(Error::ConnectionClosed)));
    }
}
