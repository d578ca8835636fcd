// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Channel-backed view of a tracker's events.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use crate::event::TrackerEvent;
use crate::subscription::{Subscribable, SubscriptionId};
use crate::types::Device;

use super::Tracker;
use super::device_tracker::Shared;

/// Async receiver of every event of a [`Tracker`].
///
/// Created by [`Tracker::events`]. Events are buffered without bound, so a
/// slow consumer never blocks the read loop. Dropping the stream removes its
/// subscriptions.
///
/// # Examples
///
/// ```no_run
/// use adb_tracker::{AdbServer, TrackerEvent};
///
/// # async fn example() -> adb_tracker::Result<()> {
/// let tracker = AdbServer::default().track_devices().await?;
/// let mut events = tracker.events();
///
/// while let Some(event) = events.recv().await {
///     match event {
///         TrackerEvent::Online(device) => println!("{} is ready", device.id),
///         TrackerEvent::Error(err) => eprintln!("tracking failed: {err}"),
///         other => println!("{other}"),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<TrackerEvent>,
    subscriptions: Vec<SubscriptionId>,
    shared: Weak<Shared>,
    ended: bool,
}

impl EventStream {
    pub(super) fn subscribe(tracker: &Tracker, shared: &Arc<Shared>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        // Hold the gate across all registrations so the replay is one
        // consistent view and no pass interleaves with it
        let _gate = shared.gate.lock();

        let forward = |wrap: fn(Device) -> TrackerEvent| {
            let sender = sender.clone();
            move |device: &Device| {
                // The receiver is gone once the stream is dropped
                let _ = sender.send(wrap(device.clone()));
            }
        };

        let mut subscriptions = vec![
            tracker.on_add(forward(TrackerEvent::Added)),
            tracker.on_online(forward(TrackerEvent::Online)),
            tracker.on_offline(forward(TrackerEvent::Offline)),
            tracker.on_remove(forward(TrackerEvent::Removed)),
        ];

        let change_sender = sender.clone();
        subscriptions.push(tracker.on_change(move |new, old| {
            let _ = change_sender.send(TrackerEvent::Changed {
                new: new.clone(),
                old: old.clone(),
            });
        }));
        let set_sender = sender.clone();
        subscriptions.push(tracker.on_change_set(move |set| {
            let _ = set_sender.send(TrackerEvent::ChangeSet(set.clone()));
        }));
        let error_sender = sender.clone();
        subscriptions.push(shared.registry.on_shared_error(move |err| {
            let _ = error_sender.send(TrackerEvent::Error(Arc::clone(err)));
        }));

        if shared.finished.load(Ordering::Acquire) {
            let _ = sender.send(TrackerEvent::End);
        } else {
            let end_sender = sender;
            subscriptions.push(tracker.on_end(move || {
                let _ = end_sender.send(TrackerEvent::End);
            }));
        }

        Self {
            receiver,
            subscriptions,
            shared: Arc::downgrade(shared),
            ended: false,
        }
    }

    /// Receives the next event.
    ///
    /// Returns `None` after `end` has been received, or if the tracker was
    /// dropped.
    pub async fn recv(&mut self) -> Option<TrackerEvent> {
        if self.ended {
            return None;
        }
        let event = self.receiver.recv().await;
        self.observe(event)
    }

    /// Receives an event if one is ready.
    pub fn try_recv(&mut self) -> Option<TrackerEvent> {
        if self.ended {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(event) => self.observe(Some(event)),
            Err(TryRecvError::Disconnected) => self.observe(None),
            Err(TryRecvError::Empty) => None,
        }
    }

    /// Returns `true` once the stream has delivered `end` or lost its
    /// tracker.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    fn observe(&mut self, event: Option<TrackerEvent>) -> Option<TrackerEvent> {
        match &event {
            Some(TrackerEvent::End) | None => self.ended = true,
            Some(_) => {}
        }
        event
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            for id in self.subscriptions.drain(..) {
                shared.registry.unsubscribe(id);
            }
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("subscriptions", &self.subscriptions.len())
            .field("ended", &self.ended)
            .finish_non_exhaustive()
    }
}
