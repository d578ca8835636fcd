// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use adb_tracker::{
    ConnectionCloser, Device, DeviceStatus, Error, EventStream, ProtocolError, Result,
    SnapshotSource, TrackerEvent,
};
use tokio::sync::mpsc;

/// Upper bound for any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Installs a test-friendly tracing subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Builds a device list from `(serial, status)` pairs.
pub fn devices(list: &[(&str, &str)]) -> Vec<Device> {
    list.iter()
        .map(|(id, status)| Device::new(*id, DeviceStatus::from(*status)))
        .collect()
}

/// Test driver for a [`ScriptedSource`].
pub struct Script {
    sender: mpsc::UnboundedSender<Result<Vec<Device>>>,
    closes: Arc<AtomicUsize>,
    close_fails: Arc<AtomicBool>,
}

impl Script {
    /// Delivers a device list to the tracker.
    pub fn push(&self, list: &[(&str, &str)]) {
        self.sender.send(Ok(devices(list))).unwrap();
    }

    /// Makes the pending read fail with `err`.
    pub fn fail(&self, err: Error) {
        self.sender.send(Err(err)).unwrap();
    }

    /// Makes every later `close` of the source report a failure.
    pub fn fail_close(&self) {
        self.close_fails.store(true, Ordering::SeqCst);
    }

    /// Ends the stream as a server hanging up mid-protocol would.
    pub fn hang_up(self) {
        drop(self);
    }

    /// Number of times the tracker closed the source.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// In-memory [`SnapshotSource`] fed by a [`Script`].
pub struct ScriptedSource {
    receiver: mpsc::UnboundedReceiver<Result<Vec<Device>>>,
    closer: ConnectionCloser,
    closes: Arc<AtomicUsize>,
    close_fails: Arc<AtomicBool>,
}

/// Creates a connected script and source.
pub fn scripted() -> (Script, ScriptedSource) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let closes = Arc::new(AtomicUsize::new(0));
    let close_fails = Arc::new(AtomicBool::new(false));
    (
        Script {
            sender,
            closes: Arc::clone(&closes),
            close_fails: Arc::clone(&close_fails),
        },
        ScriptedSource {
            receiver,
            closer: ConnectionCloser::new(),
            closes,
            close_fails,
        },
    )
}

impl SnapshotSource for ScriptedSource {
    async fn next_snapshot(&mut self) -> Result<Vec<Device>> {
        tokio::select! {
            biased;
            () = self.closer.closed() => Err(ProtocolError::Closed.into()),
            item = self.receiver.recv() => item.unwrap_or_else(|| {
                Err(ProtocolError::PrematureEof { expected: 4, received: 0 }.into())
            }),
        }
    }

    fn closer(&self) -> ConnectionCloser {
        self.closer.clone()
    }

    async fn close(&mut self) -> Result<()> {
        self.closer.close();
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.close_fails.load(Ordering::SeqCst) {
            return Err(ProtocolError::ConnectionFailed("close failed".to_string()).into());
        }
        Ok(())
    }
}

/// Receives the next event or fails the test after [`WAIT`].
pub async fn next_event(stream: &mut EventStream) -> Option<TrackerEvent> {
    tokio::time::timeout(WAIT, stream.recv())
        .await
        .expect("timed out waiting for tracker event")
}

/// Collects the events of one pass, up to and including its change set.
pub async fn next_pass(stream: &mut EventStream) -> Vec<TrackerEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(stream).await.expect("stream ended mid-pass");
        let done = matches!(event, TrackerEvent::ChangeSet(_));
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Collects events until the stream ends.
pub async fn drain(stream: &mut EventStream) -> Vec<TrackerEvent> {
    let mut events = Vec::new();
    while let Some(event) = next_event(stream).await {
        events.push(event);
    }
    events
}

/// Renders events as short strings such as `"add a"` or `"changeSet +1 -0 ~0"`.
pub fn describe(events: &[TrackerEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| match event {
            TrackerEvent::Changed { new, old } => {
                format!("change {} {}->{}", new.id, old.status, new.status)
            }
            TrackerEvent::ChangeSet(set) => format!(
                "changeSet +{} -{} ~{}",
                set.added.len(),
                set.removed.len(),
                set.changed.len()
            ),
            TrackerEvent::Error(err) => format!("error {err}"),
            TrackerEvent::End => "end".to_string(),
            other => match other.device() {
                Some(device) => format!("{} {}", other.kind(), device.id),
                None => other.kind().to_string(),
            },
        })
        .collect()
}
