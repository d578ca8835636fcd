// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Aggregate summary of one reconciliation pass.

use serde::{Deserialize, Serialize};

use crate::types::Device;

/// Devices added, removed and changed during a single reconciliation pass.
///
/// Online/offline transitions that are not accompanied by an add, a removal
/// or a status change do not appear here. `changed` holds the post-change
/// device values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Devices that were not present in the previous snapshot.
    pub added: Vec<Device>,
    /// Devices that disappeared, with their last known status.
    pub removed: Vec<Device>,
    /// Devices whose status changed, with their new status.
    pub changed: Vec<Device>,
}

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the pass produced no add, removal or change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Returns the total number of devices in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceStatus;

    #[test]
    fn empty_by_default() {
        let set = ChangeSet::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn len_counts_all_lists() {
        let set = ChangeSet {
            added: vec![Device::new("a", DeviceStatus::Device)],
            removed: vec![Device::new("b", DeviceStatus::Offline)],
            changed: vec![],
        };
        assert!(!set.is_empty());
        assert_eq!(set.len(), 2);
    }
}
