use serde::{Deserialize, Serialize};

use crate::firestore::core::view_snapshot::{ChangeType, ViewSnapshot};

/// Which metadata-only events a listener wants to see.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListenOptions {
    /// Raise snapshots when only `from_cache` / pending-write state changed.
    pub include_query_metadata_changes: bool,
    /// Keep per-document `Metadata` changes in raised snapshots.
    pub include_document_metadata_changes: bool,
}

/// Decides which view snapshots become user-visible events.
#[derive(Clone, Debug)]
pub struct QueryListener {
    options: ListenOptions,
    snapshot: Option<ViewSnapshot>,
    raised_initial_event: bool,
}

impl QueryListener {
    pub fn new(options: ListenOptions) -> Self {
        Self {
            options,
            snapshot: None,
            raised_initial_event: false,
        }
    }

    pub fn options(&self) -> ListenOptions {
        self.options
    }

    /// Returns the snapshot to raise, if any.
    pub fn on_view_snapshot(&mut self, snapshot: ViewSnapshot) -> Option<ViewSnapshot> {
        let snapshot = if self.options.include_document_metadata_changes {
            snapshot
        } else {
            let mut filtered = snapshot;
            filtered
                .document_changes
                .retain(|change| change.change_type != ChangeType::Metadata);
            filtered.excludes_metadata_changes = true;
            filtered
        };

        let raise = if self.raised_initial_event {
            self.should_raise_event(&snapshot)
        } else {
            true
        };

        let raised = if raise {
            self.raised_initial_event = true;
            Some(snapshot.clone())
        } else {
            None
        };
        self.snapshot = Some(snapshot);
        raised
    }

    fn should_raise_event(&self, snapshot: &ViewSnapshot) -> bool {
        if !snapshot.document_changes.is_empty() {
            return true;
        }

        let pending_writes_changed = self
            .snapshot
            .as_ref()
            .map(|previous| previous.has_pending_writes() != snapshot.has_pending_writes())
            .unwrap_or(false);

        (snapshot.sync_state_changed || pending_writes_changed)
            && self.options.include_query_metadata_changes
    }
}
