//! Snapshot synchronisation with the shared state document.
//!
//! [`SyncSession`] is the single owner of the live aggregator. It pushes the
//! snapshot after local mutations and merges newer documents written
//! elsewhere (last write wins, no conflict resolution).

pub mod store;

pub use store::{FileStore, SnapshotStore, StoredState};

use crate::analysis::IndicatorAggregator;
use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Result of a pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// Sync is disabled for this session.
    Disabled,
    /// No document existed; it was created from the local snapshot.
    Seeded,
    /// A newer document was merged; carries the number of indicators applied.
    Merged(usize),
    /// The document is not newer than the last one seen.
    UpToDate,
}

/// Live aggregator plus its optional store.
pub struct SyncSession {
    aggregator: IndicatorAggregator,
    store: Option<Box<dyn SnapshotStore>>,
    last_seen: Option<DateTime<Utc>>,
}

impl SyncSession {
    pub fn new(aggregator: IndicatorAggregator, store: Option<Box<dyn SnapshotStore>>) -> Self {
        Self {
            aggregator,
            store,
            last_seen: None,
        }
    }

    /// Session with no backing store.
    pub fn offline(aggregator: IndicatorAggregator) -> Self {
        Self::new(aggregator, None)
    }

    pub fn aggregator(&self) -> &IndicatorAggregator {
        &self.aggregator
    }

    pub fn aggregator_mut(&mut self) -> &mut IndicatorAggregator {
        &mut self.aggregator
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Timestamp of the newest document pushed or merged.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_seen
    }

    /// Fetch the document and merge it if it is newer than the last one seen.
    ///
    /// On error the snapshot is left untouched.
    pub fn pull(&mut self) -> Result<PullOutcome> {
        let Some(store) = self.store.as_ref() else {
            return Ok(PullOutcome::Disabled);
        };

        let Some(remote) = store.load()? else {
            let now = Utc::now();
            store.save(&StoredState {
                indicators: self.aggregator.snapshot().to_json(),
                last_updated: now,
            })?;
            info!("Seeded state document at {}", store.describe());
            self.last_seen = Some(now);
            self.aggregator.take_dirty();
            return Ok(PullOutcome::Seeded);
        };

        if self.last_seen.is_some_and(|seen| remote.last_updated <= seen) {
            debug!("State document unchanged since {}", remote.last_updated);
            return Ok(PullOutcome::UpToDate);
        }

        let had_local_edits = self.aggregator.is_dirty();
        let applied = self.aggregator.replace_from_json(&remote.indicators);
        if !had_local_edits {
            // The merged values came from the store; nothing to push back.
            self.aggregator.take_dirty();
        }
        self.last_seen = Some(remote.last_updated);

        info!(
            "Merged {} indicators from state document ({})",
            applied, remote.last_updated
        );
        Ok(PullOutcome::Merged(applied))
    }

    /// Write the snapshot if it changed since the last push. Returns whether
    /// a write happened. The dirty flag survives a failed write.
    pub fn push_if_dirty(&mut self) -> Result<bool> {
        let Some(store) = self.store.as_ref() else {
            return Ok(false);
        };
        if !self.aggregator.is_dirty() {
            return Ok(false);
        }

        let now = Utc::now();
        store.save(&StoredState {
            indicators: self.aggregator.snapshot().to_json(),
            last_updated: now,
        })?;

        self.aggregator.take_dirty();
        self.last_seen = Some(now);
        debug!("Pushed snapshot revision {}", self.aggregator.revision());
        Ok(true)
    }
}
