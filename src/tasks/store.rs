// Undo log: append-only stack snapshots tagged with consecutive epochs
// Every durable effect is journaled as a PersistCommand for the persistence task

use std::collections::{BTreeMap, VecDeque};
use std::mem;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::LogCorruption;
use crate::modes::calculator::Pad;

/// Epochs of history kept behind the current one
pub const RETAINED_EPOCHS: u64 = 30;

/// Depth of the row standing in for an empty stack
pub const EMPTY_DEPTH: i32 = -1;

/// Immutable stack contents at one epoch, index 0 is the top.
/// Cloning shares the values.
#[derive(Debug, Clone, PartialEq)]
pub struct StackSnapshot {
    epoch: u64,
    values: Arc<[f64]>,
}

impl StackSnapshot {
    pub fn new(epoch: u64, values: impl Into<Arc<[f64]>>) -> Self {
        Self {
            epoch,
            values: values.into(),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `depth` below the top
    pub fn get(&self, depth: usize) -> Option<f64> {
        self.values.get(depth).copied()
    }

    /// Same underlying values, not just equal ones
    pub fn shares_values(&self, other: &StackSnapshot) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }

    /// Storage rows, a single [`EMPTY_DEPTH`] row for an empty stack
    pub fn rows(&self) -> impl Iterator<Item = SnapshotRow> + '_ {
        let sentinel = self.values.is_empty().then_some(SnapshotRow {
            epoch: self.epoch,
            depth: EMPTY_DEPTH,
            value: 0.0,
        });

        self.values
            .iter()
            .enumerate()
            .map(|(depth, value)| SnapshotRow {
                epoch: self.epoch,
                depth: depth as i32,
                value: *value,
            })
            .chain(sentinel)
    }
}

/// One `(epoch, depth, value)` record as the persistence layer stores it
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SnapshotRow {
    pub epoch: u64,
    pub depth: i32,
    pub value: f64,
}

/// Durable effects, to be applied by storage in the order they were issued
#[derive(Debug, Clone, PartialEq)]
pub enum PersistCommand {
    /// Write every row of a new snapshot
    Append(StackSnapshot),
    /// Delete the rows of one epoch
    Rollback { epoch: u64 },
    /// Delete the rows of every epoch before `before`
    Prune { before: u64 },
    /// Delete every row
    Reset,
    /// Replace the stored entry pad
    StorePad(Pad),
}

/// The undo log. There is always a current snapshot; older ones are history.
///
/// Nothing is journaled until [`EpochStore::start_journal`] is called, so a
/// log without storage behind it stays bounded.
#[derive(Debug)]
pub struct EpochStore {
    current: StackSnapshot,
    history: VecDeque<StackSnapshot>,
    journal: VecDeque<PersistCommand>,
    journaling: bool,
    /// Storage already holds every retained snapshot
    stored: bool,
}

impl EpochStore {
    /// Fresh log holding an empty stack at epoch 0
    pub fn new() -> Self {
        Self {
            current: StackSnapshot::new(0, Vec::new()),
            history: VecDeque::new(),
            journal: VecDeque::new(),
            journaling: false,
            stored: false,
        }
    }

    /// Rebuild the log from stored rows.
    ///
    /// Rows that fail the consistency check are not repaired: the log starts
    /// over at epoch 0, and storage is reset once journaling starts.
    pub fn restore(rows: impl IntoIterator<Item = SnapshotRow>) -> Self {
        match rebuild(rows) {
            Ok(mut snapshots) => match snapshots.pop_back() {
                Some(current) => {
                    info!(
                        "Restored undo log: epochs {}..={}",
                        snapshots.front().map_or(current.epoch, |first| first.epoch),
                        current.epoch
                    );

                    let mut store = Self {
                        current,
                        history: snapshots,
                        ..Self::new()
                    };
                    store.prune(store.current.epoch);
                    // Rows pruned here stay in storage until the next prune
                    store.stored = true;
                    store
                }
                None => {
                    info!("No stored undo log, starting at epoch 0");
                    Self::new()
                }
            },
            Err(corruption) => {
                warn!("Undo log is corrupt ({corruption}), starting over at epoch 0");
                Self::new()
            }
        }
    }

    /// Journal every durable effect from now on.
    ///
    /// Storage that does not hold this log yet is first rewritten from
    /// scratch: a [`PersistCommand::Reset`] followed by every retained
    /// snapshot, oldest first.
    pub fn start_journal(&mut self) {
        if self.journaling {
            return;
        }
        self.journaling = true;

        if !self.stored {
            debug!("Rewriting storage from epoch {}", self.first_epoch());
            self.journal.push_back(PersistCommand::Reset);
            for snapshot in self.history.iter().chain([&self.current]) {
                self.journal.push_back(PersistCommand::Append(snapshot.clone()));
            }
            self.stored = true;
        }
    }

    pub fn is_journaling(&self) -> bool {
        self.journaling
    }

    fn journal(&mut self, command: PersistCommand) {
        if self.journaling {
            self.journal.push_back(command);
        } else {
            self.stored = false;
        }
    }

    /// Snapshot at the latest epoch
    pub fn current(&self) -> &StackSnapshot {
        &self.current
    }

    pub fn first_epoch(&self) -> u64 {
        self.history.front().map_or(self.current.epoch, |first| first.epoch)
    }

    pub fn last_epoch(&self) -> u64 {
        self.current.epoch
    }

    /// Retained snapshots, the current one included
    pub fn retained(&self) -> usize {
        self.history.len() + 1
    }

    /// Store `values` as the next epoch and return that epoch
    pub fn append(&mut self, values: impl Into<Arc<[f64]>>) -> u64 {
        let epoch = self.current.epoch + 1;
        let snapshot = StackSnapshot::new(epoch, values);
        debug!("Epoch {epoch}: depth {}", snapshot.depth());

        let previous = mem::replace(&mut self.current, snapshot.clone());
        self.history.push_back(previous);
        self.journal(PersistCommand::Append(snapshot));

        self.prune(epoch);
        epoch
    }

    /// Drop the latest epoch.
    ///
    /// Returns `true` when nothing older is left, meaning the log is already
    /// at its oldest state and was not changed.
    pub fn rollback(&mut self) -> bool {
        let Some(previous) = self.history.pop_back() else {
            return true;
        };

        let dropped = mem::replace(&mut self.current, previous);
        debug!("Rolled back epoch {} to {}", dropped.epoch, self.current.epoch);
        self.journal(PersistCommand::Rollback { epoch: dropped.epoch });

        false
    }

    /// Forget history older than [`RETAINED_EPOCHS`] before `new_epoch`.
    /// The current snapshot is never pruned.
    pub fn prune(&mut self, new_epoch: u64) {
        if self.first_epoch() + RETAINED_EPOCHS >= new_epoch {
            return;
        }

        let before = (new_epoch - RETAINED_EPOCHS).min(self.current.epoch);
        while self.history.front().is_some_and(|first| first.epoch < before) {
            self.history.pop_front();
        }

        debug!("Pruned epochs before {before}");
        self.journal(PersistCommand::Prune { before });
    }

    /// Journal the entry pad for storage
    pub fn record_pad(&mut self, pad: &Pad) {
        if self.journaling {
            self.journal.push_back(PersistCommand::StorePad(pad.clone()));
        }
    }

    /// Commands not yet handed to storage
    pub fn pending(&self) -> usize {
        self.journal.len()
    }

    pub fn peek_command(&self) -> Option<&PersistCommand> {
        self.journal.front()
    }

    pub fn pop_command(&mut self) -> Option<PersistCommand> {
        self.journal.pop_front()
    }
}

impl Default for EpochStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Group rows into snapshots, checking that epochs are consecutive and that
/// each epoch is either a lone empty row or depths running `0..n` without gaps
fn rebuild(rows: impl IntoIterator<Item = SnapshotRow>) -> Result<VecDeque<StackSnapshot>, LogCorruption> {
    let mut epochs: BTreeMap<u64, Vec<(i32, f64)>> = BTreeMap::new();
    for row in rows {
        epochs.entry(row.epoch).or_default().push((row.depth, row.value));
    }

    let mut snapshots = VecDeque::with_capacity(epochs.len());
    let mut previous: Option<u64> = None;

    for (epoch, mut cells) in epochs {
        if let Some(previous) = previous {
            if epoch != previous + 1 {
                return Err(LogCorruption::EpochGap {
                    previous,
                    found: epoch,
                });
            }
        }

        let sentinels = cells.iter().filter(|(depth, _)| *depth == EMPTY_DEPTH).count();
        if sentinels > 1 {
            return Err(LogCorruption::DuplicateDepth {
                epoch,
                depth: EMPTY_DEPTH,
            });
        }
        if sentinels == 1 && cells.len() > 1 {
            return Err(LogCorruption::SentinelWithValues { epoch });
        }

        cells.retain(|(depth, _)| *depth != EMPTY_DEPTH);
        cells.sort_by_key(|(depth, _)| *depth);

        let mut values = Vec::with_capacity(cells.len());
        for (expected, (depth, value)) in cells.into_iter().enumerate() {
            let expected = expected as i32;
            if depth >= 0 && depth < expected {
                return Err(LogCorruption::DuplicateDepth { epoch, depth });
            }
            if depth != expected {
                return Err(LogCorruption::DepthGap {
                    epoch,
                    expected,
                    found: depth,
                });
            }
            values.push(value);
        }

        snapshots.push_back(StackSnapshot::new(epoch, values));
        previous = Some(epoch);
    }

    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(epoch: u64, depth: i32, value: f64) -> SnapshotRow {
        SnapshotRow { epoch, depth, value }
    }

    #[test]
    fn test_new_store_is_empty_at_epoch_zero() {
        let store = EpochStore::new();
        assert_eq!(store.last_epoch(), 0);
        assert!(store.current().is_empty());
        assert_eq!(store.pending(), 0);
        assert!(!store.is_journaling());
    }

    #[test]
    fn test_unjournaled_store_stays_bounded() {
        let mut store = EpochStore::new();
        for i in 0..1000 {
            store.append(vec![i as f64]);
            store.record_pad(&Pad::new());
        }
        store.rollback();

        assert_eq!(store.pending(), 0);
        assert_eq!(store.retained(), RETAINED_EPOCHS as usize);
    }

    #[test]
    fn test_start_journal_rewrites_storage() {
        let mut store = EpochStore::new();
        store.append(vec![1.0]);
        store.start_journal();

        assert_eq!(store.pop_command(), Some(PersistCommand::Reset));
        assert_eq!(
            store.pop_command(),
            Some(PersistCommand::Append(StackSnapshot::new(0, Vec::new())))
        );
        assert_eq!(
            store.pop_command(),
            Some(PersistCommand::Append(StackSnapshot::new(1, vec![1.0])))
        );
        assert_eq!(store.pending(), 0);

        // Starting again changes nothing, later effects are journaled
        store.start_journal();
        store.rollback();
        assert_eq!(store.pop_command(), Some(PersistCommand::Rollback { epoch: 1 }));
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn test_restored_store_is_already_stored() {
        let mut store = EpochStore::restore([row(0, EMPTY_DEPTH, 0.0), row(1, 0, 5.0)]);
        assert_eq!(store.current().values(), &[5.0]);

        store.start_journal();
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn test_corrupt_restore_resets_storage() {
        let mut store = EpochStore::restore([row(0, EMPTY_DEPTH, 0.0), row(0, 0, 5.0)]);
        assert!(store.current().is_empty());

        store.start_journal();
        assert_eq!(store.peek_command(), Some(&PersistCommand::Reset));
    }

    #[test]
    fn test_empty_snapshot_has_sentinel_row() {
        let rows: Vec<_> = StackSnapshot::new(4, Vec::new()).rows().collect();
        assert_eq!(rows, vec![row(4, EMPTY_DEPTH, 0.0)]);

        let rows: Vec<_> = StackSnapshot::new(5, vec![2.0, 1.0]).rows().collect();
        assert_eq!(rows, vec![row(5, 0, 2.0), row(5, 1, 1.0)]);
    }

    #[test]
    fn test_rollback_at_oldest() {
        let mut store = EpochStore::new();
        assert!(store.rollback());

        store.append(vec![1.0]);
        assert!(!store.rollback());
        assert!(store.rollback());
        assert_eq!(store.last_epoch(), 0);
    }

    #[test]
    fn test_prune_keeps_window() {
        let mut store = EpochStore::new();
        for i in 1..=40 {
            store.append(vec![i as f64]);
        }

        assert_eq!(store.last_epoch(), 40);
        assert_eq!(store.first_epoch(), 10);
        assert_eq!(store.retained(), 31);
    }

    #[test]
    fn test_prune_never_drops_current() {
        let mut store = EpochStore::new();
        store.append(vec![1.0]);
        store.prune(500);

        assert_eq!(store.retained(), 1);
        assert_eq!(store.current().values(), &[1.0]);
    }

    #[test]
    fn test_rebuild_rejects_gaps() {
        let gap = [row(1, 0, 1.0), row(1, 2, 3.0)];
        assert_eq!(
            rebuild(gap),
            Err(LogCorruption::DepthGap { epoch: 1, expected: 1, found: 2 })
        );

        let duplicate = [row(1, 0, 1.0), row(1, 0, 3.0)];
        assert_eq!(
            rebuild(duplicate),
            Err(LogCorruption::DuplicateDepth { epoch: 1, depth: 0 })
        );

        let skipped = [row(1, EMPTY_DEPTH, 0.0), row(3, EMPTY_DEPTH, 0.0)];
        assert_eq!(
            rebuild(skipped),
            Err(LogCorruption::EpochGap { previous: 1, found: 3 })
        );
    }

    #[test]
    fn test_rebuild_rejects_stray_sentinel() {
        let mixed = [row(0, EMPTY_DEPTH, 0.0), row(0, 0, 5.0)];
        assert_eq!(rebuild(mixed), Err(LogCorruption::SentinelWithValues { epoch: 0 }));

        let doubled = [row(0, EMPTY_DEPTH, 0.0), row(0, EMPTY_DEPTH, 0.0)];
        assert_eq!(
            rebuild(doubled),
            Err(LogCorruption::DuplicateDepth { epoch: 0, depth: EMPTY_DEPTH })
        );
    }
}
