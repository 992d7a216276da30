// Calculator session: the single owner of a calculator and its undo log
// Persistence and observers hang off channels, the session never waits on them

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{ImmediatePublisher, PubSubChannel};
use log::info;

use crate::error::CalcError;
use crate::modes::calculator::{Calculator, Operation, Outcome};
use crate::modes::{FormatState, Text};
use crate::tasks::persist::{Persister, SnapshotBackend};
use crate::tasks::store::{EpochStore, StackSnapshot};

/// Snapshots an observer may fall behind by before it starts missing them
pub const NOTIFY_DEPTH: usize = 4;

/// Observers per session
pub const MAX_OBSERVERS: usize = 4;

/// Current-stack notifications, one message per change
pub type SnapshotChannel = PubSubChannel<CriticalSectionRawMutex, StackSnapshot, NOTIFY_DEPTH, MAX_OBSERVERS, 1>;

type SnapshotPublisher<'a> =
    ImmediatePublisher<'a, CriticalSectionRawMutex, StackSnapshot, NOTIFY_DEPTH, MAX_OBSERVERS, 1>;

pub struct Session<'a> {
    calculator: Calculator,
    store: EpochStore,
    persister: Option<Persister<'a>>,
    notifier: Option<SnapshotPublisher<'a>>,
}

impl<'a> Session<'a> {
    /// Empty stack, default format, nothing persisted
    pub fn new() -> Self {
        info!("Session started at epoch 0");
        Self::from_parts(Calculator::new(), EpochStore::new())
    }

    /// Pick up where a stored session left off. A corrupt log restarts empty,
    /// the stored pad is kept either way.
    pub fn restore<B: SnapshotBackend>(backend: &B, format: FormatState) -> Result<Self, B::Error> {
        let store = EpochStore::restore(backend.rows()?);
        let calculator = Calculator::with_state(backend.pad()?, format);

        info!("Session resumed at epoch {}", store.last_epoch());
        Ok(Self::from_parts(calculator, store))
    }

    fn from_parts(calculator: Calculator, store: EpochStore) -> Self {
        Self {
            calculator,
            store,
            persister: None,
            notifier: None,
        }
    }

    /// Persist through `persister` from now on. Storage that does not hold
    /// this session's log yet is rewritten first.
    pub fn with_persister(mut self, mut persister: Persister<'a>) -> Self {
        self.store.start_journal();
        self.calculator.record_pad(&mut self.store);
        persister.forward(&mut self.store);
        self.persister = Some(persister);
        self
    }

    /// Publish the current snapshot on `channel` after every change
    pub fn with_notifications(mut self, channel: &'a SnapshotChannel) -> Self {
        self.notifier = Some(channel.immediate_publisher());
        self
    }

    pub fn apply(&mut self, op: Operation) -> Result<Outcome, CalcError> {
        let before = self.store.current().clone();
        let result = self.calculator.apply(&mut self.store, op);

        if let Some(persister) = &mut self.persister {
            persister.forward(&mut self.store);
        }

        let current = self.store.current();
        if current.epoch() != before.epoch() || !current.shares_values(&before) {
            if let Some(notifier) = &self.notifier {
                notifier.publish_immediate(current.clone());
            }
        }

        result
    }

    pub fn calculator(&self) -> &Calculator {
        &self.calculator
    }

    pub fn store(&self) -> &EpochStore {
        &self.store
    }

    pub fn current(&self) -> &StackSnapshot {
        self.store.current()
    }

    pub fn pad(&self) -> &str {
        self.calculator.pad()
    }

    pub fn format(&self) -> &FormatState {
        self.calculator.format()
    }

    /// Rendered stack value at `depth`
    pub fn display(&self, depth: usize) -> Option<Text> {
        self.calculator.display(&self.store, depth)
    }

    /// Hand every journaled command to the persistence queue, waiting for
    /// room if it is full
    pub async fn flush(&mut self) {
        if let Some(persister) = &mut self.persister {
            persister.flush(&mut self.store).await;
        }
    }

    /// Flush, then stop the persistence task
    pub async fn close(mut self) {
        self.flush().await;

        if let Some(persister) = &self.persister {
            persister.shutdown().await;
        }
    }
}

impl Default for Session<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::calculator::ops;

    #[test]
    fn test_publishes_changes_only() {
        let channel = SnapshotChannel::new();
        let mut observer = channel.subscriber().unwrap();
        let mut session = Session::new().with_notifications(&channel);

        session.apply(Operation::Push(2.0)).unwrap();
        session.apply(Operation::Binary(ops::add)).unwrap();
        session.apply(Operation::PadAppend('5')).unwrap();

        let snapshot = observer.try_next_message_pure().unwrap();
        assert_eq!(snapshot.values(), &[2.0]);
        assert!(observer.try_next_message_pure().is_none());
    }

    #[test]
    fn test_no_journal_without_persister() {
        let mut session = Session::new();
        session.apply(Operation::Push(1.0)).unwrap();
        assert_eq!(session.store().pending(), 0);
        assert_eq!(session.display(0).as_deref(), Some("1"));
    }
}
