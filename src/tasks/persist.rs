// Persistence task: drains journaled store commands into a storage backend
// Commands travel through a FIFO channel so storage sees them in program order

use core::convert::Infallible;
use core::fmt::Debug;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Sender, TrySendError};
use log::{debug, error, info, warn};
use portable_atomic::{AtomicU64, Ordering};

use super::store::{EpochStore, PersistCommand, SnapshotRow};
use crate::modes::calculator::Pad;

/// Commands in flight between a session and its persistence task
pub const PERSIST_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum PersistMessage {
    Command(PersistCommand),
    /// Stop the task once everything sent before has been applied
    Shutdown,
}

pub type PersistChannel = Channel<CriticalSectionRawMutex, PersistMessage, PERSIST_QUEUE_DEPTH>;

/// Storage for the undo log and the entry pad.
///
/// Implementations only need to apply commands in the order received and
/// replay what they hold; consistency is checked when the log is restored.
pub trait SnapshotBackend {
    type Error: Debug;

    fn apply(&mut self, command: &PersistCommand) -> Result<(), Self::Error>;

    /// Every stored row, in any order
    fn rows(&self) -> Result<Vec<SnapshotRow>, Self::Error>;

    fn pad(&self) -> Result<Pad, Self::Error>;
}

/// Backend keeping rows in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    rows: Vec<SnapshotRow>,
    pad: Pad,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend preloaded with `rows`, as if read back from disk
    pub fn with_rows(rows: impl IntoIterator<Item = SnapshotRow>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            pad: Pad::new(),
        }
    }
}

impl SnapshotBackend for MemoryBackend {
    type Error = Infallible;

    fn apply(&mut self, command: &PersistCommand) -> Result<(), Self::Error> {
        match command {
            PersistCommand::Append(snapshot) => self.rows.extend(snapshot.rows()),
            PersistCommand::Rollback { epoch } => self.rows.retain(|row| row.epoch != *epoch),
            PersistCommand::Prune { before } => self.rows.retain(|row| row.epoch >= *before),
            PersistCommand::Reset => self.rows.clear(),
            PersistCommand::StorePad(pad) => self.pad = pad.clone(),
        }

        Ok(())
    }

    fn rows(&self) -> Result<Vec<SnapshotRow>, Self::Error> {
        Ok(self.rows.clone())
    }

    fn pad(&self) -> Result<Pad, Self::Error> {
        Ok(self.pad.clone())
    }
}

/// Commands handed to the queue versus commands storage has applied
pub struct PersistProgress {
    queued: AtomicU64,
    applied: AtomicU64,
}

impl PersistProgress {
    pub const fn new() -> Self {
        Self {
            queued: AtomicU64::new(0),
            applied: AtomicU64::new(0),
        }
    }

    fn mark_queued(&self) {
        self.queued.fetch_add(1, Ordering::Release);
    }

    fn mark_applied(&self) {
        self.applied.fetch_add(1, Ordering::Release);
    }

    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Acquire)
    }

    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::Acquire)
    }

    /// Storage has caught up with everything queued so far
    pub fn is_idle(&self) -> bool {
        self.applied() >= self.queued()
    }
}

impl Default for PersistProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending half: moves a store's journal into the persistence channel
pub struct Persister<'a> {
    sender: Sender<'a, CriticalSectionRawMutex, PersistMessage, PERSIST_QUEUE_DEPTH>,
    progress: &'a PersistProgress,
}

impl<'a> Persister<'a> {
    pub fn new(channel: &'a PersistChannel, progress: &'a PersistProgress) -> Self {
        Self {
            sender: channel.sender(),
            progress,
        }
    }

    /// Forward journaled commands without waiting. Stops at a full queue and
    /// leaves the rest journaled, so order holds across calls.
    pub fn forward(&mut self, store: &mut EpochStore) -> usize {
        let mut sent = 0;

        while let Some(command) = store.peek_command() {
            match self.sender.try_send(PersistMessage::Command(command.clone())) {
                Ok(()) => {
                    store.pop_command();
                    self.progress.mark_queued();
                    sent += 1;
                }
                Err(TrySendError::Full(_)) => {
                    warn!("Persistence queue full, {} commands held back", store.pending());
                    break;
                }
            }
        }

        sent
    }

    /// Forward the whole journal, waiting for room in the queue
    pub async fn flush(&mut self, store: &mut EpochStore) {
        while let Some(command) = store.pop_command() {
            self.sender.send(PersistMessage::Command(command)).await;
            self.progress.mark_queued();
        }
    }

    /// Ask the persistence task to stop after what is already queued
    pub async fn shutdown(&self) {
        self.sender.send(PersistMessage::Shutdown).await;
    }
}

/// Apply queued commands to `backend` until shut down.
/// Backend failures are logged and the command is skipped.
pub async fn persist_task<B: SnapshotBackend>(
    channel: &PersistChannel,
    backend: &mut B,
    progress: &PersistProgress,
) {
    info!("Persistence task started");

    let receiver = channel.receiver();

    loop {
        match receiver.receive().await {
            PersistMessage::Command(command) => {
                debug!("Persisting {command:?}");

                if let Err(e) = backend.apply(&command) {
                    error!("Persistence backend failed on {command:?}: {e:?}");
                }
                progress.mark_applied();
            }
            PersistMessage::Shutdown => break,
        }
    }

    info!("Persistence task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::store::{StackSnapshot, RETAINED_EPOCHS};

    #[test]
    fn test_memory_backend_applies_commands() {
        let mut backend = MemoryBackend::new();
        backend.apply(&PersistCommand::Append(StackSnapshot::new(0, Vec::new()))).unwrap();
        backend.apply(&PersistCommand::Append(StackSnapshot::new(1, vec![2.0]))).unwrap();
        backend.apply(&PersistCommand::Append(StackSnapshot::new(2, vec![3.0, 2.0]))).unwrap();
        assert_eq!(backend.rows().unwrap().len(), 4);

        backend.apply(&PersistCommand::Rollback { epoch: 2 }).unwrap();
        backend.apply(&PersistCommand::Prune { before: 1 }).unwrap();
        assert_eq!(
            backend.rows().unwrap(),
            vec![SnapshotRow { epoch: 1, depth: 0, value: 2.0 }]
        );

        backend.apply(&PersistCommand::Reset).unwrap();
        assert!(backend.rows().unwrap().is_empty());
    }

    #[test]
    fn test_forward_holds_back_when_full() {
        let channel = PersistChannel::new();
        let progress = PersistProgress::new();
        let mut persister = Persister::new(&channel, &progress);

        // Reset and the genesis append, then epochs 1..=29 stay inside the
        // retained window so no prune is journaled
        let mut store = EpochStore::new();
        store.start_journal();
        for i in 1..RETAINED_EPOCHS {
            store.append(vec![i as f64]);
        }
        store.record_pad(&Pad::new());
        store.record_pad(&Pad::new());
        assert_eq!(store.pending(), PERSIST_QUEUE_DEPTH + 1);

        assert_eq!(persister.forward(&mut store), PERSIST_QUEUE_DEPTH);
        assert_eq!(store.pending(), 1);
        assert_eq!(store.peek_command(), Some(&PersistCommand::StorePad(Pad::new())));
        assert_eq!(progress.queued(), PERSIST_QUEUE_DEPTH as u64);
        assert!(!progress.is_idle());
    }
}
