pub mod persist;
pub mod store;

pub use persist::{
    persist_task, MemoryBackend, PersistChannel, PersistMessage, PersistProgress, Persister, SnapshotBackend,
};
pub use store::{EpochStore, PersistCommand, SnapshotRow, StackSnapshot};
