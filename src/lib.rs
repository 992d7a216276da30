// Numeric core of the NumCal calculator
// Display modes, the RPN stack with its undo log, and the persistence queue feeding storage

pub mod error;
pub mod modes;
pub mod session;
pub mod tasks;
pub mod utils;

pub use error::{CalcError, LogCorruption, ParseError};
pub use modes::calculator::{ops, Calculator, Operation, Outcome, Pad};
pub use modes::{DisplayMode, FormatState, HexWidth, NumberMode, Text};
pub use session::{Session, SnapshotChannel};
pub use tasks::{EpochStore, StackSnapshot};
