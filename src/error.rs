// Error types shared by the formatters, the calculator and the undo log

use thiserror::Error;

/// Malformed numeric text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    #[error("nothing to parse")]
    Empty,
    #[error("malformed number")]
    Malformed,
    #[error("hex input takes bare digits without a 0x prefix")]
    HexPrefix,
    #[error("hex input must be a whole number")]
    Fractional,
    #[error("zero denominator")]
    ZeroDenominator,
    #[error("number out of range")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalcError {
    #[error("cannot parse entry: {0}")]
    Parse(#[from] ParseError),
    #[error("stack underflow: need {needed} values, have {depth}")]
    StackUnderflow { needed: usize, depth: usize },
    #[error("entry too long")]
    PadFull,
}

/// Inconsistent snapshot rows read back from storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogCorruption {
    #[error("epoch {found} follows epoch {previous}")]
    EpochGap { previous: u64, found: u64 },
    #[error("epoch {epoch} is missing depth {expected}, found {found}")]
    DepthGap { epoch: u64, expected: i32, found: i32 },
    #[error("epoch {epoch} has depth {depth} twice")]
    DuplicateDepth { epoch: u64, depth: i32 },
    #[error("epoch {epoch} has both the empty-stack row and values")]
    SentinelWithValues { epoch: u64 },
}
