use thiserror::Error;
use znn_types::{Hash256, OutPoint};

/// Failures while deserializing a block record.
///
/// All of these are fatal for the file being parsed; the driver drops the
/// rest of that file and moves on to the next one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A compact-size prefix announced a 64-bit length, which no field in
    /// the block format is allowed to carry.
    #[error("64-bit length prefix is not valid in a block record")]
    OversizedLength,

    /// A compact-size value was non-canonical or above the vector cap.
    #[error("invalid vector length {0}")]
    InvalidLength(u64),

    /// A read ran past the end of the record.
    #[error("unexpected end of record at offset {0}")]
    Truncated(u64),

    /// A transaction output carried a negative amount.
    #[error("negative output amount {0}")]
    NegativeAmount(i64),

    /// The parsed block did not consume exactly its declared size.
    #[error("block consumed {actual} bytes but declared {declared}")]
    SizeMismatch { declared: u32, actual: u64 },

    /// The script kind carries no spending address.
    #[error("no address for a {0} script")]
    UnknownScript(znn_types::ScriptKind),
}

/// Failures while reconstructing the main chain from parsed blocks.
/// Any of these aborts the whole run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    /// A backlink pointed at a block that was never parsed.
    #[error("ancestry broken: predecessor of {0} is not known")]
    BrokenAncestry(Hash256),

    /// The reverse walk hit a block without a predecessor that is not the
    /// genesis block.
    #[error("reached rootless block {0}, which is not genesis")]
    MissingGenesis(Hash256),

    /// The forward walk did not terminate at the working tip.
    #[error("forward walk ended at {0} instead of the working tip")]
    UnreachableTip(Hash256),
}

/// Failures while computing the balance snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    /// An input claimed an outpoint that no processed block created.
    #[error("input claims unknown outpoint {0}")]
    DanglingInput(OutPoint),

    /// An address balance fell below zero. Only raised when the caller
    /// opted into strict balance checking.
    #[error("balance of {address} fell to {balance}")]
    NegativeBalance { address: String, balance: i64 },
}
