//! Reconstruction of the Zenon main chain from raw `blk*.dat` files and
//! computation of per-address balance snapshots.
//!
//! The pipeline runs leaves-first: [`scanner::FileScanner`] locates record
//! boundaries by magic pattern, [`datfile::Datfile`] parses each record
//! through the header, transaction and block codecs, [`chain::ChainLinker`]
//! rebuilds the unique genesis-to-tip chain out of the unordered block set
//! (dropping orphans from abandoned forks), and [`snapshot::SnapshotEngine`]
//! folds the linear chain into an address-to-balance mapping.
//!
//! Everything is synchronous and single-owner; blocks live in one map and
//! are released as the snapshot consumes them.

pub mod block;
pub mod chain;
pub mod datfile;
pub mod error;
pub mod hash;
pub mod header;
pub mod reader;
pub mod scanner;
pub mod script;
pub mod snapshot;
pub mod transaction;

pub use chain::{BlockMap, Chain, ChainLinker};
pub use datfile::Datfile;
pub use error::{ChainError, ParseError, SnapshotError};
pub use hash::{HeaderHasher, Sha256dHasher};
pub use reader::ByteReader;
pub use scanner::FileScanner;
pub use snapshot::{SnapshotEngine, SnapshotSink};
