use crate::{Hash256, Header, Transaction};

/// A fully deserialized block record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// Byte offset of the block payload inside its `blk*.dat` file.
    pub file_offset: u64,
    /// Main-chain height. Zero until assigned by chain linking.
    pub height: u64,
    /// The record's declared payload size from the on-disk framing.
    pub declared_size: u32,
    /// Block id: quark or double SHA-256 of the header, depending on the
    /// header version.
    pub hash: Hash256,
    pub header: Header,
    pub txns: Vec<Transaction>,
    /// Block signature written by the staker of a proof-of-stake block.
    /// Parsed for framing fidelity; nothing downstream interprets it.
    pub signee: Vec<u8>,
    /// Hash of the block's successor on the main chain. Null until chain
    /// linking, and null on the working tip afterwards.
    pub next_hash: Hash256,
}

impl Block {
    pub fn new(
        file_offset: u64,
        declared_size: u32,
        hash: Hash256,
        header: Header,
        txns: Vec<Transaction>,
        signee: Vec<u8>,
    ) -> Self {
        Block {
            file_offset,
            height: 0,
            declared_size,
            hash,
            header,
            txns,
            signee,
            next_hash: Hash256::ZERO,
        }
    }
}
