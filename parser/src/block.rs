use crate::error::ParseError;
use crate::hash::HeaderHasher;
use crate::header::read_and_hash;
use crate::reader::ByteReader;
use crate::transaction::read_transaction;
use znn_types::{Block, ChainParams};

/// Reads one block payload from the current position.
///
/// `declared_size` is the record's framing size, already consumed by the
/// caller; the parse must account for exactly that many bytes or the record
/// is rejected. Proof-of-stake blocks (recognized by a coin-stake second
/// transaction) carry a trailing length-prefixed block signature.
pub fn read_block<H: HeaderHasher>(
    reader: &mut ByteReader<'_>,
    declared_size: u32,
    hasher: &H,
    params: &ChainParams,
) -> Result<Block, ParseError> {
    let offset = reader.position();

    let (header, hash) = read_and_hash(reader, hasher)?;

    // The smallest possible transaction is around 60 bytes; cap the
    // allocation accordingly in case the count is garbage.
    let tx_count = reader.read_compact_size()? as usize;
    let mut txns = Vec::with_capacity(tx_count.min(reader.remaining() as usize / 60));
    for _ in 0..tx_count {
        txns.push(read_transaction(reader, params)?);
    }

    let signee = if tx_count > 1 && txns[1].is_coin_stake() {
        reader.read_sized_bytes()?
    } else {
        Vec::new()
    };

    let actual = reader.position() - offset;
    if actual != declared_size as u64 {
        return Err(ParseError::SizeMismatch {
            declared: declared_size,
            actual,
        });
    }

    Ok(Block::new(offset, declared_size, hash, header, txns, signee))
}
