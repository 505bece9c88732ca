use crate::error::ParseError;
use crate::hash::sha256d;
use crate::reader::ByteReader;
use crate::script;
use znn_types::{ChainParams, OutPoint, Transaction, TxInput, TxOutput};

/// Reads one transaction from the current position.
///
/// Outputs are classified as they are read, and the transaction hash is the
/// double SHA-256 of exactly the bytes consumed here, taken back from the
/// source buffer rather than re-serialized.
pub fn read_transaction(
    reader: &mut ByteReader<'_>,
    params: &ChainParams,
) -> Result<Transaction, ParseError> {
    let tx_begin = reader.position() as usize;

    let version = reader.read_i32()?;

    // Capacity bounded by what the record could possibly hold (an input
    // takes at least 41 bytes, an output at least 9), so a garbage count
    // fails on read instead of on allocation.
    let vin_count = reader.read_compact_size()? as usize;
    let mut vin = Vec::with_capacity(vin_count.min(reader.remaining() as usize / 41));
    for _ in 0..vin_count {
        vin.push(read_input(reader)?);
    }

    let vout_count = reader.read_compact_size()? as usize;
    let mut vout = Vec::with_capacity(vout_count.min(reader.remaining() as usize / 9));
    for _ in 0..vout_count {
        vout.push(read_output(reader, params)?);
    }

    let locktime = reader.read_u32()?;

    let tx_end = reader.position() as usize;
    let hash = sha256d(&reader.bytes()[tx_begin..tx_end]);

    Ok(Transaction {
        version,
        locktime,
        hash,
        vin,
        vout,
    })
}

// A serialized input is an outpoint (claimed tx hash and output index),
// a length-prefixed signature script, and the sequence field.
fn read_input(reader: &mut ByteReader<'_>) -> Result<TxInput, ParseError> {
    let txid = reader.read_hash256()?;
    let vout = reader.read_u32()?;
    let script_sig = reader.read_sized_bytes()?;
    let sequence = reader.read_u32()?;
    Ok(TxInput {
        prev_out: OutPoint::new(txid, vout),
        script_sig,
        sequence,
    })
}

fn read_output(
    reader: &mut ByteReader<'_>,
    params: &ChainParams,
) -> Result<TxOutput, ParseError> {
    let amount = reader.read_i64()?;
    if amount < 0 {
        return Err(ParseError::NegativeAmount(amount));
    }
    let script_pubkey = reader.read_sized_bytes()?;
    let (kind, address) = script::evaluate(&script_pubkey, params);
    Ok(TxOutput {
        amount,
        script_pubkey,
        address,
        kind,
    })
}
