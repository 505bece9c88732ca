use crate::{Hash256, OutPoint};
use std::fmt;

/// Shape of a transaction output's locking script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptKind {
    /// `OP_DUP OP_HASH160 <20B> OP_EQUALVERIFY OP_CHECKSIG`
    PubkeyHash,
    /// `<pubkey> OP_CHECKSIG`
    /// <https://en.bitcoin.it/wiki/Script#Obsolete_pay-to-pubkey_transaction>
    Pubkey,
    /// `OP_HASH160 <20B> OP_EQUAL`
    ScriptHash,
    /// `OP_RETURN ...`, provably unspendable.
    Data,
    /// `OP_HASH256 ... OP_EQUAL`, spendable by solving a hash puzzle.
    Puzzle,
    /// Zero-length script, the marker output of coin-stake transactions.
    Empty,
    NonStandard,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptKind::PubkeyHash => "p2pkh",
            ScriptKind::Pubkey => "p2pk",
            ScriptKind::ScriptHash => "p2sh",
            ScriptKind::Data => "data",
            ScriptKind::Puzzle => "puzzle",
            ScriptKind::Empty => "empty",
            ScriptKind::NonStandard => "non-standard",
        };
        f.write_str(name)
    }
}

/// A transaction input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    /// The output being spent. Null txid + index `0xffffffff` means no
    /// output is claimed (a coinbase input).
    pub prev_out: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl TxInput {
    /// Whether this input spends an earlier output.
    pub fn claims_output(&self) -> bool {
        !(self.prev_out.txid.is_null() && self.prev_out.vout == u32::MAX)
    }
}

/// A transaction output, with its script already classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    pub amount: i64,
    pub script_pubkey: Vec<u8>,
    /// Base58 address derived from the script, or empty when the script
    /// kind does not resolve to one.
    pub address: String,
    pub kind: ScriptKind,
}

impl TxOutput {
    /// The empty output: zero value and a zero-length script. Coin-stake
    /// transactions carry one as their first output.
    pub fn is_empty(&self) -> bool {
        self.amount == 0 && self.script_pubkey.is_empty()
    }
}

/// How a transaction mints or moves coins.
///
/// The chain starts with proof-of-work blocks whose single coinbase mints
/// the reward, later switches to proof-of-stake where the coinbase pays a
/// staker and a node, and finally to an extended staking form whose reward
/// transaction also claims the staked output. Shape alone decides the kind;
/// no phase ordering is assumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxKind {
    PowCoinbase,
    PosCoinbase,
    PosCoinbaseExt,
    Regular,
}

impl TxKind {
    /// Coinbase kinds mint their outputs; their inputs claim nothing and
    /// are skipped by balance accounting. The extended staking form does
    /// claim a real output and is deliberately not listed here.
    pub fn is_minting(&self) -> bool {
        matches!(self, TxKind::PowCoinbase | TxKind::PosCoinbase)
    }
}

/// A deserialized transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub locktime: u32,
    /// Double SHA-256 of the transaction's serialized bytes.
    pub hash: Hash256,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
}

impl Transaction {
    pub fn kind(&self) -> TxKind {
        let claims = match self.vin.first() {
            Some(vin) => vin.claims_output(),
            None => return TxKind::Regular,
        };
        match (self.vin.len(), self.vout.len()) {
            (1, 1) if !claims => TxKind::PowCoinbase,
            (1, 2) if !claims && !self.vout[0].is_empty() => TxKind::PosCoinbase,
            (1, n) if n >= 3 && claims && self.vout[0].is_empty() => TxKind::PosCoinbaseExt,
            _ => TxKind::Regular,
        }
    }

    /// Coin-stake marker: a claiming first input and an empty first output.
    /// The second transaction of a proof-of-stake block has this shape, and
    /// its presence means the block carries a trailing signature blob.
    pub fn is_coin_stake(&self) -> bool {
        match self.vin.first() {
            Some(vin) => {
                vin.claims_output() && self.vout.len() > 1 && self.vout[0].is_empty()
            }
            None => false,
        }
    }
}
