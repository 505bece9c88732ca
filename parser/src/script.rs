//! Output script classification and address derivation.
//!
//! References: the node's `script/standard.cpp` (`ExtractDestination`) and
//! <https://en.bitcoin.it/wiki/Script>.

use crate::error::ParseError;
use crate::hash::{hash160, sha256d};
use znn_types::{ChainParams, Hash160, ScriptKind};

pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_HASH256: u8 = 0xaa;
pub const OP_CHECKSIG: u8 = 0xac;

const HASH160_LEN: u8 = 0x14;

// pay-to-pubkey-hash
// <https://en.bitcoin.it/wiki/Script#Standard_Transaction_to_Bitcoin_address_.28pay-to-pubkey-hash.29>
fn is_pkh(script: &[u8]) -> bool {
    script.len() >= 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == HASH160_LEN
        && script[script.len() - 2] == OP_EQUALVERIFY
        && script[script.len() - 1] == OP_CHECKSIG
}

// pay-to-pubkey: a direct push of a 33- or 65-byte key, then OP_CHECKSIG
fn is_pk(script: &[u8]) -> bool {
    if script.len() < 2 || script[0] >= OP_PUSHDATA1 {
        return false;
    }
    let keylen = script[0] as usize;
    (keylen == 33 || keylen == 65)
        && script.len() == keylen + 2
        && script[script.len() - 1] == OP_CHECKSIG
}

// pay-to-scripthash
fn is_p2sh(script: &[u8]) -> bool {
    script.len() == 23
        && script[0] == OP_HASH160
        && script[1] == HASH160_LEN
        && script[22] == OP_EQUAL
}

// spendable by solving a hash puzzle
// <https://en.bitcoin.it/wiki/Script#Transaction_puzzle>
fn is_puzzle(script: &[u8]) -> bool {
    !script.is_empty() && script[0] == OP_HASH256 && script[script.len() - 1] == OP_EQUAL
}

// provably unspendable data carrier
// <https://en.bitcoin.it/wiki/Script#Provably_Unspendable.2FPrunable_Outputs>
fn is_unspendable(script: &[u8]) -> bool {
    !script.is_empty() && script[0] == OP_RETURN
}

/// Classifies an output script. Total: every byte string maps to exactly
/// one kind.
pub fn classify(script: &[u8]) -> ScriptKind {
    if is_pkh(script) {
        ScriptKind::PubkeyHash
    } else if is_pk(script) {
        ScriptKind::Pubkey
    } else if is_p2sh(script) {
        ScriptKind::ScriptHash
    } else if script.is_empty() {
        ScriptKind::Empty
    } else if is_puzzle(script) {
        ScriptKind::Puzzle
    } else if is_unspendable(script) {
        ScriptKind::Data
    } else {
        ScriptKind::NonStandard
    }
}

/// The 20-byte payload behind an address-bearing script. Fails for kinds
/// that do not resolve to an address.
pub fn address_payload(script: &[u8]) -> Result<Hash160, ParseError> {
    match classify(script) {
        ScriptKind::PubkeyHash => {
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&script[3..23]);
            Ok(Hash160::from_bytes(bytes))
        }
        ScriptKind::Pubkey => {
            let keylen = script[0] as usize;
            Ok(hash160(&script[1..1 + keylen]))
        }
        ScriptKind::ScriptHash => {
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&script[2..22]);
            Ok(Hash160::from_bytes(bytes))
        }
        other => Err(ParseError::UnknownScript(other)),
    }
}

/// Base58Check address: version byte, 20-byte payload, then the first four
/// bytes of the payload's double SHA-256.
pub fn encode_address(version: u8, payload: &Hash160) -> String {
    let mut data = Vec::with_capacity(25);
    data.push(version);
    data.extend_from_slice(payload.as_bytes());
    let checksum = sha256d(&data);
    data.extend_from_slice(&checksum.as_bytes()[..4]);
    bs58::encode(data).into_string()
}

/// Classifies a script and derives its spending address in one pass.
/// The address is empty for kinds that do not carry one.
pub fn evaluate(script: &[u8], params: &ChainParams) -> (ScriptKind, String) {
    let kind = classify(script);
    let address = match kind {
        ScriptKind::PubkeyHash | ScriptKind::Pubkey | ScriptKind::ScriptHash => {
            let version = if kind == ScriptKind::ScriptHash {
                params.script_address_prefix
            } else {
                params.pubkey_address_prefix
            };
            let payload = address_payload(script)
                .expect("address-bearing script kinds always yield a payload");
            encode_address(version, &payload)
        }
        _ => String::new(),
    };
    (kind, address)
}
