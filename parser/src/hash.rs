use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use znn_types::{Hash160, Hash256};

/// Double SHA-256, the hash behind transaction ids, modern block ids and
/// address checksums.
pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    Hash256::from_bytes(second.into())
}

/// RIPEMD160(SHA256(data)), the payload of pay-to-pubkey addresses.
pub fn hash160(data: &[u8]) -> Hash160 {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    Hash160::from_bytes(ripe.into())
}

/// Block-id hashing for the two header generations.
///
/// Headers below version 4 are hashed with quark, a chained multi-round
/// primitive the node inherits from its PIVX ancestry. No maintained crate
/// provides it, so it enters through this trait: embedders that need to
/// walk legacy history supply their own implementation, typically a binding
/// to the node's hashing library. `sha256d` has a canonical implementation
/// and rarely needs overriding.
pub trait HeaderHasher {
    fn quark(&self, data: &[u8]) -> Hash256;

    fn sha256d(&self, data: &[u8]) -> Hash256 {
        sha256d(data)
    }
}

/// Stand-in hasher that applies double SHA-256 to legacy headers as well.
///
/// Correct for any chain whose whole history uses header version 4 or
/// later, and for synthetic fixtures. On a chain with legacy blocks the
/// computed ids will not match the headers' backlinks, which chain linking
/// reports as broken ancestry rather than producing a wrong snapshot.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256dHasher;

impl HeaderHasher for Sha256dHasher {
    fn quark(&self, data: &[u8]) -> Hash256 {
        sha256d(data)
    }
}
