use crate::Hash256;

/// A deserialized block header.
///
/// Headers come in two wire sizes. Versions below 4 are the classic 80-byte
/// Bitcoin layout; version 4 appended a 32-byte zerocoin accumulator
/// checkpoint, giving 112 bytes. The version also selects the hash primitive
/// used for the block id (quark for the legacy layout, double SHA-256 for
/// the extended one).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Header {
    pub version: i32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
    /// Only meaningful when `version > 3`; implicitly null before that.
    pub accumulator_checkpoint: Hash256,
}

impl Header {
    /// Whether this header uses the 80-byte layout and the quark block id.
    pub fn is_legacy(&self) -> bool {
        self.version < 4
    }

    /// Number of bytes this header occupies on disk.
    pub fn serialized_len(&self) -> usize {
        if self.is_legacy() {
            80
        } else {
            112
        }
    }

    /// Appends the wire encoding of this header to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(self.prev_hash.as_bytes());
        out.extend_from_slice(self.merkle_root.as_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.bits.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        if !self.is_legacy() {
            out.extend_from_slice(self.accumulator_checkpoint.as_bytes());
        }
    }
}
