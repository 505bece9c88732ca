use crate::{Hash256, Header};

/// Chain-specific constants: on-disk framing, address encoding and the
/// genesis anchor. Tests substitute their own instance.
#[derive(Clone, Debug)]
pub struct ChainParams {
    /// Four-byte sentinel separating block records in `blk*.dat` files.
    pub magic: [u8; 4],
    /// Smallest payload a record may declare (a bare legacy header).
    pub min_block_size: u32,
    /// Largest payload a record may declare.
    pub max_block_size: u32,
    /// Base58 version byte for pay-to-pubkey(-hash) addresses.
    pub pubkey_address_prefix: u8,
    /// Base58 version byte for pay-to-script-hash addresses.
    pub script_address_prefix: u8,
    pub genesis_hash: Hash256,
    pub genesis_header: Header,
}

/// The Zenon main network.
pub const MAINNET: ChainParams = ChainParams {
    magic: [0xb1, 0x3b, 0x2d, 0xf6],
    min_block_size: 80,
    max_block_size: 2_000_000,
    pubkey_address_prefix: 80,
    script_address_prefix: 15,
    genesis_hash: Hash256::from_bytes([
        0xee, 0x92, 0x0f, 0x57, 0xe0, 0xe0, 0x43, 0x82, 0x5a, 0xd3, 0xc3, 0x37, 0xd8, 0x35,
        0x28, 0x6f, 0x7c, 0x5d, 0x44, 0x3e, 0xe4, 0x0b, 0xa8, 0xcc, 0xf5, 0xfa, 0x1d, 0x8e,
        0x42, 0x0c, 0x00, 0x00,
    ]),
    genesis_header: Header {
        version: 1,
        prev_hash: Hash256::ZERO,
        merkle_root: Hash256::from_bytes([
            0x0c, 0xff, 0xfe, 0x9f, 0xa0, 0xe9, 0x54, 0xdc, 0x31, 0xb0, 0xcf, 0x5f, 0x23,
            0xc0, 0xff, 0xf0, 0x54, 0x25, 0x9d, 0xdb, 0x23, 0xfa, 0x53, 0x0c, 0xd8, 0x85,
            0x97, 0x3b, 0x63, 0x2f, 0x29, 0xa9,
        ]),
        time: 1553068993,
        bits: 0x1e0ffff0,
        nonce: 176725,
        accumulator_checkpoint: Hash256::ZERO,
    },
};
