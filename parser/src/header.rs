use crate::error::ParseError;
use crate::hash::HeaderHasher;
use crate::reader::ByteReader;
use znn_types::{Hash256, Header};

/// Reads a header from the current position.
///
/// The accumulator checkpoint field exists on disk only for versions above
/// 3; earlier headers leave it null.
pub fn read_header(reader: &mut ByteReader<'_>) -> Result<Header, ParseError> {
    let version = reader.read_i32()?;
    let prev_hash = reader.read_hash256()?;
    let merkle_root = reader.read_hash256()?;
    let time = reader.read_u32()?;
    let bits = reader.read_u32()?;
    let nonce = reader.read_u32()?;
    let accumulator_checkpoint = if version > 3 {
        reader.read_hash256()?
    } else {
        Hash256::ZERO
    };
    Ok(Header {
        version,
        prev_hash,
        merkle_root,
        time,
        bits,
        nonce,
        accumulator_checkpoint,
    })
}

/// Reads a header and computes its block id from the source bytes.
///
/// Legacy headers (version < 4) are quark-hashed over their 80 bytes;
/// version 4 onward is double SHA-256 over all 112. The hash input is the
/// byte range the header was parsed from, so no re-serialization happens.
pub fn read_and_hash<H: HeaderHasher>(
    reader: &mut ByteReader<'_>,
    hasher: &H,
) -> Result<(Header, Hash256), ParseError> {
    let start = reader.position() as usize;
    let header = read_header(reader)?;
    let raw = &reader.bytes()[start..start + header.serialized_len()];
    let hash = if header.is_legacy() {
        hasher.quark(raw)
    } else {
        hasher.sha256d(raw)
    };
    Ok((header, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{sha256d, Sha256dHasher};
    use assert_matches::assert_matches;

    fn sample_header(version: i32) -> Header {
        Header {
            version,
            prev_hash: Hash256::from_bytes([0x11; 32]),
            merkle_root: Hash256::from_bytes([0x22; 32]),
            time: 1553069000,
            bits: 0x1e0ffff0,
            nonce: 42,
            accumulator_checkpoint: if version > 3 {
                Hash256::from_bytes([0x33; 32])
            } else {
                Hash256::ZERO
            },
        }
    }

    #[test]
    fn roundtrip_both_layouts() {
        for version in [1, 3, 4, 5] {
            let header = sample_header(version);
            let mut bytes = Vec::new();
            header.write_to(&mut bytes);

            let mut reader = ByteReader::new(&bytes);
            let parsed = read_header(&mut reader).unwrap();
            assert_eq!(parsed, header);
            assert_eq!(reader.position() as usize, header.serialized_len());
        }
    }

    #[test]
    fn legacy_hash_covers_80_bytes_via_quark() {
        struct MarkingHasher;
        impl HeaderHasher for MarkingHasher {
            fn quark(&self, data: &[u8]) -> Hash256 {
                assert_eq!(data.len(), 80);
                Hash256::from_bytes([0xaa; 32])
            }
        }

        let header = sample_header(2);
        let mut bytes = Vec::new();
        header.write_to(&mut bytes);
        // Trailing bytes past the header must not leak into the hash.
        bytes.extend_from_slice(&[0xff; 16]);

        let mut reader = ByteReader::new(&bytes);
        let (_, hash) = read_and_hash(&mut reader, &MarkingHasher).unwrap();
        assert_eq!(hash, Hash256::from_bytes([0xaa; 32]));
        assert_eq!(reader.position(), 80);
    }

    #[test]
    fn modern_hash_covers_112_bytes_via_sha256d() {
        let header = sample_header(4);
        let mut bytes = Vec::new();
        header.write_to(&mut bytes);
        bytes.extend_from_slice(&[0xff; 16]);

        let mut reader = ByteReader::new(&bytes);
        let (parsed, hash) = read_and_hash(&mut reader, &Sha256dHasher).unwrap();
        assert_eq!(parsed.accumulator_checkpoint, Hash256::from_bytes([0x33; 32]));
        assert_eq!(hash, sha256d(&bytes[..112]));
        assert_eq!(reader.position(), 112);
    }

    #[test]
    fn rereading_source_bytes_reproduces_the_hash() {
        let header = sample_header(4);
        let mut bytes = Vec::new();
        header.write_to(&mut bytes);

        let first = read_and_hash(&mut ByteReader::new(&bytes), &Sha256dHasher)
            .unwrap()
            .1;
        let second = read_and_hash(&mut ByteReader::new(&bytes), &Sha256dHasher)
            .unwrap()
            .1;
        assert_eq!(first, second);
    }

    #[test]
    fn truncated_header_fails() {
        let header = sample_header(4);
        let mut bytes = Vec::new();
        header.write_to(&mut bytes);
        bytes.truncate(100);

        let mut reader = ByteReader::new(&bytes);
        assert_matches!(read_header(&mut reader), Err(ParseError::Truncated(_)));
    }
}
