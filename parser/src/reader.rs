use crate::error::ParseError;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use znn_types::{Hash160, Hash256};

/// Hard cap on any script or vector length in the block format.
/// Mirrors the node's serialization limit.
pub const MAX_VECTOR_SIZE: u64 = 0x0200_0000;

const FLAG_SIZE_IS_U16: u8 = 0xfd;
const FLAG_SIZE_IS_U32: u8 = 0xfe;
const FLAG_SIZE_IS_U64: u8 = 0xff;

/// Typed little-endian reads over an in-memory block record.
///
/// The reader owns a borrowed view of the whole record, so callers can take
/// back the exact byte range a structure was parsed from (`bytes`) and hash
/// it without re-serializing.
pub struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader {
            cursor: Cursor::new(data),
        }
    }

    /// The underlying buffer, independent of the current position.
    pub fn bytes(&self) -> &'a [u8] {
        self.cursor.get_ref()
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Bytes left between the current position and the end of the buffer.
    pub fn remaining(&self) -> u64 {
        (self.bytes().len() as u64).saturating_sub(self.cursor.position())
    }

    pub fn seek(&mut self, position: u64) {
        self.cursor.set_position(position);
    }

    /// Moves the position by a signed distance from where it is now.
    pub fn seek_relative(&mut self, offset: i64) {
        let position = self.cursor.position() as i64 + offset;
        self.cursor.set_position(position.max(0) as u64);
    }

    /// Advances the position by `n` bytes without reading them.
    pub fn skip(&mut self, n: u64) -> Result<(), ParseError> {
        let target = self.cursor.position() + n;
        if target > self.bytes().len() as u64 {
            return Err(self.truncated());
        }
        self.cursor.set_position(target);
        Ok(())
    }

    fn truncated(&self) -> ParseError {
        ParseError::Truncated(self.cursor.position())
    }

    pub fn read_u8(&mut self) -> Result<u8, ParseError> {
        self.cursor.read_u8().map_err(|_| self.truncated())
    }

    pub fn read_i8(&mut self) -> Result<i8, ParseError> {
        self.cursor.read_i8().map_err(|_| self.truncated())
    }

    pub fn read_u16(&mut self) -> Result<u16, ParseError> {
        self.cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    pub fn read_i16(&mut self) -> Result<i16, ParseError> {
        self.cursor
            .read_i16::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        self.cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    pub fn read_u64(&mut self) -> Result<u64, ParseError> {
        self.cursor
            .read_u64::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    pub fn read_i32(&mut self) -> Result<i32, ParseError> {
        self.cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    pub fn read_i64(&mut self) -> Result<i64, ParseError> {
        self.cursor
            .read_i64::<LittleEndian>()
            .map_err(|_| self.truncated())
    }

    /// Reads 32 raw bytes. Hash fields are stored as-is, no byte swapping.
    pub fn read_hash256(&mut self) -> Result<Hash256, ParseError> {
        let mut bytes = [0u8; 32];
        self.cursor
            .read_exact(&mut bytes)
            .map_err(|_| self.truncated())?;
        Ok(Hash256::from_bytes(bytes))
    }

    /// Reads 20 raw bytes.
    pub fn read_hash160(&mut self) -> Result<Hash160, ParseError> {
        let mut bytes = [0u8; 20];
        self.cursor
            .read_exact(&mut bytes)
            .map_err(|_| self.truncated())?;
        Ok(Hash160::from_bytes(bytes))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, ParseError> {
        if n as u64 > self.remaining() {
            return Err(self.truncated());
        }
        let mut buf = vec![0u8; n];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| self.truncated())?;
        Ok(buf)
    }

    /// Decodes the variable-length size prefix used for every script and
    /// vector in the block format.
    ///
    /// The first byte selects the width: values below 0xfd stand for
    /// themselves, 0xfd announces a u16, 0xfe a u32. The 0xff (u64) form is
    /// rejected outright; it conflicts with the vector cap. Widened forms
    /// must encode a value that would not have fit the narrower form, so
    /// e.g. `fd 05 00` is rejected as non-canonical.
    pub fn read_compact_size(&mut self) -> Result<u64, ParseError> {
        let flag = self.read_u8()?;
        let (value, flagged_minsize) = match flag {
            FLAG_SIZE_IS_U64 => return Err(ParseError::OversizedLength),
            FLAG_SIZE_IS_U32 => (self.read_u32()? as u64, 0x10000),
            FLAG_SIZE_IS_U16 => (self.read_u16()? as u64, 253),
            short => (short as u64, 0),
        };
        if value < flagged_minsize || value > MAX_VECTOR_SIZE {
            return Err(ParseError::InvalidLength(value));
        }
        Ok(value)
    }

    /// Reads a compact-size length followed by that many bytes.
    pub fn read_sized_bytes(&mut self) -> Result<Vec<u8>, ParseError> {
        let len = self.read_compact_size()?;
        self.read_bytes(len as usize)
    }
}
