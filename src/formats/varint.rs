//! Variable-length and fixed-width little-endian integer coding used by
//! the water index container.

use anyhow::{bail, Result};
use std::io::{Read, Write};

/// Number of bytes `write_varint` will emit for `value`.
pub fn varint_len(value: u64) -> usize {
    let mut value = value;
    let mut len = 1;
    while value > 0x7f {
        value >>= 7;
        len += 1;
    }
    len
}

/// Writes an unsigned integer in 7-bit groups, least significant first,
/// high bit marking continuation. Returns the number of bytes written.
pub fn write_varint<W: Write>(writer: &mut W, value: u64) -> Result<usize> {
    let mut value = value;
    let mut buffer = [0u8; 10];
    let mut bytes = 0;

    while value > 0x7f {
        buffer[bytes] = (value & 0x7f) as u8 | 0x80;
        value >>= 7;
        bytes += 1;
    }
    buffer[bytes] = value as u8;
    bytes += 1;

    writer.write_all(&buffer[..bytes])?;
    Ok(bytes)
}

pub fn read_varint<R: Read>(reader: &mut R) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0;

    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;

        if shift >= 64 {
            bail!("Varint longer than 64 bits");
        }

        value |= u64::from(byte[0] & 0x7f) << shift;

        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    Ok(value)
}

/// Minimum number of bytes needed to store `value` as a little-endian
/// integer, at least one.
pub fn bytes_needed(value: u64) -> u8 {
    let mut value = value;
    let mut bytes = 0u8;

    while value != 0 {
        value >>= 8;
        bytes += 1;
    }

    bytes.max(1)
}

/// Writes the low `bytes` bytes of `value`, little-endian.
pub fn write_uint<W: Write>(writer: &mut W, value: u64, bytes: u8) -> Result<()> {
    if bytes == 0 || bytes > 8 {
        bail!("Invalid integer width: {}", bytes);
    }

    let le = value.to_le_bytes();
    writer.write_all(&le[..bytes as usize])?;
    Ok(())
}

pub fn read_uint<R: Read>(reader: &mut R, bytes: u8) -> Result<u64> {
    if bytes == 0 || bytes > 8 {
        bail!("Invalid integer width: {}", bytes);
    }

    let mut buffer = [0u8; 8];
    reader.read_exact(&mut buffer[..bytes as usize])?;
    Ok(u64::from_le_bytes(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_varint_round_trip() {
        for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, u64::from(u32::MAX), u64::MAX] {
            let mut buffer = Vec::new();
            let written = write_varint(&mut buffer, value).unwrap();
            assert_eq!(written, buffer.len());
            assert_eq!(written, varint_len(value));

            let mut cursor = Cursor::new(&buffer);
            assert_eq!(read_varint(&mut cursor).unwrap(), value);
        }
    }

    #[test]
    fn test_varint_lengths() {
        assert_eq!(varint_len(0), 1);
        assert_eq!(varint_len(127), 1);
        assert_eq!(varint_len(128), 2);
        assert_eq!(varint_len(16_383), 2);
        assert_eq!(varint_len(16_384), 3);
    }

    #[test]
    fn test_bytes_needed() {
        assert_eq!(bytes_needed(0), 1);
        assert_eq!(bytes_needed(3), 1);
        assert_eq!(bytes_needed(255), 1);
        assert_eq!(bytes_needed(256), 2);
        assert_eq!(bytes_needed(65_535), 2);
        assert_eq!(bytes_needed(65_536), 3);
    }

    #[test]
    fn test_uint_round_trip() {
        for (value, width) in [(5u64, 1u8), (300, 2), (70_000, 3), (u64::from(u32::MAX), 8)] {
            let mut buffer = Vec::new();
            write_uint(&mut buffer, value, width).unwrap();
            assert_eq!(buffer.len(), width as usize);

            let mut cursor = Cursor::new(&buffer);
            assert_eq!(read_uint(&mut cursor, width).unwrap(), value);
        }
    }

    #[test]
    fn test_uint_invalid_width() {
        let mut buffer = Vec::new();
        assert!(write_uint(&mut buffer, 1, 0).is_err());
        assert!(write_uint(&mut buffer, 1, 9).is_err());
    }
}
