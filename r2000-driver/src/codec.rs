//! Binary codec shared by the recording writer and reader.
//!
//! Integers are stored as a one byte width followed by that many
//! little-endian bytes. Arrays of `u32` are stored as a one byte compression
//! flag, a width-prefixed length and the payload. A compressed payload is a
//! four byte big-endian element count followed by a zlib stream.

use crate::constants::{COMPRESSED_COUNT_SIZE, FIELD_WIDTH};
use crate::error::{R2000Error, Result};
use crate::numeric::{be_u32, from_le_width, le_u32};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use r2000_data::{PacketHeader, HEADER_SIZE};
use std::io::{self, Read, Write};
use tracing::error;

/// Compresses `values` into a count-prefixed zlib stream.
pub fn compress(values: &[u32]) -> Result<Vec<u8>> {
    let count = u32::try_from(values.len()).map_err(|_| {
        R2000Error::Compression(format!("{} elements exceed u32", values.len()))
    })?;

    let mut out = Vec::with_capacity(COMPRESSED_COUNT_SIZE + values.len());
    out.extend_from_slice(&count.to_be_bytes());

    let mut encoder = ZlibEncoder::new(out, Compression::default());
    for v in values {
        encoder
            .write_all(&v.to_le_bytes())
            .map_err(|e| R2000Error::Compression(e.to_string()))?;
    }
    encoder
        .finish()
        .map_err(|e| R2000Error::Compression(e.to_string()))
}

/// Decompresses a payload produced by [`compress`].
///
/// The declared element count bounds the output. A stream that is corrupt or
/// decodes to a different number of elements is an error.
pub fn decompress(data: &[u8]) -> Result<Vec<u32>> {
    if data.len() < COMPRESSED_COUNT_SIZE {
        return Err(R2000Error::Compression(format!(
            "payload of {} bytes has no element count",
            data.len()
        )));
    }
    let count = be_u32(data) as usize;
    let expected_bytes = count as u64 * 4;

    let mut bytes = Vec::new();
    ZlibDecoder::new(&data[COMPRESSED_COUNT_SIZE..])
        .take(expected_bytes + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| R2000Error::Compression(e.to_string()))?;

    if bytes.len() as u64 != expected_bytes {
        return Err(R2000Error::Compression(format!(
            "declared {} elements but decoded {} bytes",
            count,
            bytes.len()
        )));
    }
    Ok(bytes.chunks_exact(4).map(le_u32).collect())
}

/// Like [`decompress`], but reports a failure and yields an empty sequence.
pub fn decompress_or_empty(data: &[u8]) -> Vec<u32> {
    decompress(data).unwrap_or_else(|e| {
        error!(error = %e, "decompression failed, dropping field");
        Vec::new()
    })
}

pub(crate) fn write_uint(out: &mut Vec<u8>, width: u8, value: u64) {
    out.push(width);
    out.extend_from_slice(&value.to_le_bytes()[..width as usize]);
}

pub(crate) fn read_uint<R: Read>(reader: &mut R) -> Result<u64> {
    let mut width = [0u8; 1];
    reader.read_exact(&mut width)?;
    let width = width[0] as usize;
    if width == 0 || width > 8 {
        return Err(invalid_data(format!("invalid integer width {}", width)));
    }
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes[..width])?;
    Ok(from_le_width(&bytes[..width]))
}

fn invalid_data(message: String) -> R2000Error {
    R2000Error::IoError(io::Error::new(io::ErrorKind::InvalidData, message))
}

/// Byte length of `count` elements of `size` bytes each.
fn field_bytes(count: u64, size: u64) -> Result<u64> {
    count
        .checked_mul(size)
        .ok_or_else(|| invalid_data(format!("field length {} overflows", count)))
}

fn read_flag<R: Read>(reader: &mut R) -> Result<bool> {
    let mut flag = [0u8; 1];
    reader.read_exact(&mut flag)?;
    Ok(flag[0] != 0)
}

/// Reads exactly `len` bytes without allocating more than the stream holds.
fn read_bytes<R: Read>(reader: &mut R, len: u64) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.by_ref().take(len).read_to_end(&mut bytes)?;
    if (bytes.len() as u64) < len {
        return Err(R2000Error::IoError(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes, found {}", len, bytes.len()),
        )));
    }
    Ok(bytes)
}

/// Writes an array field. Uncompressed fields store the element count,
/// compressed fields the byte length of the compressed payload.
pub(crate) fn write_u32_field(
    out: &mut Vec<u8>,
    values: &[u32],
    compress_field: bool,
) -> Result<()> {
    if compress_field {
        let compressed = compress(values)?;
        out.push(1);
        write_uint(out, FIELD_WIDTH, compressed.len() as u64);
        out.extend_from_slice(&compressed);
    } else {
        out.push(0);
        write_uint(out, FIELD_WIDTH, values.len() as u64);
        for v in values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    Ok(())
}

/// Reads an array field. A payload that fails to decompress is consumed and
/// reported, and the field comes back empty.
pub(crate) fn read_u32_field<R: Read>(reader: &mut R) -> Result<Vec<u32>> {
    let compressed = read_flag(reader)?;
    let len = read_uint(reader)?;
    if compressed {
        let data = read_bytes(reader, len)?;
        Ok(decompress_or_empty(&data))
    } else {
        let data = read_bytes(reader, field_bytes(len, 4)?)?;
        Ok(data.chunks_exact(4).map(le_u32).collect())
    }
}

/// Writes packet headers, never compressed.
pub(crate) fn write_header_field(out: &mut Vec<u8>, headers: &[PacketHeader]) {
    out.push(0);
    write_uint(out, FIELD_WIDTH, headers.len() as u64);
    for h in headers {
        out.extend_from_slice(&h.to_bytes());
    }
}

pub(crate) fn read_header_field<R: Read>(reader: &mut R) -> Result<Vec<PacketHeader>> {
    // the flag is ignored, headers are always stored raw
    read_flag(reader)?;
    let len = read_uint(reader)?;
    let data = read_bytes(reader, field_bytes(len, HEADER_SIZE as u64)?)?;
    Ok(data
        .chunks_exact(HEADER_SIZE)
        .filter_map(PacketHeader::from_bytes)
        .collect())
}
