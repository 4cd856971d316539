//! Reader for the compact binary CMap format (`.bcmap`).
//!
//! The file starts with a header byte (bit 0 is the writing mode) followed by
//! records. Each record starts with a control byte:
//!
//! ```text
//!   7 6 5   4          3 2 1 0
//!   type    sequence   dataSize
//! ```
//!
//! Numbers are stored either raw (`dataSize + 1` bytes) or as 7-bit groups
//! with a continuation bit. Within a record only the first entry is stored in
//! full, the following ones are deltas against the previous entry.

use super::CMapReader;
use crate::cmap::CMap;
use crate::error::{ParseError, Result};
use crate::hex::HexNumber;
use crate::mapping::Mapping;

/// `ceil(16 * 8 / 7)` 7-bit groups are enough for any number.
const MAX_ENCODED_NUM_SIZE: usize = 19;

/// bfchar and bfrange sources are always two byte codes.
const UCS2_WIDTH: usize = 2;

const CODESPACE_RANGE: u8 = 0;
const NOTDEF_RANGE: u8 = 1;
const CID_CHAR: u8 = 2;
const CID_RANGE: u8 = 3;
const BF_CHAR: u8 = 4;
const BF_RANGE: u8 = 5;
const METADATA: u8 = 7;

const METADATA_COMMENT: u8 = 0;
const METADATA_USECMAP: u8 = 1;

struct BinaryCMapStream<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> BinaryCMapStream<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        BinaryCMapStream { buffer, pos: 0 }
    }

    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.buffer.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn read_required_byte(&mut self) -> Result<u8> {
        self.read_byte().ok_or_else(|| ParseError::EndOfInput.into())
    }

    /// Unsigned varint, most significant group first.
    fn read_number(&mut self) -> Result<u32> {
        let mut n = 0u32;
        loop {
            let byte = self.read_required_byte()?;
            if n > u32::MAX >> 7 {
                return Err(ParseError::NumberOverflow.into());
            }
            n = (n << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                return Ok(n);
            }
        }
    }

    /// Zig-zag style signed varint: the low bit selects `!(n >> 1)`.
    fn read_signed(&mut self) -> Result<i64> {
        let n = self.read_number()?;
        if n & 1 != 0 {
            Ok(!((n >> 1) as i64))
        } else {
            Ok((n >> 1) as i64)
        }
    }

    /// Raw number of `num.width()` bytes.
    fn read_hex(&mut self, num: &mut HexNumber) -> Result<()> {
        let width = num.width();
        let bytes = self
            .buffer
            .get(self.pos..self.pos + width)
            .ok_or(ParseError::EndOfInput)?;
        num.as_bytes_mut().copy_from_slice(bytes);
        self.pos += width;
        Ok(())
    }

    /// Number stored as 7-bit groups, most significant group first.
    fn read_hex_number(&mut self, num: &mut HexNumber) -> Result<()> {
        let mut stack = [0u8; MAX_ENCODED_NUM_SIZE];
        let mut sp = 0;
        loop {
            let byte = self.read_required_byte()?;
            if sp == MAX_ENCODED_NUM_SIZE {
                return Err(ParseError::NumberOverflow.into());
            }
            stack[sp] = byte & 0x7F;
            sp += 1;
            if byte & 0x80 == 0 {
                break;
            }
        }
        let mut buffer = 0u32;
        let mut buffer_size = 0u32;
        for byte in num.as_bytes_mut().iter_mut().rev() {
            while buffer_size < 8 && sp > 0 {
                sp -= 1;
                buffer |= (stack[sp] as u32) << buffer_size;
                buffer_size += 7;
            }
            *byte = buffer as u8;
            buffer >>= 8;
            buffer_size = buffer_size.saturating_sub(8);
        }
        Ok(())
    }

    /// Signed delta: the lowest bit of the decoded number is the sign.
    fn read_hex_signed(&mut self, num: &mut HexNumber) -> Result<()> {
        self.read_hex_number(num)?;
        let bytes = num.as_bytes_mut();
        let sign = if bytes[bytes.len() - 1] & 1 != 0 { 0xFF } else { 0 };
        let mut c = 0u32;
        for byte in bytes.iter_mut() {
            c = ((c & 1) << 8) | *byte as u32;
            *byte = ((c >> 1) as u8) ^ sign;
        }
        Ok(())
    }

    /// Length prefixed string, one varint per character.
    fn read_string(&mut self) -> Result<String> {
        let len = self.read_number()?;
        let mut out = String::new();
        for _ in 0..len {
            let c = self.read_number()?;
            out.push(char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        Ok(out)
    }
}

/// Reads a binary CMap held completely in memory.
pub struct BinaryCMapReader<'a> {
    data: &'a [u8],
}

impl<'a> BinaryCMapReader<'a> {
    pub fn new(data: &'a [u8]) -> BinaryCMapReader<'a> {
        BinaryCMapReader { data }
    }
}

impl CMapReader for BinaryCMapReader<'_> {
    fn read(&mut self, cmap: &mut CMap) -> Result<Option<String>> {
        let mut stream = BinaryCMapStream::new(self.data);
        let header = stream.read_required_byte()?;
        cmap.set_vertical(header & 1 != 0);

        let mut use_cmap = None;
        while let Some(b) = stream.read_byte() {
            let record_type = b >> 5;
            if record_type == METADATA {
                match b & 0x1F {
                    METADATA_COMMENT => {
                        stream.read_string()?;
                    }
                    METADATA_USECMAP => use_cmap = Some(stream.read_string()?),
                    _ => {}
                }
                continue;
            }
            let sequence = b & 0x10 != 0;
            // four bits of dataSize, so at most 16 bytes
            let width = (b & 0x0F) as usize + 1;
            let count = stream.read_number()?;
            let mut record = Record {
                stream: &mut stream,
                cmap: &mut *cmap,
                count,
                sequence,
                width,
            };
            match record_type {
                CODESPACE_RANGE => record.codespace_ranges()?,
                NOTDEF_RANGE => record.notdef_ranges()?,
                CID_CHAR => record.cid_chars()?,
                CID_RANGE => record.cid_ranges()?,
                BF_CHAR => record.bf_chars()?,
                BF_RANGE => record.bf_ranges()?,
                other => return Err(ParseError::UnknownRecordType(other).into()),
            }
        }
        Ok(use_cmap)
    }
}

/// One record being decoded: `count` entries of numbers `width` bytes wide.
struct Record<'s, 'a> {
    stream: &'s mut BinaryCMapStream<'a>,
    cmap: &'s mut CMap,
    count: u32,
    sequence: bool,
    width: usize,
}

impl Record<'_, '_> {
    /// Read the next range: `start` follows the previous `end` by a delta,
    /// `end` follows `start` by a delta.
    fn next_range(&mut self, start: &mut HexNumber, end: &mut HexNumber) -> Result<()> {
        end.increment();
        self.stream.read_hex_number(start)?;
        start.add(end);
        self.stream.read_hex_number(end)?;
        end.add(start);
        Ok(())
    }

    /// Like `next_range`, but a sequence record starts right after the previous end.
    fn next_sequence_range(&mut self, start: &mut HexNumber, end: &mut HexNumber) -> Result<()> {
        if !self.sequence {
            return self.next_range(start, end);
        }
        end.increment();
        start.set_from(end);
        self.stream.read_hex_number(end)?;
        end.add(start);
        Ok(())
    }

    fn first_range(&mut self, start: &mut HexNumber, end: &mut HexNumber) -> Result<()> {
        self.stream.read_hex(start)?;
        self.stream.read_hex_number(end)?;
        end.add(start);
        Ok(())
    }

    fn codespace_ranges(&mut self) -> Result<()> {
        if self.count == 0 {
            return Ok(());
        }
        let mut start = HexNumber::new(self.width);
        let mut end = HexNumber::new(self.width);
        self.first_range(&mut start, &mut end)?;
        self.cmap.add_codespace_range(self.width, start.to_u32(), end.to_u32())?;
        for _ in 1..self.count {
            self.next_range(&mut start, &mut end)?;
            self.cmap.add_codespace_range(self.width, start.to_u32(), end.to_u32())?;
        }
        Ok(())
    }

    /// notdef ranges are decoded to keep the stream in sync but not stored.
    fn notdef_ranges(&mut self) -> Result<()> {
        if self.count == 0 {
            return Ok(());
        }
        let mut start = HexNumber::new(self.width);
        let mut end = HexNumber::new(self.width);
        self.first_range(&mut start, &mut end)?;
        self.stream.read_number()?;
        for _ in 1..self.count {
            self.next_range(&mut start, &mut end)?;
            self.stream.read_number()?;
        }
        Ok(())
    }

    fn cid_chars(&mut self) -> Result<()> {
        if self.count == 0 {
            return Ok(());
        }
        let mut char = HexNumber::new(self.width);
        let mut tmp = HexNumber::new(self.width);
        self.stream.read_hex(&mut char)?;
        let mut code = self.stream.read_number()? as i64;
        self.cmap.map_one(char.to_u32(), Mapping::from(cid(code)?));
        for _ in 1..self.count {
            char.increment();
            if !self.sequence {
                self.stream.read_hex_number(&mut tmp)?;
                char.add(&tmp);
            }
            code += self.stream.read_signed()? + 1;
            self.cmap.map_one(char.to_u32(), Mapping::from(cid(code)?));
        }
        Ok(())
    }

    fn cid_ranges(&mut self) -> Result<()> {
        if self.count == 0 {
            return Ok(());
        }
        let mut start = HexNumber::new(self.width);
        let mut end = HexNumber::new(self.width);
        self.first_range(&mut start, &mut end)?;
        let code = self.stream.read_number()?;
        self.cmap.map_cid_range(start.to_u32(), end.to_u32(), code)?;
        for _ in 1..self.count {
            self.next_sequence_range(&mut start, &mut end)?;
            let code = self.stream.read_number()?;
            self.cmap.map_cid_range(start.to_u32(), end.to_u32(), code)?;
        }
        Ok(())
    }

    fn bf_chars(&mut self) -> Result<()> {
        if self.count == 0 {
            return Ok(());
        }
        let mut char = HexNumber::new(UCS2_WIDTH);
        let mut char_delta = HexNumber::new(UCS2_WIDTH);
        let mut dst = HexNumber::new(self.width);
        let mut dst_delta = HexNumber::new(self.width);
        self.stream.read_hex(&mut char)?;
        self.stream.read_hex(&mut dst)?;
        self.cmap.map_one(char.to_u32(), Mapping::from(dst.as_bytes()));
        for _ in 1..self.count {
            char.increment();
            if !self.sequence {
                self.stream.read_hex_number(&mut char_delta)?;
                char.add(&char_delta);
            }
            dst.increment();
            self.stream.read_hex_signed(&mut dst_delta)?;
            dst.add(&dst_delta);
            self.cmap.map_one(char.to_u32(), Mapping::from(dst.as_bytes()));
        }
        Ok(())
    }

    fn bf_ranges(&mut self) -> Result<()> {
        if self.count == 0 {
            return Ok(());
        }
        let mut start = HexNumber::new(UCS2_WIDTH);
        let mut end = HexNumber::new(UCS2_WIDTH);
        let mut dst = HexNumber::new(self.width);
        self.first_range(&mut start, &mut end)?;
        self.stream.read_hex(&mut dst)?;
        self.cmap.map_bf_range(start.to_u32(), end.to_u32(), dst.as_bytes())?;
        for _ in 1..self.count {
            self.next_sequence_range(&mut start, &mut end)?;
            self.stream.read_hex(&mut dst)?;
            self.cmap.map_bf_range(start.to_u32(), end.to_u32(), dst.as_bytes())?;
        }
        Ok(())
    }
}

fn cid(code: i64) -> Result<u32> {
    u32::try_from(code).map_err(|_| ParseError::NumberOverflow.into())
}
