//! Little-endian reader and writer shared by every codec.
//!
//! Counted lists go through [`ResourceReader::count`], which checks the count
//! against [`ParseLimits`] and against the bytes left in the buffer before the
//! caller allocates anything sized by it.

use crate::config::ParseLimits;
use crate::error::FormatError;
use crate::package::index::ResourceKey;
use binrw::meta::{ReadEndian, WriteEndian};
use binrw::{BinRead, BinWrite};
use byteorder::{ReadBytesExt, LE};
use std::io::{Cursor, Read};

pub type FormatResult<T> = Result<T, FormatError>;

/// Size of an embedded key block: instance(8), type(4), group(4).
pub const KEY_BLOCK_SIZE: u64 = 16;

pub struct ResourceReader<'a> {
    cursor: Cursor<&'a [u8]>,
    limits: ParseLimits,
}

impl<'a> ResourceReader<'a> {
    pub fn new(data: &'a [u8], limits: &ParseLimits) -> Self {
        Self {
            cursor: Cursor::new(data),
            limits: *limits,
        }
    }

    pub fn limits(&self) -> &ParseLimits {
        &self.limits
    }

    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.position())
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    fn need(&self, needed: u64) -> FormatResult<()> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(FormatError::Truncated {
                offset: self.position(),
                needed,
                remaining,
            });
        }
        Ok(())
    }

    pub fn seek(&mut self, position: u64) -> FormatResult<()> {
        if position > self.len() {
            return Err(FormatError::invalid(format!(
                "offset {} lies beyond the end of the {}-byte buffer",
                position,
                self.len()
            )));
        }
        self.cursor.set_position(position);
        Ok(())
    }

    /// Runs `f` with the cursor at `position`, then restores the cursor.
    pub fn at_offset<T>(
        &mut self,
        position: u64,
        f: impl FnOnce(&mut Self) -> FormatResult<T>,
    ) -> FormatResult<T> {
        let saved = self.position();
        self.seek(position)?;
        let result = f(self);
        self.cursor.set_position(saved);
        result
    }

    pub fn u8(&mut self) -> FormatResult<u8> {
        self.need(1)?;
        Ok(self.cursor.read_u8()?)
    }

    pub fn bool(&mut self) -> FormatResult<bool> {
        Ok(self.u8()? != 0)
    }

    pub fn u16(&mut self) -> FormatResult<u16> {
        self.need(2)?;
        Ok(self.cursor.read_u16::<LE>()?)
    }

    pub fn i16(&mut self) -> FormatResult<i16> {
        self.need(2)?;
        Ok(self.cursor.read_i16::<LE>()?)
    }

    pub fn u32(&mut self) -> FormatResult<u32> {
        self.need(4)?;
        Ok(self.cursor.read_u32::<LE>()?)
    }

    pub fn i32(&mut self) -> FormatResult<i32> {
        self.need(4)?;
        Ok(self.cursor.read_i32::<LE>()?)
    }

    pub fn u64(&mut self) -> FormatResult<u64> {
        self.need(8)?;
        Ok(self.cursor.read_u64::<LE>()?)
    }

    pub fn f32(&mut self) -> FormatResult<f32> {
        self.need(4)?;
        Ok(self.cursor.read_f32::<LE>()?)
    }

    pub fn array<const N: usize>(&mut self) -> FormatResult<[u8; N]> {
        self.need(N as u64)?;
        let mut buf = [0u8; N];
        self.cursor.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn bytes(&mut self, len: u64) -> FormatResult<Vec<u8>> {
        self.need(len)?;
        let mut buf = vec![0u8; len as usize];
        self.cursor.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads a fixed-layout record declared with `binrw`. `size` is its
    /// encoded length, checked before the read.
    pub fn record<T>(&mut self, size: u64) -> FormatResult<T>
    where
        T: for<'b> BinRead<Args<'b> = ()> + ReadEndian,
    {
        self.need(size)?;
        T::read(&mut self.cursor).map_err(|e| FormatError::invalid(e.to_string()))
    }

    /// Validates an on-disk element count before anything is allocated.
    /// `min_element_size` is the smallest number of bytes one element can take.
    pub fn check_count(&self, what: &'static str, count: u64, min_element_size: u64) -> FormatResult<usize> {
        if count > self.limits.max_count as u64 {
            return Err(FormatError::CountExceedsLimit {
                what,
                count,
                limit: self.limits.max_count,
            });
        }
        let needed = count.saturating_mul(min_element_size);
        let remaining = self.remaining();
        if needed > remaining {
            return Err(FormatError::CountExceedsRemaining {
                what,
                count,
                needed,
                remaining,
            });
        }
        Ok(count as usize)
    }

    /// Reads a `u32` count and validates it.
    pub fn count(&mut self, what: &'static str, min_element_size: u64) -> FormatResult<usize> {
        let count = self.u32()?;
        self.check_count(what, count as u64, min_element_size)
    }

    /// Reads an `i32` count; negative counts are malformed.
    pub fn signed_count(&mut self, what: &'static str, min_element_size: u64) -> FormatResult<usize> {
        let count = self.i32()?;
        if count < 0 {
            return Err(FormatError::invalid(format!("negative {} count {}", what, count)));
        }
        self.check_count(what, count as u64, min_element_size)
    }

    /// Reads a `u8` count and validates it.
    pub fn byte_count(&mut self, what: &'static str, min_element_size: u64) -> FormatResult<usize> {
        let count = self.u8()?;
        self.check_count(what, count as u64, min_element_size)
    }

    pub fn list<T>(
        &mut self,
        count: usize,
        mut read: impl FnMut(&mut Self) -> FormatResult<T>,
    ) -> FormatResult<Vec<T>> {
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read(self)?);
        }
        Ok(items)
    }

    /// 7-bit encoded byte length followed by UTF-16 big-endian code units.
    pub fn string_utf16be(&mut self) -> FormatResult<String> {
        let len = self.varint()?;
        if len % 2 != 0 {
            return Err(FormatError::invalid(format!("odd UTF-16 byte length {}", len)));
        }
        let raw = self.bytes(len)?;
        let units: Vec<u16> = raw
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16(&units).map_err(|e| FormatError::invalid(format!("invalid UTF-16 string: {}", e)))
    }

    /// `u32` byte length followed by ASCII bytes.
    pub fn string_ascii(&mut self) -> FormatResult<String> {
        let len = self.u32()? as u64;
        let raw = self.bytes(len)?;
        if !raw.is_ascii() {
            return Err(FormatError::invalid("non-ASCII byte in ASCII string"));
        }
        // ASCII is valid UTF-8.
        String::from_utf8(raw).map_err(|e| FormatError::invalid(e.to_string()))
    }

    /// `u32` byte length followed by UTF-8 bytes.
    pub fn string_utf8(&mut self) -> FormatResult<String> {
        let len = self.u32()? as u64;
        let raw = self.bytes(len)?;
        String::from_utf8(raw).map_err(|e| FormatError::invalid(format!("invalid UTF-8 string: {}", e)))
    }

    /// .NET style 7-bit encoded integer, at most five bytes.
    pub fn varint(&mut self) -> FormatResult<u64> {
        let mut value: u64 = 0;
        for shift in (0..35).step_by(7) {
            let b = self.u8()?;
            value |= ((b & 0x7F) as u64) << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(FormatError::invalid("7-bit encoded length is longer than five bytes"))
    }

    /// Key stored as instance(8), type(4), group(4).
    pub fn key_itg(&mut self) -> FormatResult<ResourceKey> {
        let instance = self.u64()?;
        let type_id = self.u32()?;
        let group = self.u32()?;
        Ok(ResourceKey::new(type_id, group, instance))
    }
}

#[derive(Debug, Default)]
pub struct ResourceWriter {
    buf: Vec<u8>,
}

impl ResourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn position(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    pub fn record<T>(&mut self, v: &T) -> FormatResult<()>
    where
        T: for<'b> BinWrite<Args<'b> = ()> + WriteEndian,
    {
        let mut cursor = Cursor::new(&mut self.buf);
        cursor.set_position(cursor.get_ref().len() as u64);
        v.write(&mut cursor).map_err(|e| FormatError::invalid(e.to_string()))
    }

    /// Writes a zero placeholder and returns its position for [`Self::patch_u32`].
    pub fn reserve_u32(&mut self) -> u64 {
        let at = self.position();
        self.u32(0);
        at
    }

    pub fn patch_u32(&mut self, at: u64, v: u32) {
        let at = at as usize;
        self.buf[at..at + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn count_u32(&mut self, what: &'static str, len: usize) -> FormatResult<()> {
        let v = u32::try_from(len).map_err(|_| FormatError::Overflow { what, value: len as u64 })?;
        self.u32(v);
        Ok(())
    }

    pub fn count_i32(&mut self, what: &'static str, len: usize) -> FormatResult<()> {
        let v = i32::try_from(len).map_err(|_| FormatError::Overflow { what, value: len as u64 })?;
        self.i32(v);
        Ok(())
    }

    pub fn count_u8(&mut self, what: &'static str, len: usize) -> FormatResult<()> {
        let v = u8::try_from(len).map_err(|_| FormatError::Overflow { what, value: len as u64 })?;
        self.u8(v);
        Ok(())
    }

    pub fn varint(&mut self, mut v: u64) {
        while v >= 0x80 {
            self.u8((v as u8) | 0x80);
            v >>= 7;
        }
        self.u8(v as u8);
    }

    pub fn string_utf16be(&mut self, s: &str) {
        let units: Vec<u16> = s.encode_utf16().collect();
        self.varint(units.len() as u64 * 2);
        for unit in units {
            self.bytes(&unit.to_be_bytes());
        }
    }

    pub fn string_ascii(&mut self, s: &str) -> FormatResult<()> {
        if !s.is_ascii() {
            return Err(FormatError::invalid(format!("{:?} is not ASCII", s)));
        }
        self.count_u32("string length", s.len())?;
        self.bytes(s.as_bytes());
        Ok(())
    }

    pub fn string_utf8(&mut self, s: &str) -> FormatResult<()> {
        self.count_u32("string length", s.len())?;
        self.bytes(s.as_bytes());
        Ok(())
    }

    pub fn key_itg(&mut self, key: &ResourceKey) {
        self.u64(key.instance);
        self.u32(key.type_id);
        self.u32(key.group);
    }
}

/// Swatch colours: `u8` count followed by ARGB `u32` values.
pub fn read_swatches(r: &mut ResourceReader<'_>) -> FormatResult<Vec<u32>> {
    let count = r.byte_count("swatch colour", 4)?;
    r.list(count, |r| r.u32())
}

pub fn write_swatches(w: &mut ResourceWriter, colors: &[u32]) -> FormatResult<()> {
    w.count_u8("swatch colour count", colors.len())?;
    for &c in colors {
        w.u32(c);
    }
    Ok(())
}

/// One category/value tag of a flag list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flag {
    pub category: u16,
    pub value: u32,
}

/// Flag lists are `u32` count + (category `u16`, value). Older layouts store
/// the value in 16 bits.
pub fn read_flags(r: &mut ResourceReader<'_>, wide_values: bool) -> FormatResult<Vec<Flag>> {
    let element = if wide_values { 6 } else { 4 };
    let count = r.count("flag", element)?;
    r.list(count, |r| {
        let category = r.u16()?;
        let value = if wide_values { r.u32()? } else { r.u16()? as u32 };
        Ok(Flag { category, value })
    })
}

pub fn write_flags(w: &mut ResourceWriter, flags: &[Flag], wide_values: bool) -> FormatResult<()> {
    w.count_u32("flag count", flags.len())?;
    for flag in flags {
        w.u16(flag.category);
        if wide_values {
            w.u32(flag.value);
        } else {
            let value = u16::try_from(flag.value).map_err(|_| FormatError::Overflow {
                what: "16-bit flag value",
                value: flag.value as u64,
            })?;
            w.u16(value);
        }
    }
    Ok(())
}

/// Pack block shared by several catalog-like formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackInfo {
    pub pack_id: i16,
    pub pack_flags: u8,
    pub reserved: [u8; 9],
}

impl PackInfo {
    pub fn read(r: &mut ResourceReader<'_>) -> FormatResult<Self> {
        Ok(Self {
            pack_id: r.i16()?,
            pack_flags: r.u8()?,
            reserved: r.array::<9>()?,
        })
    }

    pub fn write(&self, w: &mut ResourceWriter) {
        w.i16(self.pack_id);
        w.u8(self.pack_flags);
        w.bytes(&self.reserved);
    }
}
