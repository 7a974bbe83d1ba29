//! Bounds-checked little-endian reads over an archive buffer.
//!
//! Archive records are offset-linked rather than sequential, so parsing is
//! random-access. Every accessor validates its range and reports the failing
//! offset, turning truncated buffers into structured errors instead of
//! out-of-bounds reads.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// A read-only view of a byte slice with offset-addressed accessors.
#[derive(Debug, Clone, Copy)]
pub struct BytesView<'a> {
    data: &'a [u8],
}

impl<'a> BytesView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// A sub-view of `len` bytes starting at `offset`.
    pub fn subview(&self, offset: usize, len: usize) -> Result<BytesView<'a>> {
        Ok(BytesView::new(self.bytes_at(offset, len)?))
    }

    /// A sub-view from `offset` to the end of this view.
    pub fn subview_from(&self, offset: usize) -> Result<BytesView<'a>> {
        if offset > self.data.len() {
            return Err(Error::OutOfRange {
                offset,
                wanted: 0,
                available: 0,
            });
        }
        Ok(BytesView::new(&self.data[offset..]))
    }

    /// The raw bytes in `offset..offset + len`.
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(len).ok_or(Error::OutOfRange {
            offset,
            wanted: len,
            available: self.data.len().saturating_sub(offset),
        })?;
        if end > self.data.len() {
            return Err(Error::OutOfRange {
                offset,
                wanted: len,
                available: self.data.len().saturating_sub(offset),
            });
        }
        Ok(&self.data[offset..end])
    }

    pub fn u8_at(&self, offset: usize) -> Result<u8> {
        Ok(self.bytes_at(offset, 1)?[0])
    }

    pub fn u16_at(&self, offset: usize) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.bytes_at(offset, 2)?))
    }

    pub fn i16_at(&self, offset: usize) -> Result<i16> {
        Ok(LittleEndian::read_i16(self.bytes_at(offset, 2)?))
    }

    pub fn u32_at(&self, offset: usize) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.bytes_at(offset, 4)?))
    }

    pub fn i32_at(&self, offset: usize) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.bytes_at(offset, 4)?))
    }

    pub fn f32_at(&self, offset: usize) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.bytes_at(offset, 4)?))
    }

    /// Sixteen consecutive little-endian f32 values, as stored on disk.
    pub fn mat4_at(&self, offset: usize) -> Result<[f32; 16]> {
        let bytes = self.bytes_at(offset, 0x40)?;
        let mut vals = [0.0f32; 16];
        LittleEndian::read_f32_into(bytes, &mut vals);
        Ok(vals)
    }
}
