use byteorder::{ByteOrder, LittleEndian};

use super::constants::U64_SIZE;
use super::error::DecodeError;

/// Bounds-checked little-endian reader over a fully loaded file.
///
/// Every read names the field it is after so that a short buffer can be reported precisely.
/// Nothing is allocated for a count before the bytes backing it are known to exist.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// Fail unless at least `needed` bytes remain
    pub fn require(&self, needed: u64, field: &'static str) -> Result<(), DecodeError> {
        let available = self.remaining() as u64;
        if needed > available {
            Err(DecodeError::Truncated {
                offset: self.position,
                field,
                needed,
                available,
            })
        } else {
            Ok(())
        }
    }

    /// Fail unless `count` items of `item_size` bytes remain. Guards against counts so large
    /// the byte total overflows.
    pub fn require_items(
        &self,
        count: u64,
        item_size: u64,
        field: &'static str,
    ) -> Result<(), DecodeError> {
        let needed = count.checked_mul(item_size).unwrap_or(u64::MAX);
        self.require(needed, field)
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        self.require(1, field)?;
        let value = self.buffer[self.position];
        self.position += 1;
        Ok(value)
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        self.require(U64_SIZE, field)?;
        let end = self.position + U64_SIZE as usize;
        let value = LittleEndian::read_u64(&self.buffer[self.position..end]);
        self.position = end;
        Ok(value)
    }

    /// Read `count` consecutive u64 values
    pub fn read_u64_array(
        &mut self,
        count: u64,
        field: &'static str,
    ) -> Result<Vec<u64>, DecodeError> {
        self.require_items(count, U64_SIZE, field)?;
        let end = self.position + (count * U64_SIZE) as usize;
        let mut values = vec![0; count as usize];
        LittleEndian::read_u64_into(&self.buffer[self.position..end], &mut values);
        self.position = end;
        Ok(values)
    }

    /// Consume the reader, failing if any bytes were left unread
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}
