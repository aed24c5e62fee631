//! RefPack (LZ77 variant) decoder for internally compressed resources.

use anyhow::{anyhow, bail, Result};
use byteorder::{BigEndian, ByteOrder};

/// Second byte of every RefPack stream.
pub const SIGNATURE: u8 = 0xFB;

const FLAG_LARGE_SIZES: u8 = 0x80;
const FLAG_COMPRESSED_SIZE: u8 = 0x01;
const MAX_PREALLOC: usize = 16 << 20;

pub fn is_refpack(data: &[u8]) -> bool {
    data.len() >= 2 && data[1] == SIGNATURE
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let (size, start) = read_header(data)?;
    let mut decoder = Decoder {
        src: data,
        pos: start,
        out: Vec::with_capacity(size.min(MAX_PREALLOC)),
        size,
    };
    decoder.run()?;
    Ok(decoder.out)
}

/// Returns the declared size and the offset of the first command.
fn read_header(data: &[u8]) -> Result<(usize, usize)> {
    if data.len() < 2 {
        bail!("RefPack data too short");
    }
    if data[1] != SIGNATURE {
        bail!("Invalid RefPack signature: expected 0xFB, got 0x{:02X}", data[1]);
    }
    let flags = data[0];
    let width = if flags & FLAG_LARGE_SIZES != 0 { 4 } else { 3 };
    let mut pos = 2;
    if flags & FLAG_COMPRESSED_SIZE != 0 {
        pos += width;
    }
    let field = data
        .get(pos..pos + width)
        .ok_or_else(|| anyhow!("RefPack data too short for size header"))?;
    Ok((BigEndian::read_uint(field, width) as usize, pos + width))
}

struct Decoder<'a> {
    src: &'a [u8],
    pos: usize,
    out: Vec<u8>,
    size: usize,
}

impl Decoder<'_> {
    fn run(&mut self) -> Result<()> {
        while self.out.len() < self.size {
            let b0 = self.byte()? as usize;
            match b0 {
                0x00..=0x7F => {
                    let b1 = self.byte()? as usize;
                    self.literal(b0 & 0x03)?;
                    self.back_ref(((b0 & 0x60) << 3) + b1 + 1, ((b0 & 0x1C) >> 2) + 3)?;
                }
                0x80..=0xBF => {
                    let b1 = self.byte()? as usize;
                    let b2 = self.byte()? as usize;
                    self.literal(b1 >> 6)?;
                    self.back_ref(((b1 & 0x3F) << 8) + b2 + 1, (b0 & 0x3F) + 4)?;
                }
                0xC0..=0xDF => {
                    let b1 = self.byte()? as usize;
                    let b2 = self.byte()? as usize;
                    let b3 = self.byte()? as usize;
                    self.literal(b0 & 0x03)?;
                    self.back_ref(
                        ((b0 & 0x10) << 12) + (b1 << 8) + b2 + 1,
                        ((b0 & 0x0C) << 6) + b3 + 5,
                    )?;
                }
                0xE0..=0xFB => self.literal(((b0 & 0x1F) << 2) + 4)?,
                _ => {
                    self.literal(b0 & 0x03)?;
                    break;
                }
            }
        }
        Ok(())
    }

    fn byte(&mut self) -> Result<u8> {
        let b = *self
            .src
            .get(self.pos)
            .ok_or_else(|| anyhow!("RefPack stream ends mid-command at offset {}", self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn literal(&mut self, count: usize) -> Result<()> {
        if self.out.len() + count > self.size {
            bail!("RefPack: plain copy overruns the declared size");
        }
        let bytes = self
            .src
            .get(self.pos..self.pos + count)
            .ok_or_else(|| anyhow!("RefPack: plain copy out of bounds"))?;
        self.out.extend_from_slice(bytes);
        self.pos += count;
        Ok(())
    }

    fn back_ref(&mut self, offset: usize, count: usize) -> Result<()> {
        if offset > self.out.len() || self.out.len() + count > self.size {
            bail!(
                "RefPack: reference copy out of bounds (offset={}, pos={}, count={}, len={})",
                offset,
                self.out.len(),
                count,
                self.size
            );
        }
        // Source and destination may overlap.
        let start = self.out.len() - offset;
        for i in 0..count {
            let b = self.out[start + i];
            self.out.push(b);
        }
        Ok(())
    }
}
