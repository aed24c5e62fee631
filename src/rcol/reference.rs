use std::fmt;

use binrw::binread;
use byteorder::{ByteOrder, LittleEndian};

use crate::error::RcolError;

/// What a [`ChunkReference`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RefType {
    Public = 0,
    Private = 1,
    External = 2,
    Delayed = 3,
}

impl RefType {
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(RefType::Public),
            1 => Some(RefType::Private),
            2 => Some(RefType::External),
            3 => Some(RefType::Delayed),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RefType::Public => "Public",
            RefType::Private => "Private",
            RefType::External => "External",
            RefType::Delayed => "Delayed",
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Packed 32-bit pointer stored inside chunk payloads.
///
/// `0` is null. Otherwise bits 28..32 hold the [`RefType`] and the low 28
/// bits hold `index + 1`. Public and private references index the
/// container's chunk list, external and delayed ones its external list.
#[binread]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[br(little)]
pub struct ChunkReference(u32);

impl ChunkReference {
    pub const NULL: Self = Self(0);
    pub const SIZE: usize = 4;
    /// Largest index that survives packing into 28 bits.
    pub const MAX_INDEX: i32 = 0x0FFF_FFFE;

    const TYPE_SHIFT: u32 = 28;
    const INDEX_MASK: u32 = 0x0FFF_FFFF;

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Packs a reference. A negative index, or one above [`Self::MAX_INDEX`],
    /// yields the null reference whatever `ref_type` says.
    pub fn from_parts(ref_type: RefType, index: i32) -> Self {
        if !(0..=Self::MAX_INDEX).contains(&index) {
            return Self::NULL;
        }
        Self(((ref_type as u32) << Self::TYPE_SHIFT) | (index as u32 + 1))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// `None` when the top nibble holds a value outside `0..=3`.
    pub fn ref_type(self) -> Option<RefType> {
        RefType::from_bits(self.0 >> Self::TYPE_SHIFT)
    }

    /// `-1` for the null reference.
    pub fn index(self) -> i32 {
        if self.is_null() {
            return -1;
        }
        (self.0 & Self::INDEX_MASK) as i32 - 1
    }

    pub fn read_from(bytes: &[u8]) -> Result<Self, RcolError> {
        let bytes = bytes.get(..Self::SIZE).ok_or(RcolError::Truncated {
            needed: Self::SIZE,
            available: bytes.len(),
        })?;
        Ok(Self(LittleEndian::read_u32(bytes)))
    }

    pub fn write_to(&self, dest: &mut [u8]) -> Result<(), RcolError> {
        let available = dest.len();
        let dest = dest.get_mut(..Self::SIZE).ok_or(RcolError::Truncated {
            needed: Self::SIZE,
            available,
        })?;
        LittleEndian::write_u32(dest, self.0);
        Ok(())
    }
}

impl From<u32> for ChunkReference {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<ChunkReference> for u32 {
    fn from(reference: ChunkReference) -> Self {
        reference.0
    }
}

impl fmt::Display for ChunkReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("(null)");
        }
        match self.ref_type() {
            Some(ref_type) => write!(f, "{}[{}]", ref_type, self.index()),
            None => write!(f, "0x{:X}[{}]", self.0 >> Self::TYPE_SHIFT, self.index()),
        }
    }
}
