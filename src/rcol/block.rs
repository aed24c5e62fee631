use std::fmt;
use std::io::Cursor;

use binrw::{binread, BinReaderExt};

use crate::error::RcolError;

/// Four-character ASCII tag that opens every chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockTag(pub [u8; 4]);

impl BlockTag {
    pub const SIZE: usize = 4;
    /// Tag of payloads too short to carry one.
    pub const ZERO: Self = Self([0; 4]);

    /// Accepts exactly four ASCII characters.
    pub fn parse(tag: &str) -> Option<Self> {
        let bytes: [u8; 4] = tag.as_bytes().try_into().ok()?;
        bytes.is_ascii().then_some(Self(bytes))
    }

    /// Reads the tag from the start of a payload.
    pub fn peek(data: &[u8]) -> Option<Self> {
        data.get(..Self::SIZE)
            .and_then(|b| b.try_into().ok())
            .map(Self)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

#[binread]
#[br(little)]
struct BlockHeader {
    tag: [u8; 4],
    version: u32,
}

/// Payload of a chunk kind the registry recognised.
///
/// The payload is kept verbatim so the block serializes back to the exact
/// bytes it was read from; interpreting the body is left to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownBlock {
    pub tag: BlockTag,
    pub type_id: u32,
    pub version: u32,
    pub data: Vec<u8>,
}

impl KnownBlock {
    /// Validates the magic tag and reads the version word that follows it.
    pub fn parse(expected: BlockTag, type_id: u32, data: &[u8]) -> Result<Self, RcolError> {
        if data.len() < BlockTag::SIZE + 4 {
            return Err(RcolError::BlockTooShort {
                tag: expected.to_string(),
                len: data.len(),
            });
        }
        let header: BlockHeader = Cursor::new(data).read_le()?;
        let found = BlockTag(header.tag);
        if found != expected {
            return Err(RcolError::InvalidTag {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(Self {
            tag: found,
            type_id,
            version: header.version,
            data: data.to_vec(),
        })
    }
}

/// Payload nobody registered a decoder for, stored as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBlock {
    pub tag: BlockTag,
    pub type_id: u32,
    pub data: Vec<u8>,
}

impl UnknownBlock {
    pub fn new(type_id: u32, data: &[u8]) -> Self {
        Self {
            tag: BlockTag::peek(data).unwrap_or(BlockTag::ZERO),
            type_id,
            data: data.to_vec(),
        }
    }
}

/// Decoded form of one chunk's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RcolBlock {
    Known(KnownBlock),
    Unknown(UnknownBlock),
}

impl RcolBlock {
    pub fn tag(&self) -> BlockTag {
        match self {
            RcolBlock::Known(b) => b.tag,
            RcolBlock::Unknown(b) => b.tag,
        }
    }

    pub fn is_known_type(&self) -> bool {
        matches!(self, RcolBlock::Known(_))
    }

    pub fn type_id(&self) -> u32 {
        match self {
            RcolBlock::Known(b) => b.type_id,
            RcolBlock::Unknown(b) => b.type_id,
        }
    }

    /// Bytes written back on serialize.
    pub fn data(&self) -> &[u8] {
        match self {
            RcolBlock::Known(b) => &b.data,
            RcolBlock::Unknown(b) => &b.data,
        }
    }

    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        match self {
            RcolBlock::Known(b) => &mut b.data,
            RcolBlock::Unknown(b) => &mut b.data,
        }
    }

    pub fn len(&self) -> usize {
        self.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    pub fn into_data(self) -> Vec<u8> {
        match self {
            RcolBlock::Known(b) => b.data,
            RcolBlock::Unknown(b) => b.data,
        }
    }
}
