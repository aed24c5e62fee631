use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use log::debug;

use crate::error::RcolError;
use crate::rcol::block::{BlockTag, KnownBlock, RcolBlock, UnknownBlock};

/// Builds a block from a chunk payload. Receives the kind it was registered
/// under, so one function can serve several kinds.
pub type BlockConstructor = fn(kind: &BlockKind, data: &[u8]) -> Result<RcolBlock, RcolError>;

/// One registered chunk kind.
#[derive(Clone, Copy)]
pub struct BlockKind {
    pub type_id: u32,
    pub tag: BlockTag,
    pub construct: BlockConstructor,
}

impl fmt::Debug for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockKind")
            .field("type_id", &format_args!("0x{:08X}", self.type_id))
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// Chunk kinds every registry starts with.
pub const STANDARD_KINDS: &[(u32, [u8; 4])] = &[
    (0x015A1849, *b"GEOM"),
    (0x01661233, *b"MODL"),
    (0x01D10F34, *b"MLOD"),
    (0x01D0E75D, *b"MATD"),
    (0x02019972, *b"MTST"),
    (0x01D0E723, *b"VRTF"),
    (0x01D0E6FB, *b"VBUF"),
    (0x01D0E70F, *b"IBUF"),
    (0x01D0E76B, *b"SKIN"),
    (0xD3044521, *b"RSLT"),
    (0xD382BF57, *b"FTPT"),
    (0x03B4C61D, *b"LITE"),
];

/// Standard constructor: checks the magic and keeps the payload verbatim.
pub fn known_block(kind: &BlockKind, data: &[u8]) -> Result<RcolBlock, RcolError> {
    KnownBlock::parse(kind.tag, kind.type_id, data).map(RcolBlock::Known)
}

/// Maps chunk type ids and payload tags to block constructors.
///
/// Immutable once built; share it freely between threads.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    kinds: Vec<BlockKind>,
    by_type: HashMap<u32, usize>,
    by_tag: HashMap<BlockTag, usize>,
}

#[derive(Debug, Clone)]
pub struct BlockRegistryBuilder {
    kinds: Vec<BlockKind>,
}

impl BlockRegistryBuilder {
    /// Later registrations of the same id or tag replace earlier ones.
    pub fn register(mut self, type_id: u32, tag: BlockTag, construct: BlockConstructor) -> Self {
        self.kinds.push(BlockKind { type_id, tag, construct });
        self
    }

    pub fn build(self) -> BlockRegistry {
        let mut by_type = HashMap::new();
        let mut by_tag = HashMap::new();
        for (i, kind) in self.kinds.iter().enumerate() {
            if kind.type_id != 0 {
                by_type.insert(kind.type_id, i);
            }
            if !kind.tag.is_zero() {
                by_tag.insert(kind.tag, i);
            }
        }
        debug!(
            "Built block registry: {} type ids, {} tags",
            by_type.len(),
            by_tag.len()
        );
        BlockRegistry { kinds: self.kinds, by_type, by_tag }
    }
}

impl BlockRegistry {
    /// A builder already holding [`STANDARD_KINDS`].
    pub fn builder() -> BlockRegistryBuilder {
        let kinds = STANDARD_KINDS
            .iter()
            .map(|&(type_id, tag)| BlockKind {
                type_id,
                tag: BlockTag(tag),
                construct: known_block,
            })
            .collect();
        BlockRegistryBuilder { kinds }
    }

    /// Process-wide registry with the standard kinds, built on first use.
    pub fn standard() -> &'static BlockRegistry {
        static STANDARD: OnceLock<BlockRegistry> = OnceLock::new();
        STANDARD.get_or_init(|| BlockRegistry::builder().build())
    }

    pub fn is_registered(&self, type_id: u32) -> bool {
        type_id != 0 && self.by_type.contains_key(&type_id)
    }

    pub fn is_tag_registered(&self, tag: &str) -> bool {
        BlockTag::parse(tag).is_some_and(|t| self.by_tag.contains_key(&t))
    }

    pub fn registered_types(&self) -> Vec<u32> {
        let mut types: Vec<u32> = self.by_type.keys().copied().collect();
        types.sort_unstable();
        types
    }

    pub fn registered_tags(&self) -> Vec<BlockTag> {
        let mut tags: Vec<BlockTag> = self.by_tag.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn kind_for_type(&self, type_id: u32) -> Option<&BlockKind> {
        self.by_type.get(&type_id).map(|&i| &self.kinds[i])
    }

    pub fn kind_for_tag(&self, tag: BlockTag) -> Option<&BlockKind> {
        self.by_tag.get(&tag).map(|&i| &self.kinds[i])
    }

    /// Dispatches a payload: by declared type id first, then by the tag in
    /// its first four bytes, falling back to [`UnknownBlock`].
    ///
    /// Only a registered constructor can return an error.
    pub fn create_block(&self, type_id: u32, data: &[u8]) -> Result<RcolBlock, RcolError> {
        let Some(tag) = BlockTag::peek(data) else {
            return Ok(RcolBlock::Unknown(UnknownBlock::new(type_id, data)));
        };
        if let Some(kind) = self.kind_for_type(type_id) {
            return (kind.construct)(kind, data);
        }
        if let Some(kind) = self.kind_for_tag(tag) {
            debug!(
                "Chunk type 0x{:08X} not registered, dispatching on tag {}",
                type_id, tag
            );
            return (kind.construct)(kind, data);
        }
        Ok(RcolBlock::Unknown(UnknownBlock::new(type_id, data)))
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::builder().build()
    }
}
