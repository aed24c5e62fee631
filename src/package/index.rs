/// Package-wide resource key, stored Type, Group, Instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub res_type: u32,
    pub res_group: u32,
    pub instance: u64,
}

pub const COMPRESSION_NONE: u16 = 0x0000;
pub const COMPRESSION_ZLIB: u16 = 0x5A42;
pub const COMPRESSION_REFPACK: u16 = 0xFFFF;
pub const COMPRESSION_DELETED: u16 = 0xFFE0;

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub key: ResourceKey,
    pub offset: u32,
    pub filesize: u32, // on-disk size, flag bit stripped
    pub memsize: u32,
    pub compression: u16,
    pub committed: u16,
}

impl IndexEntry {
    pub fn is_compressed(&self) -> bool {
        self.compression != COMPRESSION_NONE
    }

    pub fn is_deleted(&self) -> bool {
        self.compression == COMPRESSION_DELETED
    }
}
