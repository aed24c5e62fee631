use std::fmt;

use binrw::binread;
use byteorder::{ByteOrder, LittleEndian};

use crate::error::RcolError;
use crate::package::index::ResourceKey;

/// Type/Group/Instance identity of a chunk or external resource.
///
/// Inside RCOL containers the key is stored Instance, Type, Group (ITG),
/// which is also the field order here.
#[binread]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[br(little)]
pub struct TgiKey {
    pub instance: u64,
    pub resource_type: u32,
    pub resource_group: u32,
}

impl TgiKey {
    pub const SIZE: usize = 16;

    pub const fn new(resource_type: u32, resource_group: u32, instance: u64) -> Self {
        Self { instance, resource_type, resource_group }
    }

    /// Decodes a key from the first 16 bytes of `bytes`.
    pub fn read_from(bytes: &[u8]) -> Result<Self, RcolError> {
        let bytes = bytes.get(..Self::SIZE).ok_or(RcolError::Truncated {
            needed: Self::SIZE,
            available: bytes.len(),
        })?;
        Ok(Self {
            instance: LittleEndian::read_u64(&bytes[0..8]),
            resource_type: LittleEndian::read_u32(&bytes[8..12]),
            resource_group: LittleEndian::read_u32(&bytes[12..16]),
        })
    }

    /// Encodes the key into the first 16 bytes of `dest`. Nothing is written
    /// if `dest` is too short.
    pub fn write_to(&self, dest: &mut [u8]) -> Result<(), RcolError> {
        let available = dest.len();
        let dest = dest.get_mut(..Self::SIZE).ok_or(RcolError::Truncated {
            needed: Self::SIZE,
            available,
        })?;
        dest.copy_from_slice(&self.to_bytes());
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u64(&mut buf[0..8], self.instance);
        LittleEndian::write_u32(&mut buf[8..12], self.resource_type);
        LittleEndian::write_u32(&mut buf[12..16], self.resource_group);
        buf
    }
}

impl fmt::Display for TgiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:08X}:0x{:08X}:0x{:016X}",
            self.resource_type, self.resource_group, self.instance
        )
    }
}

impl From<ResourceKey> for TgiKey {
    fn from(key: ResourceKey) -> Self {
        Self {
            instance: key.instance,
            resource_type: key.res_type,
            resource_group: key.res_group,
        }
    }
}

impl From<TgiKey> for ResourceKey {
    fn from(key: TgiKey) -> Self {
        Self {
            res_type: key.resource_type,
            res_group: key.resource_group,
            instance: key.instance,
        }
    }
}
