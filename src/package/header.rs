use binrw::binread;

/// DBPF 2.x package header (96 bytes). Only the fields needed to locate the
/// index are kept.
#[binread]
#[derive(Debug, Clone)]
#[br(little, magic = b"DBPF")]
pub struct PackageHeader {
    pub major: u32,
    pub minor: u32,
    #[br(pad_before = 12)]
    pub created: u32,
    pub modified: u32,
    #[br(pad_before = 4)]
    pub index_count: u32,
    pub index_position_low: u32,
    pub index_size: u32,
    #[br(pad_before = 16, pad_after = 24)]
    pub index_position: u64,
}

impl PackageHeader {
    pub const SIZE: u64 = 96;

    pub fn is_supported(&self) -> bool {
        self.major == 2
    }

    /// Absolute offset of the index; old writers only fill the 32-bit field.
    pub fn index_offset(&self) -> u64 {
        if self.index_position != 0 {
            self.index_position
        } else {
            self.index_position_low as u64
        }
    }

    pub fn read<R: std::io::Read + std::io::Seek>(reader: &mut R) -> Result<Self, binrw::Error> {
        use binrw::BinReaderExt;
        reader.read_le()
    }
}
