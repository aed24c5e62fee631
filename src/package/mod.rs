pub mod header;
pub mod index;
pub mod refpack;

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use log::{debug, warn};

use crate::rcol::RcolContainer;
use header::PackageHeader;
use index::{
    IndexEntry, ResourceKey, COMPRESSION_DELETED, COMPRESSION_NONE, COMPRESSION_REFPACK,
    COMPRESSION_ZLIB,
};

/// Resource types whose payload is an RCOL container.
pub const RCOL_RESOURCE_TYPES: &[u32] = &[
    0x015A1849, // GEOM
    0x01661233, // MODL
    0x01D10F34, // MLOD
    0x01D0E75D, // MATD
    0x02019972, // MTST
    0xD3044521, // RSLT
    0xD382BF57, // FTPT
];

pub fn is_rcol_type(res_type: u32) -> bool {
    RCOL_RESOURCE_TYPES.contains(&res_type)
}

/// Bytes per index entry once the constant columns are factored out.
const MIN_ENTRY_SIZE: u64 = 20;

// Index flag bits: the column is stored once before the entries.
const CONST_TYPE: u32 = 0x01;
const CONST_GROUP: u32 = 0x02;
const CONST_INSTANCE_HI: u32 = 0x04;

pub struct Package<R> {
    pub header: PackageHeader,
    pub entries: Vec<IndexEntry>,
    reader: R,
}

impl Package<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> Package<R> {
    pub fn from_reader(mut reader: R) -> Result<Self> {
        let header = PackageHeader::read(&mut reader).context("Failed to read package header")?;
        if !header.is_supported() {
            return Err(anyhow!("Unsupported DBPF version {}.{}", header.major, header.minor));
        }

        let stream_len = reader.seek(SeekFrom::End(0))?;
        if header.index_count as u64 * MIN_ENTRY_SIZE > stream_len {
            return Err(anyhow!("Invalid package header: index_count too large for file size"));
        }

        reader.seek(SeekFrom::Start(header.index_offset()))?;
        let entries = read_index(&mut reader, header.index_count)
            .context("Failed to read package index")?;
        debug!("Opened package with {} resources", entries.len());

        Ok(Self { header, entries, reader })
    }

    pub fn find(&self, key: &ResourceKey) -> Option<&IndexEntry> {
        self.entries.iter().find(|e| e.key == *key)
    }

    /// Entries holding RCOL containers, deleted records excluded.
    pub fn rcol_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries
            .iter()
            .filter(|e| is_rcol_type(e.key.res_type) && !e.is_deleted())
    }

    pub fn read_raw_resource(&mut self, entry: &IndexEntry) -> Result<Vec<u8>> {
        self.reader.seek(SeekFrom::Start(entry.offset as u64))?;
        let mut buf = vec![0u8; entry.filesize as usize];
        self.reader
            .read_exact(&mut buf)
            .with_context(|| format!("Resource {:?} extends past end of package", entry.key))?;

        match entry.compression {
            COMPRESSION_NONE => Ok(buf),
            COMPRESSION_DELETED => bail!("Resource {:?} is marked deleted", entry.key),
            _ if refpack::is_refpack(&buf) => {
                let decompressed = refpack::decompress(&buf)
                    .with_context(|| format!("Failed to decompress resource {:?} (RefPack)", entry.key))?;
                if decompressed.len() != entry.memsize as usize {
                    warn!(
                        "Decompressed size mismatch for resource: expected {}, got {}",
                        entry.memsize,
                        decompressed.len()
                    );
                }
                Ok(decompressed)
            }
            COMPRESSION_ZLIB => {
                let mut decompressed = Vec::with_capacity(entry.memsize as usize);
                ZlibDecoder::new(&buf[..])
                    .read_to_end(&mut decompressed)
                    .context("Failed to decompress resource data (Zlib)")?;
                if decompressed.len() != entry.memsize as usize {
                    warn!(
                        "Decompressed size mismatch for resource: expected {}, got {}",
                        entry.memsize,
                        decompressed.len()
                    );
                }
                Ok(decompressed)
            }
            COMPRESSION_REFPACK => bail!("Resource {:?} lacks the RefPack signature", entry.key),
            other => bail!("Unsupported compression 0x{:04X} for {:?}", other, entry.key),
        }
    }

    pub fn read_rcol(&mut self, entry: &IndexEntry) -> Result<RcolContainer> {
        let data = self.read_raw_resource(entry)?;
        RcolContainer::parse(&data)
            .with_context(|| format!("Failed to decode RCOL blocks of {:?}", entry.key))
    }
}

fn read_index<R: Read>(reader: &mut R, count: u32) -> Result<Vec<IndexEntry>> {
    let flags = reader.read_u32::<LittleEndian>()?;
    let mut constant = |bit: u32| -> Result<Option<u32>> {
        Ok(if flags & bit != 0 {
            Some(reader.read_u32::<LittleEndian>()?)
        } else {
            None
        })
    };
    let const_type = constant(CONST_TYPE)?;
    let const_group = constant(CONST_GROUP)?;
    let const_instance_hi = constant(CONST_INSTANCE_HI)?;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let res_type = match const_type {
            Some(t) => t,
            None => reader.read_u32::<LittleEndian>()?,
        };
        let res_group = match const_group {
            Some(g) => g,
            None => reader.read_u32::<LittleEndian>()?,
        };
        let instance_hi = match const_instance_hi {
            Some(hi) => hi,
            None => reader.read_u32::<LittleEndian>()?,
        };
        let instance_lo = reader.read_u32::<LittleEndian>()?;
        let offset = reader.read_u32::<LittleEndian>()?;
        let filesize_raw = reader.read_u32::<LittleEndian>()?;
        let memsize = reader.read_u32::<LittleEndian>()?;
        let mut compression = reader.read_u16::<LittleEndian>()?;
        let committed = reader.read_u16::<LittleEndian>()?;

        let filesize = filesize_raw & 0x7FFF_FFFF;
        // Some writers set the flag bit but leave the compression column empty.
        if filesize_raw & 0x8000_0000 != 0 && compression == COMPRESSION_NONE && filesize != memsize {
            compression = COMPRESSION_ZLIB;
        }

        entries.push(IndexEntry {
            key: ResourceKey {
                res_type,
                res_group,
                instance: ((instance_hi as u64) << 32) | instance_lo as u64,
            },
            offset,
            filesize,
            memsize,
            compression,
            committed,
        });
    }
    Ok(entries)
}
