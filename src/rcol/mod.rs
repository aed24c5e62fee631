pub mod block;
pub mod reference;
pub mod registry;
pub mod tgi;

use std::io::Cursor;
use std::ops::Range;

use binrw::{binread, BinReaderExt, BinResult};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::error::RcolError;
use block::RcolBlock;
use reference::{ChunkReference, RefType};
use registry::BlockRegistry;
use tgi::TgiKey;

/// Version written by containers created from scratch.
pub const DEFAULT_VERSION: u32 = 3;

#[binread]
#[derive(Debug, Clone, Copy)]
#[br(little)]
struct RcolHeader {
    version: u32,
    public_chunks: i32,
    unused: u32,
    external_count: i32,
    chunk_count: i32,
}

impl RcolHeader {
    const SIZE: usize = 20;

    fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.version);
        LittleEndian::write_i32(&mut buf[4..8], self.public_chunks);
        LittleEndian::write_u32(&mut buf[8..12], self.unused);
        LittleEndian::write_i32(&mut buf[12..16], self.external_count);
        LittleEndian::write_i32(&mut buf[16..20], self.chunk_count);
        buf
    }
}

/// One row of the on-disk chunk index table.
#[binread]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[br(little)]
pub struct ChunkIndexEntry {
    pub position: u32,
    pub length: i32,
}

impl ChunkIndexEntry {
    pub const SIZE: usize = 8;

    fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.position);
        LittleEndian::write_i32(&mut buf[4..8], self.length);
        buf
    }
}

/// A chunk identity paired with its decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEntry {
    pub tgi: TgiKey,
    pub block: RcolBlock,
}

/// Target of a [`ChunkReference`] inside one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedRef<'a> {
    Chunk(&'a ChunkEntry),
    External(&'a TgiKey),
}

/// Where the payloads sat in the parsed buffer, kept so an untouched
/// container writes back exactly what it read.
#[derive(Debug, Clone)]
struct SourceLayout {
    index: Vec<ChunkIndexEntry>,
    ranges: Vec<Range<usize>>,
    /// Bytes after the index table that no chunk covers, by offset.
    filler: Vec<(usize, Vec<u8>)>,
    total_len: usize,
}

#[derive(Debug, Clone)]
enum Source {
    New,
    Parsed(SourceLayout),
    Rejected(Vec<u8>),
}

/// Everything the table section of a buffer says, before any payload is
/// handed to the registry.
struct Tables {
    header: RcolHeader,
    chunk_tgis: Vec<TgiKey>,
    external_resources: Vec<TgiKey>,
    layout: SourceLayout,
}

/// RCOL chunk container.
///
/// Structural corruption never produces an error: the container comes back
/// with [`is_valid`](Self::is_valid) false and no chunks. Errors only come
/// from block constructors that reject a payload they were registered for.
#[derive(Debug, Clone)]
pub struct RcolContainer {
    version: u32,
    public_chunks: i32,
    unused: u32,
    external_resources: Vec<TgiKey>,
    chunks: Vec<ChunkEntry>,
    is_valid: bool,
    modified: bool,
    source: Source,
}

impl Default for RcolContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl RcolContainer {
    /// An empty, valid container.
    pub fn new() -> Self {
        Self {
            version: DEFAULT_VERSION,
            public_chunks: 0,
            unused: 0,
            external_resources: Vec::new(),
            chunks: Vec::new(),
            is_valid: true,
            modified: false,
            source: Source::New,
        }
    }

    /// Parses with [`BlockRegistry::standard`].
    pub fn parse(bytes: &[u8]) -> Result<Self, RcolError> {
        Self::parse_with(bytes, BlockRegistry::standard())
    }

    pub fn parse_with(bytes: &[u8], registry: &BlockRegistry) -> Result<Self, RcolError> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        let Some(tables) = read_tables(bytes) else {
            warn!("Malformed RCOL container ({} bytes), keeping it opaque", bytes.len());
            return Ok(Self::rejected(bytes));
        };

        let mut chunks = Vec::with_capacity(tables.chunk_tgis.len());
        for (tgi, range) in tables.chunk_tgis.into_iter().zip(&tables.layout.ranges) {
            let block = registry.create_block(tgi.resource_type, &bytes[range.clone()])?;
            chunks.push(ChunkEntry { tgi, block });
        }
        debug!(
            "Parsed RCOL v{}: {} chunks, {} externals",
            tables.header.version,
            chunks.len(),
            tables.external_resources.len()
        );

        Ok(Self {
            version: tables.header.version,
            public_chunks: tables.header.public_chunks,
            unused: tables.header.unused,
            external_resources: tables.external_resources,
            chunks,
            is_valid: true,
            modified: false,
            source: Source::Parsed(tables.layout),
        })
    }

    fn rejected(bytes: &[u8]) -> Self {
        Self {
            is_valid: false,
            source: Source::Rejected(bytes.to_vec()),
            ..Self::new()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// True once any list or header field was touched after parsing.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn public_chunks(&self) -> i32 {
        self.public_chunks
    }

    pub fn unused(&self) -> u32 {
        self.unused
    }

    pub fn set_version(&mut self, version: u32) {
        self.touch();
        self.version = version;
    }

    pub fn set_public_chunks(&mut self, public_chunks: i32) {
        self.touch();
        self.public_chunks = public_chunks;
    }

    pub fn chunks(&self) -> &[ChunkEntry] {
        &self.chunks
    }

    pub fn external_resources(&self) -> &[TgiKey] {
        &self.external_resources
    }

    pub fn chunks_mut(&mut self) -> &mut Vec<ChunkEntry> {
        self.touch();
        &mut self.chunks
    }

    pub fn external_resources_mut(&mut self) -> &mut Vec<TgiKey> {
        self.touch();
        &mut self.external_resources
    }

    /// Marks the container modified. A rejected container is discarded and
    /// starts over as a new, valid one.
    fn touch(&mut self) {
        if matches!(self.source, Source::Rejected(_)) {
            debug!("Editing a malformed RCOL container, starting a new one");
            *self = Self::new();
        }
        self.modified = true;
    }

    /// Appends a chunk and returns its index.
    pub fn push_chunk(&mut self, tgi: TgiKey, block: RcolBlock) -> usize {
        self.chunks_mut().push(ChunkEntry { tgi, block });
        self.chunks.len() - 1
    }

    /// Appends an external resource and returns its index.
    pub fn push_external(&mut self, tgi: TgiKey) -> usize {
        self.external_resources_mut().push(tgi);
        self.external_resources.len() - 1
    }

    /// Reference to the chunk at `index`: public if it falls inside the
    /// public range, private otherwise. Null when `index` is too large to pack.
    pub fn chunk_reference(&self, index: usize) -> ChunkReference {
        let Ok(index) = i32::try_from(index) else {
            return ChunkReference::NULL;
        };
        let ref_type = if index < self.public_chunks {
            RefType::Public
        } else {
            RefType::Private
        };
        ChunkReference::from_parts(ref_type, index)
    }

    pub fn resolve(&self, reference: ChunkReference) -> Option<ResolvedRef<'_>> {
        if reference.is_null() {
            return None;
        }
        let index = usize::try_from(reference.index()).ok()?;
        match reference.ref_type()? {
            RefType::Public | RefType::Private => self.chunks.get(index).map(ResolvedRef::Chunk),
            RefType::External | RefType::Delayed => {
                self.external_resources.get(index).map(ResolvedRef::External)
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        if !self.modified {
            match &self.source {
                Source::Rejected(raw) => return raw.clone(),
                Source::Parsed(layout) if layout.fits(&self.chunks) => {
                    return self.write_verbatim(layout);
                }
                _ => {}
            }
        }
        self.write_fresh()
    }

    fn header(&self) -> RcolHeader {
        RcolHeader {
            version: self.version,
            public_chunks: self.public_chunks,
            unused: self.unused,
            external_count: self.external_resources.len() as i32,
            chunk_count: self.chunks.len() as i32,
        }
    }

    fn write_tables(&self, index: &[ChunkIndexEntry], capacity: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&self.header().to_bytes());
        for entry in &self.chunks {
            out.extend_from_slice(&entry.tgi.to_bytes());
        }
        for tgi in &self.external_resources {
            out.extend_from_slice(&tgi.to_bytes());
        }
        for row in index {
            out.extend_from_slice(&row.to_bytes());
        }
        out
    }

    fn write_fresh(&self) -> Vec<u8> {
        let mut position = index_end(self.chunks.len(), self.external_resources.len());
        let index: Vec<ChunkIndexEntry> = self
            .chunks
            .iter()
            .map(|entry| {
                let row = ChunkIndexEntry {
                    position: position as u32,
                    length: entry.block.len() as i32,
                };
                position += entry.block.len();
                row
            })
            .collect();

        let mut out = self.write_tables(&index, position);
        for entry in &self.chunks {
            out.extend_from_slice(entry.block.data());
        }
        out
    }

    fn write_verbatim(&self, layout: &SourceLayout) -> Vec<u8> {
        let mut out = self.write_tables(&layout.index, layout.total_len);
        out.resize(layout.total_len, 0);
        for (offset, bytes) in &layout.filler {
            out[*offset..*offset + bytes.len()].copy_from_slice(bytes);
        }
        for (entry, range) in self.chunks.iter().zip(&layout.ranges) {
            out[range.clone()].copy_from_slice(entry.block.data());
        }
        out
    }
}

impl SourceLayout {
    fn fits(&self, chunks: &[ChunkEntry]) -> bool {
        chunks.len() == self.ranges.len()
            && chunks
                .iter()
                .zip(&self.ranges)
                .all(|(entry, range)| entry.block.len() == range.len())
    }
}

/// Offset just past the index table.
fn index_end(chunk_count: usize, external_count: usize) -> usize {
    RcolHeader::SIZE
        + chunk_count * (TgiKey::SIZE + ChunkIndexEntry::SIZE)
        + external_count * TgiKey::SIZE
}

fn read_tables(bytes: &[u8]) -> Option<Tables> {
    if bytes.len() < RcolHeader::SIZE {
        return None;
    }
    let mut cursor = Cursor::new(bytes);
    let header: RcolHeader = cursor.read_le().ok()?;
    let chunk_count = usize::try_from(header.chunk_count).ok()?;
    let external_count = usize::try_from(header.external_count).ok()?;

    let table_len = chunk_count
        .checked_mul(TgiKey::SIZE + ChunkIndexEntry::SIZE)?
        .checked_add(external_count.checked_mul(TgiKey::SIZE)?)?;
    let tables_end = RcolHeader::SIZE.checked_add(table_len)?;
    if tables_end > bytes.len() {
        debug!(
            "RCOL tables need {} bytes, buffer has {}",
            tables_end,
            bytes.len()
        );
        return None;
    }

    let chunk_tgis: Vec<TgiKey> = (0..chunk_count)
        .map(|_| cursor.read_le())
        .collect::<BinResult<_>>()
        .ok()?;
    let external_resources: Vec<TgiKey> = (0..external_count)
        .map(|_| cursor.read_le())
        .collect::<BinResult<_>>()
        .ok()?;
    let index: Vec<ChunkIndexEntry> = (0..chunk_count)
        .map(|_| cursor.read_le())
        .collect::<BinResult<_>>()
        .ok()?;

    let ranges = index
        .iter()
        .map(|row| chunk_range(*row, chunk_count, tables_end, bytes.len()))
        .collect::<Option<Vec<_>>>()?;
    let filler = uncovered(bytes, tables_end, &ranges);

    Some(Tables {
        header,
        chunk_tgis,
        external_resources,
        layout: SourceLayout {
            index,
            ranges,
            filler,
            total_len: bytes.len(),
        },
    })
}

/// Payload bounds for one index row. A lone chunk at position 0 starts right
/// after the index table, and with length 0 runs to the end of the buffer.
fn chunk_range(
    row: ChunkIndexEntry,
    chunk_count: usize,
    tables_end: usize,
    len: usize,
) -> Option<Range<usize>> {
    let (position, length) = if chunk_count == 1 && row.position == 0 {
        let length = match row.length {
            0 => len - tables_end,
            n => usize::try_from(n).ok()?,
        };
        (tables_end, length)
    } else {
        (row.position as usize, usize::try_from(row.length).ok()?)
    };
    let end = position.checked_add(length)?;
    if end > len {
        debug!(
            "RCOL chunk extends beyond data bounds: pos={}, len={}",
            position, length
        );
        return None;
    }
    Some(position..end)
}

/// Runs of bytes past `start` that no chunk range covers.
fn uncovered(bytes: &[u8], start: usize, ranges: &[Range<usize>]) -> Vec<(usize, Vec<u8>)> {
    let mut sorted: Vec<&Range<usize>> = ranges.iter().filter(|r| !r.is_empty()).collect();
    sorted.sort_by_key(|r| r.start);

    let mut filler = Vec::new();
    let mut cursor = start;
    for range in sorted {
        if range.start > cursor {
            filler.push((cursor, bytes[cursor..range.start].to_vec()));
        }
        cursor = cursor.max(range.end);
    }
    if cursor < bytes.len() {
        filler.push((cursor, bytes[cursor..].to_vec()));
    }
    filler
}
