use flate2::write::ZlibEncoder;
use flate2::Compression;
use s4pi_rcol::package::index::COMPRESSION_REFPACK;
use s4pi_rcol::package::refpack;
use s4pi_rcol::{Package, ResourceKey};
use std::io::{Cursor, Write};
use tempfile::NamedTempFile;

const GEOM: u32 = 0x015A1849;
const TUNING: u32 = 0x034AEECB;

fn geom_rcol() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&3u32.to_le_bytes()); // version
    data.extend_from_slice(&1i32.to_le_bytes()); // public_chunks
    data.extend_from_slice(&0u32.to_le_bytes()); // unused
    data.extend_from_slice(&0i32.to_le_bytes()); // external count
    data.extend_from_slice(&1i32.to_le_bytes()); // chunk count
    data.extend_from_slice(&0x00C0FFEEu64.to_le_bytes()); // instance
    data.extend_from_slice(&GEOM.to_le_bytes()); // type
    data.extend_from_slice(&0u32.to_le_bytes()); // group
    data.extend_from_slice(&0u32.to_le_bytes()); // position (legacy zero)
    data.extend_from_slice(&0i32.to_le_bytes()); // length (rest of buffer)
    data.extend_from_slice(b"GEOM");
    data.extend_from_slice(&0x0Cu32.to_le_bytes());
    data.extend_from_slice(&[7u8; 64]);
    data
}

struct Resource {
    key: ResourceKey,
    stored: Vec<u8>,
    memsize: u32,
    compression: u16,
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Writes a DBPF 2.1 package with a flag-free index.
fn build_package(resources: &[Resource]) -> Vec<u8> {
    let mut body = Vec::new();
    let mut offsets = Vec::new();
    for res in resources {
        offsets.push(96 + body.len() as u32);
        body.extend_from_slice(&res.stored);
    }
    let index_position = 96 + body.len() as u64;

    let mut data = vec![0u8; 96];
    data[0..4].copy_from_slice(b"DBPF");
    data[4..8].copy_from_slice(&2u32.to_le_bytes()); // major
    data[8..12].copy_from_slice(&1u32.to_le_bytes()); // minor
    data[0x24..0x28].copy_from_slice(&(resources.len() as u32).to_le_bytes()); // index count
    data[0x2C..0x30].copy_from_slice(&(4 + 32 * resources.len() as u32).to_le_bytes()); // index size
    data[0x3C..0x40].copy_from_slice(&3u32.to_le_bytes());
    data[0x40..0x48].copy_from_slice(&index_position.to_le_bytes()); // index position
    data.extend_from_slice(&body);

    data.extend_from_slice(&0u32.to_le_bytes()); // index flags
    for (res, offset) in resources.iter().zip(offsets) {
        data.extend_from_slice(&res.key.res_type.to_le_bytes());
        data.extend_from_slice(&res.key.res_group.to_le_bytes());
        data.extend_from_slice(&((res.key.instance >> 32) as u32).to_le_bytes());
        data.extend_from_slice(&(res.key.instance as u32).to_le_bytes());
        data.extend_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(&(res.stored.len() as u32 | 0x80000000).to_le_bytes());
        data.extend_from_slice(&res.memsize.to_le_bytes());
        data.extend_from_slice(&res.compression.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes()); // committed
    }
    data
}

fn sample_package() -> Vec<u8> {
    let rcol = geom_rcol();
    let tuning = b"<?xml version=\"1.0\"?><I n=\"test\"/>".to_vec();
    build_package(&[
        Resource {
            key: ResourceKey { res_type: TUNING, res_group: 0, instance: 1 },
            memsize: tuning.len() as u32,
            stored: tuning,
            compression: 0x0000,
        },
        Resource {
            key: ResourceKey { res_type: GEOM, res_group: 0x80000000, instance: 0x00C0FFEE00000001 },
            stored: zlib(&rcol),
            memsize: rcol.len() as u32,
            compression: 0x5A42,
        },
    ])
}

#[test]
fn test_read_rcol_from_package() {
    let mut pkg = Package::from_reader(Cursor::new(sample_package())).unwrap();
    assert_eq!(pkg.entries.len(), 2);

    let rcol_entries: Vec<_> = pkg.rcol_entries().cloned().collect();
    assert_eq!(rcol_entries.len(), 1);
    assert_eq!(rcol_entries[0].key.instance, 0x00C0FFEE00000001);
    assert!(rcol_entries[0].is_compressed());

    let raw = pkg.read_raw_resource(&rcol_entries[0]).unwrap();
    assert_eq!(raw, geom_rcol());

    let rcol = pkg.read_rcol(&rcol_entries[0]).unwrap();
    assert!(rcol.is_valid());
    assert_eq!(rcol.chunks()[0].block.tag().to_string(), "GEOM");
    assert_eq!(rcol.serialize(), raw);
}

#[test]
fn test_uncompressed_resource() {
    let mut pkg = Package::from_reader(Cursor::new(sample_package())).unwrap();
    let key = ResourceKey { res_type: TUNING, res_group: 0, instance: 1 };
    let entry = pkg.find(&key).cloned().unwrap();
    assert!(!entry.is_compressed());
    let data = pkg.read_raw_resource(&entry).unwrap();
    assert!(data.starts_with(b"<?xml"));
}

#[test]
fn test_open_from_disk() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&sample_package()).unwrap();
    file.flush().unwrap();

    let pkg = Package::open(file.path()).unwrap();
    assert!(pkg.header.is_supported());
    assert_eq!(pkg.header.index_count, 2);
    assert_eq!(pkg.rcol_entries().count(), 1);
}

#[test]
fn test_invalid_magic() {
    let mut data = sample_package();
    data[0..4].copy_from_slice(b"DBPX");
    let res = Package::from_reader(Cursor::new(data));
    assert!(res.is_err());
    assert!(res.err().unwrap().to_string().contains("Failed to read package header"));
}

#[test]
fn test_index_count_too_large() {
    let mut data = sample_package();
    data[0x24..0x28].copy_from_slice(&1000000u32.to_le_bytes());
    let res = Package::from_reader(Cursor::new(data));
    assert_eq!(
        res.err().unwrap().to_string(),
        "Invalid package header: index_count too large for file size"
    );
}

#[test]
fn test_constant_type_index() {
    let rcol = geom_rcol();
    let mut data = build_package(&[Resource {
        key: ResourceKey { res_type: GEOM, res_group: 0, instance: 5 },
        memsize: rcol.len() as u32,
        stored: rcol.clone(),
        compression: 0x0000,
    }]);
    // Rewrite the index with the type column factored out
    let index_position = 96 + rcol.len();
    let entry = data[index_position + 4..].to_vec();
    data.truncate(index_position);
    data.extend_from_slice(&1u32.to_le_bytes()); // flags: constant type
    data.extend_from_slice(&GEOM.to_le_bytes());
    data.extend_from_slice(&entry[4..]);

    let mut pkg = Package::from_reader(Cursor::new(data)).unwrap();
    assert_eq!(pkg.entries[0].key, ResourceKey { res_type: GEOM, res_group: 0, instance: 5 });
    let entry = pkg.entries[0].clone();
    // Flag bit set with matching sizes: stored uncompressed
    assert!(!entry.is_compressed());
    assert_eq!(pkg.read_raw_resource(&entry).unwrap(), rcol);
}

/// Encodes `data` as a literal-only RefPack stream.
fn refpack_literal(data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x10, 0xFB];
    out.extend_from_slice(&(data.len() as u32).to_be_bytes()[1..]);
    let mut rest = data;
    while rest.len() >= 4 {
        let n = (rest.len() / 4 * 4).min(112);
        out.push(0xE0 + (n / 4 - 1) as u8);
        out.extend_from_slice(&rest[..n]);
        rest = &rest[n..];
    }
    out.push(0xFC + rest.len() as u8);
    out.extend_from_slice(rest);
    out
}

#[test]
fn test_refpack_back_reference() {
    // three literal bytes, then nine copied from three back
    let stream = [0x10, 0xFB, 0x00, 0x00, 0x0C, 0x1B, 0x02, b'A', b'B', b'C', 0xFC];
    assert_eq!(refpack::decompress(&stream).unwrap(), b"ABCABCABCABC");
}

#[test]
fn test_refpack_truncated_stream() {
    let stream = [0x10, 0xFB, 0x00, 0x00, 0x08, 0xE1, b'A', b'B'];
    assert!(refpack::decompress(&stream).is_err());

    let stream = [0x10, 0xFB, 0x00, 0x00, 0x08, 0x1B, 0x10, b'A', b'B', b'C'];
    let err = refpack::decompress(&stream).unwrap_err();
    assert!(err.to_string().contains("reference copy out of bounds"));
}

#[test]
fn test_read_refpack_rcol() {
    let rcol = geom_rcol();
    let stored = refpack_literal(&rcol);
    let data = build_package(&[Resource {
        key: ResourceKey { res_type: GEOM, res_group: 0, instance: 9 },
        memsize: rcol.len() as u32,
        stored,
        compression: COMPRESSION_REFPACK,
    }]);

    let mut pkg = Package::from_reader(Cursor::new(data)).unwrap();
    let entry = pkg.rcol_entries().next().cloned().unwrap();
    assert_eq!(pkg.read_raw_resource(&entry).unwrap(), rcol);

    let container = pkg.read_rcol(&entry).unwrap();
    assert!(container.is_valid());
    assert_eq!(container.serialize(), rcol);
}
