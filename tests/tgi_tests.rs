use proptest::prelude::*;
use s4pi_rcol::{RcolError, ResourceKey, TgiKey};
use std::collections::HashSet;

#[test]
fn test_itg_layout() {
    let mut data = Vec::new();
    data.extend_from_slice(&0x123456789ABCDEF0u64.to_le_bytes()); // instance
    data.extend_from_slice(&0x01661233u32.to_le_bytes()); // type
    data.extend_from_slice(&0x00000001u32.to_le_bytes()); // group

    let tgi = TgiKey::read_from(&data).unwrap();
    assert_eq!(tgi, TgiKey::new(0x01661233, 1, 0x123456789ABCDEF0));
    assert_eq!(tgi.to_bytes().to_vec(), data);
}

#[test]
fn test_display() {
    let tgi = TgiKey::new(0x01661233, 1, 0x123456789ABCDEF0);
    assert_eq!(tgi.to_string(), "0x01661233:0x00000001:0x123456789ABCDEF0");
}

#[test]
fn test_short_buffer() {
    let err = TgiKey::read_from(&[0u8; 15]).unwrap_err();
    assert!(matches!(err, RcolError::Truncated { needed: 16, available: 15 }));

    let mut dest = [0x55u8; 12];
    assert!(TgiKey::new(1, 2, 3).write_to(&mut dest).is_err());
    assert_eq!(dest, [0x55u8; 12]);
}

#[test]
fn test_equality_is_field_wise() {
    let a = TgiKey::new(1, 2, 3);
    let mut set = HashSet::new();
    set.insert(a);
    assert!(set.contains(&TgiKey::new(1, 2, 3)));
    assert_ne!(a, TgiKey::new(1, 2, 4));
    assert_ne!(a, TgiKey::new(1, 3, 3));
    assert_ne!(a, TgiKey::new(2, 2, 3));
}

#[test]
fn test_resource_key_conversion() {
    let key = ResourceKey { res_type: 0x015A1849, res_group: 0x80000000, instance: 42 };
    let tgi = TgiKey::from(key);
    assert_eq!(tgi.resource_type, 0x015A1849);
    assert_eq!(tgi.resource_group, 0x80000000);
    assert_eq!(tgi.instance, 42);
    assert_eq!(ResourceKey::from(tgi), key);
}

proptest! {
    #[test]
    fn prop_read_write_inverse(bytes in any::<[u8; 16]>()) {
        let tgi = TgiKey::read_from(&bytes).unwrap();
        let mut out = [0u8; 16];
        tgi.write_to(&mut out).unwrap();
        prop_assert_eq!(out, bytes);
        prop_assert_eq!(tgi.to_bytes(), bytes);
    }
}
