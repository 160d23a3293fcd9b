use s4pi_codecs::resource::region_map::{RegionEntry, RegionMap};
use s4pi_codecs::{Codec, FormatError, ParseLimits, ResourceKey};

const BODY: ResourceKey = ResourceKey::new(0x015A1849, 0, 0xAAAA);
const HAIR: ResourceKey = ResourceKey::new(0x015A1849, 0, 0xBBBB);

fn itg(data: &mut Vec<u8>, key: ResourceKey) {
    data.extend_from_slice(&key.instance.to_le_bytes());
    data.extend_from_slice(&key.type_id.to_le_bytes());
    data.extend_from_slice(&key.group.to_le_bytes());
}

/// Version 2 map with one entry (region 3, layer 1.0, replacement, keys 0 and 1).
fn build_v2() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&2u32.to_le_bytes()); // version
    data.extend_from_slice(&29u32.to_le_bytes()); // block at 37
    data.extend_from_slice(&36u32.to_le_bytes()); // block size
    data.extend_from_slice(&1u32.to_le_bytes()); // entry count
    data.extend_from_slice(&3u32.to_le_bytes()); // region
    data.extend_from_slice(&1.0f32.to_le_bytes()); // layer
    data.push(1); // is replacement
    data.extend_from_slice(&2u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    assert_eq!(data.len(), 37);
    data.extend_from_slice(&2u32.to_le_bytes());
    itg(&mut data, BODY);
    itg(&mut data, HAIR);
    data
}

#[test]
fn test_region_map_parses_v2() {
    let map = RegionMap::parse(&build_v2(), &ParseLimits::default()).unwrap();
    assert_eq!(map.version, 2);
    assert_eq!(
        map.entries,
        vec![RegionEntry {
            region: 3,
            layer: 1.0,
            is_replacement: true,
            key_indices: vec![0, 1],
        }]
    );
    assert_eq!(map.tgi_list, vec![BODY, HAIR]);

    let keys: Vec<_> = map.keys_for(&map.entries[0]).copied().collect();
    assert_eq!(keys, vec![BODY, HAIR]);
}

#[test]
fn test_region_map_reencodes_byte_for_byte() {
    let data = build_v2();
    let map = RegionMap::parse(&data, &ParseLimits::default()).unwrap();
    assert_eq!(map.serialize().unwrap(), data);
}

#[test]
fn test_region_map_v1_has_no_replacement_byte() {
    let map = RegionMap {
        version: 1,
        entries: vec![RegionEntry {
            region: 7,
            layer: 0.5,
            is_replacement: true,
            key_indices: vec![0],
        }],
        tgi_list: vec![BODY],
    };
    let data = map.serialize().unwrap();

    // 12 header + 4 count + 16 entry, then the block.
    let offset = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    assert_eq!(offset, 32 - 8);
    assert_eq!(data.len(), 32 + 4 + 16);

    let parsed = RegionMap::parse(&data, &ParseLimits::default()).unwrap();
    assert!(!parsed.entries[0].is_replacement);
    assert_eq!(parsed.entries[0].region, 7);
}

#[test]
fn test_region_map_block_size_must_match_count() {
    let mut data = build_v2();
    data[8..12].copy_from_slice(&40u32.to_le_bytes());
    let err = RegionMap::parse(&data, &ParseLimits::default()).unwrap_err();
    assert!(matches!(
        err,
        FormatError::CountMismatch { left: 40, right: 36, .. }
    ));
}

#[test]
fn test_region_map_entries_must_end_at_block() {
    let mut data = build_v2();
    // Offset one byte further: the list ends before the block starts.
    data[4..8].copy_from_slice(&30u32.to_le_bytes());
    data.insert(37, 0);
    assert!(RegionMap::parse(&data, &ParseLimits::default()).is_err());
}

#[test]
fn test_region_map_out_of_range_index_is_skipped() {
    let mut map = RegionMap::parse(&build_v2(), &ParseLimits::default()).unwrap();
    map.entries[0].key_indices.push(9);
    let keys: Vec<_> = map.keys_for(&map.entries[0]).collect();
    assert_eq!(keys.len(), 2);
}

#[test]
fn test_region_map_defaults_round_trip() {
    let map = RegionMap::initialize_defaults();
    let data = map.serialize().unwrap();
    assert_eq!(data.len(), 12 + 4 + 4);
    assert_eq!(RegionMap::parse(&data, &ParseLimits::default()).unwrap(), map);
}
