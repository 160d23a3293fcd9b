use s4pi_codecs::resource::deformer_map::{DeformerMap, RobeChannel, Scanline, ScanlineData};
use s4pi_codecs::{Codec, FormatError, ParseLimits};

const HEADER_V7: usize = 51;

fn header(version: u32, total_bytes: u32) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&version.to_le_bytes());
    data.extend_from_slice(&4u32.to_le_bytes()); // doubled width
    data.extend_from_slice(&2u32.to_le_bytes()); // height
    data.extend_from_slice(&0x2020u32.to_le_bytes()); // age/gender
    if version >= 6 {
        data.extend_from_slice(&1u32.to_le_bytes()); // species
    }
    data.push(2); // physique
    data.push(1); // shape or normals
    data.extend_from_slice(&0u32.to_le_bytes()); // min col
    data.extend_from_slice(&1u32.to_le_bytes()); // max col
    data.extend_from_slice(&10u32.to_le_bytes()); // min row
    data.extend_from_slice(&11u32.to_le_bytes()); // max row
    data.push(0); // robe channel
    if version >= 7 {
        data.extend_from_slice(&0.25f32.to_le_bytes());
        data.extend_from_slice(&0.5f32.to_le_bytes());
    }
    data.extend_from_slice(&total_bytes.to_le_bytes());
    data
}

/// Two pixels wide, two rows: one flat row and one run-length row.
fn build_v7() -> Vec<u8> {
    let mut data = header(7, 28);
    assert_eq!(data.len(), HEADER_V7);

    // Row 1: uncompressed, robe present, 2 pixels of 6 bytes.
    data.extend_from_slice(&16u16.to_le_bytes());
    data.push(0);
    data.push(0);
    data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);

    // Row 2: compressed, robe dropped, one run.
    data.extend_from_slice(&12u16.to_le_bytes());
    data.push(1);
    data.push(1);
    data.push(1); // index count
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&[0x80, 0x7F, 0x01]);
    data
}

#[test]
fn test_deformer_map_parses_both_row_kinds() {
    let map = DeformerMap::parse(&build_v7(), &ParseLimits::default()).unwrap();
    assert_eq!(map.version, 7);
    assert_eq!(map.species, 1);
    assert_eq!(map.skin_tight_delta, 0.5);
    assert_eq!(map.width(), 2);
    assert_eq!(map.row_count(), 2);
    assert_eq!(map.scanlines.len(), 2);
    assert_eq!(map.total_bytes(), 28);

    assert_eq!(map.scanlines[0].robe_channel, RobeChannel::Present);
    assert_eq!(
        map.scanlines[0].data,
        ScanlineData::Uncompressed(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12])
    );

    assert_eq!(map.scanlines[1].flag, 1);
    assert_eq!(map.scanlines[1].robe_channel, RobeChannel::Dropped);
    assert_eq!(
        map.scanlines[1].data,
        ScanlineData::Compressed {
            pixel_positions: vec![0],
            data_positions: vec![0],
            payload: vec![0x80, 0x7F, 0x01],
        }
    );
}

#[test]
fn test_deformer_map_reencodes_byte_for_byte() {
    let data = build_v7();
    let map = DeformerMap::parse(&data, &ParseLimits::default()).unwrap();
    assert_eq!(map.serialize().unwrap(), data);
}

#[test]
fn test_deformer_map_flat_row_length_is_checked() {
    let mut data = build_v7();
    data[HEADER_V7..HEADER_V7 + 2].copy_from_slice(&15u16.to_le_bytes());
    let err = DeformerMap::parse(&data, &ParseLimits::default()).unwrap_err();
    assert!(matches!(err, FormatError::InvalidValue(_)));
}

#[test]
fn test_deformer_map_total_must_match_rows() {
    let mut data = build_v7();
    data[HEADER_V7 - 4..HEADER_V7].copy_from_slice(&27u32.to_le_bytes());
    let err = DeformerMap::parse(&data, &ParseLimits::default()).unwrap_err();
    assert!(matches!(
        err,
        FormatError::CountMismatch { left: 28, right: 27, .. }
    ));

    data[HEADER_V7 - 4..HEADER_V7].copy_from_slice(&400u32.to_le_bytes());
    let err = DeformerMap::parse(&data, &ParseLimits::default()).unwrap_err();
    assert!(matches!(err, FormatError::Truncated { needed: 400, .. }));
}

#[test]
fn test_deformer_map_compressed_row_shorter_than_index_is_rejected() {
    let mut data = build_v7();
    let row2 = HEADER_V7 + 16;
    data[row2..row2 + 2].copy_from_slice(&5u16.to_le_bytes());
    let err = DeformerMap::parse(&data, &ParseLimits::default()).unwrap_err();
    assert!(matches!(err, FormatError::InvalidValue(_)));
}

#[test]
fn test_deformer_map_unknown_robe_value_is_rejected() {
    let mut data = build_v7();
    data[HEADER_V7 + 3] = 3;
    assert!(DeformerMap::parse(&data, &ParseLimits::default()).is_err());
}

#[test]
fn test_deformer_map_without_pixels() {
    let data = header(7, 0);
    let map = DeformerMap::parse(&data, &ParseLimits::default()).unwrap();
    assert!(map.scanlines.is_empty());
    assert_eq!(map.serialize().unwrap(), data);
}

#[test]
fn test_deformer_map_v5_skips_gated_fields() {
    let data = header(5, 0);
    assert_eq!(data.len(), HEADER_V7 - 12);

    let map = DeformerMap::parse(&data, &ParseLimits::default()).unwrap();
    assert_eq!(map.species, 0);
    assert_eq!(map.skin_tight_min, 0.0);
    assert_eq!(map.physique, 2);
    assert_eq!(map.serialize().unwrap(), data);
}

#[test]
fn test_deformer_map_rejects_versions_before_5() {
    let mut data = header(5, 0);
    data[0..4].copy_from_slice(&4u32.to_le_bytes());
    let err = DeformerMap::parse(&data, &ParseLimits::default()).unwrap_err();
    assert!(matches!(err, FormatError::UnsupportedVersion(4)));
}

#[test]
fn test_deformer_map_write_checks_rows() {
    let mut map = DeformerMap::parse(&build_v7(), &ParseLimits::default()).unwrap();

    // Robe flag changed without resizing the flat row.
    map.scanlines[0].robe_channel = RobeChannel::IsCopy;
    let err = map.serialize().unwrap_err();
    assert!(matches!(err, FormatError::CountMismatch { left: 12, right: 6, .. }));
    map.scanlines[0].robe_channel = RobeChannel::Present;

    if let ScanlineData::Compressed { data_positions, .. } = &mut map.scanlines[1].data {
        data_positions.push(1);
    }
    let err = map.serialize().unwrap_err();
    assert!(matches!(err, FormatError::CountMismatch { .. }));

    map.scanlines.truncate(1);
    let err = map.serialize().unwrap_err();
    assert!(matches!(err, FormatError::CountMismatch { left: 1, right: 2, .. }));
}

#[test]
fn test_deformer_map_builds_from_rows() {
    let mut map = DeformerMap::initialize_defaults();
    map.max_col = 0;
    map.scanlines = vec![Scanline {
        flag: 0,
        robe_channel: RobeChannel::Dropped,
        data: ScanlineData::Uncompressed(vec![9, 8, 7]),
    }];
    let data = map.serialize().unwrap();
    assert_eq!(data.len(), HEADER_V7 + 7);
    assert_eq!(DeformerMap::parse(&data, &ParseLimits::default()).unwrap(), map);
}

#[test]
fn test_deformer_map_keeps_raw_compressed_flag() {
    let mut data = build_v7();
    let row2 = HEADER_V7 + 16;
    data[row2 + 2] = 0x02;

    let map = DeformerMap::parse(&data, &ParseLimits::default()).unwrap();
    assert!(map.scanlines[1].is_compressed());
    assert_eq!(map.scanlines[1].flag, 0x02);
    assert_eq!(map.serialize().unwrap(), data);
}

#[test]
fn test_deformer_map_flag_must_match_row_kind() {
    let mut map = DeformerMap::parse(&build_v7(), &ParseLimits::default()).unwrap();
    map.scanlines[1].flag = 0;
    let err = map.serialize().unwrap_err();
    assert!(matches!(err, FormatError::InvalidValue(_)));
}
