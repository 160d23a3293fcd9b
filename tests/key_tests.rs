use s4pi_codecs::ResourceKey;
use std::collections::{HashMap, HashSet};

#[test]
fn test_key_display_is_fixed_width_hex() {
    let key = ResourceKey::new(0x034AE111, 0x80000000, 0x00ABCDEF12345678);
    assert_eq!(key.to_string(), "034AE111-80000000-00ABCDEF12345678");

    let zero = ResourceKey::default();
    assert_eq!(zero.to_string(), "00000000-00000000-0000000000000000");
}

#[test]
fn test_key_parses_display_form() {
    let key = ResourceKey::new(0xDB43E069, 0x1, 0xFFFFFFFFFFFFFFFF);
    let parsed: ResourceKey = key.to_string().parse().unwrap();
    assert_eq!(parsed, key);
}

#[test]
fn test_key_parses_colon_form_with_prefixes() {
    let parsed: ResourceKey = "0x00AE6C67:0x00000000:0x0000000000000042".parse().unwrap();
    assert_eq!(parsed, ResourceKey::new(0x00AE6C67, 0, 0x42));
}

#[test]
fn test_malformed_key_text_is_rejected() {
    assert!("034AE111-80000000".parse::<ResourceKey>().is_err());
    assert!("zz-0-0".parse::<ResourceKey>().is_err());
    assert!("1-2-3-4".parse::<ResourceKey>().is_err());
    assert!("100000000-0-0".parse::<ResourceKey>().is_err());
}

#[test]
fn test_keys_compare_on_all_fields() {
    let a = ResourceKey::new(1, 2, 3);
    assert_eq!(a, ResourceKey::new(1, 2, 3));
    assert_ne!(a, ResourceKey::new(9, 2, 3));
    assert_ne!(a, ResourceKey::new(1, 9, 3));
    assert_ne!(a, ResourceKey::new(1, 2, 9));

    let mut seen = HashSet::new();
    assert!(seen.insert(a));
    assert!(!seen.insert(ResourceKey::new(1, 2, 3)));

    let mut names = HashMap::new();
    names.insert(a, "first");
    names.insert(ResourceKey::new(1, 2, 4), "second");
    assert_eq!(names[&ResourceKey::new(1, 2, 3)], "first");
    assert_eq!(names.len(), 2);
}
