use s4pi_codecs::resource::name_map::{NameMap, NameMapEntry, TYPE_ID};
use s4pi_codecs::resource::NameMapResource;
use s4pi_codecs::{
    Codec, ContentValue, ErrorKind, FormatError, GenericResource, ParseLimits, Resource, ResourceError,
    ResourceKey, TypedResource,
};
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const KEY: ResourceKey = ResourceKey::new(TYPE_ID, 0, 0x42);

fn name_map_bytes(entries: &[(u64, &str)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_le_bytes()); // version
    data.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (instance, name) in entries {
        data.extend_from_slice(&instance.to_le_bytes());
        data.extend_from_slice(&(name.len() as u32).to_le_bytes());
        data.extend_from_slice(name.as_bytes());
    }
    data
}

#[test]
fn test_lazy_resource_defers_parsing() {
    let mut res = NameMapResource::from_bytes(KEY, vec![0xFF; 3], &ParseLimits::default());
    assert!(!res.is_parsed());
    assert!(!res.is_dirty());
    // Untouched bytes come back as they were.
    assert_eq!(res.to_bytes().unwrap(), vec![0xFF; 3]);

    let err = res.get_field("Count").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(matches!(err.format_cause(), Some(FormatError::Truncated { .. })));
}

#[test]
fn test_eager_resource_fails_on_construction() {
    let err = NameMapResource::parse_now(KEY, vec![1, 0, 0, 0, 5, 0, 0, 0], &ParseLimits::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn test_fields_read_through_contract() {
    let data = name_map_bytes(&[(0x10, "alpha"), (0x20, "beta")]);
    let mut res = NameMapResource::from_bytes(KEY, data, &ParseLimits::default());

    assert_eq!(res.get_field("Count").unwrap(), ContentValue::U32(2));
    assert_eq!(res.get_field_at(0).unwrap(), ContentValue::U32(1));
    assert_eq!(
        res.get_field("Names").unwrap(),
        ContentValue::List(vec!["alpha".into(), "beta".into()])
    );
    assert!(res.is_parsed());
    assert!(!res.is_dirty());
}

#[test]
fn test_unknown_field_is_unsupported_not_format() {
    let mut res = NameMapResource::new_empty(KEY);

    let err = res.get_field("Colour").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert!(matches!(err, ResourceError::UnsupportedField { .. }));

    let err = res.get_field_at(99).unwrap_err();
    assert!(matches!(err, ResourceError::UnsupportedField { .. }));

    let err = res.set_field_at(99, ContentValue::U32(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_read_only_field_cannot_be_written() {
    let mut res = NameMapResource::new_empty(KEY);
    let err = res.set_field("Count", ContentValue::U32(3)).unwrap_err();
    assert!(matches!(err, ResourceError::UnsupportedOperation(_)));
}

#[test]
fn test_wrong_value_type_is_a_format_error() {
    let mut res = NameMapResource::new_empty(KEY);
    let err = res.set_field("Version", ContentValue::String("two".into())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(matches!(err.format_cause(), Some(FormatError::InvalidValue(_))));
}

#[test]
fn test_mutation_marks_dirty_and_reserializes_once() {
    let data = name_map_bytes(&[(0x10, "alpha")]);
    let mut res = NameMapResource::from_bytes(KEY, data.clone(), &ParseLimits::default());

    res.set_field("Version", ContentValue::U32(2)).unwrap();
    assert!(res.is_dirty());

    let bytes = res.to_bytes().unwrap();
    assert!(!res.is_dirty());
    assert_eq!(&bytes[0..4], &2u32.to_le_bytes());
    assert_eq!(&bytes[4..], &data[4..]);

    // A second read without changes returns the same buffer.
    assert_eq!(res.to_bytes().unwrap(), bytes);

    let mut stream = res.stream().unwrap();
    let mut streamed = Vec::new();
    stream.read_to_end(&mut streamed).unwrap();
    assert_eq!(streamed, bytes);
}

#[test]
fn test_listeners_run_after_each_mutation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut res = NameMapResource::new_empty(KEY);
    res.subscribe(Box::new(move |key| {
        assert_eq!(key, KEY);
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    res.set_field("Version", ContentValue::U32(3)).unwrap();
    res.modify(|map| map.insert(7, "seven")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Failed writes do not notify.
    let _ = res.set_field("Version", ContentValue::Bool(true));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_new_empty_serializes_defaults() {
    let mut res = NameMapResource::new_empty(KEY);
    assert!(res.is_dirty());
    let bytes = res.to_bytes().unwrap();
    assert_eq!(bytes, name_map_bytes(&[]));
    assert_eq!(res.into_state().unwrap(), NameMap::initialize_defaults());
}

#[test]
fn test_typed_state_round_trips() {
    let map = NameMap {
        version: 1,
        entries: vec![
            NameMapEntry { instance: 1, name: "one".into() },
            NameMapEntry { instance: 2, name: "ünïcode".into() },
        ],
    };
    let mut res = TypedResource::from_state(KEY, map.clone());
    let bytes = res.to_bytes().unwrap();
    assert_eq!(NameMap::parse(&bytes, &ParseLimits::default()).unwrap(), map);
}

#[test]
fn test_downcast_from_trait_object() {
    let mut boxed: Box<dyn Resource> = Box::new(NameMapResource::new_empty(KEY));
    assert_eq!(boxed.format_name(), "NameMap");
    assert!(boxed.downcast_ref::<GenericResource>().is_none());

    let typed = boxed.downcast_mut::<NameMapResource>().unwrap();
    typed.modify(|map| map.insert(1, "x")).unwrap();
    assert!(boxed.is_dirty());
}

#[test]
fn test_generic_resource_fields() {
    let mut res = GenericResource::new(KEY, vec![1, 2, 3]);
    assert_eq!(res.get_field("Length").unwrap(), ContentValue::U32(3));

    res.set_field("Data", ContentValue::Bytes(vec![9])).unwrap();
    assert_eq!(res.to_bytes().unwrap(), vec![9]);

    let err = res.set_field("Length", ContentValue::U32(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}
