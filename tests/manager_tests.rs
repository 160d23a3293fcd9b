use s4pi_codecs::resource::name_map::NameMap;
use s4pi_codecs::resource::NameMapResource;
use s4pi_codecs::{
    CancellationToken, ErrorKind, FactoryRegistry, LoadOptions, ManagerOptions, MemoryArchive,
    Resource, ResourceKey, ResourceManager, SharedResource,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const NAMES: ResourceKey = ResourceKey::new(0x0166038C, 0, 1);
const MORE_NAMES: ResourceKey = ResourceKey::new(0x0166038C, 0, 2);
const UNKNOWN: ResourceKey = ResourceKey::new(0x12345678, 0, 3);

fn name_map_bytes(names: &[(u64, &str)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&(names.len() as u32).to_le_bytes());
    for (instance, name) in names {
        data.extend_from_slice(&instance.to_le_bytes());
        data.extend_from_slice(&(name.len() as u32).to_le_bytes());
        data.extend_from_slice(name.as_bytes());
    }
    data
}

fn archive() -> MemoryArchive {
    let mut archive = MemoryArchive::new();
    archive.insert(NAMES, name_map_bytes(&[(7, "seven")]));
    archive.insert(MORE_NAMES, name_map_bytes(&[(8, "eight"), (9, "nine")]));
    archive.insert(UNKNOWN, vec![1, 2, 3, 4]);
    archive
}

fn manager() -> ResourceManager {
    ResourceManager::new(ManagerOptions::without_maintenance()).unwrap()
}

fn load(manager: &ResourceManager, archive: &MemoryArchive, key: ResourceKey) -> SharedResource {
    manager
        .create_or_load(archive, key, LoadOptions::default(), &CancellationToken::new())
        .unwrap()
}

#[test]
fn test_repeat_load_returns_same_instance() {
    let manager = manager();
    let archive = archive();

    let first = load(&manager, &archive, NAMES);
    let second = load(&manager, &archive, NAMES);
    assert!(Arc::ptr_eq(&first, &second));

    let metrics = manager.metrics();
    assert_eq!(metrics.hits, 1);
    assert_eq!(metrics.misses, 1);
    assert_eq!(metrics.created, 1);
    assert!((metrics.hit_ratio - 0.5).abs() < f64::EPSILON);
}

#[test]
fn test_loaded_resource_is_typed() {
    let manager = manager();
    let archive = archive();

    let shared = load(&manager, &archive, MORE_NAMES);
    let mut guard = shared.write();
    assert_eq!(guard.format_name(), "NameMap");
    let typed = guard.downcast_mut::<NameMapResource>().unwrap();
    assert_eq!(typed.state().unwrap().get(9), Some("nine"));
}

#[test]
fn test_cache_does_not_keep_resources_alive() {
    let manager = manager();
    let archive = archive();

    let shared = load(&manager, &archive, NAMES);
    assert_eq!(manager.metrics().live_entries, 1);
    drop(shared);

    assert_eq!(manager.sweep_cache(), 1);
    assert_eq!(manager.metrics().cache_entries, 0);

    // Rebuilt from the archive.
    load(&manager, &archive, NAMES);
    assert_eq!(manager.metrics().misses, 2);
}

#[test]
fn test_mutation_visible_through_cached_handle() {
    let manager = manager();
    let archive = archive();

    let shared = load(&manager, &archive, NAMES);
    shared
        .write()
        .downcast_mut::<NameMapResource>()
        .unwrap()
        .modify(|map| map.insert(10, "ten"))
        .unwrap();

    let again = load(&manager, &archive, NAMES);
    assert!(again.read().is_dirty());
}

#[test]
fn test_unknown_type_uses_catch_all() {
    let manager = manager();
    let archive = archive();

    let shared = load(&manager, &archive, UNKNOWN);
    let mut guard = shared.write();
    assert_eq!(guard.format_name(), "Generic");
    assert_eq!(guard.to_bytes().unwrap(), vec![1, 2, 3, 4]);
}

#[test]
fn test_forced_default_is_not_cached() {
    let manager = manager();
    let archive = archive();
    let cancel = CancellationToken::new();

    let raw = manager
        .create_or_load(&archive, NAMES, LoadOptions::forced_default(), &cancel)
        .unwrap();
    assert_eq!(raw.read().format_name(), "Generic");

    let typed = load(&manager, &archive, NAMES);
    assert_eq!(typed.read().format_name(), "NameMap");
    assert!(!Arc::ptr_eq(&raw, &typed));
    assert_eq!(manager.metrics().cache_entries, 1);
}

#[test]
fn test_cancelled_load_caches_nothing() {
    let manager = manager();
    let archive = archive();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = manager
        .create_or_load(&archive, NAMES, LoadOptions::default(), &cancel)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(manager.metrics().cache_entries, 0);
    assert_eq!(manager.metrics().created, 0);
}

#[test]
fn test_newer_api_version_is_rejected() {
    let manager = manager();
    let archive = archive();
    let load = LoadOptions {
        api_version: 2,
        ..LoadOptions::default()
    };

    let err = manager
        .create_or_load(&archive, NAMES, load, &CancellationToken::new())
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn test_missing_key_is_an_archive_error() {
    let manager = manager();
    let archive = archive();
    let missing = ResourceKey::new(0x0166038C, 0, 99);

    let err = manager
        .create_or_load(&archive, missing, LoadOptions::default(), &CancellationToken::new())
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Archive);
}

#[test]
fn test_load_all_keeps_archive_order() {
    let manager = manager();
    let archive = archive();

    let results = manager.load_all(&archive, LoadOptions::default(), &CancellationToken::new());
    let keys: Vec<_> = results.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![NAMES, MORE_NAMES, UNKNOWN]);
    assert!(results.iter().all(|(_, r)| r.is_ok()));
    assert_eq!(manager.metrics().cache_entries, 3);
}

#[test]
fn test_load_all_cancelled() {
    let manager = manager();
    let archive = archive();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let results = manager.load_all(&archive, LoadOptions::default(), &cancel);
    assert_eq!(results.len(), 3);
    assert!(results
        .iter()
        .all(|(_, r)| matches!(r, Err(e) if e.kind() == ErrorKind::Cancelled)));
}

#[test]
fn test_archives_do_not_share_cache_entries() {
    let manager = manager();
    let first = archive();
    let second = archive();

    let a = load(&manager, &first, NAMES);
    let b = load(&manager, &second, NAMES);
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_evict_forces_rebuild() {
    let manager = manager();
    let archive = archive();

    let first = load(&manager, &archive, NAMES);
    manager.evict(&archive, NAMES);
    let second = load(&manager, &archive, NAMES);
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn test_create_empty_is_not_cached() {
    let manager = manager();

    let mut empty = manager.create_empty(NAMES, LoadOptions::default()).unwrap();
    assert_eq!(empty.format_name(), "NameMap");
    let typed = empty.downcast_mut::<NameMapResource>().unwrap();
    assert_eq!(typed.state().unwrap(), &NameMap::default());
    assert_eq!(manager.metrics().cache_entries, 0);
}

#[test]
fn test_registry_without_catch_all() {
    let manager = ResourceManager::with_registry(
        Arc::new(FactoryRegistry::new()),
        ManagerOptions::without_maintenance(),
    );
    let archive = archive();

    let err = manager
        .create_or_load(&archive, UNKNOWN, LoadOptions::default(), &CancellationToken::new())
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(manager.discovery().is_none());
}

#[test]
fn test_eager_parse_reports_bad_data() {
    let manager = ResourceManager::new(ManagerOptions {
        eager_parse: true,
        ..ManagerOptions::without_maintenance()
    })
    .unwrap();
    let mut archive = archive();
    archive.insert(NAMES, vec![1, 0, 0, 0, 50, 0, 0, 0]);

    let err = manager
        .create_or_load(&archive, NAMES, LoadOptions::default(), &CancellationToken::new())
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert_eq!(manager.metrics().failed, 1);
    assert_eq!(manager.metrics().cache_entries, 0);
}

#[test]
fn test_capacity_never_drops_held_resources() {
    let manager = ResourceManager::new(ManagerOptions {
        cache_capacity: 1,
        ..ManagerOptions::without_maintenance()
    })
    .unwrap();
    let archive = archive();

    let names = load(&manager, &archive, NAMES);
    let _more = load(&manager, &archive, MORE_NAMES);
    assert_eq!(manager.metrics().cache_entries, 2);

    let again = load(&manager, &archive, NAMES);
    assert!(Arc::ptr_eq(&names, &again));
    assert_eq!(manager.metrics().misses, 2);
}

#[test]
fn test_capacity_prunes_dropped_resources() {
    let manager = ResourceManager::new(ManagerOptions {
        cache_capacity: 2,
        ..ManagerOptions::without_maintenance()
    })
    .unwrap();
    let archive = archive();

    drop(load(&manager, &archive, NAMES));
    let _more = load(&manager, &archive, MORE_NAMES);
    let _unknown = load(&manager, &archive, UNKNOWN);

    let metrics = manager.metrics();
    assert_eq!(metrics.cache_entries, 2);
    assert_eq!(metrics.live_entries, 2);
}

#[test]
fn test_concurrent_loads_share_one_entry() {
    let manager = Arc::new(manager());
    let archive = Arc::new(archive());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let archive = Arc::clone(&archive);
            thread::spawn(move || {
                (0..50)
                    .map(|_| load(&manager, &archive, NAMES))
                    .last()
                    .unwrap()
            })
        })
        .collect();
    let loaded: Vec<SharedResource> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(loaded.iter().all(|r| Arc::ptr_eq(r, &loaded[0])));
    let metrics = manager.metrics();
    assert_eq!(metrics.cache_entries, 1);
    assert_eq!(metrics.hits + metrics.misses, 400);
}

#[test]
fn test_maintenance_publishes_metrics() {
    let manager = ResourceManager::new(ManagerOptions {
        maintenance_interval: Some(Duration::from_millis(10)),
        ..ManagerOptions::default()
    })
    .unwrap();
    assert!(manager.is_maintenance_running());

    let archive = archive();
    drop(load(&manager, &archive, NAMES));

    let mut latest = None;
    for _ in 0..100 {
        thread::sleep(Duration::from_millis(10));
        latest = manager.latest_metrics();
        if latest.as_ref().is_some_and(|m| m.cache_entries == 0) {
            break;
        }
    }
    let latest = latest.unwrap();
    assert_eq!(latest.misses, 1);
    assert_eq!(latest.cache_entries, 0);

    manager.shutdown();
    assert!(!manager.is_maintenance_running());
    // Still usable after shutdown.
    load(&manager, &archive, NAMES);
}
