use s4pi_codecs::factory::{discover, register_builtin, CodecModule, BUILTIN_MODULES};
use s4pi_codecs::resource::name_map::NameMap;
use s4pi_codecs::{
    CancellationToken, CodecFactory, CreateOptions, ErrorKind, FactoryRegistry, GenericFactory,
    GenericResource, Resource, ResourceError, ResourceFactory, ResourceKey, Result,
};
use std::sync::Arc;

const TYPE_A: u32 = 0x1000_0001;
const TYPE_B: u32 = 0x1000_0002;

struct TestFactory {
    name: &'static str,
    priority: i32,
    type_ids: &'static [u32],
}

impl TestFactory {
    fn arc(name: &'static str, priority: i32, type_ids: &'static [u32]) -> Arc<dyn ResourceFactory> {
        Arc::new(Self {
            name,
            priority,
            type_ids,
        })
    }
}

impl ResourceFactory for TestFactory {
    fn name(&self) -> &'static str {
        self.name
    }

    fn type_ids(&self) -> &'static [u32] {
        self.type_ids
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn create(&self, key: ResourceKey, data: Vec<u8>, _options: &CreateOptions) -> Result<Box<dyn Resource>> {
        Ok(Box::new(GenericResource::new(key, data)))
    }

    fn create_empty(&self, key: ResourceKey) -> Box<dyn Resource> {
        Box::new(GenericResource::new(key, Vec::new()))
    }
}

#[test]
fn test_higher_priority_incumbent_is_kept() {
    let registry = FactoryRegistry::new();
    registry.register(TestFactory::arc("A", 100, &[TYPE_A]));
    let outcome = registry.register(TestFactory::arc("B", 50, &[TYPE_A]));

    assert!(outcome.claimed.is_empty());
    assert_eq!(outcome.skipped, vec![TYPE_A]);
    assert_eq!(registry.resolve(TYPE_A).unwrap().name(), "A");
}

#[test]
fn test_higher_priority_newcomer_replaces() {
    let registry = FactoryRegistry::new();
    registry.register(TestFactory::arc("A", 100, &[TYPE_A, TYPE_B]));
    let outcome = registry.register(TestFactory::arc("B", 150, &[TYPE_A]));

    assert_eq!(outcome.claimed, vec![TYPE_A]);
    assert_eq!(registry.resolve(TYPE_A).unwrap().name(), "B");
    assert_eq!(registry.resolve(TYPE_B).unwrap().name(), "A");
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_equal_priority_keeps_first() {
    let registry = FactoryRegistry::new();
    registry.register(TestFactory::arc("first", 100, &[TYPE_A]));
    registry.register(TestFactory::arc("second", 100, &[TYPE_A]));
    assert_eq!(registry.factory_for(TYPE_A).unwrap().name(), "first");
}

#[test]
fn test_fallback_only_without_exact_match() {
    let registry = FactoryRegistry::new();
    registry.register(TestFactory::arc("A", 1, &[TYPE_A]));
    registry.set_fallback(Arc::new(GenericFactory));

    // A low priority still beats the catch-all.
    assert_eq!(registry.resolve(TYPE_A).unwrap().name(), "A");
    assert_eq!(registry.resolve(TYPE_B).unwrap().name(), GenericResource::NAME);
    assert!(registry.factory_for(TYPE_B).is_none());
}

#[test]
fn test_missing_fallback_is_a_configuration_error() {
    let registry = FactoryRegistry::new();
    assert!(!registry.has_fallback());

    let err = registry.resolve(TYPE_B).err().unwrap();
    assert!(matches!(err, ResourceError::MissingFallback));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_registrations_listed_in_order() {
    let registry = FactoryRegistry::new();
    registry.register(TestFactory::arc("A", 10, &[TYPE_B]));
    registry.register(TestFactory::arc("B", 10, &[TYPE_A]));

    let regs = registry.registrations();
    assert_eq!(regs.len(), 2);
    assert_eq!((regs[0].type_id, regs[0].factory), (TYPE_B, "A"));
    assert_eq!((regs[1].type_id, regs[1].factory), (TYPE_A, "B"));
}

fn register_nothing(_: &FactoryRegistry) -> Result<usize> {
    Ok(0)
}

fn register_broken(_: &FactoryRegistry) -> Result<usize> {
    Err(ResourceError::UnsupportedOperation("codec data missing".to_string()))
}

fn register_panicking(_: &FactoryRegistry) -> Result<usize> {
    panic!("bad module")
}

fn register_a(registry: &FactoryRegistry) -> Result<usize> {
    registry.register(TestFactory::arc("A", 100, &[TYPE_A]));
    Ok(1)
}

#[test]
fn test_discovery_isolates_failing_modules() {
    let modules = [
        CodecModule {
            name: "broken",
            register: register_broken,
        },
        CodecModule {
            name: "empty",
            register: register_nothing,
        },
        CodecModule {
            name: "panicking",
            register: register_panicking,
        },
        CodecModule {
            name: "a",
            register: register_a,
        },
    ];
    let registry = FactoryRegistry::new();
    let report = discover(&registry, &modules, &CancellationToken::new()).unwrap();

    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 3);
    assert_eq!(report.factories, 1);
    let failed: Vec<_> = report.failures.iter().map(|f| f.module).collect();
    assert_eq!(failed, vec!["broken", "empty", "panicking"]);
    assert!(report.failures[0].reason.contains("codec data missing"));
    assert_eq!(registry.factory_for(TYPE_A).unwrap().name(), "A");
}

#[test]
fn test_discovery_stops_when_cancelled() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let registry = FactoryRegistry::new();

    let err = discover(&registry, BUILTIN_MODULES, &cancel).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(registry.is_empty());
}

#[test]
fn test_builtin_registration() {
    let registry = FactoryRegistry::new();
    let report = register_builtin(&registry, &CancellationToken::new()).unwrap();

    assert_eq!(report.failed, 0);
    assert_eq!(report.succeeded, BUILTIN_MODULES.len());
    assert!(registry.has_fallback());

    assert_eq!(registry.resolve(0x034AE111).unwrap().name(), "CasPart");
    assert_eq!(registry.resolve(0xAC16FBEC).unwrap().name(), "RegionMap");
    assert_eq!(registry.resolve(0xDB43E069).unwrap().name(), "DeformerMap");
    assert_eq!(registry.resolve(0x00AE6C67).unwrap().name(), "Bone");
    assert_eq!(registry.resolve(0x0166038C).unwrap().name(), "NameMap");
    assert_eq!(registry.resolve(0xF3A38370).unwrap().name(), "NameMap");
    assert_eq!(registry.resolve(0xDEADBEEF).unwrap().name(), "Generic");
}

#[test]
fn test_custom_codec_overrides_builtin() {
    let registry = FactoryRegistry::new();
    register_builtin(&registry, &CancellationToken::new()).unwrap();

    let outcome = registry.register(TestFactory::arc("Custom", 200, &[0x0166038C]));
    assert_eq!(outcome.claimed, vec![0x0166038C]);
    assert_eq!(registry.resolve(0x0166038C).unwrap().name(), "Custom");
    assert_eq!(registry.resolve(0xF3A38370).unwrap().name(), "NameMap");
}

#[test]
fn test_codec_factory_lazy_and_eager() {
    let factory = CodecFactory::<NameMap>::new();
    let key = ResourceKey::new(0x0166038C, 0, 1);
    let bad = vec![1, 0, 0, 0, 9, 0, 0, 0];

    let lazy = factory.create(key, bad.clone(), &CreateOptions::default());
    assert!(lazy.is_ok());

    let eager = CreateOptions {
        eager: true,
        ..CreateOptions::default()
    };
    let err = factory.create(key, bad, &eager).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Format);

    let empty = factory.create_empty(key);
    assert_eq!(empty.format_name(), "NameMap");
    assert!(empty.is_dirty());
}
