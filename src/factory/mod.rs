//! Factories turn raw bytes into resources. Each one declares the type ids it
//! handles and a priority used by [`registry::FactoryRegistry`] to settle
//! competing claims.

pub mod registry;

use crate::config::ParseLimits;
use crate::error::Result;
use crate::package::index::ResourceKey;
use crate::resource::{Codec, GenericResource, Resource, TypedResource};
use std::marker::PhantomData;

pub use registry::{
    discover, register_builtin, CodecModule, DiscoveryFailure, DiscoveryReport, FactoryRegistry,
    RegistrationInfo, RegistrationOutcome, BUILTIN_MODULES,
};

/// Settings handed to [`ResourceFactory::create`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    pub limits: ParseLimits,
    /// Parse while constructing instead of on first field access.
    pub eager: bool,
}

pub trait ResourceFactory: Send + Sync {
    fn name(&self) -> &'static str;

    /// Type ids this factory claims. Empty for the catch-all.
    fn type_ids(&self) -> &'static [u32];

    /// Higher wins when two factories claim the same type id.
    fn priority(&self) -> i32;

    fn create(&self, key: ResourceKey, data: Vec<u8>, options: &CreateOptions) -> Result<Box<dyn Resource>>;

    fn create_empty(&self, key: ResourceKey) -> Box<dyn Resource>;
}

/// Factory for any [`Codec`], producing [`TypedResource`]s.
pub struct CodecFactory<C: Codec> {
    priority: i32,
    _codec: PhantomData<fn() -> C>,
}

impl<C: Codec> CodecFactory<C> {
    pub const DEFAULT_PRIORITY: i32 = 100;

    pub fn new() -> Self {
        Self::with_priority(Self::DEFAULT_PRIORITY)
    }

    pub fn with_priority(priority: i32) -> Self {
        Self {
            priority,
            _codec: PhantomData,
        }
    }
}

impl<C: Codec> Default for CodecFactory<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Codec> ResourceFactory for CodecFactory<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn type_ids(&self) -> &'static [u32] {
        C::TYPE_IDS
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn create(&self, key: ResourceKey, data: Vec<u8>, options: &CreateOptions) -> Result<Box<dyn Resource>> {
        let resource = if options.eager {
            TypedResource::<C>::parse_now(key, data, &options.limits)?
        } else {
            TypedResource::<C>::from_bytes(key, data, &options.limits)
        };
        Ok(Box::new(resource))
    }

    fn create_empty(&self, key: ResourceKey) -> Box<dyn Resource> {
        Box::new(TypedResource::<C>::new_empty(key))
    }
}

/// Catch-all for type ids no codec claims; keeps the raw bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericFactory;

impl ResourceFactory for GenericFactory {
    fn name(&self) -> &'static str {
        GenericResource::NAME
    }

    fn type_ids(&self) -> &'static [u32] {
        &[]
    }

    fn priority(&self) -> i32 {
        0
    }

    fn create(&self, key: ResourceKey, data: Vec<u8>, _options: &CreateOptions) -> Result<Box<dyn Resource>> {
        Ok(Box::new(GenericResource::new(key, data)))
    }

    fn create_empty(&self, key: ResourceKey) -> Box<dyn Resource> {
        Box::new(GenericResource::new(key, Vec::new()))
    }
}
