pub mod bone;
pub mod caspart;
pub mod color_timeline;
pub mod deformer_map;
pub mod generic;
pub mod io;
pub mod name_map;
pub mod region_map;
pub mod styled_look;
pub mod value;
pub mod weather;

use crate::config::ParseLimits;
use crate::error::{FormatError, ResourceError, Result};
use crate::package::index::ResourceKey;
use std::any::Any;
use std::io::Cursor;

pub use generic::GenericResource;
pub use value::{ContentValue, FieldInfo};

pub type CasPartResource = TypedResource<caspart::CasPart>;
pub type RegionMapResource = TypedResource<region_map::RegionMap>;
pub type DeformerMapResource = TypedResource<deformer_map::DeformerMap>;
pub type BoneResource = TypedResource<bone::BoneTable>;
pub type StyledLookResource = TypedResource<styled_look::StyledLook>;
pub type WeatherResource = TypedResource<weather::Weather>;
pub type NameMapResource = TypedResource<name_map::NameMap>;
pub type ColorTimelineResource = TypedResource<color_timeline::ColorTimeline>;

/// Called with the resource's key after every mutation.
pub type ChangeListener = Box<dyn Fn(ResourceKey) + Send + Sync>;

/// What every decoded resource exposes, whatever its format.
pub trait Resource: Send + Sync + std::fmt::Debug {
    fn key(&self) -> ResourceKey;

    /// Name of the format, used in errors and tooling.
    fn format_name(&self) -> &'static str;

    /// Current bytes, re-serialized first if a field changed since the last read.
    fn to_bytes(&mut self) -> Result<Vec<u8>>;

    fn stream(&mut self) -> Result<Cursor<Vec<u8>>> {
        Ok(Cursor::new(self.to_bytes()?))
    }

    /// Encodes the current fields even when nothing changed.
    fn reserialize(&mut self) -> Result<Vec<u8>> {
        self.to_bytes()
    }

    /// True when fields changed and the byte buffer is stale.
    fn is_dirty(&self) -> bool;

    fn subscribe(&mut self, listener: ChangeListener);

    fn content_fields(&self) -> &'static [FieldInfo];

    fn get_field(&mut self, name: &str) -> Result<ContentValue>;

    fn set_field(&mut self, name: &str, value: ContentValue) -> Result<()>;

    fn get_field_at(&mut self, index: usize) -> Result<ContentValue> {
        let name = field_name_at(self.format_name(), self.content_fields(), index)?;
        self.get_field(name)
    }

    fn set_field_at(&mut self, index: usize, value: ContentValue) -> Result<()> {
        let name = field_name_at(self.format_name(), self.content_fields(), index)?;
        self.set_field(name, value)
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

fn field_name_at(format: &'static str, fields: &'static [FieldInfo], index: usize) -> Result<&'static str> {
    fields
        .get(index)
        .map(|f| f.name)
        .ok_or_else(|| ResourceError::UnsupportedField {
            format,
            field: format!("#{}", index),
        })
}

impl dyn Resource {
    pub fn downcast_ref<T: Resource + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Resource + 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// A binary format: bytes to typed state and back.
pub trait Codec: Sized + Send + Sync + std::fmt::Debug + 'static {
    const NAME: &'static str;

    /// Type ids this codec decodes.
    const TYPE_IDS: &'static [u32];

    const FIELDS: &'static [FieldInfo] = &[];

    /// Decodes `data`; nothing from `data` is borrowed past the call.
    fn parse(data: &[u8], limits: &ParseLimits) -> Result<Self, FormatError>;

    /// Encodes the current state. Equal states give equal bytes.
    fn serialize(&self) -> Result<Vec<u8>, FormatError>;

    /// State of a new, empty resource.
    fn initialize_defaults() -> Self;

    fn get_field(&self, name: &str) -> Option<ContentValue> {
        let _ = name;
        None
    }

    /// `Ok(false)` when the name is not one of [`Self::FIELDS`].
    fn set_field(&mut self, name: &str, value: ContentValue) -> Result<bool, FormatError> {
        let _ = (name, value);
        Ok(false)
    }
}

/// Shared base of all codec-backed resources: lazy parsing, dirty tracking and
/// change notification around a [`Codec`] state.
pub struct TypedResource<C: Codec> {
    key: ResourceKey,
    limits: ParseLimits,
    /// Clean bytes; `None` until the first serialization of a new resource.
    data: Option<Vec<u8>>,
    state: Option<C>,
    dirty: bool,
    listeners: Vec<ChangeListener>,
}

impl<C: Codec> std::fmt::Debug for TypedResource<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedResource")
            .field("format", &C::NAME)
            .field("key", &self.key)
            .field("parsed", &self.state.is_some())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl<C: Codec> TypedResource<C> {
    /// Wraps `data`; parsing waits until a field is first touched.
    pub fn from_bytes(key: ResourceKey, data: Vec<u8>, limits: &ParseLimits) -> Self {
        Self {
            key,
            limits: *limits,
            data: Some(data),
            state: None,
            dirty: false,
            listeners: Vec::new(),
        }
    }

    /// Wraps and parses `data` immediately.
    pub fn parse_now(key: ResourceKey, data: Vec<u8>, limits: &ParseLimits) -> Result<Self> {
        let mut resource = Self::from_bytes(key, data, limits);
        resource.ensure_parsed()?;
        Ok(resource)
    }

    /// A resource with default field values and no bytes yet.
    pub fn new_empty(key: ResourceKey) -> Self {
        Self {
            key,
            limits: ParseLimits::default(),
            data: None,
            state: Some(C::initialize_defaults()),
            dirty: true,
            listeners: Vec::new(),
        }
    }

    pub fn from_state(key: ResourceKey, state: C) -> Self {
        Self {
            state: Some(state),
            ..Self::new_empty(key)
        }
    }

    fn ensure_parsed(&mut self) -> Result<&mut C> {
        if self.state.is_none() {
            let data = self.data.as_deref().unwrap_or_default();
            let parsed = C::parse(data, &self.limits).map_err(|e| ResourceError::format(C::NAME, e))?;
            self.state = Some(parsed);
        }
        match self.state.as_mut() {
            Some(state) => Ok(state),
            None => Err(ResourceError::UnsupportedOperation(format!("{} state missing", C::NAME))),
        }
    }

    pub fn is_parsed(&self) -> bool {
        self.state.is_some()
    }

    /// Parsed fields, decoding on first access.
    pub fn state(&mut self) -> Result<&C> {
        Ok(&*self.ensure_parsed()?)
    }

    /// Applies `f` to the fields, marks the resource dirty and notifies listeners.
    pub fn modify<R>(&mut self, f: impl FnOnce(&mut C) -> R) -> Result<R> {
        let result = f(self.ensure_parsed()?);
        self.mark_dirty();
        Ok(result)
    }

    pub fn into_state(mut self) -> Result<C> {
        self.ensure_parsed()?;
        self.state
            .take()
            .ok_or_else(|| ResourceError::UnsupportedOperation(format!("{} state missing", C::NAME)))
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
        for listener in &self.listeners {
            listener(self.key);
        }
    }
}

impl<C: Codec> Resource for TypedResource<C> {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn format_name(&self) -> &'static str {
        C::NAME
    }

    fn to_bytes(&mut self) -> Result<Vec<u8>> {
        if self.dirty || self.data.is_none() {
            let state = self.ensure_parsed()?;
            let bytes = state.serialize().map_err(|e| ResourceError::format(C::NAME, e))?;
            self.data = Some(bytes);
            self.dirty = false;
        }
        Ok(self.data.clone().unwrap_or_default())
    }

    fn reserialize(&mut self) -> Result<Vec<u8>> {
        self.ensure_parsed()?
            .serialize()
            .map_err(|e| ResourceError::format(C::NAME, e))
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn subscribe(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    fn content_fields(&self) -> &'static [FieldInfo] {
        C::FIELDS
    }

    fn get_field(&mut self, name: &str) -> Result<ContentValue> {
        let unsupported = || ResourceError::UnsupportedField {
            format: C::NAME,
            field: name.to_string(),
        };
        if !C::FIELDS.iter().any(|f| f.name == name) {
            return Err(unsupported());
        }
        self.ensure_parsed()?.get_field(name).ok_or_else(unsupported)
    }

    fn set_field(&mut self, name: &str, value: ContentValue) -> Result<()> {
        let info = C::FIELDS
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| ResourceError::UnsupportedField {
                format: C::NAME,
                field: name.to_string(),
            })?;
        if !info.writable {
            return Err(ResourceError::UnsupportedOperation(format!(
                "{}.{} is read-only",
                C::NAME,
                name
            )));
        }
        let state = self.ensure_parsed()?;
        match state.set_field(name, value) {
            Ok(true) => {
                self.mark_dirty();
                Ok(())
            }
            Ok(false) => Err(ResourceError::UnsupportedField {
                format: C::NAME,
                field: name.to_string(),
            }),
            Err(e) => Err(ResourceError::format(C::NAME, e)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
