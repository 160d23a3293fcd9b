use super::{ChangeListener, ContentValue, FieldInfo, Resource};
use crate::error::{ResourceError, Result};
use crate::package::index::ResourceKey;
use std::any::Any;

/// Raw bytes of a resource no codec claims.
pub struct GenericResource {
    key: ResourceKey,
    pub data: Vec<u8>,
    listeners: Vec<ChangeListener>,
}

impl std::fmt::Debug for GenericResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericResource")
            .field("key", &self.key)
            .field("len", &self.data.len())
            .finish()
    }
}

const FIELDS: &[FieldInfo] = &[FieldInfo::rw("Data"), FieldInfo::ro("Length")];

impl GenericResource {
    pub const NAME: &'static str = "Generic";

    pub fn new(key: ResourceKey, data: Vec<u8>) -> Self {
        Self {
            key,
            data,
            listeners: Vec::new(),
        }
    }

    pub fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
        for listener in &self.listeners {
            listener(self.key);
        }
    }
}

impl Resource for GenericResource {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn format_name(&self) -> &'static str {
        Self::NAME
    }

    fn to_bytes(&mut self) -> Result<Vec<u8>> {
        Ok(self.data.clone())
    }

    // The buffer is the state, so it is never stale.
    fn is_dirty(&self) -> bool {
        false
    }

    fn subscribe(&mut self, listener: ChangeListener) {
        self.listeners.push(listener);
    }

    fn content_fields(&self) -> &'static [FieldInfo] {
        FIELDS
    }

    fn get_field(&mut self, name: &str) -> Result<ContentValue> {
        match name {
            "Data" => Ok(ContentValue::Bytes(self.data.clone())),
            "Length" => Ok(ContentValue::U32(self.data.len() as u32)),
            _ => Err(ResourceError::UnsupportedField {
                format: Self::NAME,
                field: name.to_string(),
            }),
        }
    }

    fn set_field(&mut self, name: &str, value: ContentValue) -> Result<()> {
        match name {
            "Data" => {
                let data = Vec::<u8>::try_from(value).map_err(|e| ResourceError::format(Self::NAME, e))?;
                self.set_data(data);
                Ok(())
            }
            "Length" => Err(ResourceError::UnsupportedOperation(
                "Generic.Length is read-only".to_string(),
            )),
            _ => Err(ResourceError::UnsupportedField {
                format: Self::NAME,
                field: name.to_string(),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
