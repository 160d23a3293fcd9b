//! Name map, types 0x0166038C and 0xF3A38370: instance hash to readable
//! name. Entry order is preserved.

use super::io::{ResourceReader, ResourceWriter};
use super::{Codec, ContentValue, FieldInfo};
use crate::config::ParseLimits;
use crate::error::FormatError;

pub const TYPE_ID: u32 = 0x0166038C;
pub const TYPE_ID_ALT: u32 = 0xF3A38370;

pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMapEntry {
    pub instance: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMap {
    pub version: u32,
    pub entries: Vec<NameMapEntry>,
}

impl NameMap {
    pub fn get(&self, instance: u64) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.instance == instance)
            .map(|e| e.name.as_str())
    }

    /// Replaces the name of an existing entry or appends a new one.
    pub fn insert(&mut self, instance: u64, name: impl Into<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.instance == instance) {
            Some(entry) => entry.name = name,
            None => self.entries.push(NameMapEntry { instance, name }),
        }
    }
}

impl Default for NameMap {
    fn default() -> Self {
        Self::initialize_defaults()
    }
}

impl Codec for NameMap {
    const NAME: &'static str = "NameMap";
    const TYPE_IDS: &'static [u32] = &[TYPE_ID, TYPE_ID_ALT];
    const FIELDS: &'static [FieldInfo] = &[
        FieldInfo::rw("Version"),
        FieldInfo::ro("Count"),
        FieldInfo::ro("Names"),
    ];

    fn parse(data: &[u8], limits: &ParseLimits) -> Result<Self, FormatError> {
        let mut r = ResourceReader::new(data, limits);
        let version = r.u32()?;
        let count = r.count("name map entry", 12)?;
        let entries = r.list(count, |r| {
            Ok(NameMapEntry {
                instance: r.u64()?,
                name: r.string_utf8()?,
            })
        })?;
        Ok(Self { version, entries })
    }

    fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut w = ResourceWriter::new();
        w.u32(self.version);
        w.count_u32("name map entry count", self.entries.len())?;
        for entry in &self.entries {
            w.u64(entry.instance);
            w.string_utf8(&entry.name)?;
        }
        Ok(w.into_inner())
    }

    fn initialize_defaults() -> Self {
        Self {
            version: CURRENT_VERSION,
            entries: Vec::new(),
        }
    }

    fn get_field(&self, name: &str) -> Option<ContentValue> {
        Some(match name {
            "Version" => self.version.into(),
            "Count" => (self.entries.len() as u32).into(),
            "Names" => ContentValue::List(self.entries.iter().map(|e| e.name.as_str().into()).collect()),
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: ContentValue) -> Result<bool, FormatError> {
        match name {
            "Version" => self.version = value.try_into()?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}
