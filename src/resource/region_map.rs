//! Region map, type 0xAC16FBEC: which geometry resources cover which body
//! regions. Entries refer to geometry by index into a TGI block stored after
//! the entry list.

use super::io::{ResourceReader, ResourceWriter, KEY_BLOCK_SIZE};
use super::{Codec, ContentValue, FieldInfo};
use crate::config::ParseLimits;
use crate::error::FormatError;
use crate::package::index::ResourceKey;

pub const TYPE_ID: u32 = 0xAC16FBEC;

pub const CURRENT_VERSION: u32 = 2;

/// Entries carry an `is_replacement` byte from this version on.
const REPLACEMENT_FLAG: u32 = 2;

const TGI_OFFSET_BASE: u64 = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct RegionEntry {
    pub region: u32,
    pub layer: f32,
    pub is_replacement: bool,
    /// Indices into the TGI block.
    pub key_indices: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionMap {
    pub version: u32,
    pub entries: Vec<RegionEntry>,
    pub tgi_list: Vec<ResourceKey>,
}

impl RegionMap {
    /// Keys referenced by `entry`; indices outside the block are skipped.
    pub fn keys_for<'a>(&'a self, entry: &'a RegionEntry) -> impl Iterator<Item = &'a ResourceKey> + 'a {
        entry
            .key_indices
            .iter()
            .filter_map(move |&i| self.tgi_list.get(i as usize))
    }
}

impl Default for RegionMap {
    fn default() -> Self {
        Self::initialize_defaults()
    }
}

impl Codec for RegionMap {
    const NAME: &'static str = "RegionMap";
    const TYPE_IDS: &'static [u32] = &[TYPE_ID];
    const FIELDS: &'static [FieldInfo] = &[
        FieldInfo::rw("Version"),
        FieldInfo::ro("EntryCount"),
        FieldInfo::ro("TgiList"),
    ];

    fn parse(data: &[u8], limits: &ParseLimits) -> Result<Self, FormatError> {
        let mut r = ResourceReader::new(data, limits);

        let version = r.u32()?;
        let tgi_offset = r.u32()? as u64 + TGI_OFFSET_BASE;
        let tgi_size = r.u32()?;
        let tgi_list = r.at_offset(tgi_offset, |r| {
            let count = r.count("TGI block", KEY_BLOCK_SIZE)?;
            r.list(count, |r| r.key_itg())
        })?;
        let expected_size = 4 + KEY_BLOCK_SIZE * tgi_list.len() as u64;
        if tgi_size as u64 != expected_size {
            return Err(FormatError::CountMismatch {
                what: "TGI block size",
                left: tgi_size as u64,
                right: expected_size,
            });
        }

        let entry_size = if version >= REPLACEMENT_FLAG { 13 } else { 12 };
        let entry_count = r.count("region entry", entry_size)?;
        let entries = r.list(entry_count, |r| {
            let region = r.u32()?;
            let layer = r.f32()?;
            let is_replacement = if version >= REPLACEMENT_FLAG { r.bool()? } else { false };
            let index_count = r.count("key index", 4)?;
            let key_indices = r.list(index_count, |r| r.u32())?;
            Ok(RegionEntry {
                region,
                layer,
                is_replacement,
                key_indices,
            })
        })?;

        if r.position() != tgi_offset {
            return Err(FormatError::invalid(format!(
                "entry list ends at {} but the TGI block starts at {}",
                r.position(),
                tgi_offset
            )));
        }

        Ok(Self {
            version,
            entries,
            tgi_list,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut w = ResourceWriter::new();

        w.u32(self.version);
        let offset_at = w.reserve_u32();
        let size_at = w.reserve_u32();

        w.count_u32("region entry count", self.entries.len())?;
        for entry in &self.entries {
            w.u32(entry.region);
            w.f32(entry.layer);
            if self.version >= REPLACEMENT_FLAG {
                w.bool(entry.is_replacement);
            }
            w.count_u32("key index count", entry.key_indices.len())?;
            for &index in &entry.key_indices {
                w.u32(index);
            }
        }

        let block_start = w.position();
        w.count_u32("TGI block count", self.tgi_list.len())?;
        for key in &self.tgi_list {
            w.key_itg(key);
        }
        let block_size = w.position() - block_start;

        let relative = block_start - TGI_OFFSET_BASE;
        w.patch_u32(
            offset_at,
            u32::try_from(relative).map_err(|_| FormatError::Overflow {
                what: "TGI offset",
                value: relative,
            })?,
        );
        w.patch_u32(
            size_at,
            u32::try_from(block_size).map_err(|_| FormatError::Overflow {
                what: "TGI block size",
                value: block_size,
            })?,
        );

        Ok(w.into_inner())
    }

    fn initialize_defaults() -> Self {
        Self {
            version: CURRENT_VERSION,
            entries: Vec::new(),
            tgi_list: Vec::new(),
        }
    }

    fn get_field(&self, name: &str) -> Option<ContentValue> {
        Some(match name {
            "Version" => self.version.into(),
            "EntryCount" => (self.entries.len() as u32).into(),
            "TgiList" => ContentValue::List(self.tgi_list.iter().map(|&k| k.into()).collect()),
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
