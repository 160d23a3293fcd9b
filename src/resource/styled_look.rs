//! Styled look, type 0x71BDB8A2: a named outfit preset with two animation
//! references. Strings here are `u32` length + ASCII.

use super::io::{
    read_flags, read_swatches, write_flags, write_swatches, Flag, PackInfo, ResourceReader,
    ResourceWriter,
};
use super::{Codec, ContentValue, FieldInfo};
use crate::config::ParseLimits;
use crate::error::FormatError;
use crate::package::index::ResourceKey;

pub const TYPE_ID: u32 = 0x71BDB8A2;

pub const CURRENT_VERSION: u32 = 0x0A;

const WIDE_FLAGS: u32 = 8;
const PACK: u32 = 0x0A;

#[derive(Debug, Clone, PartialEq)]
pub struct StyledLook {
    pub version: u32,
    pub age_gender: u32,
    pub grouping_id: u64,
    pub unknown1: u8,
    pub name_hash: u32,
    pub description_hash: u32,
    pub animation_ref1: ResourceKey,
    pub animation_state_name1: String,
    pub animation_ref2: ResourceKey,
    pub animation_state_name2: String,
    pub swatch_colors: Vec<u32>,
    pub flags: Vec<Flag>,
    pub pack: PackInfo,
}

impl Default for StyledLook {
    fn default() -> Self {
        Self::initialize_defaults()
    }
}

impl Codec for StyledLook {
    const NAME: &'static str = "StyledLook";
    const TYPE_IDS: &'static [u32] = &[TYPE_ID];
    const FIELDS: &'static [FieldInfo] = &[
        FieldInfo::ro("Version"),
        FieldInfo::rw("AgeGender"),
        FieldInfo::rw("GroupingId"),
        FieldInfo::rw("NameHash"),
        FieldInfo::rw("DescriptionHash"),
        FieldInfo::rw("AnimationRef1"),
        FieldInfo::rw("AnimationStateName1"),
        FieldInfo::rw("AnimationRef2"),
        FieldInfo::rw("AnimationStateName2"),
        FieldInfo::rw("PackId"),
    ];

    fn parse(data: &[u8], limits: &ParseLimits) -> Result<Self, FormatError> {
        let mut r = ResourceReader::new(data, limits);

        let version = r.u32()?;
        let age_gender = r.u32()?;
        let grouping_id = r.u64()?;
        let unknown1 = r.u8()?;
        let name_hash = r.u32()?;
        let description_hash = r.u32()?;
        let animation_ref1 = r.key_itg()?;
        let animation_state_name1 = r.string_ascii()?;
        let animation_ref2 = r.key_itg()?;
        let animation_state_name2 = r.string_ascii()?;
        let swatch_colors = read_swatches(&mut r)?;
        let flags = read_flags(&mut r, version >= WIDE_FLAGS)?;
        let pack = if version >= PACK {
            PackInfo::read(&mut r)?
        } else {
            PackInfo::default()
        };

        Ok(Self {
            version,
            age_gender,
            grouping_id,
            unknown1,
            name_hash,
            description_hash,
            animation_ref1,
            animation_state_name1,
            animation_ref2,
            animation_state_name2,
            swatch_colors,
            flags,
            pack,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut w = ResourceWriter::new();
        w.u32(self.version);
        w.u32(self.age_gender);
        w.u64(self.grouping_id);
        w.u8(self.unknown1);
        w.u32(self.name_hash);
        w.u32(self.description_hash);
        w.key_itg(&self.animation_ref1);
        w.string_ascii(&self.animation_state_name1)?;
        w.key_itg(&self.animation_ref2);
        w.string_ascii(&self.animation_state_name2)?;
        write_swatches(&mut w, &self.swatch_colors)?;
        write_flags(&mut w, &self.flags, self.version >= WIDE_FLAGS)?;
        if self.version >= PACK {
            self.pack.write(&mut w);
        }
        Ok(w.into_inner())
    }

    fn initialize_defaults() -> Self {
        Self {
            version: CURRENT_VERSION,
            age_gender: 0,
            grouping_id: 0,
            unknown1: 0,
            name_hash: 0,
            description_hash: 0,
            animation_ref1: ResourceKey::default(),
            animation_state_name1: String::new(),
            animation_ref2: ResourceKey::default(),
            animation_state_name2: String::new(),
            swatch_colors: Vec::new(),
            flags: Vec::new(),
            pack: PackInfo::default(),
        }
    }

    fn get_field(&self, name: &str) -> Option<ContentValue> {
        Some(match name {
            "Version" => self.version.into(),
            "AgeGender" => self.age_gender.into(),
            "GroupingId" => self.grouping_id.into(),
            "NameHash" => self.name_hash.into(),
            "DescriptionHash" => self.description_hash.into(),
            "AnimationRef1" => self.animation_ref1.into(),
            "AnimationStateName1" => self.animation_state_name1.clone().into(),
            "AnimationRef2" => self.animation_ref2.into(),
            "AnimationStateName2" => self.animation_state_name2.clone().into(),
            "PackId" => self.pack.pack_id.into(),
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: ContentValue) -> Result<bool, FormatError> {
        match name {
            "AgeGender" => self.age_gender = value.try_into()?,
            "GroupingId" => self.grouping_id = value.try_into()?,
            "NameHash" => self.name_hash = value.try_into()?,
            "DescriptionHash" => self.description_hash = value.try_into()?,
            "AnimationRef1" => self.animation_ref1 = value.try_into()?,
            "AnimationStateName1" => self.animation_state_name1 = ascii(value)?,
            "AnimationRef2" => self.animation_ref2 = value.try_into()?,
            "AnimationStateName2" => self.animation_state_name2 = ascii(value)?,
            "PackId" => self.pack.pack_id = value.try_into()?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn ascii(value: ContentValue) -> Result<String, FormatError> {
    let s = String::try_from(value)?;
    if !s.is_ascii() {
        return Err(FormatError::invalid(format!("{:?} is not ASCII", s)));
    }
    Ok(s)
}
