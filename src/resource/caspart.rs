//! CAS part (clothing/body part) descriptor, type 0x034AE111.
//!
//! The header holds a placeholder offset to the TGI block, which is written
//! after the body. The stored value is relative to the end of the 8-byte
//! version/offset header. The many `*_key: u8` fields are indices into that
//! block.

use super::io::{
    read_flags, read_swatches, write_flags, write_swatches, Flag, FormatResult, PackInfo,
    ResourceReader, ResourceWriter, KEY_BLOCK_SIZE,
};
use super::{Codec, ContentValue, FieldInfo};
use crate::config::ParseLimits;
use crate::error::FormatError;
use crate::package::index::ResourceKey;

pub const TYPE_ID: u32 = 0x034AE111;

pub const MIN_VERSION: u32 = 0x1B;
pub const CURRENT_VERSION: u32 = 0x2C;

const VOICE_EFFECT: u32 = 0x1C;
const EMISSION_AND_MATERIALS: u32 = 0x1E;
const OCCULT: u32 = 0x1F;
const RESERVED1: u32 = 0x20;
const PACK: u32 = 0x22;
const WIDE_FLAGS: u32 = 0x25;
const OPPOSITE_GENDER: u32 = 0x26;
const FALLBACK: u32 = 0x27;
const EXCLUDE2: u32 = 0x29;
const CREATE_DESCRIPTION: u32 = 0x2B;
const OPACITY: u32 = 0x2C;

/// Bytes between the start of the buffer and the origin of the stored offset.
const TGI_OFFSET_BASE: u64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LodAsset {
    pub sorting: i32,
    pub spec_level: i32,
    pub cast_shadow: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LodBlock {
    pub level: u8,
    pub unused: u32,
    pub assets: Vec<LodAsset>,
    /// Indices into the TGI block.
    pub key_indices: Vec<u8>,
}

impl LodBlock {
    fn read(r: &mut ResourceReader<'_>) -> FormatResult<Self> {
        let level = r.u8()?;
        let unused = r.u32()?;
        let asset_count = r.byte_count("LOD asset", 12)?;
        let assets = r.list(asset_count, |r| {
            Ok(LodAsset {
                sorting: r.i32()?,
                spec_level: r.i32()?,
                cast_shadow: r.i32()?,
            })
        })?;
        let key_count = r.byte_count("LOD key", 1)?;
        let key_indices = r.bytes(key_count as u64)?;
        Ok(Self {
            level,
            unused,
            assets,
            key_indices,
        })
    }

    fn write(&self, w: &mut ResourceWriter) -> FormatResult<()> {
        w.u8(self.level);
        w.u32(self.unused);
        w.count_u8("LOD asset count", self.assets.len())?;
        for asset in &self.assets {
            w.i32(asset.sorting);
            w.i32(asset.spec_level);
            w.i32(asset.cast_shadow);
        }
        w.count_u8("LOD key count", self.key_indices.len())?;
        w.bytes(&self.key_indices);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionOverride {
    pub region: u8,
    pub layer: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialSet {
    /// Count byte as stored. Always non-zero; three hashes follow it
    /// whatever its value.
    pub used_count: u8,
    pub upper_body: u32,
    pub lower_body: u32,
    pub shoes: u32,
}

impl Default for MaterialSet {
    fn default() -> Self {
        Self {
            used_count: 3,
            upper_body: 0,
            lower_body: 0,
            shoes: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpacitySettings {
    pub minimum: f32,
    pub increment: f32,
}

impl Default for OpacitySettings {
    fn default() -> Self {
        Self {
            minimum: 0.2,
            increment: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CasPart {
    pub version: u32,
    pub name: String,
    pub sort_priority: f32,
    pub secondary_sort_index: u16,
    pub property_id: u32,
    pub aural_material_hash: u32,
    pub parm_flags: u8,
    pub exclude_part_flags: u64,
    pub exclude_modifier_region_flags: u64,
    pub flags: Vec<Flag>,
    pub deprecated_price: u32,
    pub part_title_key: u32,
    pub part_description_key: u32,
    pub unique_texture_space: u8,
    pub body_type: i32,
    pub body_sub_type: i32,
    pub age_gender: u32,
    pub swatch_colors: Vec<u32>,
    pub buff_res_key: u8,
    pub variant_thumbnail_key: u8,
    pub naked_key: u8,
    pub parent_key: u8,
    pub sort_layer: i32,
    pub lod_blocks: Vec<LodBlock>,
    pub slot_keys: Vec<u8>,
    pub diffuse_shadow_key: u8,
    pub shadow_key: u8,
    pub composition_method: u8,
    pub region_map_key: u8,
    pub overrides: Vec<RegionOverride>,
    pub normal_map_key: u8,
    pub specular_map_key: u8,
    pub shared_uv_map_space: u32,
    pub voice_effect_hash: u64,
    pub emission_map_key: u8,
    pub material_set: Option<MaterialSet>,
    pub hide_for_occult_flags: u32,
    pub reserved1: u32,
    pub pack: PackInfo,
    pub opposite_gender_part: u64,
    pub fallback_part: u64,
    pub parm_flags2: u8,
    pub exclude_part_flags2: u64,
    pub create_description_key: u32,
    pub opacity: OpacitySettings,
    /// Bytes between the known body and the TGI block, kept verbatim.
    pub extra: Vec<u8>,
    pub tgi_list: Vec<ResourceKey>,
}

impl CasPart {
    /// Resolves a byte index into the TGI block.
    pub fn key_at(&self, index: u8) -> Option<&ResourceKey> {
        self.tgi_list.get(index as usize)
    }
}

impl Default for CasPart {
    fn default() -> Self {
        Self::initialize_defaults()
    }
}

impl Codec for CasPart {
    const NAME: &'static str = "CasPart";
    const TYPE_IDS: &'static [u32] = &[TYPE_ID];
    const FIELDS: &'static [FieldInfo] = &[
        FieldInfo::ro("Version"),
        FieldInfo::rw("Name"),
        FieldInfo::rw("SortPriority"),
        FieldInfo::rw("PropertyId"),
        FieldInfo::rw("BodyType"),
        FieldInfo::rw("BodySubType"),
        FieldInfo::rw("AgeGender"),
        FieldInfo::rw("PartTitleKey"),
        FieldInfo::rw("PackId"),
        FieldInfo::ro("SwatchColors"),
        FieldInfo::ro("TgiList"),
    ];

    fn parse(data: &[u8], limits: &ParseLimits) -> Result<Self, FormatError> {
        let mut r = ResourceReader::new(data, limits);

        let version = r.u32()?;
        if version < MIN_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
        let tgi_offset = r.u32()? as u64 + TGI_OFFSET_BASE;
        let tgi_list = r.at_offset(tgi_offset, |r| {
            let count = r.byte_count("TGI block", KEY_BLOCK_SIZE)?;
            r.list(count, |r| r.key_itg())
        })?;

        let preset_count = r.u32()?;
        if preset_count != 0 {
            return Err(FormatError::invalid(format!(
                "{} presets present; embedded presets are not supported",
                preset_count
            )));
        }

        let name = r.string_utf16be()?;
        let sort_priority = r.f32()?;
        let secondary_sort_index = r.u16()?;
        let property_id = r.u32()?;
        let aural_material_hash = r.u32()?;
        let parm_flags = r.u8()?;
        let exclude_part_flags = r.u64()?;
        let exclude_modifier_region_flags = r.u64()?;
        let flags = read_flags(&mut r, version >= WIDE_FLAGS)?;
        let deprecated_price = r.u32()?;
        let part_title_key = r.u32()?;
        let part_description_key = r.u32()?;
        let unique_texture_space = r.u8()?;
        let body_type = r.i32()?;
        let body_sub_type = r.i32()?;
        let age_gender = r.u32()?;
        let swatch_colors = read_swatches(&mut r)?;
        let buff_res_key = r.u8()?;
        let variant_thumbnail_key = r.u8()?;
        let naked_key = r.u8()?;
        let parent_key = r.u8()?;
        let sort_layer = r.i32()?;

        let lod_count = r.byte_count("LOD block", 7)?;
        let lod_blocks = r.list(lod_count, LodBlock::read)?;
        let slot_count = r.byte_count("slot key", 1)?;
        let slot_keys = r.bytes(slot_count as u64)?;

        let diffuse_shadow_key = r.u8()?;
        let shadow_key = r.u8()?;
        let composition_method = r.u8()?;
        let region_map_key = r.u8()?;
        let override_count = r.byte_count("override", 5)?;
        let overrides = r.list(override_count, |r| {
            Ok(RegionOverride {
                region: r.u8()?,
                layer: r.f32()?,
            })
        })?;
        let normal_map_key = r.u8()?;
        let specular_map_key = r.u8()?;
        let shared_uv_map_space = r.u32()?;

        let mut part = CasPart {
            version,
            name,
            sort_priority,
            secondary_sort_index,
            property_id,
            aural_material_hash,
            parm_flags,
            exclude_part_flags,
            exclude_modifier_region_flags,
            flags,
            deprecated_price,
            part_title_key,
            part_description_key,
            unique_texture_space,
            body_type,
            body_sub_type,
            age_gender,
            swatch_colors,
            buff_res_key,
            variant_thumbnail_key,
            naked_key,
            parent_key,
            sort_layer,
            lod_blocks,
            slot_keys,
            diffuse_shadow_key,
            shadow_key,
            composition_method,
            region_map_key,
            overrides,
            normal_map_key,
            specular_map_key,
            shared_uv_map_space,
            tgi_list,
            ..Self::initialize_defaults()
        };

        if version >= VOICE_EFFECT {
            part.voice_effect_hash = r.u64()?;
        }
        if version >= EMISSION_AND_MATERIALS {
            part.emission_map_key = r.u8()?;
            let used_material_count = r.u8()?;
            part.material_set = if used_material_count > 0 {
                Some(MaterialSet {
                    used_count: used_material_count,
                    upper_body: r.u32()?,
                    lower_body: r.u32()?,
                    shoes: r.u32()?,
                })
            } else {
                None
            };
        }
        if version >= OCCULT {
            part.hide_for_occult_flags = r.u32()?;
        }
        if version >= RESERVED1 {
            part.reserved1 = r.u32()?;
        }
        if version >= PACK {
            part.pack = PackInfo::read(&mut r)?;
        }
        if version >= OPPOSITE_GENDER {
            part.opposite_gender_part = r.u64()?;
        }
        if version >= FALLBACK {
            part.fallback_part = r.u64()?;
            part.parm_flags2 = r.u8()?;
        }
        if version >= EXCLUDE2 {
            part.exclude_part_flags2 = r.u64()?;
        }
        if version >= CREATE_DESCRIPTION {
            part.create_description_key = r.u32()?;
        }
        if version >= OPACITY {
            part.opacity = OpacitySettings {
                minimum: r.f32()?,
                increment: r.f32()?,
            };
        }

        let body_end = r.position();
        if body_end > tgi_offset {
            return Err(FormatError::invalid(format!(
                "body ends at {} but the TGI block starts at {}",
                body_end, tgi_offset
            )));
        }
        part.extra = r.bytes(tgi_offset - body_end)?;

        Ok(part)
    }

    fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        if self.version < MIN_VERSION {
            return Err(FormatError::UnsupportedVersion(self.version));
        }
        let version = self.version;
        let mut w = ResourceWriter::with_capacity(256);

        w.u32(version);
        let tgi_offset_at = w.reserve_u32();
        w.u32(0); // presets

        w.string_utf16be(&self.name);
        w.f32(self.sort_priority);
        w.u16(self.secondary_sort_index);
        w.u32(self.property_id);
        w.u32(self.aural_material_hash);
        w.u8(self.parm_flags);
        w.u64(self.exclude_part_flags);
        w.u64(self.exclude_modifier_region_flags);
        write_flags(&mut w, &self.flags, version >= WIDE_FLAGS)?;
        w.u32(self.deprecated_price);
        w.u32(self.part_title_key);
        w.u32(self.part_description_key);
        w.u8(self.unique_texture_space);
        w.i32(self.body_type);
        w.i32(self.body_sub_type);
        w.u32(self.age_gender);
        write_swatches(&mut w, &self.swatch_colors)?;
        w.u8(self.buff_res_key);
        w.u8(self.variant_thumbnail_key);
        w.u8(self.naked_key);
        w.u8(self.parent_key);
        w.i32(self.sort_layer);

        w.count_u8("LOD block count", self.lod_blocks.len())?;
        for block in &self.lod_blocks {
            block.write(&mut w)?;
        }
        w.count_u8("slot key count", self.slot_keys.len())?;
        w.bytes(&self.slot_keys);

        w.u8(self.diffuse_shadow_key);
        w.u8(self.shadow_key);
        w.u8(self.composition_method);
        w.u8(self.region_map_key);
        w.count_u8("override count", self.overrides.len())?;
        for o in &self.overrides {
            w.u8(o.region);
            w.f32(o.layer);
        }
        w.u8(self.normal_map_key);
        w.u8(self.specular_map_key);
        w.u32(self.shared_uv_map_space);

        if version >= VOICE_EFFECT {
            w.u64(self.voice_effect_hash);
        }
        if version >= EMISSION_AND_MATERIALS {
            w.u8(self.emission_map_key);
            match &self.material_set {
                Some(set) => {
                    if set.used_count == 0 {
                        return Err(FormatError::invalid(
                            "material set present with a used count of zero",
                        ));
                    }
                    w.u8(set.used_count);
                    w.u32(set.upper_body);
                    w.u32(set.lower_body);
                    w.u32(set.shoes);
                }
                None => w.u8(0),
            }
        }
        if version >= OCCULT {
            w.u32(self.hide_for_occult_flags);
        }
        if version >= RESERVED1 {
            w.u32(self.reserved1);
        }
        if version >= PACK {
            self.pack.write(&mut w);
        }
        if version >= OPPOSITE_GENDER {
            w.u64(self.opposite_gender_part);
        }
        if version >= FALLBACK {
            w.u64(self.fallback_part);
            w.u8(self.parm_flags2);
        }
        if version >= EXCLUDE2 {
            w.u64(self.exclude_part_flags2);
        }
        if version >= CREATE_DESCRIPTION {
            w.u32(self.create_description_key);
        }
        if version >= OPACITY {
            w.f32(self.opacity.minimum);
            w.f32(self.opacity.increment);
        }
        w.bytes(&self.extra);

        let relative = w.position() - TGI_OFFSET_BASE;
        let relative = u32::try_from(relative).map_err(|_| FormatError::Overflow {
            what: "TGI offset",
            value: relative,
        })?;
        w.patch_u32(tgi_offset_at, relative);

        w.count_u8("TGI block count", self.tgi_list.len())?;
        for key in &self.tgi_list {
            w.key_itg(key);
        }

        Ok(w.into_inner())
    }

    fn initialize_defaults() -> Self {
        Self {
            version: CURRENT_VERSION,
            name: String::new(),
            sort_priority: 0.0,
            secondary_sort_index: 0,
            property_id: 0,
            aural_material_hash: 0,
            parm_flags: 0,
            exclude_part_flags: 0,
            exclude_modifier_region_flags: 0,
            flags: Vec::new(),
            deprecated_price: 0,
            part_title_key: 0,
            part_description_key: 0,
            unique_texture_space: 0,
            body_type: 0,
            body_sub_type: 0,
            age_gender: 0,
            swatch_colors: Vec::new(),
            buff_res_key: 0,
            variant_thumbnail_key: 0,
            naked_key: 0,
            parent_key: 0,
            sort_layer: 0,
            lod_blocks: Vec::new(),
            slot_keys: Vec::new(),
            diffuse_shadow_key: 0,
            shadow_key: 0,
            composition_method: 0,
            region_map_key: 0,
            overrides: Vec::new(),
            normal_map_key: 0,
            specular_map_key: 0,
            shared_uv_map_space: 0,
            voice_effect_hash: 0,
            emission_map_key: 0,
            material_set: None,
            hide_for_occult_flags: 0,
            reserved1: 0,
            pack: PackInfo::default(),
            opposite_gender_part: 0,
            fallback_part: 0,
            parm_flags2: 0,
            exclude_part_flags2: 0,
            create_description_key: 0,
            opacity: OpacitySettings::default(),
            extra: Vec::new(),
            tgi_list: Vec::new(),
        }
    }

    fn get_field(&self, name: &str) -> Option<ContentValue> {
        Some(match name {
            "Version" => self.version.into(),
            "Name" => self.name.clone().into(),
            "SortPriority" => self.sort_priority.into(),
            "PropertyId" => self.property_id.into(),
            "BodyType" => self.body_type.into(),
            "BodySubType" => self.body_sub_type.into(),
            "AgeGender" => self.age_gender.into(),
            "PartTitleKey" => self.part_title_key.into(),
            "PackId" => self.pack.pack_id.into(),
            "SwatchColors" => ContentValue::List(self.swatch_colors.iter().map(|&c| c.into()).collect()),
            "TgiList" => ContentValue::List(self.tgi_list.iter().map(|&k| k.into()).collect()),
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: ContentValue) -> Result<bool, FormatError> {
        match name {
            "Name" => self.name = value.try_into()?,
            "SortPriority" => self.sort_priority = value.try_into()?,
            "PropertyId" => self.property_id = value.try_into()?,
            "BodyType" => self.body_type = value.try_into()?,
            "BodySubType" => self.body_sub_type = value.try_into()?,
            "AgeGender" => self.age_gender = value.try_into()?,
            "PartTitleKey" => self.part_title_key = value.try_into()?,
            "PackId" => self.pack.pack_id = value.try_into()?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}
