//! Bone table, type 0x00AE6C67: bone names and their inverse bind pose
//! matrices, stored as two parallel lists.

use super::io::{ResourceReader, ResourceWriter};
use super::{Codec, ContentValue, FieldInfo};
use crate::config::ParseLimits;
use crate::error::FormatError;
use binrw::binrw;

pub const TYPE_ID: u32 = 0x00AE6C67;

pub const CURRENT_VERSION: u32 = 1;

/// Row-major 4x3 transform.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[brw(little)]
pub struct BoneMatrix {
    pub rows: [[f32; 3]; 4],
}

impl BoneMatrix {
    pub const SIZE: u64 = 48;

    pub const IDENTITY: BoneMatrix = BoneMatrix {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, 0.0]],
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub matrix: BoneMatrix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneTable {
    pub version: u32,
    pub bones: Vec<Bone>,
}

impl BoneTable {
    pub fn find(&self, name: &str) -> Option<&Bone> {
        self.bones.iter().find(|b| b.name == name)
    }
}

impl Default for BoneTable {
    fn default() -> Self {
        Self::initialize_defaults()
    }
}

impl Codec for BoneTable {
    const NAME: &'static str = "Bone";
    const TYPE_IDS: &'static [u32] = &[TYPE_ID];
    const FIELDS: &'static [FieldInfo] = &[
        FieldInfo::rw("Version"),
        FieldInfo::ro("BoneCount"),
        FieldInfo::ro("Names"),
    ];

    fn parse(data: &[u8], limits: &ParseLimits) -> Result<Self, FormatError> {
        let mut r = ResourceReader::new(data, limits);

        let version = r.u32()?;
        let name_count = r.signed_count("bone name", 1)?;
        let names = r.list(name_count, |r| r.string_utf16be())?;
        let matrix_count = r.signed_count("bone matrix", BoneMatrix::SIZE)?;
        if matrix_count != name_count {
            return Err(FormatError::CountMismatch {
                what: "bone names and matrices",
                left: name_count as u64,
                right: matrix_count as u64,
            });
        }
        let matrices = r.list(matrix_count, |r| r.record::<BoneMatrix>(BoneMatrix::SIZE))?;

        let bones = names
            .into_iter()
            .zip(matrices)
            .map(|(name, matrix)| Bone { name, matrix })
            .collect();
        Ok(Self { version, bones })
    }

    fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut w = ResourceWriter::new();
        w.u32(self.version);
        w.count_i32("bone name count", self.bones.len())?;
        for bone in &self.bones {
            w.string_utf16be(&bone.name);
        }
        w.count_i32("bone matrix count", self.bones.len())?;
        for bone in &self.bones {
            w.record(&bone.matrix)?;
        }
        Ok(w.into_inner())
    }

    fn initialize_defaults() -> Self {
        Self {
            version: CURRENT_VERSION,
            bones: Vec::new(),
        }
    }

    fn get_field(&self, name: &str) -> Option<ContentValue> {
        Some(match name {
            "Version" => self.version.into(),
            "BoneCount" => (self.bones.len() as u32).into(),
            "Names" => ContentValue::List(self.bones.iter().map(|b| b.name.as_str().into()).collect()),
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
