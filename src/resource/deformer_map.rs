//! Deformer map, type 0xDB43E069: per-pixel shape or normal deltas stored as
//! scanlines. Each row is either a flat array of pixel records or an index
//! table plus a run-length payload. The payload is kept as opaque bytes and
//! written back unchanged.

use super::io::{FormatResult, ResourceReader, ResourceWriter};
use super::{Codec, ContentValue, FieldInfo};
use crate::config::ParseLimits;
use crate::error::FormatError;

pub const TYPE_ID: u32 = 0xDB43E069;

pub const MIN_VERSION: u32 = 5;
pub const CURRENT_VERSION: u32 = 7;

const SPECIES: u32 = 6;
const SKIN_TIGHT: u32 = 7;

/// Row length, compressed flag and robe flag.
const SCANLINE_HEADER: usize = 4;
/// Bytes per uncompressed pixel with and without the robe channel.
const RECORD_WITH_ROBE: usize = 6;
const RECORD_WITHOUT_ROBE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RobeChannel {
    #[default]
    Present,
    Dropped,
    IsCopy,
}

impl RobeChannel {
    fn from_u8(v: u8) -> FormatResult<Self> {
        match v {
            0 => Ok(RobeChannel::Present),
            1 => Ok(RobeChannel::Dropped),
            2 => Ok(RobeChannel::IsCopy),
            other => Err(FormatError::invalid(format!("unknown robe channel value {}", other))),
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RobeChannel::Present => 0,
            RobeChannel::Dropped => 1,
            RobeChannel::IsCopy => 2,
        }
    }

    /// Size of one uncompressed pixel record in a row with this flag.
    pub fn record_size(self) -> usize {
        if self == RobeChannel::Present {
            RECORD_WITH_ROBE
        } else {
            RECORD_WITHOUT_ROBE
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanlineData {
    /// `width * record_size` bytes of pixel records.
    Uncompressed(Vec<u8>),
    /// Run index table and the packed non-default pixels.
    Compressed {
        pixel_positions: Vec<u16>,
        data_positions: Vec<u16>,
        payload: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scanline {
    /// Compressed flag byte as stored. Zero for flat rows; any other value
    /// marks a run-length row and is written back unchanged.
    pub flag: u8,
    pub robe_channel: RobeChannel,
    pub data: ScanlineData,
}

impl Scanline {
    pub fn is_compressed(&self) -> bool {
        matches!(self.data, ScanlineData::Compressed { .. })
    }

    /// Encoded length, including the 4-byte row header.
    pub fn encoded_len(&self) -> usize {
        match &self.data {
            ScanlineData::Uncompressed(records) => SCANLINE_HEADER + records.len(),
            ScanlineData::Compressed {
                pixel_positions,
                payload,
                ..
            } => SCANLINE_HEADER + 1 + 4 * pixel_positions.len() + payload.len(),
        }
    }

    fn read(r: &mut ResourceReader<'_>, width: usize) -> FormatResult<Self> {
        let start = r.position();
        let declared = r.u16()? as usize;
        let flag = r.u8()?;
        let robe_channel = RobeChannel::from_u8(r.u8()?)?;

        let data = if flag == 0 {
            let len = width * robe_channel.record_size();
            if declared != SCANLINE_HEADER + len {
                return Err(FormatError::invalid(format!(
                    "uncompressed scanline at {} declares {} bytes, expected {}",
                    start,
                    declared,
                    SCANLINE_HEADER + len
                )));
            }
            ScanlineData::Uncompressed(r.bytes(len as u64)?)
        } else {
            let index_count = r.byte_count("scanline index", 4)?;
            let pixel_positions = r.list(index_count, |r| r.u16())?;
            let data_positions = r.list(index_count, |r| r.u16())?;
            let header = SCANLINE_HEADER + 1 + 4 * index_count;
            let payload_len = declared.checked_sub(header).ok_or_else(|| {
                FormatError::invalid(format!(
                    "compressed scanline at {} declares {} bytes, shorter than its {}-byte index table",
                    start, declared, header
                ))
            })?;
            ScanlineData::Compressed {
                pixel_positions,
                data_positions,
                payload: r.bytes(payload_len as u64)?,
            }
        };

        Ok(Self {
            flag,
            robe_channel,
            data,
        })
    }

    fn write(&self, w: &mut ResourceWriter, width: usize) -> FormatResult<()> {
        let len = self.encoded_len();
        let declared = u16::try_from(len).map_err(|_| FormatError::Overflow {
            what: "scanline length",
            value: len as u64,
        })?;
        if (self.flag != 0) != self.is_compressed() {
            return Err(FormatError::invalid(format!(
                "scanline flag {:#04x} does not match its {} data",
                self.flag,
                if self.is_compressed() { "run-length" } else { "flat" }
            )));
        }
        w.u16(declared);
        w.u8(self.flag);
        w.u8(self.robe_channel.as_u8());

        match &self.data {
            ScanlineData::Uncompressed(records) => {
                let expected = width * self.robe_channel.record_size();
                if records.len() != expected {
                    return Err(FormatError::CountMismatch {
                        what: "uncompressed scanline bytes",
                        left: records.len() as u64,
                        right: expected as u64,
                    });
                }
                w.bytes(records);
            }
            ScanlineData::Compressed {
                pixel_positions,
                data_positions,
                payload,
            } => {
                if pixel_positions.len() != data_positions.len() {
                    return Err(FormatError::CountMismatch {
                        what: "scanline index tables",
                        left: pixel_positions.len() as u64,
                        right: data_positions.len() as u64,
                    });
                }
                w.count_u8("scanline index count", pixel_positions.len())?;
                for &p in pixel_positions {
                    w.u16(p);
                }
                for &d in data_positions {
                    w.u16(d);
                }
                w.bytes(payload);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeformerMap {
    pub version: u32,
    pub doubled_width: u32,
    pub height: u32,
    pub age_gender: u32,
    pub species: u32,
    pub physique: u8,
    pub shape_or_normals: u8,
    pub min_col: u32,
    pub max_col: u32,
    pub min_row: u32,
    pub max_row: u32,
    pub robe_channel: RobeChannel,
    pub skin_tight_min: f32,
    pub skin_tight_delta: f32,
    /// Empty when the map carries no pixel data.
    pub scanlines: Vec<Scanline>,
}

impl DeformerMap {
    /// Pixels per scanline.
    pub fn width(&self) -> u32 {
        self.max_col.saturating_sub(self.min_col).saturating_add(1)
    }

    pub fn row_count(&self) -> u32 {
        self.max_row.saturating_sub(self.min_row).saturating_add(1)
    }

    fn check_bounds(&self) -> FormatResult<()> {
        if self.max_col < self.min_col || self.max_row < self.min_row {
            return Err(FormatError::invalid(format!(
                "empty pixel rectangle: columns {}..={}, rows {}..={}",
                self.min_col, self.max_col, self.min_row, self.max_row
            )));
        }
        Ok(())
    }

    /// Sum of all encoded scanline lengths.
    pub fn total_bytes(&self) -> u64 {
        self.scanlines.iter().map(|s| s.encoded_len() as u64).sum()
    }
}

impl Default for DeformerMap {
    fn default() -> Self {
        Self::initialize_defaults()
    }
}

impl Codec for DeformerMap {
    const NAME: &'static str = "DeformerMap";
    const TYPE_IDS: &'static [u32] = &[TYPE_ID];
    const FIELDS: &'static [FieldInfo] = &[
        FieldInfo::ro("Version"),
        FieldInfo::rw("AgeGender"),
        FieldInfo::rw("Species"),
        FieldInfo::rw("Physique"),
        FieldInfo::rw("ShapeOrNormals"),
        FieldInfo::rw("SkinTightMin"),
        FieldInfo::rw("SkinTightDelta"),
        FieldInfo::ro("Width"),
        FieldInfo::ro("RowCount"),
        FieldInfo::ro("TotalBytes"),
    ];

    fn parse(data: &[u8], limits: &ParseLimits) -> Result<Self, FormatError> {
        let mut r = ResourceReader::new(data, limits);

        let version = r.u32()?;
        if version < MIN_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
        let doubled_width = r.u32()?;
        let height = r.u32()?;
        let age_gender = r.u32()?;
        let species = if version >= SPECIES { r.u32()? } else { 0 };
        let physique = r.u8()?;
        let shape_or_normals = r.u8()?;
        let min_col = r.u32()?;
        let max_col = r.u32()?;
        let min_row = r.u32()?;
        let max_row = r.u32()?;
        let robe_channel = RobeChannel::from_u8(r.u8()?)?;
        let (skin_tight_min, skin_tight_delta) = if version >= SKIN_TIGHT {
            (r.f32()?, r.f32()?)
        } else {
            (0.0, 0.0)
        };
        let total_bytes = r.u32()? as u64;

        let mut map = DeformerMap {
            version,
            doubled_width,
            height,
            age_gender,
            species,
            physique,
            shape_or_normals,
            min_col,
            max_col,
            min_row,
            max_row,
            robe_channel,
            skin_tight_min,
            skin_tight_delta,
            scanlines: Vec::new(),
        };

        if total_bytes != 0 {
            map.check_bounds()?;
            if total_bytes > r.remaining() {
                return Err(FormatError::Truncated {
                    offset: r.position(),
                    needed: total_bytes,
                    remaining: r.remaining(),
                });
            }
            let rows = r.check_count("scanline", map.row_count() as u64, SCANLINE_HEADER as u64)?;
            let width = map.width() as usize;
            let start = r.position();
            map.scanlines = r.list(rows, |r| Scanline::read(r, width))?;
            let consumed = r.position() - start;
            if consumed != total_bytes {
                return Err(FormatError::CountMismatch {
                    what: "scanline bytes",
                    left: consumed,
                    right: total_bytes,
                });
            }
        }

        Ok(map)
    }

    fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        if self.version < MIN_VERSION {
            return Err(FormatError::UnsupportedVersion(self.version));
        }
        let mut w = ResourceWriter::new();

        w.u32(self.version);
        w.u32(self.doubled_width);
        w.u32(self.height);
        w.u32(self.age_gender);
        if self.version >= SPECIES {
            w.u32(self.species);
        }
        w.u8(self.physique);
        w.u8(self.shape_or_normals);
        w.u32(self.min_col);
        w.u32(self.max_col);
        w.u32(self.min_row);
        w.u32(self.max_row);
        w.u8(self.robe_channel.as_u8());
        if self.version >= SKIN_TIGHT {
            w.f32(self.skin_tight_min);
            w.f32(self.skin_tight_delta);
        }

        if self.scanlines.is_empty() {
            w.u32(0);
            return Ok(w.into_inner());
        }

        self.check_bounds()?;
        if self.scanlines.len() as u64 != self.row_count() as u64 {
            return Err(FormatError::CountMismatch {
                what: "scanline rows",
                left: self.scanlines.len() as u64,
                right: self.row_count() as u64,
            });
        }
        let total = self.total_bytes();
        w.u32(u32::try_from(total).map_err(|_| FormatError::Overflow {
            what: "scanline bytes",
            value: total,
        })?);
        let width = self.width() as usize;
        for line in &self.scanlines {
            line.write(&mut w, width)?;
        }

        Ok(w.into_inner())
    }

    fn initialize_defaults() -> Self {
        Self {
            version: CURRENT_VERSION,
            doubled_width: 0,
            height: 0,
            age_gender: 0,
            species: 0,
            physique: 0,
            shape_or_normals: 0,
            min_col: 0,
            max_col: 0,
            min_row: 0,
            max_row: 0,
            robe_channel: RobeChannel::Present,
            skin_tight_min: 0.0,
            skin_tight_delta: 0.0,
            scanlines: Vec::new(),
        }
    }

    fn get_field(&self, name: &str) -> Option<ContentValue> {
        Some(match name {
            "Version" => self.version.into(),
            "AgeGender" => self.age_gender.into(),
            "Species" => self.species.into(),
            "Physique" => self.physique.into(),
            "ShapeOrNormals" => self.shape_or_normals.into(),
            "SkinTightMin" => self.skin_tight_min.into(),
            "SkinTightDelta" => self.skin_tight_delta.into(),
            "Width" => self.width().into(),
            "RowCount" => (self.scanlines.len() as u32).into(),
            "TotalBytes" => (self.total_bytes() as u32).into(),
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: ContentValue) -> Result<bool, FormatError> {
        match name {
            "AgeGender" => self.age_gender = value.try_into()?,
            "Species" => self.species = value.try_into()?,
            "Physique" => self.physique = value.try_into()?,
            "ShapeOrNormals" => self.shape_or_normals = value.try_into()?,
            "SkinTightMin" => self.skin_tight_min = value.try_into()?,
            "SkinTightDelta" => self.skin_tight_delta = value.try_into()?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}
