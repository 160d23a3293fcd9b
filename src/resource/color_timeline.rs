//! Colour timeline, type 0x19301120: lighting colours keyed by time of day.

use super::io::{FormatResult, ResourceReader, ResourceWriter};
use super::{Codec, ContentValue, FieldInfo};
use crate::config::ParseLimits;
use crate::error::FormatError;
use binrw::binrw;

pub const TYPE_ID: u32 = 0x19301120;

pub const CURRENT_VERSION: u32 = 14;

const SKY_HORIZON_DARK: u32 = 13;
const CLOUD_COLOR: u32 = 14;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[brw(little)]
pub struct ColorPoint {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
    pub time: f32,
}

impl ColorPoint {
    pub const SIZE: u64 = 20;
}

pub type ColorChannel = Vec<ColorPoint>;

fn read_channel(r: &mut ResourceReader<'_>) -> FormatResult<ColorChannel> {
    let count = r.count("colour point", ColorPoint::SIZE)?;
    r.list(count, |r| r.record::<ColorPoint>(ColorPoint::SIZE))
}

fn write_channel(w: &mut ResourceWriter, channel: &[ColorPoint]) -> FormatResult<()> {
    w.count_u32("colour point count", channel.len())?;
    for point in channel {
        w.record(point)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Timeline {
    pub ambient: ColorChannel,
    pub directional: ColorChannel,
    pub shadow: ColorChannel,
    pub sky_horizon: ColorChannel,
    pub fog_start: ColorChannel,
    pub fog_end: ColorChannel,
    pub sky_high: ColorChannel,
    pub sky_low: ColorChannel,
    pub sky_horizon_dark: ColorChannel,
    pub point_of_interest_id: u32,
    pub cloud_color: ColorChannel,
}

impl Timeline {
    fn base_channels(&self) -> [&ColorChannel; 8] {
        [
            &self.ambient,
            &self.directional,
            &self.shadow,
            &self.sky_horizon,
            &self.fog_start,
            &self.fog_end,
            &self.sky_high,
            &self.sky_low,
        ]
    }

    fn read(r: &mut ResourceReader<'_>, version: u32) -> FormatResult<Self> {
        let mut timeline = Timeline {
            ambient: read_channel(r)?,
            directional: read_channel(r)?,
            shadow: read_channel(r)?,
            sky_horizon: read_channel(r)?,
            fog_start: read_channel(r)?,
            fog_end: read_channel(r)?,
            sky_high: read_channel(r)?,
            sky_low: read_channel(r)?,
            ..Default::default()
        };
        if version >= SKY_HORIZON_DARK {
            timeline.sky_horizon_dark = read_channel(r)?;
            timeline.point_of_interest_id = r.u32()?;
        }
        if version >= CLOUD_COLOR {
            timeline.cloud_color = read_channel(r)?;
        }
        Ok(timeline)
    }

    fn write(&self, w: &mut ResourceWriter, version: u32) -> FormatResult<()> {
        for channel in self.base_channels() {
            write_channel(w, channel)?;
        }
        if version >= SKY_HORIZON_DARK {
            write_channel(w, &self.sky_horizon_dark)?;
            w.u32(self.point_of_interest_id);
        }
        if version >= CLOUD_COLOR {
            write_channel(w, &self.cloud_color)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorTimeline {
    pub version: u32,
    pub timelines: Vec<Timeline>,
}

impl Default for ColorTimeline {
    fn default() -> Self {
        Self::initialize_defaults()
    }
}

impl Codec for ColorTimeline {
    const NAME: &'static str = "ColorTimeline";
    const TYPE_IDS: &'static [u32] = &[TYPE_ID];
    const FIELDS: &'static [FieldInfo] = &[FieldInfo::rw("Version"), FieldInfo::ro("TimelineCount")];

    fn parse(data: &[u8], limits: &ParseLimits) -> Result<Self, FormatError> {
        let mut r = ResourceReader::new(data, limits);
        let version = r.u32()?;
        // Eight empty channels is the smallest timeline.
        let count = r.count("timeline", 8 * 4)?;
        let timelines = r.list(count, |r| Timeline::read(r, version))?;
        Ok(Self { version, timelines })
    }

    fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut w = ResourceWriter::new();
        w.u32(self.version);
        w.count_u32("timeline count", self.timelines.len())?;
        for timeline in &self.timelines {
            timeline.write(&mut w, self.version)?;
        }
        Ok(w.into_inner())
    }

    fn initialize_defaults() -> Self {
        Self {
            version: CURRENT_VERSION,
            timelines: Vec::new(),
        }
    }

    fn get_field(&self, name: &str) -> Option<ContentValue> {
        Some(match name {
            "Version" => self.version.into(),
            "TimelineCount" => (self.timelines.len() as u32).into(),
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
