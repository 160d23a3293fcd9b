//! Weather forecast, type 0x497F3271.

use super::io::{ResourceReader, ResourceWriter};
use super::{Codec, ContentValue, FieldInfo};
use crate::config::ParseLimits;
use crate::error::FormatError;
use crate::package::index::ResourceKey;
use binrw::binrw;

pub const TYPE_ID: u32 = 0x497F3271;

pub const CURRENT_VERSION: u32 = 3;

const HUMIDITY: u32 = 2;
const SKY_BOX: u32 = 3;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[brw(little)]
pub struct WeatherEvent {
    pub event_hash: u32,
    pub weight: f32,
    pub duration_hours: f32,
}

impl WeatherEvent {
    pub const SIZE: u64 = 12;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Weather {
    pub version: u32,
    pub name_hash: u32,
    pub temperature_min: f32,
    pub temperature_max: f32,
    pub events: Vec<WeatherEvent>,
    pub humidity: f32,
    pub sky_box: ResourceKey,
}

impl Default for Weather {
    fn default() -> Self {
        Self::initialize_defaults()
    }
}

impl Codec for Weather {
    const NAME: &'static str = "Weather";
    const TYPE_IDS: &'static [u32] = &[TYPE_ID];
    const FIELDS: &'static [FieldInfo] = &[
        FieldInfo::rw("Version"),
        FieldInfo::rw("NameHash"),
        FieldInfo::rw("TemperatureMin"),
        FieldInfo::rw("TemperatureMax"),
        FieldInfo::ro("EventCount"),
        FieldInfo::rw("Humidity"),
        FieldInfo::rw("SkyBox"),
    ];

    fn parse(data: &[u8], limits: &ParseLimits) -> Result<Self, FormatError> {
        let mut r = ResourceReader::new(data, limits);

        let version = r.u32()?;
        let name_hash = r.u32()?;
        let temperature_min = r.f32()?;
        let temperature_max = r.f32()?;
        let count = r.count("weather event", WeatherEvent::SIZE)?;
        let events = r.list(count, |r| r.record::<WeatherEvent>(WeatherEvent::SIZE))?;
        let humidity = if version >= HUMIDITY { r.f32()? } else { 0.0 };
        let sky_box = if version >= SKY_BOX {
            r.key_itg()?
        } else {
            ResourceKey::default()
        };

        Ok(Self {
            version,
            name_hash,
            temperature_min,
            temperature_max,
            events,
            humidity,
            sky_box,
        })
    }

    fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let mut w = ResourceWriter::new();
        w.u32(self.version);
        w.u32(self.name_hash);
        w.f32(self.temperature_min);
        w.f32(self.temperature_max);
        w.count_u32("weather event count", self.events.len())?;
        for event in &self.events {
            w.record(event)?;
        }
        if self.version >= HUMIDITY {
            w.f32(self.humidity);
        }
        if self.version >= SKY_BOX {
            w.key_itg(&self.sky_box);
        }
        Ok(w.into_inner())
    }

    fn initialize_defaults() -> Self {
        Self {
            version: CURRENT_VERSION,
            name_hash: 0,
            temperature_min: 0.0,
            temperature_max: 0.0,
            events: Vec::new(),
            humidity: 0.0,
            sky_box: ResourceKey::default(),
        }
    }

    fn get_field(&self, name: &str) -> Option<ContentValue> {
        Some(match name {
            "Version" => self.version.into(),
            "NameHash" => self.name_hash.into(),
            "TemperatureMin" => self.temperature_min.into(),
            "TemperatureMax" => self.temperature_max.into(),
            "EventCount" => (self.events.len() as u32).into(),
            "Humidity" => self.humidity.into(),
            "SkyBox" => self.sky_box.into(),
            _ => return None,
        })
    }

    fn set_field(&mut self, name: &str, value: ContentValue) -> Result<bool, FormatError> {
        match name {
            "Version" => self.version = value.try_into()?,
            "NameHash" => self.name_hash = value.try_into()?,
            "TemperatureMin" => self.temperature_min = value.try_into()?,
            "TemperatureMax" => self.temperature_max = value.try_into()?,
            "Humidity" => self.humidity = value.try_into()?,
            "SkyBox" => self.sky_box = value.try_into()?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}
