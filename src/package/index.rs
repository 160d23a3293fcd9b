use binrw::binrw;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Type, group and instance of one archive entry.
///
/// Stored in the package index in natural (T, G, I) order. Formats that embed
/// keys use the swapped I-T-G layout, see [`crate::resource::io`].
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[br(little)]
#[bw(little)]
pub struct ResourceKey {
    pub type_id: u32,
    pub group: u32,
    pub instance: u64,
}

impl ResourceKey {
    pub const fn new(type_id: u32, group: u32, instance: u64) -> Self {
        Self {
            type_id,
            group,
            instance,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}-{:08X}-{:016X}", self.type_id, self.group, self.instance)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid resource key {0:?}, expected TTTTTTTT-GGGGGGGG-IIIIIIIIIIIIIIII")]
pub struct ParseKeyError(String);

impl FromStr for ResourceKey {
    type Err = ParseKeyError;

    /// Accepts `-` or `:` separators and an optional `0x` on each part.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseKeyError(s.to_string());
        let parts: Vec<&str> = s.split(|c| c == '-' || c == ':').collect();
        if parts.len() != 3 {
            return Err(err());
        }
        let hex = |p: &str| p.trim_start_matches("0x").trim_start_matches("0X").to_string();
        let type_id = u32::from_str_radix(&hex(parts[0]), 16).map_err(|_| err())?;
        let group = u32::from_str_radix(&hex(parts[1]), 16).map_err(|_| err())?;
        let instance = u64::from_str_radix(&hex(parts[2]), 16).map_err(|_| err())?;
        Ok(Self::new(type_id, group, instance))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: ResourceKey,
    pub offset: u32,
    pub filesize: u32, // on-disk size, high bit stripped
    pub memsize: u32,  // decompressed size
    pub compression: u16, // 0x5A42 zlib, 0xFFFF RefPack, 0x0000 none
    pub committed: u16,
}

impl IndexEntry {
    pub const ZLIB: u16 = 0x5A42;

    pub fn is_compressed(&self) -> bool {
        self.compression != 0
    }
}
