use binrw::binrw;

#[binrw]
#[derive(Debug, Default, Clone)]
#[br(little)]
#[bw(little)]
pub struct PackageHeader {
    pub magic: [u8; 4],      // "DBPF"
    pub major: u32,          // 2
    pub minor: u32,          // 1
    pub unused1: u32,
    pub unused2: u32,
    pub unused3: u32,
    pub created: u32,
    pub modified: u32,
    pub index_version: u32,
    pub index_count: u32,
    pub index_position_low: u32,
    pub index_size: u32,
    pub unused4: [u32; 3],
    pub index_record_version: u32, // always 3
    pub index_position: u64,
    pub unused5: [u32; 6],
}

impl PackageHeader {
    pub const SIZE: u64 = 96;
    pub const MAGIC: [u8; 4] = *b"DBPF";

    /// Header for a package about to be written; the index fields are patched
    /// once the entries are on disk.
    pub fn for_new_package(index_count: u32) -> Self {
        Self {
            magic: Self::MAGIC,
            major: 2,
            minor: 1,
            index_count,
            index_record_version: 3,
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == Self::MAGIC && self.major == 2
    }

    pub fn read<R: std::io::Read + std::io::Seek>(reader: &mut R) -> Result<Self, binrw::Error> {
        use binrw::BinReaderExt;
        reader.read_le()
    }

    pub fn write<W: std::io::Write + std::io::Seek>(&self, writer: &mut W) -> Result<(), binrw::Error> {
        use binrw::BinWriterExt;
        writer.write_le(self)
    }
}
