///! Binary structure and mapping files

pub mod codec;
pub mod crc;

pub mod ch_file;
pub mod id_map;
pub mod tnr_file;
pub mod tnraf_file;

pub use ch_file::ChFile;
pub use codec::peek_header;
pub use id_map::IdMapFile;
pub use tnr_file::TnrFile;
pub use tnraf_file::TnrafFile;

/// Which structure a file holds, from its magic
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureKind {
    Ch,
    Tnr,
    Tnraf,
}

impl StructureKind {
    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            ch_file::MAGIC => Some(StructureKind::Ch),
            tnr_file::MAGIC => Some(StructureKind::Tnr),
            tnraf_file::MAGIC => Some(StructureKind::Tnraf),
            _ => None,
        }
    }
}

impl std::fmt::Display for StructureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureKind::Ch => write!(f, "CH"),
            StructureKind::Tnr => write!(f, "TNR"),
            StructureKind::Tnraf => write!(f, "TNRAF"),
        }
    }
}
