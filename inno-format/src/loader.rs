//! Locating the setup data inside the installer executable.
//!
//! The installer is a Windows executable with a pointer block grafted in:
//! at file offset 0x30 sits the u32 magic `"Inno"` followed by the file
//! offset of the *loader offset table*. The table opens with a 12-byte
//! generation signature and carries the offsets of the embedded setup
//! header and data regions. Generations from `rDlPtS06` on append a CRC-32
//! of the table payload.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use crate::error::OpenError;

/// File offset of the loader magic.
pub const LOADER_HEADER_OFFSET: u64 = 0x30;
/// `"Inno"`, little-endian.
pub const LOADER_HEADER_MAGIC: u32 = 0x6f6e_6e49;

/// The version tag at the start of the setup header region opens with this.
const VERSION_TAG_PREFIX: &[u8] = b"Inno Setup Setup Data";
const VERSION_TAG_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Generation {
    /// `rDlPtS02`, the 1.x/2.x/3.x era.
    Legacy2,
    /// `rDlPtS04`, 4.0.0.
    V4000,
    /// `rDlPtS05`, 4.0.3.
    V4003,
    /// `rDlPtS06`, 4.0.10; first generation with a table checksum.
    V4010,
    /// `rDlPtS07`, 4.1.6; drops the compressed-loader size field.
    V4106,
    /// The scrambled signature used from 5.1.5 on.
    Modern,
}

const SIGNATURES: &[([u8; 12], Generation)] = &[
    (*b"rDlPtS02\x87eVx", Generation::Legacy2),
    (*b"rDlPtS04\x87eVx", Generation::V4000),
    (*b"rDlPtS05\x87eVx", Generation::V4003),
    (*b"rDlPtS06\x87eVx", Generation::V4010),
    (*b"rDlPtS07\x87eVx", Generation::V4106),
    (
        [
            0x72, 0x44, 0x6c, 0x50, 0x74, 0x53, 0xcd, 0xe6, 0xd7, 0x7b, 0x0b, 0x2a,
        ],
        Generation::Modern,
    ),
];

impl Generation {
    fn has_message_offset(self) -> bool {
        self == Generation::Legacy2
    }

    fn has_compressed_size(self) -> bool {
        self < Generation::V4106
    }

    fn has_checksum(self) -> bool {
        self >= Generation::V4010
    }

    fn field_count(self) -> usize {
        6 + usize::from(self.has_message_offset()) + usize::from(self.has_compressed_size())
    }
}

/// Resolved offsets of the regions embedded in the installer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Offsets {
    /// Total size of the installer as recorded by the compiler.
    pub total_size: u32,
    pub exe_offset: u32,
    pub exe_compressed_size: u32,
    pub exe_uncompressed_size: u32,
    pub exe_checksum: u32,
    pub message_offset: u32,
    /// File offset of the setup header region.
    pub header_offset: u64,
    /// File offset of the data region, or `None` for multi-part installers
    /// whose data lives in external slice files.
    pub data_offset: Option<u64>,
}

impl Offsets {
    /// Locate and read the loader offset table.
    pub fn load<R: Read + Seek>(src: &mut R) -> Result<Offsets, OpenError> {
        src.seek(SeekFrom::Start(LOADER_HEADER_OFFSET))?;
        let magic = read_u32_or_missing(src)?;
        if magic != LOADER_HEADER_MAGIC {
            return Err(OpenError::MissingMagic);
        }
        let table_offset = read_u32_or_missing(src)?;

        src.seek(SeekFrom::Start(u64::from(table_offset)))?;
        let mut signature = [0u8; 12];
        src.read_exact(&mut signature)?;
        let generation = SIGNATURES
            .iter()
            .find(|(sig, _)| *sig == signature)
            .map(|(_, generation)| *generation)
            .ok_or(OpenError::UnknownSignature(signature))?;

        let mut raw = vec![0u8; generation.field_count() * 4];
        src.read_exact(&mut raw)?;
        if generation.has_checksum() {
            let stored = src.read_u32::<LittleEndian>()?;
            let computed = crc32fast::hash(&raw);
            if stored != computed {
                return Err(OpenError::OffsetTableCorrupt);
            }
        }

        let mut fields = raw.as_slice();
        let total_size = fields.read_u32::<LittleEndian>()?;
        let exe_offset = fields.read_u32::<LittleEndian>()?;
        let exe_compressed_size = if generation.has_compressed_size() {
            fields.read_u32::<LittleEndian>()?
        } else {
            0
        };
        let exe_uncompressed_size = fields.read_u32::<LittleEndian>()?;
        let exe_checksum = fields.read_u32::<LittleEndian>()?;
        let message_offset = if generation.has_message_offset() {
            fields.read_u32::<LittleEndian>()?
        } else {
            0
        };
        let header_offset = fields.read_u32::<LittleEndian>()?;
        let data_offset = fields.read_u32::<LittleEndian>()?;

        debug!(
            ?generation,
            header_offset,
            data_offset,
            "loader offset table resolved"
        );

        Ok(Offsets {
            total_size,
            exe_offset,
            exe_compressed_size,
            exe_uncompressed_size,
            exe_checksum,
            message_offset,
            header_offset: u64::from(header_offset),
            data_offset: (data_offset != 0).then_some(u64::from(data_offset)),
        })
    }
}

fn read_u32_or_missing<R: Read>(src: &mut R) -> Result<u32, OpenError> {
    src.read_u32::<LittleEndian>().map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            OpenError::MissingMagic
        } else {
            OpenError::Io(err)
        }
    })
}

/// Lightweight identity check: does this byte prefix look like an Inno
/// Setup installer? Needs at least 0x38 bytes.
pub fn probe(prefix: &[u8]) -> bool {
    if prefix.len() < 0x38 || &prefix[..2] != b"MZ" {
        return false;
    }
    let at = LOADER_HEADER_OFFSET as usize;
    let magic = u32::from_le_bytes([prefix[at], prefix[at + 1], prefix[at + 2], prefix[at + 3]]);
    magic == LOADER_HEADER_MAGIC
}

/// Read the 64-byte NUL-padded version tag at the start of the setup
/// header region, e.g. `Inno Setup Setup Data (5.5.7)`.
pub fn read_version_tag<R: Read + Seek>(src: &mut R, header_offset: u64) -> Result<String, OpenError> {
    src.seek(SeekFrom::Start(header_offset))?;
    let mut raw = [0u8; VERSION_TAG_LEN];
    src.read_exact(&mut raw)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let tag = &raw[..end];
    if !tag.starts_with(VERSION_TAG_PREFIX) {
        return Err(OpenError::Metadata {
            reason: "setup header does not start with a version tag".to_string(),
        });
    }
    Ok(String::from_utf8_lossy(tag).into_owned())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn synthetic_installer(signature: [u8; 12], corrupt_crc: bool) -> Vec<u8> {
        let table_offset: u32 = 0x40;
        let mut bytes = vec![0u8; table_offset as usize];
        bytes[0] = b'M';
        bytes[1] = b'Z';
        bytes[LOADER_HEADER_OFFSET as usize..LOADER_HEADER_OFFSET as usize + 4]
            .copy_from_slice(&LOADER_HEADER_MAGIC.to_le_bytes());
        bytes[LOADER_HEADER_OFFSET as usize + 4..LOADER_HEADER_OFFSET as usize + 8]
            .copy_from_slice(&table_offset.to_le_bytes());

        bytes.extend_from_slice(&signature);
        let mut fields = Vec::new();
        for value in [0x9000u32, 0x1000, 0x8000, 0x3d0c5a9f, 0x5000, 0x7000] {
            fields.extend_from_slice(&value.to_le_bytes());
        }
        let mut crc = crc32fast::hash(&fields);
        if corrupt_crc {
            crc ^= 1;
        }
        bytes.extend_from_slice(&fields);
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes
    }

    #[test]
    fn loads_a_modern_offset_table() {
        let bytes = synthetic_installer(*b"rDlPtS07\x87eVx", false);
        let offsets = Offsets::load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(offsets.total_size, 0x9000);
        assert_eq!(offsets.exe_offset, 0x1000);
        assert_eq!(offsets.exe_compressed_size, 0);
        assert_eq!(offsets.exe_uncompressed_size, 0x8000);
        assert_eq!(offsets.exe_checksum, 0x3d0c5a9f);
        assert_eq!(offsets.header_offset, 0x5000);
        assert_eq!(offsets.data_offset, Some(0x7000));
    }

    #[test]
    fn zero_data_offset_means_external_slices() {
        let mut bytes = synthetic_installer(*b"rDlPtS07\x87eVx", false);
        // Zero out the data_offset field and fix up the checksum.
        let fields_at = 0x40 + 12;
        bytes[fields_at + 20..fields_at + 24].copy_from_slice(&0u32.to_le_bytes());
        let crc = crc32fast::hash(&bytes[fields_at..fields_at + 24]);
        bytes[fields_at + 24..fields_at + 28].copy_from_slice(&crc.to_le_bytes());

        let offsets = Offsets::load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(offsets.data_offset, None);
    }

    #[test]
    fn corrupt_table_checksum_is_rejected() {
        let bytes = synthetic_installer(*b"rDlPtS07\x87eVx", true);
        assert!(matches!(
            Offsets::load(&mut Cursor::new(bytes)),
            Err(OpenError::OffsetTableCorrupt)
        ));
    }

    #[test]
    fn unknown_signature_is_rejected() {
        let bytes = synthetic_installer(*b"rDlPtS99\x87eVx", false);
        assert!(matches!(
            Offsets::load(&mut Cursor::new(bytes)),
            Err(OpenError::UnknownSignature(_))
        ));
    }

    #[test]
    fn missing_magic_is_rejected() {
        let bytes = vec![0u8; 0x100];
        assert!(matches!(
            Offsets::load(&mut Cursor::new(bytes)),
            Err(OpenError::MissingMagic)
        ));
        assert!(matches!(
            Offsets::load(&mut Cursor::new(vec![0u8; 8])),
            Err(OpenError::MissingMagic)
        ));
    }

    #[test]
    fn probe_checks_both_magics() {
        let bytes = synthetic_installer(*b"rDlPtS07\x87eVx", false);
        assert!(probe(&bytes));

        let mut not_mz = bytes.clone();
        not_mz[0] = b'X';
        assert!(!probe(&not_mz));

        assert!(!probe(b"MZ"));
        assert!(!probe(&vec![0u8; 0x100]));
    }

    #[test]
    fn version_tag_round_trip() {
        let mut bytes = vec![0u8; 0x20];
        let mut tag = [0u8; VERSION_TAG_LEN];
        let text = b"Inno Setup Setup Data (5.5.7) (u)";
        tag[..text.len()].copy_from_slice(text);
        bytes.extend_from_slice(&tag);

        let version = read_version_tag(&mut Cursor::new(&bytes), 0x20).unwrap();
        assert_eq!(version, "Inno Setup Setup Data (5.5.7) (u)");

        assert!(matches!(
            read_version_tag(&mut Cursor::new(vec![0u8; 0x80]), 0),
            Err(OpenError::Metadata { .. })
        ));
    }
}
