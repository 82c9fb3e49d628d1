//! The immutable fact base an archive is assembled from.
//!
//! Parsing the installer's metadata block (its version-dependent record
//! tables) is a separate concern; whatever performs it hands these tables
//! over once, fully resolved, and they stay read-only for the archive's
//! lifetime.

use crate::chunk::Chunk;
use crate::compression::{Compression, PostFilter};

/// Flags of a file record relevant to architecture classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOptions {
    pub bits_32: bool,
    pub bits_64: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileKind {
    #[default]
    Regular,
    /// Virtual entry for the generated uninstaller; it has no payload.
    UninstallStub,
}

/// One entry of the installer's file table.
#[derive(Debug, Clone, Default)]
pub struct FileRecord {
    /// Install destination path.
    pub destination: String,
    /// Source path at compile time; may be empty.
    pub source: String,
    /// Check condition script, e.g. `not IsWin64`.
    pub check: String,
    pub kind: FileKind,
    pub options: RecordOptions,
    /// Windows file attribute bits.
    pub attributes: u32,
    /// Size for external (not embedded) files.
    pub external_size: u64,
    pub checksum: u32,
    /// Index into the data entry table, or `None` for records without a
    /// payload (such as the uninstall stub).
    pub location: Option<u32>,
}

/// Position, size and verification data for one file's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    /// The chunk holding this file's bytes.
    pub chunk: Chunk,
    /// Byte offset within the *decoded* chunk stream.
    pub file_offset: u64,
    /// Length of the file's span within the decoded chunk stream.
    pub file_size: u64,
    /// Final size after any post-filter. Equal to `file_size` except for
    /// the legacy per-file zlib filter.
    pub uncompressed_size: u64,
    /// CRC-32 of the final bytes.
    pub checksum: u32,
    pub filter: PostFilter,
    /// Modification time, seconds since the Unix epoch.
    pub timestamp: i64,
}

impl DataEntry {
    /// Identity of the decoded payload. Two entries with equal keys decode
    /// to the same bytes, whether or not they share a table index.
    pub(crate) fn payload_key(&self) -> (Chunk, u64, u64) {
        (self.chunk, self.file_offset, self.file_size)
    }
}

/// Pre-parsed setup metadata: header fields plus the two tables the
/// extraction engine walks.
#[derive(Debug, Clone, Default)]
pub struct SetupInfo {
    /// Version tag of the setup data block, if known.
    pub version: Option<String>,
    pub app_name: Option<String>,
    pub app_version: Option<String>,
    /// Compression method declared in the setup header.
    pub compression: Compression,
    pub files: Vec<FileRecord>,
    pub data_entries: Vec<DataEntry>,
}
