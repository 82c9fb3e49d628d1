use crate::compression::Compression;

/// Errors raised while locating and validating the installer's embedded
/// offset table, or while assembling an archive from pre-parsed metadata.
///
/// All of these are fatal: no partial archive state is retained.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("Setup loader magic not found. Is this an Inno Setup installer?")]
    MissingMagic,

    #[error("Unrecognized setup loader signature: {0:02x?}")]
    UnknownSignature([u8; 12]),

    #[error("Setup loader offset table failed its checksum")]
    OffsetTableCorrupt,

    #[error("Setup metadata rejected: {reason}")]
    Metadata { reason: String },

    #[error("Failed to read installer")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the decode pipeline (chunk access and stream filters).
///
/// During extraction these are scoped to a single worklist item and are
/// reported through its [`Outcome`](crate::Outcome), never aborting the
/// batch.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Bad chunk header at offset {offset:#x}")]
    BadChunkMagic { offset: u64 },

    #[error("Compression method {0} is not supported")]
    UnsupportedCompression(Compression),

    #[error("Encrypted chunks are not supported")]
    EncryptionUnsupported,

    #[error("Invalid LZMA properties ({0:#04x})")]
    BadLzmaProps(u8),

    #[error("Compressed stream ended prematurely")]
    Truncated,

    #[error("Filter chain made no progress")]
    Stalled,

    #[error("zlib stream corrupt")]
    Zlib(#[from] flate2::DecompressError),

    #[error("bzip2 stream corrupt")]
    Bzip2(#[from] bzip2::Error),

    #[error("LZMA stream corrupt")]
    Lzma(#[from] xz2::stream::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Batch-fatal extraction failures.
///
/// Per-item decode failures are *not* errors; they surface as the item's
/// [`Outcome`](crate::Outcome). Only boundary failures end the batch.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Multi-part installer without embedded data; slice resolution is not implemented")]
    MultiVolumeUnsupported,

    #[error("Output sink failed for item {index}")]
    Sink {
        index: u32,
        #[source]
        source: std::io::Error,
    },
}
