use std::fmt;

/// Compression method of a chunk.
///
/// The whole archive normally uses one method, recorded in the setup
/// header, but the method is carried per chunk because old installers mix
/// stored and compressed chunks.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum Compression {
    #[default]
    Stored,
    Zlib,
    BZip2,
    Lzma1,
    Lzma2,
    Unknown(u8),
}

impl Compression {
    pub const fn available_variants() -> &'static [&'static str] {
        &["stored", "zlib", "bzip2", "lzma1", "lzma2"]
    }

    /// Display name, matching the labels archive managers show for this
    /// format.
    pub const fn name(self) -> &'static str {
        use Compression::*;

        match self {
            Stored => "Copy",
            Zlib => "Deflate",
            BZip2 => "BZip2",
            Lzma1 => "LZMA",
            Lzma2 => "LZMA2",
            Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::Unknown(id) => write!(f, "Unknown(id: {:x})", id),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl fmt::Debug for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Encryption method of a chunk.
///
/// The password value is threaded through the chunk reader, but no cipher
/// is wired up: opening an `Encrypted` chunk fails with a decode error.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum Encryption {
    #[default]
    Plaintext,
    Encrypted,
}

/// Per-file filter applied after chunk decompression.
///
/// Executables are stored with their call/jump operands rewritten so that
/// identical code compresses better; the instruction filters undo that.
/// Very old installers compress each file separately inside a stored chunk
/// with zlib instead.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum PostFilter {
    #[default]
    None,
    Instruction4108,
    Instruction5200,
    Instruction5309,
    Zlib,
}

impl PostFilter {
    pub const fn name(self) -> Option<&'static str> {
        use PostFilter::*;

        match self {
            None => Option::None,
            Instruction4108 => Some("IF4108"),
            Instruction5200 => Some("IF5200"),
            Instruction5309 => Some("IF5309"),
            Zlib => Some("ZlibFilter"),
        }
    }
}

/// Combined method label for one file, e.g. `LZMA:IF5200`.
///
/// Stored chunks contribute no method component, so a stored file with no
/// filter yields an empty label.
pub fn method_label(compression: Compression, filter: PostFilter) -> String {
    let method = match compression {
        Compression::Stored => "",
        other => other.name(),
    };

    match (method, filter.name()) {
        ("", None) => String::new(),
        ("", Some(f)) => f.to_string(),
        (m, None) => m.to_string(),
        (m, Some(f)) => format!("{}:{}", m, f),
    }
}
