//! Per-item presentation for host listings.

use crate::compression::method_label;
use crate::record::{DataEntry, FileKind, FileRecord};

/// Architecture a file record is gated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileArch {
    Unknown,
    X86,
    X64,
    Arm64,
}

/// Three-valued latch used while scanning check-condition tokens.
///
/// The first assignment wins; a later contradicting assignment reverts the
/// latch to `Unsure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Tri {
    #[default]
    Unsure,
    Yes,
    No,
}

impl Tri {
    fn set(&mut self, value: bool) {
        use Tri::*;

        *self = match (*self, value) {
            (Unsure, true) | (Yes, true) => Yes,
            (Unsure, false) | (No, false) => No,
            (Yes, false) | (No, true) => Unsure,
        };
    }
}

/// Classify a record from its option bits and check-condition tokens.
/// Tokens may be negated by a preceding `not`.
pub fn detect_arch(record: &FileRecord) -> FileArch {
    let mut bits32 = Tri::Unsure;
    let mut bits64 = Tri::Unsure;
    let mut arm = Tri::Unsure;

    if record.options.bits_32 {
        bits32.set(true);
    }
    if record.options.bits_64 {
        bits64.set(true);
    }

    let mut negate = false;
    for word in record.check.split_whitespace() {
        match word {
            "not" => {
                negate = true;
                continue;
            }
            "Is64BitInstallMode" | "IsWin64" => bits64.set(!negate),
            "IsARM64" => arm.set(!negate),
            _ => {}
        }
        negate = false;
    }

    if arm == Tri::Yes {
        FileArch::Arm64
    } else if bits64 == Tri::Yes {
        FileArch::X64
    } else if bits32 == Tri::Yes {
        FileArch::X86
    } else {
        FileArch::Unknown
    }
}

/// A file record joined with its data entry, ready for display.
pub struct Item<'a> {
    pub(crate) record: &'a FileRecord,
    pub(crate) data: Option<&'a DataEntry>,
    /// Prefix paths with the architecture when the archive has duplicate
    /// destination paths.
    pub(crate) disambiguate: bool,
}

impl Item<'_> {
    pub fn record(&self) -> &FileRecord {
        self.record
    }

    pub fn data_entry(&self) -> Option<&DataEntry> {
        self.data
    }

    pub fn path(&self) -> String {
        if self.record.kind == FileKind::UninstallStub {
            return "unins___.exe".to_string();
        }
        if self.disambiguate {
            let prefix = match detect_arch(self.record) {
                FileArch::X86 => "{x86}\\",
                FileArch::X64 => "{x64}\\",
                FileArch::Arm64 => "{arm64}\\",
                FileArch::Unknown => "",
            };
            return format!("{}{}", prefix, self.record.destination);
        }
        self.record.destination.clone()
    }

    /// Declared decoded size; the uninstall stub is always empty.
    pub fn size(&self) -> u64 {
        if self.record.kind == FileKind::UninstallStub {
            return 0;
        }
        self.data.map(|d| d.uncompressed_size).unwrap_or(0)
    }

    pub fn checksum(&self) -> u32 {
        self.data.map(|d| d.checksum).unwrap_or(self.record.checksum)
    }

    pub fn encrypted(&self) -> bool {
        self.data
            .map(|d| d.chunk.encryption == crate::compression::Encryption::Encrypted)
            .unwrap_or(false)
    }

    /// Combined method label, e.g. `LZMA:IF5200`.
    pub fn method(&self) -> String {
        self.data
            .map(|d| method_label(d.chunk.compression, d.filter))
            .unwrap_or_default()
    }

    pub fn mtime(&self) -> i64 {
        if self.record.kind == FileKind::UninstallStub {
            return 0;
        }
        self.data.map(|d| d.timestamp).unwrap_or(0)
    }

    pub fn attributes(&self) -> u32 {
        self.record.attributes
    }

    /// The record's check condition, surfaced as its comment.
    pub fn comment(&self) -> &str {
        &self.record.check
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordOptions;

    fn record_with_check(check: &str) -> FileRecord {
        FileRecord {
            check: check.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn tri_state_first_assignment_wins_until_contradicted() {
        let mut t = Tri::Unsure;
        t.set(true);
        assert_eq!(t, Tri::Yes);
        t.set(true);
        assert_eq!(t, Tri::Yes);
        t.set(false);
        assert_eq!(t, Tri::Unsure);
    }

    #[test]
    fn arch_from_check_tokens() {
        assert_eq!(detect_arch(&record_with_check("IsWin64")), FileArch::X64);
        assert_eq!(detect_arch(&record_with_check("IsARM64")), FileArch::Arm64);
        assert_eq!(detect_arch(&record_with_check("not IsWin64")), FileArch::Unknown);
        assert_eq!(detect_arch(&record_with_check("")), FileArch::Unknown);
    }

    #[test]
    fn arch_from_option_bits() {
        let record = FileRecord {
            options: RecordOptions {
                bits_32: true,
                bits_64: false,
            },
            ..Default::default()
        };
        assert_eq!(detect_arch(&record), FileArch::X86);
    }

    #[test]
    fn contradiction_reverts_to_unsure() {
        // The option bit says 64-bit; the check condition says not.
        let record = FileRecord {
            options: RecordOptions {
                bits_32: false,
                bits_64: true,
            },
            check: "not Is64BitInstallMode".to_string(),
            ..Default::default()
        };
        assert_eq!(detect_arch(&record), FileArch::Unknown);
    }
}
