//! Herein lies a reading engine for Inno Setup installer archives.
//!
//! The crate covers the streaming side of the format: locating the
//! embedded setup regions ([`Offsets`]), resolving chunks to pull-based
//! decompression pipelines ([`ChunkReader`], [`FilterChain`]), and walking
//! the file table to extract payloads with deduplication, checksum
//! verification and progress reporting ([`InnoReader`]).
//!
//! Parsing the version-dependent setup metadata block is out of scope:
//! callers hand over an already-parsed [`SetupInfo`] and a seekable byte
//! source, and drive extraction through an [`ExtractCallback`].
//!
//! ```no_run
//! use std::fs::File;
//! use inno_format::{loader, InnoReader, SetupInfo};
//!
//! let mut file = File::open("setup.exe")?;
//! let offsets = loader::Offsets::load(&mut file)?;
//! let info: SetupInfo = todo!("parse the setup header region");
//! let _archive = InnoReader::new(file, offsets, info)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod chunk;
mod codec;
mod compression;
mod counting;
mod error;
mod filter;
mod item;
pub mod loader;
mod reader;
mod record;

pub use chunk::{Chunk, ChunkReader, FileReader, CHUNK_MAGIC};
pub use codec::{CopyDecoder, Decoder, StreamStatus};
pub use compression::{method_label, Compression, Encryption, PostFilter};
pub use counting::CountingReader;
pub use error::{DecodeError, ExtractError, OpenError};
pub use filter::{CodecStage, FilterChain, Pull, PullBuffer, RegionRoot};
pub use item::{detect_arch, FileArch, Item};
pub use loader::{probe, Offsets};
pub use reader::{ExtractCallback, ExtractStats, InnoReader, Outcome};
pub use record::{DataEntry, FileKind, FileRecord, RecordOptions, SetupInfo};
