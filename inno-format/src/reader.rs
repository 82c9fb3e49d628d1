//! The archive reader and its extraction orchestrator.
//!
//! Extraction is single-threaded, synchronous and strictly sequential:
//! one chunk chain is open at a time and decompressors are forward-only.
//! Aliasing records (several file records resolving to the same payload)
//! are decoded once; the first decode is captured and replayed for the
//! rest.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};

use tracing::{debug, trace};

use crate::chunk::{Chunk, ChunkReader};
use crate::error::{DecodeError, ExtractError, OpenError};
use crate::item::Item;
use crate::loader::Offsets;
use crate::record::{DataEntry, SetupInfo};

/// Outcome of one worklist item. Item failures never abort the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Resource exhaustion (e.g. the reuse capture buffer could not be
    /// allocated).
    Unavailable,
    /// Size mismatch, checksum mismatch, or a decode failure.
    DataError,
}

/// The host side of an extraction batch: it supplies sinks and receives
/// outcomes and progress.
pub trait ExtractCallback {
    /// Declared total byte count for the batch, reported before any I/O.
    fn set_total(&mut self, _total: u64) {}

    /// Announce an item. Return `Ok(false)` to skip it (no sink supplied,
    /// no outcome reported).
    fn begin_item(&mut self, _index: u32, _item: &Item<'_>) -> std::io::Result<bool> {
        Ok(true)
    }

    /// Receive a block of the item's decoded bytes.
    fn write(&mut self, index: u32, data: &[u8]) -> std::io::Result<()>;

    /// Monotonically increasing count of raw container bytes consumed.
    fn progress(&mut self, _source_bytes: u64) {}

    /// Receive the item's outcome. Called exactly once per non-skipped item.
    fn end_item(&mut self, _index: u32, _outcome: Outcome) {}
}

/// Statistics from one extraction batch.
#[derive(Debug, Clone, Default)]
pub struct ExtractStats {
    /// Items that completed with `Outcome::Success`.
    pub files_extracted: u64,
    /// Items served from a reuse buffer without decoding.
    pub reused: u64,
    /// Items that actually ran the decode pipeline.
    pub decode_calls: u64,
    pub data_errors: u64,
    pub unavailable: u64,
    /// Total bytes handed to sinks.
    pub bytes_written: u64,
}

/// Reader over one installer: the pre-parsed metadata tables plus a chunk
/// reader owning the container byte source.
pub struct InnoReader<R> {
    chunks: ChunkReader<R>,
    offsets: Offsets,
    info: SetupInfo,
    /// Maps a file record index to the index of the first record that
    /// resolved to the same payload. Canonical records have no entry.
    collisions: HashMap<u32, u32>,
    path_collision: bool,
}

impl<R: Read + Seek> InnoReader<R> {
    /// Assemble a reader from a byte source, resolved offsets, and the
    /// already-parsed metadata tables.
    pub fn new(src: R, offsets: Offsets, info: SetupInfo) -> Result<InnoReader<R>, OpenError> {
        let mut collisions = HashMap::new();
        let mut first_by_payload: HashMap<(Chunk, u64, u64), u32> = HashMap::new();
        let mut paths = HashSet::new();
        let mut path_collision = false;

        for (index, record) in info.files.iter().enumerate() {
            let index = index as u32;
            if let Some(entry) = record
                .location
                .and_then(|location| info.data_entries.get(location as usize))
            {
                match first_by_payload.entry(entry.payload_key()) {
                    std::collections::hash_map::Entry::Occupied(first) => {
                        collisions.insert(index, *first.get());
                    }
                    std::collections::hash_map::Entry::Vacant(slot) => {
                        slot.insert(index);
                    }
                }
            }
            if !paths.insert(record.destination.clone()) {
                path_collision = true;
            }
        }

        debug!(
            files = info.files.len(),
            data_entries = info.data_entries.len(),
            collisions = collisions.len(),
            path_collision,
            "archive assembled"
        );

        Ok(InnoReader {
            chunks: ChunkReader::new(src, offsets.data_offset.unwrap_or(0)),
            offsets,
            info,
            collisions,
            path_collision,
        })
    }

    pub fn offsets(&self) -> &Offsets {
        &self.offsets
    }

    pub fn info(&self) -> &SetupInfo {
        &self.info
    }

    pub fn num_items(&self) -> u32 {
        self.info.files.len() as u32
    }

    pub fn item(&self, index: u32) -> Option<Item<'_>> {
        let record = self.info.files.get(index as usize)?;
        let data = record
            .location
            .and_then(|location| self.info.data_entries.get(location as usize));
        Some(Item {
            record,
            data,
            disambiguate: self.path_collision,
        })
    }

    /// Archive-level compression method name.
    pub fn method_name(&self) -> &'static str {
        self.info.compression.name()
    }

    /// Human-readable archive comment in the style hosts display.
    pub fn comment(&self) -> String {
        let mut out = String::new();
        if let Some(version) = &self.info.version {
            out.push_str(&format!("InnoSetupVersion = {}\n", version));
        }
        if let Some(name) = &self.info.app_name {
            out.push_str(&format!("AppName = {}\n", name));
        }
        if let Some(version) = &self.info.app_version {
            out.push_str(&format!("AppVersion = {}\n", version));
        }
        out
    }

    /// If `index` aliases an earlier record, return the canonical index.
    pub fn canonical_index(&self, index: u32) -> Option<u32> {
        self.collisions.get(&index).copied()
    }

    /// Raw container bytes consumed so far.
    pub fn source_bytes(&self) -> u64 {
        self.chunks.source_bytes()
    }

    /// Extract every record in table order.
    pub fn extract_all(
        &mut self,
        password: Option<&str>,
        callback: &mut dyn ExtractCallback,
    ) -> Result<ExtractStats, ExtractError> {
        self.extract(None, password, callback)
    }

    /// Extract the given record indices (or all records, in table order,
    /// when `indices` is `None`), streaming each item's bytes to the
    /// callback and reporting a per-item [`Outcome`].
    pub fn extract(
        &mut self,
        indices: Option<&[u32]>,
        password: Option<&str>,
        callback: &mut dyn ExtractCallback,
    ) -> Result<ExtractStats, ExtractError> {
        if self.offsets.data_offset.is_none() {
            return Err(ExtractError::MultiVolumeUnsupported);
        }

        let order: Vec<u32> = match indices {
            Some(indices) => indices.to_vec(),
            None => (0..self.num_items()).collect(),
        };

        // First pass, no I/O: progress total and the batch reuse plan.
        // A reuse slot is opened for the canonical record of every alias in
        // the batch; whichever of the group decodes first fills it.
        let mut reuse: HashMap<u32, Vec<u8>> = HashMap::new();
        let mut total = 0u64;
        for &index in &order {
            if let Some(&first) = self.collisions.get(&index) {
                reuse.entry(first).or_default();
            }
            if let Some(item) = self.item(index) {
                total += item.size();
            }
        }
        callback.set_total(total);
        debug!(items = order.len(), total, "extraction batch started");

        let mut stats = ExtractStats::default();
        let mut scratch = vec![0u8; 16 * 1024];

        for &index in &order {
            let Some(item) = self.item(index) else {
                callback.end_item(index, Outcome::DataError);
                stats.data_errors += 1;
                continue;
            };
            let proceed = callback
                .begin_item(index, &item)
                .map_err(|source| ExtractError::Sink { index, source })?;
            if !proceed {
                trace!(index, "item skipped by host");
                continue;
            }

            let outcome =
                self.extract_item(index, password, &mut reuse, &mut scratch, &mut stats, callback)?;
            match outcome {
                Outcome::Success => stats.files_extracted += 1,
                Outcome::Unavailable => stats.unavailable += 1,
                Outcome::DataError => stats.data_errors += 1,
            }
            callback.end_item(index, outcome);
        }

        debug!(
            extracted = stats.files_extracted,
            reused = stats.reused,
            data_errors = stats.data_errors,
            "extraction batch finished"
        );
        Ok(stats)
    }

    fn extract_item(
        &mut self,
        index: u32,
        password: Option<&str>,
        reuse: &mut HashMap<u32, Vec<u8>>,
        scratch: &mut [u8],
        stats: &mut ExtractStats,
        callback: &mut dyn ExtractCallback,
    ) -> Result<Outcome, ExtractError> {
        let record = &self.info.files[index as usize];

        let Some(location) = record.location else {
            // Virtual entry (e.g. the uninstall stub): trivially satisfied
            // with zero bytes.
            return Ok(Outcome::Success);
        };
        let Some(entry) = self.info.data_entries.get(location as usize) else {
            debug!(index, location, "location out of range");
            return Ok(Outcome::DataError);
        };
        let entry = entry.clone();

        // Alias served from an already-captured decode.
        let canonical = self.collisions.get(&index).copied();
        if let Some(first) = canonical {
            if let Some(buffer) = reuse.get(&first) {
                if !buffer.is_empty() || entry.uncompressed_size == 0 {
                    callback
                        .write(index, buffer)
                        .map_err(|source| ExtractError::Sink { index, source })?;
                    stats.reused += 1;
                    stats.bytes_written += buffer.len() as u64;
                    callback.progress(self.chunks.source_bytes());
                    trace!(index, first, "served from reuse buffer");
                    return Ok(Outcome::Success);
                }
            }
        }

        // This decode's bytes are captured when any record of its alias
        // group appears later in the batch. The slot is keyed by the
        // canonical index whether or not the canonical record itself is in
        // the batch.
        let capture_key = canonical.or_else(|| reuse.contains_key(&index).then_some(index));
        let mut capture = match capture_key {
            Some(_) => {
                let mut buffer = Vec::new();
                if buffer
                    .try_reserve_exact(entry.uncompressed_size.min(usize::MAX as u64) as usize)
                    .is_err()
                {
                    return Ok(Outcome::Unavailable);
                }
                Some(buffer)
            }
            None => None,
        };

        stats.decode_calls += 1;
        let decoded = self.decode_item(index, &entry, password, scratch, &mut capture, callback)?;
        let (written, checksum) = match decoded {
            Ok(pair) => pair,
            Err(err) => {
                debug!(index, error = %err, "item decode failed");
                return Ok(match err {
                    DecodeError::Io(ref io) if io.kind() == std::io::ErrorKind::OutOfMemory => {
                        Outcome::Unavailable
                    }
                    _ => Outcome::DataError,
                });
            }
        };
        stats.bytes_written += written;

        if written != entry.uncompressed_size {
            debug!(
                index,
                written,
                declared = entry.uncompressed_size,
                "size mismatch"
            );
            return Ok(Outcome::DataError);
        }
        if checksum != entry.checksum {
            debug!(
                index,
                computed = format_args!("{:08x}", checksum),
                declared = format_args!("{:08x}", entry.checksum),
                "checksum mismatch"
            );
            return Ok(Outcome::DataError);
        }

        // Publish the captured bytes only after they verified; aliases of a
        // bad canonical must decode (and fail) on their own.
        if let (Some(key), Some(buffer)) = (capture_key, capture) {
            reuse.insert(key, buffer);
        }
        Ok(Outcome::Success)
    }

    /// Run the decode pipeline for one item. The outer `Result` is for
    /// batch-fatal sink failures; the inner one scopes decode errors to
    /// the item.
    #[allow(clippy::type_complexity)]
    fn decode_item(
        &mut self,
        index: u32,
        entry: &DataEntry,
        password: Option<&str>,
        scratch: &mut [u8],
        capture: &mut Option<Vec<u8>>,
        callback: &mut dyn ExtractCallback,
    ) -> Result<Result<(u64, u32), DecodeError>, ExtractError> {
        macro_rules! try_decode {
            ($expr:expr) => {
                match $expr {
                    Ok(value) => value,
                    Err(err) => return Ok(Err(err)),
                }
            };
        }

        try_decode!(self.chunks.open(&entry.chunk, password));

        // Position within the decoded chunk stream. Forward motion is a
        // discard; backward motion forces a rebuild of the chain.
        let position = self.chunks.total_read();
        if entry.file_offset >= position {
            try_decode!(self.chunks.discard(entry.file_offset - position));
        } else {
            debug!(
                index,
                position,
                offset = entry.file_offset,
                "rewinding chunk"
            );
            try_decode!(self.chunks.reset(&entry.chunk, password));
            try_decode!(self.chunks.discard(entry.file_offset));
        }

        let mut file = self.chunks.file_reader(entry);
        let mut written = 0u64;
        loop {
            let n = try_decode!(file.read(scratch));
            if n == 0 {
                break;
            }
            callback
                .write(index, &scratch[..n])
                .map_err(|source| ExtractError::Sink { index, source })?;
            if let Some(buffer) = capture {
                if buffer.try_reserve(n).is_err() {
                    return Ok(Err(std::io::Error::new(
                        std::io::ErrorKind::OutOfMemory,
                        "reuse buffer allocation failed",
                    )
                    .into()));
                }
                buffer.extend_from_slice(&scratch[..n]);
            }
            written += n as u64;
            callback.progress(file.source_bytes());
        }

        Ok(Ok((written, file.checksum())))
    }
}
