//! Chunk access: resolving a chunk's identity to a positioned filter chain.
//!
//! A chunk is a contiguous, independently decompressible region of the
//! data area holding the concatenated payloads of one or more files.
//! Decompressors are stateful and forward-only, so the reader keeps a
//! single open chain and reuses it for as long as consecutive requests
//! name the same chunk and non-decreasing offsets.

use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, trace};

use crate::codec::{self, Decoder};
use crate::compression::{Compression, Encryption, PostFilter};
use crate::counting::CountingReader;
use crate::error::DecodeError;
use crate::filter::{CodecStage, FilterChain, Pull, RegionRoot};
use crate::record::DataEntry;

/// Every chunk in the data region starts with these four bytes.
pub const CHUNK_MAGIC: [u8; 4] = *b"zlb\x1a";

/// Identity of one chunk. Equality across all fields drives reader reuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub compression: Compression,
    pub encryption: Encryption,
    /// First byte offset within the data region (of the chunk magic).
    pub offset: u64,
    /// Encoded length, excluding the magic.
    pub stored_size: u64,
}

/// Resolves chunks to positioned filter chains over one container stream.
pub struct ChunkReader<R> {
    src: CountingReader<R>,
    data_offset: u64,
    current: Option<Chunk>,
    chain: FilterChain,
}

impl<R: Read + Seek> ChunkReader<R> {
    pub fn new(src: R, data_offset: u64) -> Self {
        ChunkReader {
            src: CountingReader::new(src),
            data_offset,
            current: None,
            chain: FilterChain::new(),
        }
    }

    /// The chunk the open chain was built for, if any.
    pub fn current(&self) -> Option<&Chunk> {
        self.current.as_ref()
    }

    /// Decoded bytes delivered from the open chain, relative to chunk start.
    pub fn total_read(&self) -> u64 {
        self.chain.total_read()
    }

    /// Raw container bytes consumed so far. Monotonically increasing.
    pub fn source_bytes(&self) -> u64 {
        self.src.bytes_read()
    }

    /// Seeks issued against the container so far.
    pub fn source_seeks(&self) -> u64 {
        self.src.seeks()
    }

    /// Make `chunk` the open chunk. A request for the chunk that is already
    /// open returns without touching the container; back-to-back files in
    /// one chunk are the common case.
    pub fn open(&mut self, chunk: &Chunk, password: Option<&str>) -> Result<(), DecodeError> {
        if self.current.as_ref() == Some(chunk) {
            trace!(offset = chunk.offset, "chunk already open");
            return Ok(());
        }
        self.reset(chunk, password)
    }

    /// Discard any open chain and build a fresh one positioned at the start
    /// of `chunk`, even if it is the chunk already open. Required when the
    /// read cursor has moved past a requested file offset.
    pub fn reset(&mut self, chunk: &Chunk, password: Option<&str>) -> Result<(), DecodeError> {
        self.current = None;
        self.chain = FilterChain::new();

        if chunk.encryption == Encryption::Encrypted {
            // The password is accepted and threaded through, but no cipher
            // is wired up.
            let _ = password;
            return Err(DecodeError::EncryptionUnsupported);
        }

        debug!(
            offset = chunk.offset,
            size = chunk.stored_size,
            method = %chunk.compression,
            "opening chunk"
        );

        self.src
            .seek(SeekFrom::Start(self.data_offset + chunk.offset))?;
        let mut magic = [0u8; 4];
        self.src.read_exact(&mut magic)?;
        if magic != CHUNK_MAGIC {
            return Err(DecodeError::BadChunkMagic {
                offset: self.data_offset + chunk.offset,
            });
        }

        let mut chain = FilterChain::new();
        chain.push_root(RegionRoot::new(chunk.stored_size));
        chain.push_codec(codec::new_decoder(chunk.compression)?);

        self.chain = chain;
        self.current = Some(*chunk);
        Ok(())
    }

    /// Pull decoded chunk bytes. Returns 0 at end of chunk.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<usize, DecodeError> {
        let Self { src, chain, .. } = self;
        match chain.read(src, dest)? {
            Pull::Read(n) => Ok(n),
            Pull::Eof => Ok(0),
            Pull::WouldBlock => Err(DecodeError::Stalled),
        }
    }

    /// Read and drop `n` decoded bytes. There is no random access into a
    /// compressed chunk; this is how positioning works.
    pub fn discard(&mut self, mut n: u64) -> Result<(), DecodeError> {
        let mut scratch = [0u8; 4096];
        while n > 0 {
            let want = scratch.len().min(n.min(usize::MAX as u64) as usize);
            let got = self.read(&mut scratch[..want])?;
            if got == 0 {
                return Err(DecodeError::Truncated);
            }
            n -= got as u64;
        }
        Ok(())
    }

    /// A reader for one file's span of the open chunk, with the entry's
    /// post-filter applied and a checksum accumulated over the output.
    /// The chunk must already be positioned at the file's offset.
    pub fn file_reader(&mut self, entry: &DataEntry) -> FileReader<'_, R> {
        let post: Option<Box<dyn Decoder>> = match entry.filter {
            PostFilter::None => None,
            PostFilter::Instruction4108 => Some(Box::new(codec::exe::Exe4108Decoder::new())),
            PostFilter::Instruction5200 => Some(Box::new(codec::exe::Exe5200Decoder::new(false))),
            PostFilter::Instruction5309 => Some(Box::new(codec::exe::Exe5200Decoder::new(true))),
            PostFilter::Zlib => Some(Box::new(codec::zlib::ZlibDecoder::new())),
        };
        FileReader {
            chunks: self,
            remaining: entry.file_size,
            post: post.map(CodecStage::new),
            hasher: crc32fast::Hasher::new(),
            produced: 0,
        }
    }
}

/// Streaming view of one file inside an open chunk: a byte-range
/// restriction, an optional post-filter stage, and a checksum tap.
pub struct FileReader<'a, R> {
    chunks: &'a mut ChunkReader<R>,
    remaining: u64,
    post: Option<CodecStage>,
    hasher: crc32fast::Hasher,
    produced: u64,
}

impl<R: Read + Seek> FileReader<'_, R> {
    /// Pull decoded, filtered file bytes. Returns 0 at end of file.
    pub fn read(&mut self, dest: &mut [u8]) -> Result<usize, DecodeError> {
        let Self {
            chunks,
            remaining,
            post,
            ..
        } = self;

        let n = match post {
            None => {
                let want = dest.len().min((*remaining).min(usize::MAX as u64) as usize);
                if want == 0 {
                    0
                } else {
                    let n = chunks.read(&mut dest[..want])?;
                    *remaining -= n as u64;
                    n
                }
            }
            Some(stage) => {
                let mut fill = |buf: &mut [u8]| -> Result<Pull, DecodeError> {
                    let want = buf.len().min((*remaining).min(usize::MAX as u64) as usize);
                    if want == 0 {
                        return Ok(Pull::Eof);
                    }
                    let n = chunks.read(&mut buf[..want])?;
                    if n == 0 {
                        return Ok(Pull::Eof);
                    }
                    *remaining -= n as u64;
                    Ok(Pull::Read(n))
                };
                match stage.read(&mut fill, dest)? {
                    Pull::Read(n) => n,
                    Pull::Eof => 0,
                    Pull::WouldBlock => return Err(DecodeError::Stalled),
                }
            }
        };

        self.hasher.update(&dest[..n]);
        self.produced += n as u64;
        Ok(n)
    }

    /// Bytes delivered so far.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// CRC-32 of the bytes delivered so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Raw container bytes consumed, for progress reporting.
    pub fn source_bytes(&self) -> u64 {
        self.chunks.source_bytes()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn stored_chunk_container(payload: &[u8], data_offset: u64) -> (Cursor<Vec<u8>>, Chunk) {
        let mut bytes = vec![0u8; data_offset as usize];
        bytes.extend_from_slice(&CHUNK_MAGIC);
        bytes.extend_from_slice(payload);
        let chunk = Chunk {
            compression: Compression::Stored,
            encryption: Encryption::Plaintext,
            offset: 0,
            stored_size: payload.len() as u64,
        };
        (Cursor::new(bytes), chunk)
    }

    #[test]
    fn reopening_the_same_chunk_reuses_the_chain() {
        let (src, chunk) = stored_chunk_container(b"0123456789", 16);
        let mut reader = ChunkReader::new(src, 16);

        reader.open(&chunk, None).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(reader.read(&mut buf).unwrap(), 5);
        assert_eq!(reader.total_read(), 5);

        let seeks = reader.source_seeks();
        let source = reader.source_bytes();
        reader.open(&chunk, None).unwrap();
        assert_eq!(reader.source_seeks(), seeks);
        assert_eq!(reader.source_bytes(), source);
        assert_eq!(reader.total_read(), 5);

        assert_eq!(reader.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"56789");
    }

    #[test]
    fn reset_rewinds_to_chunk_start() {
        let (src, chunk) = stored_chunk_container(b"abcdefghij", 0);
        let mut reader = ChunkReader::new(src, 0);

        reader.open(&chunk, None).unwrap();
        reader.discard(6).unwrap();
        assert_eq!(reader.total_read(), 6);

        reader.reset(&chunk, None).unwrap();
        assert_eq!(reader.total_read(), 0);
        reader.discard(2).unwrap();
        let mut buf = [0u8; 2];
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"cd");
    }

    #[test]
    fn bad_chunk_magic_is_rejected() {
        let mut bytes = b"nope".to_vec();
        bytes.extend_from_slice(b"payload");
        let chunk = Chunk {
            compression: Compression::Stored,
            encryption: Encryption::Plaintext,
            offset: 0,
            stored_size: 7,
        };
        let mut reader = ChunkReader::new(Cursor::new(bytes), 0);
        assert!(matches!(
            reader.open(&chunk, None),
            Err(DecodeError::BadChunkMagic { offset: 0 })
        ));
    }

    #[test]
    fn encrypted_chunks_are_refused() {
        let (src, mut chunk) = stored_chunk_container(b"secret", 0);
        chunk.encryption = Encryption::Encrypted;
        let mut reader = ChunkReader::new(src, 0);
        assert!(matches!(
            reader.open(&chunk, Some("password")),
            Err(DecodeError::EncryptionUnsupported)
        ));
    }

    #[test]
    fn discarding_past_the_chunk_end_fails() {
        let (src, chunk) = stored_chunk_container(b"tiny", 0);
        let mut reader = ChunkReader::new(src, 0);
        reader.open(&chunk, None).unwrap();
        assert!(matches!(
            reader.discard(5),
            Err(DecodeError::Truncated)
        ));
    }

    #[test]
    fn file_reader_restricts_and_checksums() {
        let (src, chunk) = stored_chunk_container(b"aaaabbbbcccc", 0);
        let mut reader = ChunkReader::new(src, 0);
        reader.open(&chunk, None).unwrap();
        reader.discard(4).unwrap();

        let entry = DataEntry {
            chunk,
            file_offset: 4,
            file_size: 4,
            uncompressed_size: 4,
            checksum: crc32fast::hash(b"bbbb"),
            filter: PostFilter::None,
            timestamp: 0,
        };
        let mut fr = reader.file_reader(&entry);
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = fr.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"bbbb");
        assert_eq!(fr.produced(), 4);
        assert_eq!(fr.checksum(), entry.checksum);
    }
}
