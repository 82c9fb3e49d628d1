//! Streaming decoders driven by the filter pipeline.
//!
//! Every decoder is a buffer-to-buffer state machine with no I/O of its
//! own: consume some input, produce some output, report done. The actual
//! decompression is done by `flate2`, `bzip2` and `xz2`; this module only
//! adapts them to one uniform contract.

pub mod bzip2;
pub mod exe;
pub mod lzma;
pub mod zlib;

use crate::compression::Compression;
use crate::error::DecodeError;

/// Status returned by one [`Decoder::process`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Made progress, call again with updated buffers.
    Progress {
        bytes_consumed: usize,
        bytes_produced: usize,
    },
    /// Stream finished; no further output will be produced.
    Done {
        bytes_consumed: usize,
        bytes_produced: usize,
    },
}

impl StreamStatus {
    pub fn is_done(&self) -> bool {
        matches!(self, StreamStatus::Done { .. })
    }

    pub fn bytes_consumed(&self) -> usize {
        match self {
            StreamStatus::Progress { bytes_consumed, .. } => *bytes_consumed,
            StreamStatus::Done { bytes_consumed, .. } => *bytes_consumed,
        }
    }

    pub fn bytes_produced(&self) -> usize {
        match self {
            StreamStatus::Progress { bytes_produced, .. } => *bytes_produced,
            StreamStatus::Done { bytes_produced, .. } => *bytes_produced,
        }
    }
}

/// A streaming transform.
///
/// `flush` is set once the upstream has no more input; the decoder must
/// then finish (possibly over several calls while draining output) and
/// report `Done`. A decoder that can make no progress with `flush` set and
/// an empty input must fail rather than hold the pipeline open.
pub trait Decoder {
    fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: bool,
    ) -> Result<StreamStatus, DecodeError>;
}

/// Identity transform for stored chunks.
pub struct CopyDecoder;

impl Decoder for CopyDecoder {
    fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: bool,
    ) -> Result<StreamStatus, DecodeError> {
        let n = input.len().min(output.len());
        output[..n].copy_from_slice(&input[..n]);
        if flush && n == input.len() {
            Ok(StreamStatus::Done {
                bytes_consumed: n,
                bytes_produced: n,
            })
        } else {
            Ok(StreamStatus::Progress {
                bytes_consumed: n,
                bytes_produced: n,
            })
        }
    }
}

/// Select the decompressor for a chunk's compression method.
pub fn new_decoder(method: Compression) -> Result<Box<dyn Decoder>, DecodeError> {
    match method {
        Compression::Stored => Ok(Box::new(CopyDecoder)),
        Compression::Zlib => Ok(Box::new(zlib::ZlibDecoder::new())),
        Compression::BZip2 => Ok(Box::new(bzip2::Bzip2Decoder::new())),
        Compression::Lzma1 => Ok(Box::new(lzma::LzmaDecoder::lzma1())),
        Compression::Lzma2 => Ok(Box::new(lzma::LzmaDecoder::lzma2())),
        Compression::Unknown(_) => Err(DecodeError::UnsupportedCompression(method)),
    }
}
