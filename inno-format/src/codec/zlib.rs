//! zlib decompression via flate2's low-level state machine.

use flate2::{Decompress, FlushDecompress, Status};

use super::{Decoder, StreamStatus};
use crate::error::DecodeError;

pub struct ZlibDecoder {
    inner: Decompress,
}

impl ZlibDecoder {
    pub fn new() -> Self {
        ZlibDecoder {
            inner: Decompress::new(true),
        }
    }
}

impl Default for ZlibDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ZlibDecoder {
    fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: bool,
    ) -> Result<StreamStatus, DecodeError> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();

        let mode = if flush {
            FlushDecompress::Finish
        } else {
            FlushDecompress::None
        };
        let status = self.inner.decompress(input, output, mode)?;

        let bytes_consumed = (self.inner.total_in() - before_in) as usize;
        let bytes_produced = (self.inner.total_out() - before_out) as usize;

        match status {
            Status::StreamEnd => Ok(StreamStatus::Done {
                bytes_consumed,
                bytes_produced,
            }),
            Status::Ok | Status::BufError => {
                // A zlib stream carries its own end marker; running out of
                // input without having seen it means the chunk was cut short.
                if flush && input.is_empty() && bytes_consumed == 0 && bytes_produced == 0 {
                    return Err(DecodeError::Truncated);
                }
                Ok(StreamStatus::Progress {
                    bytes_consumed,
                    bytes_produced,
                })
            }
        }
    }
}
