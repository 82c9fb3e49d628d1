//! bzip2 decompression via the low-level `bzip2::Decompress` state machine.

use bzip2::{Decompress, Status};

use super::{Decoder, StreamStatus};
use crate::error::DecodeError;

pub struct Bzip2Decoder {
    inner: Decompress,
}

impl Bzip2Decoder {
    pub fn new() -> Self {
        Bzip2Decoder {
            inner: Decompress::new(false),
        }
    }
}

impl Default for Bzip2Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Bzip2Decoder {
    fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: bool,
    ) -> Result<StreamStatus, DecodeError> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();

        let status = self.inner.decompress(input, output)?;

        let bytes_consumed = (self.inner.total_in() - before_in) as usize;
        let bytes_produced = (self.inner.total_out() - before_out) as usize;

        match status {
            Status::StreamEnd => Ok(StreamStatus::Done {
                bytes_consumed,
                bytes_produced,
            }),
            _ => {
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

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn bzip(data: &[u8]) -> Vec<u8> {
        let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::new(6));
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn drive(codec: &mut dyn Decoder, encoded: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        let mut pos = 0;
        loop {
            let remaining = &encoded[pos..];
            let status = codec.process(remaining, &mut buf, remaining.is_empty())?;
            pos += status.bytes_consumed();
            out.extend_from_slice(&buf[..status.bytes_produced()]);
            if status.is_done() {
                return Ok(out);
            }
        }
    }

    #[test]
    fn round_trip() {
        let plain = b"bzip2 works on whole blocks, so feed it something substantial".repeat(50);
        let decoded = drive(&mut Bzip2Decoder::new(), &bzip(&plain)).unwrap();
        assert_eq!(decoded, plain);
    }

    #[test]
    fn truncated_stream_is_detected() {
        let encoded = bzip(&b"short".repeat(100));
        let cut = &encoded[..encoded.len() / 2];
        assert!(drive(&mut Bzip2Decoder::new(), cut).is_err());
    }
}
