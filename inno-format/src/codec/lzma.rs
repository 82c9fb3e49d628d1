//! Raw LZMA1/LZMA2 decompression via `xz2::stream::Stream`.
//!
//! Chunks do not hold `.xz` containers. An LZMA1 chunk starts with the
//! classic 5-byte property header (lc/lp/pb byte then a little-endian u32
//! dictionary size) followed by a raw stream with no end marker; an LZMA2
//! chunk starts with a single dictionary-size code byte. The decoder
//! buffers the header itself, then drives a raw liblzma decoder. End of
//! the chunk region terminates the stream.

use xz2::stream::{Action, Error, Filters, LzmaOptions, Status, Stream};

use super::{Decoder, StreamStatus};
use crate::error::DecodeError;

/// liblzma rejects dictionaries smaller than this.
const DICT_SIZE_MIN: u32 = 4096;

#[derive(Clone, Copy)]
enum Variant {
    Lzma1,
    Lzma2,
}

enum State {
    Header(Vec<u8>),
    Streaming(Stream),
}

pub struct LzmaDecoder {
    variant: Variant,
    state: State,
}

impl LzmaDecoder {
    pub fn lzma1() -> Self {
        LzmaDecoder {
            variant: Variant::Lzma1,
            state: State::Header(Vec::with_capacity(5)),
        }
    }

    pub fn lzma2() -> Self {
        LzmaDecoder {
            variant: Variant::Lzma2,
            state: State::Header(Vec::with_capacity(1)),
        }
    }

    fn header_len(&self) -> usize {
        match self.variant {
            Variant::Lzma1 => 5,
            Variant::Lzma2 => 1,
        }
    }

    fn build_stream(&self, header: &[u8]) -> Result<Stream, DecodeError> {
        let mut filters = Filters::new();
        match self.variant {
            Variant::Lzma1 => {
                let props = header[0];
                if props >= 9 * 5 * 5 {
                    return Err(DecodeError::BadLzmaProps(props));
                }
                let lc = u32::from(props % 9);
                let rest = props / 9;
                let lp = u32::from(rest % 5);
                let pb = u32::from(rest / 5);
                let dict_size =
                    u32::from_le_bytes([header[1], header[2], header[3], header[4]]);

                let mut opts = LzmaOptions::new_preset(6)?;
                opts.dict_size(dict_size.max(DICT_SIZE_MIN));
                opts.literal_context_bits(lc);
                opts.literal_position_bits(lp);
                opts.position_bits(pb);
                filters.lzma1(&opts);
            }
            Variant::Lzma2 => {
                let code = header[0];
                if code > 40 {
                    return Err(DecodeError::BadLzmaProps(code));
                }
                let dict_size = if code == 40 {
                    u32::MAX
                } else {
                    (2 | u32::from(code & 1)) << (code / 2 + 11)
                };

                let mut opts = LzmaOptions::new_preset(6)?;
                opts.dict_size(dict_size.max(DICT_SIZE_MIN));
                filters.lzma2(&opts);
            }
        }
        Ok(Stream::new_raw_decoder(&filters)?)
    }
}

impl Decoder for LzmaDecoder {
    fn process(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: bool,
    ) -> Result<StreamStatus, DecodeError> {
        let mut header_consumed = 0usize;

        if let State::Header(buf) = &mut self.state {
            let want = self.header_len() - buf.len();
            let take = want.min(input.len());
            buf.extend_from_slice(&input[..take]);
            header_consumed = take;
            if buf.len() < self.header_len() {
                if flush && take == input.len() {
                    return Err(DecodeError::Truncated);
                }
                return Ok(StreamStatus::Progress {
                    bytes_consumed: header_consumed,
                    bytes_produced: 0,
                });
            }
            let header = std::mem::take(buf);
            self.state = State::Streaming(self.build_stream(&header)?);
        }

        let State::Streaming(stream) = &mut self.state else {
            unreachable!("header state handled above");
        };

        let rest = &input[header_consumed..];
        let before_in = stream.total_in();
        let before_out = stream.total_out();

        match stream.process(rest, output, Action::Run) {
            Ok(status) => {
                let bytes_consumed = header_consumed + (stream.total_in() - before_in) as usize;
                let bytes_produced = (stream.total_out() - before_out) as usize;
                if matches!(status, Status::StreamEnd) {
                    return Ok(StreamStatus::Done {
                        bytes_consumed,
                        bytes_produced,
                    });
                }
                // Raw streams in this container carry no end marker; the
                // stream is over when the chunk region is exhausted.
                if flush
                    && rest.len() == bytes_consumed - header_consumed
                    && bytes_produced == 0
                {
                    return Ok(StreamStatus::Done {
                        bytes_consumed,
                        bytes_produced,
                    });
                }
                Ok(StreamStatus::Progress {
                    bytes_consumed,
                    bytes_produced,
                })
            }
            Err(Error::Buf) if flush && rest.is_empty() => Ok(StreamStatus::Done {
                bytes_consumed: header_consumed,
                bytes_produced: 0,
            }),
            Err(err) => Err(DecodeError::Lzma(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LC: u32 = 3;
    const LP: u32 = 0;
    const PB: u32 = 2;
    const DICT: u32 = 1 << 16;

    fn raw_lzma1(data: &[u8]) -> Vec<u8> {
        let mut opts = LzmaOptions::new_preset(6).unwrap();
        opts.dict_size(DICT);
        opts.literal_context_bits(LC);
        opts.literal_position_bits(LP);
        opts.position_bits(PB);
        let mut filters = Filters::new();
        filters.lzma1(&opts);
        let mut stream = Stream::new_raw_encoder(&filters).unwrap();

        let mut out = vec![0u8; data.len() * 2 + 1024];
        let mut produced = 0;
        let mut consumed = 0;
        loop {
            let action = if consumed == data.len() {
                Action::Finish
            } else {
                Action::Run
            };
            let status = stream
                .process(&data[consumed..], &mut out[produced..], action)
                .unwrap();
            consumed = stream.total_in() as usize;
            produced = stream.total_out() as usize;
            if matches!(status, Status::StreamEnd) {
                break;
            }
        }
        out.truncate(produced);

        // Prepend the 5-byte property header the way the container does.
        let props = ((PB * 5 + LP) * 9 + LC) as u8;
        let mut framed = vec![props];
        framed.extend_from_slice(&DICT.to_le_bytes());
        framed.extend_from_slice(&out);
        framed
    }

    fn drive(codec: &mut dyn Decoder, encoded: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::new();
        let mut buf = [0u8; 33];
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
    fn lzma1_round_trip_with_property_header() {
        let plain = b"an unterminated raw lzma1 stream, ended by region exhaustion".repeat(30);
        let decoded = drive(&mut LzmaDecoder::lzma1(), &raw_lzma1(&plain)).unwrap();
        assert_eq!(decoded, plain);
    }

    #[test]
    fn lzma1_bad_props_byte() {
        let encoded = [0xff, 0, 0, 1, 0, 0, 0, 0];
        assert!(matches!(
            drive(&mut LzmaDecoder::lzma1(), &encoded),
            Err(DecodeError::BadLzmaProps(0xff))
        ));
    }

    #[test]
    fn lzma2_dict_code_over_40_is_rejected() {
        let encoded = [41u8, 0, 0];
        assert!(matches!(
            drive(&mut LzmaDecoder::lzma2(), &encoded),
            Err(DecodeError::BadLzmaProps(41))
        ));
    }

    #[test]
    fn truncated_header_is_detected() {
        let encoded = [0x5d, 0x00];
        assert!(matches!(
            drive(&mut LzmaDecoder::lzma1(), &encoded),
            Err(DecodeError::Truncated)
        ));
    }
}
