//! Pull-based stream filters.
//!
//! A [`FilterChain`] is an ordered arena of stages. The first stage is a
//! root that pulls raw bytes from the container; every later stage wraps a
//! [`Decoder`] and pulls its input from the stage before it. Nothing runs
//! ahead of downstream demand: reading from the chain reads from the last
//! stage, which fills its input buffer from upstream only when it has to.

use std::io::Read;

use crate::codec::Decoder;
use crate::error::DecodeError;

/// Buffer size for per-stage input windows.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Outcome of one pull from a stage or chain.
///
/// `WouldBlock` is reserved for non-blocking sources; the on-disk sources
/// this crate is used with never produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    /// `n` bytes were written to the destination.
    Read(usize),
    /// No bytes available right now, but the stream has not ended.
    WouldBlock,
    /// End of stream; no bytes were produced.
    Eof,
}

/// Fixed-capacity refillable input window.
///
/// State is the index pair `{cursor, limit}` plus a sticky EOF flag; once
/// the upstream has reported end-of-stream no further refill is attempted.
pub struct PullBuffer {
    data: Box<[u8]>,
    cursor: usize,
    limit: usize,
    eof: bool,
}

impl PullBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        PullBuffer {
            data: vec![0u8; capacity].into_boxed_slice(),
            cursor: 0,
            limit: 0,
            eof: false,
        }
    }

    pub fn available(&self) -> usize {
        self.limit - self.cursor
    }

    pub fn eof(&self) -> bool {
        self.eof
    }

    /// The unread window.
    pub fn unread(&self) -> &[u8] {
        &self.data[self.cursor..self.limit]
    }

    /// Mark `n` bytes of the unread window as consumed.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.cursor += n;
    }

    /// Shift any unread tail to the front and fill the free space from
    /// `read_more`. Honors the sticky EOF flag.
    pub fn refill(
        &mut self,
        read_more: &mut dyn FnMut(&mut [u8]) -> Result<Pull, DecodeError>,
    ) -> Result<Pull, DecodeError> {
        if self.eof {
            return Ok(Pull::Eof);
        }
        if self.cursor > 0 {
            self.data.copy_within(self.cursor..self.limit, 0);
            self.limit -= self.cursor;
            self.cursor = 0;
        }
        if self.limit == self.data.len() {
            // No free space; the caller must drain first.
            return Ok(Pull::Read(0));
        }
        match read_more(&mut self.data[self.limit..])? {
            Pull::Read(n) => {
                debug_assert!(self.limit + n <= self.data.len());
                self.limit += n;
                Ok(Pull::Read(n))
            }
            Pull::Eof => {
                self.eof = true;
                Ok(Pull::Eof)
            }
            Pull::WouldBlock => Ok(Pull::WouldBlock),
        }
    }
}

/// Chain root: reads up to a fixed number of raw bytes from the container
/// stream. The seek to the region start happens before the chain is built.
pub struct RegionRoot {
    remaining: u64,
}

impl RegionRoot {
    pub fn new(len: u64) -> Self {
        RegionRoot { remaining: len }
    }

    fn read(&mut self, src: &mut dyn Read, dest: &mut [u8]) -> Result<Pull, DecodeError> {
        if self.remaining == 0 || dest.is_empty() {
            return Ok(Pull::Eof);
        }
        let want = dest.len().min(self.remaining.min(usize::MAX as u64) as usize);
        let n = src.read(&mut dest[..want])?;
        if n == 0 {
            // Underlying stream ended before the region did. Downstream
            // decoders surface this as a truncation, not silent success.
            self.remaining = 0;
            return Ok(Pull::Eof);
        }
        self.remaining -= n as u64;
        Ok(Pull::Read(n))
    }
}

/// A decode stage: a [`Decoder`] plus its input window and stream state.
///
/// `read` is the symmetric filter loop: fill input from upstream when it
/// runs dry, drive the decoder with a flush flag once upstream EOF has been
/// seen, and stop when the destination is full, the decoder reports done,
/// or the upstream would block. The loop is guaranteed to make progress;
/// a decoder that refuses to advance is reported as `Stalled`.
pub struct CodecStage {
    codec: Box<dyn Decoder>,
    input: PullBuffer,
    upstream_eof: bool,
    done: bool,
}

impl CodecStage {
    pub fn new(codec: Box<dyn Decoder>) -> Self {
        CodecStage {
            codec,
            input: PullBuffer::with_capacity(DEFAULT_BUFFER_SIZE),
            upstream_eof: false,
            done: false,
        }
    }

    pub fn read(
        &mut self,
        fill: &mut dyn FnMut(&mut [u8]) -> Result<Pull, DecodeError>,
        dest: &mut [u8],
    ) -> Result<Pull, DecodeError> {
        if self.done {
            return Ok(Pull::Eof);
        }
        if dest.is_empty() {
            return Ok(Pull::Read(0));
        }

        let mut written = 0usize;
        let mut consumed = 0usize;
        let mut idle = 0u8;
        loop {
            let marker = (written, consumed, self.input.available(), self.upstream_eof);

            let flush = self.upstream_eof;
            if self.input.available() > 0 || flush {
                let status = self.codec.process(self.input.unread(), &mut dest[written..], flush)?;
                self.input.consume(status.bytes_consumed());
                consumed += status.bytes_consumed();
                written += status.bytes_produced();
                if status.is_done() {
                    self.done = true;
                    return Ok(if written > 0 { Pull::Read(written) } else { Pull::Eof });
                }
            }

            if written == dest.len() {
                return Ok(Pull::Read(written));
            }

            if !self.upstream_eof {
                match self.input.refill(fill)? {
                    Pull::Read(_) => {}
                    Pull::Eof => self.upstream_eof = true,
                    Pull::WouldBlock => {
                        if self.input.available() == 0 {
                            return Ok(if written > 0 {
                                Pull::Read(written)
                            } else {
                                Pull::WouldBlock
                            });
                        }
                    }
                }
            }

            if (written, consumed, self.input.available(), self.upstream_eof) == marker {
                idle += 1;
                if idle > 1 {
                    return Err(DecodeError::Stalled);
                }
            } else {
                idle = 0;
            }
        }
    }
}

/// One stage of a chain. Classification into root vs. transform happens
/// here, at build time, not per read.
pub enum Stage {
    Root(RegionRoot),
    Codec(CodecStage),
}

/// Ordered, owned sequence of stages presenting the last stage's output as
/// a single byte stream.
///
/// Stages live in a vector; the "previous stage" relation is the index
/// order, so there is no per-stage lifetime management. Dropping the chain
/// drops every stage regardless of how far decoding progressed.
#[derive(Default)]
pub struct FilterChain {
    stages: Vec<Stage>,
    total_read: u64,
}

impl FilterChain {
    pub fn new() -> Self {
        FilterChain::default()
    }

    pub fn push_root(&mut self, root: RegionRoot) {
        self.stages.push(Stage::Root(root));
    }

    pub fn push_codec(&mut self, codec: Box<dyn Decoder>) {
        self.stages.push(Stage::Codec(CodecStage::new(codec)));
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Cumulative bytes delivered to the caller. Used by the chunk reader
    /// for forward-skip calculations.
    pub fn total_read(&self) -> u64 {
        self.total_read
    }

    /// Pull decoded bytes from the final stage.
    pub fn read(&mut self, src: &mut dyn Read, dest: &mut [u8]) -> Result<Pull, DecodeError> {
        if self.stages.is_empty() || dest.is_empty() {
            return Ok(Pull::Read(0));
        }
        let pull = read_stage(src, &mut self.stages, dest)?;
        if let Pull::Read(n) = pull {
            self.total_read += n as u64;
        }
        Ok(pull)
    }

    /// Pull a single decoded byte; `None` at end of stream.
    pub fn read_byte(&mut self, src: &mut dyn Read) -> Result<Option<u8>, DecodeError> {
        let mut byte = [0u8; 1];
        match self.read(src, &mut byte)? {
            Pull::Read(0) | Pull::Eof => Ok(None),
            Pull::Read(_) => Ok(Some(byte[0])),
            Pull::WouldBlock => Err(DecodeError::Stalled),
        }
    }
}

fn read_stage(
    src: &mut dyn Read,
    stages: &mut [Stage],
    dest: &mut [u8],
) -> Result<Pull, DecodeError> {
    if stages.is_empty() {
        return Ok(Pull::Eof);
    }
    let (upstream, tail) = stages.split_at_mut(stages.len() - 1);
    match &mut tail[0] {
        Stage::Root(root) => root.read(src, dest),
        Stage::Codec(stage) => {
            let mut fill = |buf: &mut [u8]| read_stage(&mut *src, &mut *upstream, buf);
            stage.read(&mut fill, dest)
        }
    }
}
