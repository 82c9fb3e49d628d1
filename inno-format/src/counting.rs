//! Counting reader wrapper for tracking container consumption.

use std::io::{Read, Result, Seek, SeekFrom};

/// A reader wrapper that counts bytes read and seeks issued through it.
///
/// The byte count is the monotonically increasing "source bytes consumed"
/// figure reported to hosts for progress display.
pub struct CountingReader<R> {
    inner: R,
    bytes_read: u64,
    seeks: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
            seeks: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn seeks(&self) -> u64 {
        self.seeks
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl<R: Seek> Seek for CountingReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.seeks += 1;
        self.inner.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn counts_reads_and_seeks() {
        let mut reader = CountingReader::new(Cursor::new(b"hello world".to_vec()));

        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(reader.bytes_read(), 5);
        assert_eq!(reader.seeks(), 0);

        reader.seek(SeekFrom::Start(6)).unwrap();
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"world");
        assert_eq!(reader.bytes_read(), 10);
        assert_eq!(reader.seeks(), 1);
    }
}
