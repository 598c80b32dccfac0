// RvDiff - RISC-V Core Differential Testing
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use std::io::{self, Write};

/// Writes at most `max_bytes` to `inner` and counts what it had to drop.
///
/// Emulator logs of runaway programs can grow without bound; past the cap the
/// remaining bytes are accepted and discarded so the caller never sees an error.
pub struct SizeLimitedWriter<W: Write> {
    inner: W,
    bytes_written: u64,
    bytes_dropped: u64,
    max_bytes: u64,
}

impl<W: Write> SizeLimitedWriter<W> {
    pub fn new(inner: W, max_bytes: u64) -> Self {
        Self {
            inner,
            bytes_written: 0,
            bytes_dropped: 0,
            max_bytes,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn bytes_dropped(&self) -> u64 {
        self.bytes_dropped
    }

    pub fn limit_exceeded(&self) -> bool {
        self.bytes_dropped > 0
    }
}

impl<W: Write> Write for SizeLimitedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining = self.max_bytes.saturating_sub(self.bytes_written);
        let to_write = buf.len().min(remaining as usize);
        if to_write == 0 {
            self.bytes_dropped += buf.len() as u64;
            return Ok(buf.len());
        }

        let written = self.inner.write(&buf[..to_write])?;
        self.bytes_written += written as u64;
        if written == to_write && to_write < buf.len() {
            // Report the tail as consumed so write_all does not retry it.
            self.bytes_dropped += (buf.len() - to_write) as u64;
            return Ok(buf.len());
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_limit() {
        let mut buf = Vec::new();
        let mut writer = SizeLimitedWriter::new(&mut buf, 100);
        writer.write_all(b"Hello").unwrap();
        assert_eq!(writer.bytes_written(), 5);
        assert!(!writer.limit_exceeded());
        assert_eq!(buf, b"Hello");
    }

    #[test]
    fn test_exact_limit_then_drop() {
        let mut buf = Vec::new();
        let mut writer = SizeLimitedWriter::new(&mut buf, 5);
        writer.write_all(b"Hello").unwrap();
        assert!(!writer.limit_exceeded());

        writer.write_all(b" World").unwrap();
        assert_eq!(writer.bytes_written(), 5);
        assert_eq!(writer.bytes_dropped(), 6);
        assert_eq!(buf, b"Hello");
    }

    #[test]
    fn test_binary_dump_is_cut_mid_buffer() {
        let mut buf = Vec::new();
        let mut writer = SizeLimitedWriter::new(&mut buf, 10);
        writer.write_all(&[0xAB; 16]).unwrap();
        assert_eq!(writer.bytes_written(), 10);
        assert_eq!(writer.bytes_dropped(), 6);
        assert_eq!(buf.len(), 10);
    }
}
