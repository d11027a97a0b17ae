//! Line framing over raw input bytes.
//!
//! LF, CRLF and bare CR all end a record. A record that is still open when
//! the stream ends (no terminator at all, or a CR as the very last byte) is
//! discarded unless the reader is built with [`TrailingLine::Keep`]. Tools
//! that consumed the earlier output of this converter saw those records
//! silently dropped, so dropping stays the default.

use std::io::{self, BufRead, ErrorKind};

/// What to do with a record that has no usable terminator at end of stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingLine {
    #[default]
    Discard,
    Keep,
}

/// Stateful cursor that frames one input stream into byte records.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    trailing: TrailingLine,
    records: u64,
    done: bool,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_trailing(inner, TrailingLine::Discard)
    }

    pub fn with_trailing(inner: R, trailing: TrailingLine) -> Self {
        Self {
            inner,
            trailing,
            records: 0,
            done: false,
        }
    }

    /// Number of records returned so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Reads the next record into `buf`, replacing its contents.
    ///
    /// Returns `Ok(false)` at end of stream; `buf` then holds nothing unless
    /// the reader keeps trailing lines and one was pending, in which case it
    /// is returned once with `Ok(true)` before the final `Ok(false)`.
    /// Record bytes are passed through untouched; no encoding is assumed.
    pub fn read_line(&mut self, buf: &mut Vec<u8>) -> io::Result<bool> {
        buf.clear();
        if self.done {
            return Ok(false);
        }

        loop {
            let available = match self.inner.fill_buf() {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if available.is_empty() {
                return Ok(self.finish(buf));
            }

            match available.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(idx) => {
                    let terminator = available[idx];
                    buf.extend_from_slice(&available[..idx]);
                    self.inner.consume(idx + 1);

                    if terminator == b'\r' {
                        match self.peek_byte()? {
                            // CR as the last byte of the stream ends the run.
                            None => return Ok(self.finish(buf)),
                            Some(b'\n') => self.inner.consume(1),
                            Some(_) => {}
                        }
                    }
                    self.records += 1;
                    return Ok(true);
                }
                None => {
                    let len = available.len();
                    buf.extend_from_slice(available);
                    self.inner.consume(len);
                }
            }
        }
    }

    fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok(bytes) => return Ok(bytes.first().copied()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn finish(&mut self, buf: &mut Vec<u8>) -> bool {
        self.done = true;
        if buf.is_empty() {
            return false;
        }
        match self.trailing {
            TrailingLine::Discard => {
                tracing::debug!(
                    bytes = buf.len(),
                    "dropping unterminated record at end of input"
                );
                buf.clear();
                false
            }
            TrailingLine::Keep => {
                self.records += 1;
                true
            }
        }
    }
}
