//! Line framing over an arbitrarily chunked byte stream.

use bytes::BytesMut;

use crate::error::DifyError;

/// Longest partial line held while waiting for its terminator (4 MiB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Splits raw response bytes into complete lines.
///
/// Bytes after the last `\n` of a chunk stay pending and are prepended to the
/// next chunk. Lines are decoded only once complete, so a multi-byte UTF-8
/// sequence split across chunks decodes the same as one delivered whole.
#[derive(Debug)]
pub struct FrameBuffer {
    pending: BytesMut,
    max_line: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self {
            pending: BytesMut::new(),
            max_line: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl FrameBuffer {
    /// Create an empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit how many bytes may arrive without a line break
    #[must_use]
    pub const fn with_max_line(mut self, bytes: usize) -> Self {
        self.max_line = bytes;
        self
    }

    /// Push a chunk of bytes and return every line it completes
    ///
    /// Returned lines exclude the terminating `\n` and any trailing `\r`.
    ///
    /// # Errors
    ///
    /// Returns [`DifyError::LineTooLong`] once the unterminated tail exceeds
    /// the line limit. The pending bytes are dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, DifyError> {
        // Only the new bytes can contain a terminator we have not seen yet.
        let Some(last_newline) = chunk.iter().rposition(|b| *b == b'\n') else {
            self.hold(chunk)?;
            return Ok(Vec::new());
        };

        self.pending.extend_from_slice(&chunk[..=last_newline]);
        let complete = self.pending.split();
        self.hold(&chunk[last_newline + 1..])?;

        Ok(complete[..complete.len() - 1]
            .split(|b| *b == b'\n')
            .map(decode_line)
            .collect())
    }

    /// Drain the unterminated tail at end of stream
    ///
    /// Returns `None` when nothing is pending.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let tail = self.pending.split();
        Some(decode_line(&tail))
    }

    /// Number of bytes waiting for a terminator
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn hold(&mut self, bytes: &[u8]) -> Result<(), DifyError> {
        if self.pending.len() + bytes.len() > self.max_line {
            self.pending.clear();
            return Err(DifyError::LineTooLong {
                limit: self.max_line,
            });
        }
        self.pending.extend_from_slice(bytes);
        Ok(())
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}
