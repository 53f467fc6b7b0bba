//! Newline-delimited framing for the server's stdout byte stream.

/// Accumulates raw bytes and yields complete lines.
///
/// Reads from a pipe can end anywhere, including mid-line or mid-codepoint,
/// so bytes are held until a `\n` arrives.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completed, without terminators.
    ///
    /// Blank lines are dropped; a trailing `\r` is stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if let Some(line) = decode_line(&self.buf[start..end]) {
                lines.push(line);
            }
            start = end + 1;
        }
        self.buf.drain(..start);
        lines
    }

    /// Bytes received after the last newline.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Flush whatever is buffered as a final line (used at end of stream).
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = String::from_utf8_lossy(raw);
    let trimmed = line.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
