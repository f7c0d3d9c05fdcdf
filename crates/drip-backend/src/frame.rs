//! Line framing for the worker byte stream.
//!
//! Bytes arrive in arbitrary chunks. The splitter keeps the unterminated
//! tail of the previous read and works on the concatenation, so a line or a
//! `\r\n` pair split across reads frames exactly like an unsplit one.
//!
//! There is no line-length bound: a stream that never sends a terminator
//! grows `partial` without limit.

/// Splits a chunked byte stream into text lines.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    /// Bytes after the last terminator seen.
    partial: Vec<u8>,
    /// The previous chunk ended on `\r`; a leading `\n` belongs to it.
    pending_cr: bool,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes, in order.
    ///
    /// Lines never contain `\r` or `\n`. Terminators are split on raw bytes
    /// before decoding, so a multi-byte character cut by a read boundary is
    /// reassembled intact.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        if self.pending_cr && !rest.is_empty() {
            self.pending_cr = false;
            if let Some(stripped) = rest.strip_prefix(b"\n") {
                rest = stripped;
            }
        }

        while let Some(pos) = rest.iter().position(|&b| b == b'\n' || b == b'\r') {
            self.partial.extend_from_slice(&rest[..pos]);
            lines.push(decode(std::mem::take(&mut self.partial)));

            let terminator = rest[pos];
            rest = &rest[pos + 1..];
            if terminator == b'\r' {
                match rest.first() {
                    Some(b'\n') => rest = &rest[1..],
                    Some(_) => {}
                    None => self.pending_cr = true,
                }
            }
        }

        self.partial.extend_from_slice(rest);
        lines
    }

    /// End of stream: hand back the final unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        self.pending_cr = false;
        if self.partial.is_empty() {
            None
        } else {
            Some(decode(std::mem::take(&mut self.partial)))
        }
    }
}

fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
