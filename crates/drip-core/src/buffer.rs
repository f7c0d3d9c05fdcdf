//! Two-stage text accumulation.
//!
//! Deltas land in a cheap `incoming` list; the `committed` string only
//! grows on [`StreamBuffer::flush`]. Concatenation is paid once per flush
//! rather than once per delta, which keeps a long stream linear.

/// Incoming deltas plus the text committed so far.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    committed: String,
    incoming: Vec<String>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a delta. Returns true if this made the buffer go from empty
    /// to pending.
    pub fn append(&mut self, delta: impl Into<String>) -> bool {
        let was_empty = self.incoming.is_empty();
        self.incoming.push(delta.into());
        was_empty
    }

    pub fn has_pending(&self) -> bool {
        !self.incoming.is_empty()
    }

    /// Commit everything pending, in order, and return the full committed text.
    pub fn flush(&mut self) -> &str {
        let extra: usize = self.incoming.iter().map(String::len).sum();
        self.committed.reserve(extra);
        for delta in self.incoming.drain(..) {
            self.committed.push_str(&delta);
        }
        &self.committed
    }

    /// Drop everything, pending or committed.
    pub fn clear(&mut self) {
        self.committed = String::new();
        self.incoming = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_reports_first_pending() {
        let mut buffer = StreamBuffer::new();
        assert!(buffer.append("a"));
        assert!(!buffer.append("b"));
        assert!(buffer.has_pending());
    }

    #[test]
    fn flush_commits_in_order() {
        let mut buffer = StreamBuffer::new();
        buffer.append("Hel");
        buffer.append("lo");
        assert_eq!(buffer.flush(), "Hello");
        assert!(!buffer.has_pending());

        buffer.append(", world");
        assert!(buffer.has_pending());
        assert_eq!(buffer.flush(), "Hello, world");
    }

    #[test]
    fn flush_with_nothing_pending_is_stable() {
        let mut buffer = StreamBuffer::new();
        buffer.append("x");
        buffer.flush();
        assert_eq!(buffer.flush(), "x");
        assert_eq!(buffer.flush(), "x");
    }

    #[test]
    fn append_after_flush_rearms() {
        let mut buffer = StreamBuffer::new();
        buffer.append("x");
        buffer.flush();
        assert!(buffer.append("y"));
    }

    #[test]
    fn empty_delta_is_still_pending() {
        let mut buffer = StreamBuffer::new();
        assert!(!buffer.has_pending());
        buffer.append("");
        assert!(buffer.has_pending());
    }

    #[test]
    fn clear_drops_everything() {
        let mut buffer = StreamBuffer::new();
        buffer.append("a");
        buffer.flush();
        buffer.append("b");
        buffer.clear();
        assert!(!buffer.has_pending());
        assert_eq!(buffer.flush(), "");
    }
}
