//! Line framing for the incoming byte stream.
//!
//! The server delivers bytes in arbitrary-sized chunks; a chunk may hold
//! several complete lines, a fragment of one, or both. [`LineFramer`]
//! appends each chunk to an internal buffer, emits every complete line in
//! arrival order, and retains any trailing fragment for the next chunk.
//!
//! Remote closure (an empty read) and idle timeouts are signalled at the
//! read layer via [`ReadOutcome`]; the framer itself only ever sees data.

use bytes::BytesMut;
use chrono::{DateTime, Utc};

/// One complete protocol line with its arrival timestamp.
///
/// The line terminator (`\n`, plus an optional preceding `\r`) has been
/// stripped. Consumed exactly once by the classification layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    /// Line text without the terminator. Invalid UTF-8 bytes are replaced
    /// rather than rejected; the parser copes downstream.
    pub text: String,
    /// When the chunk containing the end of this line was read.
    pub at: DateTime<Utc>,
}

/// Result of one bounded read against the socket.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Data arrived; every complete line framed from it, in order.
    /// May be empty when the chunk held only a fragment.
    Lines(Vec<RawLine>),
    /// The read timed out with no data. Not a connection loss.
    Idle,
    /// The remote closed the stream (empty read). Fatal to the session.
    Closed,
}

/// Splits an unbounded byte stream into discrete protocol lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: BytesMut,
}

impl LineFramer {
    /// Create a framer with an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    /// Append a chunk and drain every complete line it unlocked.
    ///
    /// Lines are emitted in arrival order; a trailing partial line stays
    /// buffered until a later chunk completes it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawLine> {
        self.buf.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let at = Utc::now();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line = self.buf.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            lines.push(RawLine {
                text: String::from_utf8_lossy(&line).into_owned(),
                at,
            });
        }
        // split_to leaves the head capacity behind; reclaim it so a
        // long-lived fragment does not pin the whole chunk history.
        if self.buf.capacity() - self.buf.len() > 65536 {
            let pending = self.buf.split();
            self.buf = BytesMut::from(&pending[..]);
        }
        lines
    }

    /// Number of buffered bytes belonging to an incomplete line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[RawLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_single_complete_line() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"PING :tmi.twitch.tv\r\n");
        assert_eq!(texts(&lines), vec!["PING :tmi.twitch.tv"]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_partial_line_retained() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b"PING :tmi.twi").is_empty());
        assert_eq!(framer.pending(), 13);

        let lines = framer.feed(b"tch.tv\r\n");
        assert_eq!(texts(&lines), vec!["PING :tmi.twitch.tv"]);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_chunk() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"first\r\nsecond\r\nthird\r\npartial");
        assert_eq!(texts(&lines), vec!["first", "second", "third"]);
        assert_eq!(framer.pending(), 7);
    }

    #[test]
    fn test_terminator_split_across_chunks() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b"line\r").is_empty());
        let lines = framer.feed(b"\n");
        assert_eq!(texts(&lines), vec!["line"]);
    }

    #[test]
    fn test_bare_lf_accepted() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"no-cr\n");
        assert_eq!(texts(&lines), vec!["no-cr"]);
    }

    #[test]
    fn test_empty_line_emitted() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"\r\n");
        assert_eq!(texts(&lines), vec![""]);
    }

    #[test]
    fn test_invalid_utf8_replaced_not_dropped() {
        let mut framer = LineFramer::new();
        let lines = framer.feed(b"abc\xff\xfedef\r\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].text.starts_with("abc"));
        assert!(lines[0].text.ends_with("def"));
    }

}
