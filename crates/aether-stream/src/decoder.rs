//! Line-oriented `data:` frame decoder.
//!
//! The decoder buffers raw bytes and only decodes text once a full line is
//! available. Line terminators are ASCII, so they can never appear inside a
//! multi-byte UTF-8 sequence; a character split across two chunks therefore
//! stays in the buffer until its line completes and is decoded exactly once.

use bytes::BytesMut;

const DATA_PREFIX: &[u8] = b"data:";

/// One `data:` line with its prefix removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub payload: String,
}

impl Frame {
    /// Wraps an already stripped payload.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

/// Splits a chunked byte stream into [`Frame`]s regardless of where the
/// transport cut the chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    // Bytes at the front of `buf` already known to contain no `\n`.
    scanned: usize,
}

impl FrameDecoder {
    /// Creates a decoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every frame completed by it, in order.
    ///
    /// Non-`data:` lines (blank separators, `:` comments, `event:` fields) are
    /// consumed and dropped. The unterminated tail stays buffered.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let line = self.buf.split_to(self.scanned + offset + 1);
            self.scanned = 0;
            if let Some(frame) = parse_line(strip_terminator(&line)) {
                frames.push(frame);
            }
        }
        self.scanned = self.buf.len();
        frames
    }

    /// Drains the unterminated tail at end of stream.
    ///
    /// Returns a frame only when the tail is a `data:` line; the buffer is
    /// empty afterwards either way.
    pub fn flush(&mut self) -> Option<Frame> {
        self.scanned = 0;
        if self.buf.is_empty() {
            return None;
        }
        let tail = self.buf.split();
        parse_line(strip_terminator(&tail))
    }

    /// Discards any buffered bytes.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }

    /// Number of bytes received but not yet resolved into a complete line.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn parse_line(line: &[u8]) -> Option<Frame> {
    let rest = line.strip_prefix(DATA_PREFIX)?;
    let rest = rest.strip_prefix(b" ").unwrap_or(rest);
    Some(Frame::new(String::from_utf8_lossy(rest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::sample::Index;

    fn payloads(frames: &[Frame]) -> Vec<&str> {
        frames.iter().map(|f| f.payload.as_str()).collect()
    }

    fn decode_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut out: Vec<String> = chunks
            .iter()
            .flat_map(|chunk| decoder.push(chunk))
            .map(|f| f.payload)
            .collect();
        out.extend(decoder.flush().map(|f| f.payload));
        out
    }

    #[test]
    fn frame_split_across_chunks_is_reassembled() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: hel").is_empty());
        assert_eq!(decoder.buffered_len(), 9);
        let frames = decoder.push(b"lo\n");
        assert_eq!(payloads(&frames), vec!["hello"]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn several_frames_in_one_chunk_come_out_in_order() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: a\n\ndata: b\n\ndata: [DONE]\n\n");
        assert_eq!(payloads(&frames), vec!["a", "b", "[DONE]"]);
    }

    #[test]
    fn empty_chunk_is_a_no_op() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: par");
        assert!(decoder.push(b"").is_empty());
        assert_eq!(decoder.buffered_len(), 9);
    }

    #[test]
    fn crlf_and_lf_terminators_are_both_accepted() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: one\r\n\r\ndata: two\n\n");
        assert_eq!(payloads(&frames), vec!["one", "two"]);
    }

    #[test]
    fn crlf_split_between_cr_and_lf() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: x\r").is_empty());
        assert_eq!(payloads(&decoder.push(b"\n")), vec!["x"]);
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b": keep-alive\nevent: message\nid: 7\ndata: kept\nretry: 10\n\n");
        assert_eq!(payloads(&frames), vec!["kept"]);
    }

    #[test]
    fn prefix_without_space_is_accepted_and_only_one_space_is_stripped() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data:tight\ndata:  padded\n");
        assert_eq!(payloads(&frames), vec!["tight", " padded"]);
    }

    #[test]
    fn multibyte_character_split_across_chunks_survives() {
        let bytes = "data: {\"content\":\"héllo 漢\"}\n".as_bytes();
        let cut = bytes
            .iter()
            .position(|b| *b == 0xC3)
            .expect("é lead byte present")
            + 1;
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(&bytes[..cut]).is_empty());
        let frames = decoder.push(&bytes[cut..]);
        assert_eq!(payloads(&frames), vec!["{\"content\":\"héllo 漢\"}"]);
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: a\xFFb\ndata: next\n");
        assert_eq!(payloads(&frames), vec!["a\u{FFFD}b", "next"]);
    }

    #[test]
    fn flush_recovers_unterminated_data_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: first\ndata: [DONE]").len() == 1);
        assert_eq!(decoder.flush(), Some(Frame::new("[DONE]")));
        assert_eq!(decoder.buffered_len(), 0);
        assert_eq!(decoder.flush(), None);
    }

    #[test]
    fn flush_drops_unterminated_non_data_tail() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"event: tail");
        assert_eq!(decoder.flush(), None);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn reset_discards_partial_line() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"data: stale");
        decoder.reset();
        assert_eq!(payloads(&decoder.push(b"data: fresh\n")), vec!["fresh"]);
    }

    #[test]
    fn long_line_delivered_byte_by_byte() {
        let wire = format!("data: {}\n", "x".repeat(4096));
        let chunks: Vec<&[u8]> = wire.as_bytes().chunks(1).collect();
        let frames = decode_all(&chunks);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 4096);
    }

    proptest! {
        #[test]
        fn frames_do_not_depend_on_chunk_boundaries(
            payloads in proptest::collection::vec("[a-zA-Z0-9 {}:\"é漢]{0,12}", 1..8),
            crlf in any::<bool>(),
            unterminated_tail in any::<bool>(),
            cuts in proptest::collection::vec(any::<Index>(), 0..6),
        ) {
            let terminator = if crlf { "\r\n" } else { "\n" };
            let mut wire = String::new();
            for (i, payload) in payloads.iter().enumerate() {
                wire.push_str("data: ");
                wire.push_str(payload);
                if !(unterminated_tail && i + 1 == payloads.len()) {
                    wire.push_str(terminator);
                    wire.push_str(terminator);
                }
            }
            let bytes = wire.as_bytes();

            let whole = decode_all(&[bytes]);
            prop_assert_eq!(&whole, &payloads);

            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(bytes.len() + 1)).collect();
            points.sort_unstable();
            points.dedup();
            let mut chunks: Vec<&[u8]> = Vec::new();
            let mut start = 0;
            for point in points {
                chunks.push(&bytes[start..point]);
                start = point;
            }
            chunks.push(&bytes[start..]);
            prop_assert_eq!(decode_all(&chunks), whole);
        }
    }
}
