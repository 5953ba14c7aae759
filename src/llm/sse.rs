//! Incremental parser for the `data:`-framed event stream returned by the
//! completions endpoint when `"stream": true` is set.
//!
//! HTTP chunks arrive at arbitrary byte boundaries, so the parser buffers
//! partial lines across [`SseFrameParser::push`] calls. Frames are
//! delimited by blank lines; multiple `data:` lines within one frame are
//! joined with `\n` per the SSE framing rules. Comment lines (leading
//! `:`) and field names other than `data` are ignored, which is all the
//! completions stream ever sends.

/// One complete `data:` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub data: String,
}

impl SseFrame {
    /// Terminal sentinel frame sent after the last completion chunk.
    pub const DONE_SENTINEL: &'static str = "[DONE]";

    /// Whether this frame is the end-of-stream sentinel.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data.trim() == Self::DONE_SENTINEL
    }
}

/// Streaming frame parser fed with raw response bytes.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    line_buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseFrameParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes; returns the frames completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                let mut line = std::mem::take(&mut self.line_buffer);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if let Some(frame) = self.process_line(&line) {
                    frames.push(frame);
                }
            } else {
                self.line_buffer.push(byte);
            }
        }
        frames
    }

    /// Emit any frame still buffered when the stream ends without a
    /// trailing blank line.
    pub fn flush(&mut self) -> Option<SseFrame> {
        if self.line_buffer.is_empty() {
            return self.take_frame();
        }
        let mut line = std::mem::take(&mut self.line_buffer);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        self.process_line(&line).or_else(|| self.take_frame())
    }

    fn process_line(&mut self, line: &[u8]) -> Option<SseFrame> {
        if line.is_empty() {
            // Blank line terminates the current frame.
            return self.take_frame();
        }
        let text = String::from_utf8_lossy(line);
        if let Some(value) = text.strip_prefix("data:") {
            // Exactly one leading space belongs to the framing, not the payload.
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.data_lines.push(value.to_owned());
        }
        // Comments (leading ':') and other field names fall through.
        None
    }

    fn take_frame(&mut self) -> Option<SseFrame> {
        if self.data_lines.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data_lines).join("\n");
        Some(SseFrame { data })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn parses_a_single_frame() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push(b"data: {\"x\":1}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"x\":1}");
    }

    #[test]
    fn reassembles_frames_split_across_chunks() {
        let mut parser = SseFrameParser::new();
        assert!(parser.push(b"da").is_empty());
        assert!(parser.push(b"ta: hel").is_empty());
        assert!(parser.push(b"lo\n").is_empty());
        let frames = parser.push(b"\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "hello");
    }

    #[test]
    fn parses_multiple_frames_in_one_chunk() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push(b"data: one\n\ndata: two\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "one");
        assert_eq!(frames[1].data, "two");
    }

    #[test]
    fn strips_carriage_returns() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push(b"data: crlf\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "crlf");
    }

    #[test]
    fn strips_exactly_one_leading_space() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push(b"data:  padded\n\n");
        assert_eq!(frames[0].data, " padded");

        let frames = parser.push(b"data:tight\n\n");
        assert_eq!(frames[0].data, "tight");
    }

    #[test]
    fn joins_multi_line_data_fields() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push(b"data: first\ndata: second\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "first\nsecond");
    }

    #[test]
    fn ignores_comments_and_unknown_fields() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push(b": keep-alive\nevent: message\ndata: payload\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "payload");
    }

    #[test]
    fn recognizes_the_done_sentinel() {
        let mut parser = SseFrameParser::new();
        let frames = parser.push(b"data: [DONE]\n\n");
        assert!(frames[0].is_done());

        let frame = SseFrame {
            data: "{\"x\":1}".to_owned(),
        };
        assert!(!frame.is_done());
    }

    #[test]
    fn flush_emits_the_unterminated_tail() {
        let mut parser = SseFrameParser::new();
        assert!(parser.push(b"data: tail").is_empty());
        let frame = parser.flush().unwrap();
        assert_eq!(frame.data, "tail");
        assert!(parser.flush().is_none());
    }
}
