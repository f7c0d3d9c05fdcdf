//! Bytes in, events out: the splitter and the parser chained together.

use drip_protocol::ParsedEvent;

use crate::frame::FrameSplitter;
use crate::parser::EventParser;

/// Decodes a chunked worker stream into events, in arrival order.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    splitter: FrameSplitter,
    parser: EventParser,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read's worth of bytes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ParsedEvent> {
        let lines = self.splitter.push(chunk);
        lines
            .iter()
            .filter_map(|line| self.parser.parse_line(line))
            .collect()
    }

    /// End of stream: decode the unterminated tail, if any.
    pub fn finish(&mut self) -> Option<ParsedEvent> {
        let line = self.splitter.finish()?;
        self.parser.parse_line(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = concat!(
        ": connected\n",
        "event: delta\r\n",
        "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"thinking\"}}]}\r\n",
        "\r\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"lo ✓\"}]}}]}\r",
        "stray words\n",
        "{\"error\":{\"message\":\"soft\"}}\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
        "data: [DONE]\n",
        "@@non-200@@HTTP/1.1 502\n",
        "Bad gateway\n",
        "tail"
    );

    fn decode_chunks(chunks: &[&[u8]]) -> Vec<ParsedEvent> {
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(decoder.push(chunk));
        }
        events.extend(decoder.finish());
        events
    }

    #[test]
    fn decodes_mixed_stream() {
        let events = decode_chunks(&[STREAM.as_bytes()]);
        assert_eq!(
            events,
            vec![
                ParsedEvent::ReasoningDelta("thinking".to_string()),
                ParsedEvent::ContentDelta("Hel".to_string()),
                ParsedEvent::ContentDelta("lo ✓".to_string()),
                ParsedEvent::Unrecognized("stray words".to_string()),
                ParsedEvent::ErrorPayload("soft".to_string()),
                ParsedEvent::ContentDelta("\n".to_string()),
                ParsedEvent::StreamDone,
                ParsedEvent::ProtocolError("HTTP/1.1 502".to_string()),
                ParsedEvent::ProtocolError("Bad gateway".to_string()),
                ParsedEvent::ProtocolError("tail".to_string()),
            ]
        );
    }

    #[test]
    fn chunking_never_changes_events() {
        let bytes = STREAM.as_bytes();
        let expected = decode_chunks(&[bytes]);

        for i in 0..=bytes.len() {
            assert_eq!(
                decode_chunks(&[&bytes[..i], &bytes[i..]]),
                expected,
                "split at {i}"
            );
        }

        for size in [1, 2, 3, 7, 13] {
            let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
            assert_eq!(decode_chunks(&chunks), expected, "chunks of {size}");
        }
    }

    #[test]
    fn scenario_hello() {
        let stream = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: [DONE]\n",
        );
        let text: String = decode_chunks(&[stream.as_bytes()])
            .into_iter()
            .filter_map(|e| match e {
                ParsedEvent::ContentDelta(t) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Hello");
    }
}
