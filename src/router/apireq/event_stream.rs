//! This module decodes the event stream produced by the router's chat completion
//! endpoint. The body is a sequence of newline-delimited lines, each of which is
//! either blank, a `data: <json>` frame or the `data: [DONE]` sentinel. Bytes are
//! fed in as they arrive from the network; a frame may be split across any number
//! of reads and a single read may carry many frames, so incomplete lines are
//! carried over until their terminating newline shows up.

use serde::Deserialize;
use thiserror::Error;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// A decoded unit from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StreamEvent {
    /// A non-empty piece of the assistant's reply.
    Delta(String),
    /// The `[DONE]` sentinel.
    Done,
    /// A `data:` frame whose payload could not be parsed. Partial frames are
    /// expected on this transport, so this is never fatal.
    Malformed { payload: String, reason: String },
}

#[derive(Error, Debug)]
pub(crate) enum DecodeError {
    #[error("the response overflowed the {0} byte streaming buffer, this could indicate a malicious server")]
    BufferExceeded(usize),
}

/* Structures to deserialize chat.completion.chunk frames. Only the path
 * choices[0].delta.content is of interest. */

#[derive(Deserialize, Debug)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Deserialize, Debug)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug)]
pub(crate) struct EventDecoder {
    buf: Vec<u8>,
    max_size: usize,
}

impl Default for EventDecoder {
    fn default() -> Self {
        EventDecoder::new()
    }
}

impl EventDecoder {
    pub(crate) fn new() -> EventDecoder {
        Self::with_max_size(1 << 24) // 16 MiB
    }

    pub(crate) fn with_max_size(max_size: usize) -> EventDecoder {
        EventDecoder {
            buf: Vec::with_capacity(1 << 10),
            max_size,
        }
    }

    /// Number of bytes waiting for the end of their line.
    pub(crate) fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Appends a chunk of the body and decodes every line it completes.
    ///
    /// A `[DONE]` sentinel ends processing of the chunk: it is returned as the
    /// last event and whatever followed it in the buffer is dropped.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>, DecodeError> {
        if self.buf.len() + chunk.len() > self.max_size {
            return Err(DecodeError::BufferExceeded(self.max_size));
        }

        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;

        while let Some(offset) = self.buf[consumed..].iter().position(|b| *b == b'\n') {
            let event = decode_line(&self.buf[consumed..consumed + offset]);

            consumed += offset + 1;

            match event {
                Some(StreamEvent::Done) => {
                    self.buf.clear();
                    events.push(StreamEvent::Done);

                    return Ok(events);
                }
                Some(event) => events.push(event),
                None => {}
            }
        }

        self.buf.drain(..consumed);

        Ok(events)
    }

    /// Decodes the unterminated line left over once the body has ended.
    pub(crate) fn finish(&mut self) -> Option<StreamEvent> {
        let rest = std::mem::take(&mut self.buf);

        decode_line(&rest)
    }
}

/// Decodes a single line (without its newline). Lines which are not data
/// frames, and frames which carry no content, produce nothing.
fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let line = String::from_utf8_lossy(line);

    let payload = line.trim().strip_prefix(DATA_PREFIX)?;

    if payload == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }

    match serde_json::from_str::<CompletionChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map(StreamEvent::Delta),
        Err(err) => Some(StreamEvent::Malformed {
            payload: payload.to_string(),
            reason: err.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_STREAM: &'static str = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
        "\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
        "\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
        "\n",
        "data: [DONE]\n",
        "\n",
    );

    fn decode_in_chunks(stream: &str, chunk_size: usize) -> Vec<StreamEvent> {
        let mut decoder = EventDecoder::new();
        let mut events = Vec::new();

        for chunk in stream.as_bytes().chunks(chunk_size) {
            events.extend(decoder.feed(chunk).expect("should decode"));
        }

        events.extend(decoder.finish());

        events
    }

    #[test]
    fn test_chunking() {
        for chunk_size in 1..=HELLO_STREAM.len() {
            let events = decode_in_chunks(HELLO_STREAM, chunk_size);

            assert_eq!(
                events,
                vec![
                    StreamEvent::Delta("Hel".to_string()),
                    StreamEvent::Delta("lo".to_string()),
                    StreamEvent::Done,
                ],
                "chunk size {}",
                chunk_size
            );
        }
    }

    #[test]
    fn test_multibyte_split() {
        let stream = "data: {\"choices\":[{\"delta\":{\"content\":\"h\u{e9}\u{1f600}\"}}]}\n";

        for chunk_size in 1..=stream.len() {
            let events = decode_in_chunks(stream, chunk_size);

            assert_eq!(events, vec![StreamEvent::Delta("h\u{e9}\u{1f600}".to_string())]);
        }
    }

    #[test]
    fn test_ignored_lines() {
        let stream = concat!(
            ": keep-alive\n",
            "event: message\n",
            "data:{\"choices\":[{\"delta\":{\"content\":\"no space\"}}]}\n",
            "data: {\"choices\":[]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":null},\"finish_reason\":\"stop\"}]}\n",
            "   data: {\"choices\":[{\"delta\":{\"content\":\"kept\"}}]}  \r\n",
        );

        let events = decode_in_chunks(stream, stream.len());

        assert_eq!(events, vec![StreamEvent::Delta("kept".to_string())]);
    }

    #[test]
    fn test_malformed_frame() {
        let stream = concat!(
            "data: {not json\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n",
        );

        let events = decode_in_chunks(stream, 7);

        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            StreamEvent::Malformed { payload, .. } if payload == "{not json"
        ));
        assert_eq!(events[1], StreamEvent::Delta("ok".to_string()));
    }

    #[test]
    fn test_done_ends_chunk() {
        let mut decoder = EventDecoder::new();

        let events = decoder
            .feed(b"data: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"lost\"}}]}\ndata: {\"ch")
            .unwrap();

        assert_eq!(events, vec![StreamEvent::Done]);
        assert_eq!(decoder.pending(), 0);

        // Later reads are decoded as usual
        let events = decoder
            .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n")
            .unwrap();

        assert_eq!(events, vec![StreamEvent::Delta("late".to_string())]);
    }

    #[test]
    fn test_finish_flushes_trailing_line() {
        let mut decoder = EventDecoder::new();

        let events = decoder
            .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(decoder.finish(), Some(StreamEvent::Delta("tail".to_string())));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_buffer_exceeded() {
        let mut decoder = EventDecoder::with_max_size(16);

        assert!(decoder.feed(b"data: 0123456\n").is_ok());
        assert!(matches!(
            decoder.feed(b"data: 0123456789abcdef"),
            Err(DecodeError::BufferExceeded(16))
        ));
    }
}
