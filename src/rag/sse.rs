// ABOUTME: Shared SSE line-buffering parser for streaming backend responses
// ABOUTME: Handles partial lines across TCP boundaries and multiple events per chunk
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # SSE stream parsing
//!
//! A line-buffering parser for Server-Sent Events shared by the streaming
//! backend and the chat client. Solves two correctness issues:
//!
//! 1. **Multiple events per TCP chunk**: when network buffers batch several
//!    SSE events into one `bytes_stream()` chunk, all of them are emitted.
//! 2. **Partial payloads across TCP boundaries**: when a payload is split
//!    across two chunks, the buffer accumulates until a full line arrives.
//!
//! The caller supplies a `parse_data` closure that turns a raw `data:`
//! payload into an answer fragment; the framing (line buffering, prefix
//! stripping, `[DONE]` detection) lives here once.

use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::unfold;
use futures_util::{future, Stream, StreamExt};

use super::AnswerStream;
use crate::errors::{AppError, AppResult};

/// A parsed SSE event from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload with the prefix stripped
    Data(String),
    /// The `[DONE]` termination signal
    Done,
}

/// Line-buffering SSE parser.
///
/// SSE streams are newline-delimited and TCP does not guarantee alignment
/// between network chunks and event boundaries. Incomplete lines stay
/// buffered; complete events are emitted only once a full line is available.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    /// Create a new empty line buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes from a TCP chunk, returning any complete SSE events.
    ///
    /// Bytes are appended to the internal buffer; complete lines are parsed
    /// and returned, any trailing partial line stays buffered for the next
    /// `feed()` call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        let text = String::from_utf8_lossy(bytes);
        self.buffer.push_str(&text);

        let mut events = Vec::new();

        while let Some(newline_pos) = self.buffer.find('\n') {
            let line = self.buffer[..newline_pos].trim_end_matches('\r').to_owned();
            self.buffer = self.buffer[newline_pos + 1..].to_owned();

            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush any remaining buffered content as a final event.
    ///
    /// Called when the byte stream ends with a partial line (no trailing
    /// newline) still in the buffer.
    pub fn flush(&mut self) -> Vec<SseEvent> {
        let remaining = mem::take(&mut self.buffer);
        parse_line(&remaining).into_iter().collect()
    }
}

fn parse_line(line: &str) -> Option<SseEvent> {
    let trimmed = line.trim();

    // Empty lines are event separators
    if trimmed.is_empty() {
        return None;
    }

    if trimmed == "data: [DONE]" {
        return Some(SseEvent::Done);
    }

    if let Some(data) = trimmed.strip_prefix("data: ") {
        if !data.trim().is_empty() {
            return Some(SseEvent::Data(data.to_owned()));
        }
    }

    // Non-data SSE fields (event:, id:, retry:, comments) are ignored
    None
}

/// Wrap a raw byte stream with SSE line buffering and fragment parsing.
///
/// `parse_data` converts a `data:` payload into an answer fragment;
/// returning `None` skips events that carry no output (empty deltas,
/// metadata-only chunks). `[DONE]` ends the stream.
pub fn create_sse_stream<S, F>(
    byte_stream: S,
    parse_data: F,
    service_name: &'static str,
) -> AnswerStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
    F: Fn(&str) -> Option<AppResult<String>> + Send + 'static,
{
    let state = SseStreamState {
        parser: SseLineBuffer::new(),
        pending: VecDeque::new(),
        stream_ended: false,
    };

    // unfold keeps parser state across async iterations; each iteration
    // either drains a pending event or reads the next TCP chunk.
    let stream = unfold(
        (
            Box::pin(byte_stream)
                as Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
            state,
            parse_data,
            service_name,
        ),
        |(mut byte_stream, mut state, parse_data, service_name)| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, (byte_stream, state, parse_data, service_name)));
                }

                if state.stream_ended {
                    return None;
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        for event in state.parser.feed(&bytes) {
                            match event {
                                SseEvent::Data(payload) => {
                                    if let Some(result) = parse_data(&payload) {
                                        state.pending.push_back(result);
                                    }
                                }
                                SseEvent::Done => {
                                    state.stream_ended = true;
                                }
                            }
                        }
                        // Loop to drain pending events
                    }
                    Some(Err(e)) => {
                        state.stream_ended = true;
                        return Some((
                            Err(AppError::external_service(
                                service_name,
                                format!("Stream read error: {e}"),
                            )),
                            (byte_stream, state, parse_data, service_name),
                        ));
                    }
                    None => {
                        state.stream_ended = true;
                        for event in state.parser.flush() {
                            if let SseEvent::Data(payload) = event {
                                if let Some(result) = parse_data(&payload) {
                                    state.pending.push_back(result);
                                }
                            }
                        }
                        if let Some(item) = state.pending.pop_front() {
                            return Some((item, (byte_stream, state, parse_data, service_name)));
                        }
                        return None;
                    }
                }
            }
        },
    );

    // Drop empty fragments
    let filtered = stream.filter(|result| {
        future::ready(result.as_ref().map_or(true, |fragment| !fragment.is_empty()))
    });

    Box::pin(filtered)
}

struct SseStreamState {
    parser: SseLineBuffer,
    pending: VecDeque<AppResult<String>>,
    stream_ended: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(
            events,
            vec![
                SseEvent::Data("{\"a\":1}".to_owned()),
                SseEvent::Data("{\"b\":2}".to_owned()),
            ]
        );
    }

    #[test]
    fn test_partial_line_across_chunks() {
        let mut parser = SseLineBuffer::new();
        let first = parser.feed(b"data: {\"content\":\"hel");
        assert!(first.is_empty());

        let second = parser.feed(b"lo\"}\n");
        assert_eq!(
            second,
            vec![SseEvent::Data("{\"content\":\"hello\"}".to_owned())]
        );
    }

    #[test]
    fn test_done_marker() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"data: {\"content\":\"x\"}\n\ndata: [DONE]\n\n");
        assert_eq!(
            events,
            vec![SseEvent::Data("{\"content\":\"x\"}".to_owned()), SseEvent::Done]
        );
    }

    #[test]
    fn test_crlf_lines() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"data: {\"a\":1}\r\n\r\n");
        assert_eq!(events, vec![SseEvent::Data("{\"a\":1}".to_owned())]);
    }

    #[test]
    fn test_flush_partial_event() {
        let mut parser = SseLineBuffer::new();
        assert!(parser.feed(b"data: {\"tail\":true}").is_empty());
        assert_eq!(
            parser.flush(),
            vec![SseEvent::Data("{\"tail\":true}".to_owned())]
        );
        // Buffer is consumed
        assert!(parser.flush().is_empty());
    }

    #[test]
    fn test_non_data_fields_ignored() {
        let mut parser = SseLineBuffer::new();
        let events = parser.feed(b"event: ping\nid: 7\n: comment\nretry: 100\n");
        assert!(events.is_empty());
    }
}
