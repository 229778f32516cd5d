//! Incremental server-sent-event decoding.
//!
//! [`SseDecoder`] turns raw body chunks into [`PartialResponse`]s following
//! the OpenAI-compatible framing: newline-terminated `data: <json>` lines and
//! a final `data: [DONE]` sentinel. [`PartialResponseStream`] drives the
//! decoder from a transport [`ByteStream`] as a pull-based [`Stream`].

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use futures::stream::FusedStream;

use super::ProviderError;
use super::openai_compat::types::{SSE_DONE_MARKER, StreamChunk};
use crate::content::GenerateContentResponse;
use crate::transport::ByteStream;

/// Prefix of an SSE data line.
const SSE_DATA_PREFIX: &str = "data: ";

/// One decoded text fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialResponse {
    /// Incremental text. Never empty.
    pub text_delta: String,
    /// Finish reason carried by the same frame, if any.
    pub finish_reason: Option<String>,
}

impl From<PartialResponse> for GenerateContentResponse {
    fn from(partial: PartialResponse) -> Self {
        GenerateContentResponse::from_text(partial.text_delta, partial.finish_reason)
    }
}

/// A `data:` line that could not be parsed.
///
/// Never fatal: the decoder logs it and moves on to the next line.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload after `data: ` is not a valid chunk.
    #[error("malformed SSE frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// What a single complete line contributes to the output.
#[derive(Debug, PartialEq, Eq)]
enum Line {
    /// Nothing to emit.
    Skip,
    /// A non-empty text fragment.
    Emit(PartialResponse),
    /// The `[DONE]` sentinel.
    Done,
}

/// Outcome of feeding one chunk to the decoder.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Decoded {
    /// Fragments found in this chunk, in wire order.
    pub responses: Vec<PartialResponse>,
    /// Whether the `[DONE]` sentinel was reached. Bytes after it are ignored.
    pub done: bool,
}

/// Incremental UTF-8 decoder.
///
/// Holds back the trailing bytes of a multi-byte sequence that was cut at a
/// chunk boundary. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        out
    }
}

/// Line-buffered SSE decoder for a single stream.
///
/// Each stream owns its own decoder; nothing is shared between streams.
#[derive(Debug, Default)]
pub struct SseDecoder {
    utf8: Utf8Decoder,
    buffer: String,
    done: bool,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk of body bytes.
    ///
    /// Complete lines are processed immediately; a trailing partial line is
    /// kept until the next chunk. Once the sentinel is seen, this and every
    /// later call return nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use relay_core::provider::SseDecoder;
    ///
    /// let mut decoder = SseDecoder::new();
    /// let first = decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"H");
    /// assert!(first.responses.is_empty());
    ///
    /// let second = decoder.feed(b"i\"}}]}\ndata: [DONE]\n");
    /// assert_eq!(second.responses[0].text_delta, "Hi");
    /// assert!(second.done);
    /// ```
    pub fn feed(&mut self, bytes: &[u8]) -> Decoded {
        let mut decoded = Decoded::default();
        if self.done {
            decoded.done = true;
            return decoded;
        }

        self.buffer.push_str(&self.utf8.decode(bytes));

        let Some(last_newline) = self.buffer.rfind('\n') else {
            return decoded;
        };
        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        for line in complete.split('\n') {
            match parse_line(line) {
                Ok(Line::Skip) => {}
                Ok(Line::Emit(partial)) => decoded.responses.push(partial),
                Ok(Line::Done) => {
                    self.done = true;
                    self.buffer.clear();
                    decoded.done = true;
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "streaming: skipping SSE frame");
                }
            }
        }

        decoded
    }
}

/// Classify one complete line.
fn parse_line(line: &str) -> Result<Line, FrameError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Line::Skip);
    }

    let Some(payload) = line.strip_prefix(SSE_DATA_PREFIX) else {
        return Ok(Line::Skip);
    };
    if payload == SSE_DONE_MARKER {
        return Ok(Line::Done);
    }

    let chunk: StreamChunk = serde_json::from_str(payload)?;
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(Line::Skip);
    };

    match choice.delta.content {
        Some(text) if !text.is_empty() => Ok(Line::Emit(PartialResponse {
            text_delta: text,
            finish_reason: choice.finish_reason,
        })),
        _ => Ok(Line::Skip),
    }
}

/// Lifecycle of a [`PartialResponseStream`].
enum DecoderState {
    /// Waiting for the next body chunk.
    AwaitingBytes,
    /// Handing out fragments decoded from the last chunk.
    Emitting(VecDeque<PartialResponse>),
    /// Finishing after the queued fragments: the sentinel was seen.
    Draining(VecDeque<PartialResponse>),
    /// Finished without error.
    Done,
    /// Finished after a transport error.
    Errored,
}

/// A lazy, single-pass stream of [`PartialResponse`]s read from a body.
///
/// The body is released as soon as the stream reaches a terminal state, or
/// when this value is dropped, whichever comes first.
pub struct PartialResponseStream {
    body: Option<ByteStream>,
    decoder: SseDecoder,
    state: DecoderState,
}

impl PartialResponseStream {
    /// Decode `body` as an SSE stream.
    pub fn new(body: ByteStream) -> Self {
        Self {
            body: Some(body),
            decoder: SseDecoder::new(),
            state: DecoderState::AwaitingBytes,
        }
    }

    /// Drop the body. Idempotent.
    fn release(&mut self) {
        if self.body.take().is_some() {
            tracing::debug!("streaming: body released");
        }
    }
}

impl Stream for PartialResponseStream {
    type Item = Result<PartialResponse, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            match &mut this.state {
                DecoderState::Done | DecoderState::Errored => return Poll::Ready(None),
                DecoderState::Emitting(queue) => {
                    if let Some(partial) = queue.pop_front() {
                        return Poll::Ready(Some(Ok(partial)));
                    }
                    this.state = DecoderState::AwaitingBytes;
                }
                DecoderState::Draining(queue) => {
                    if let Some(partial) = queue.pop_front() {
                        return Poll::Ready(Some(Ok(partial)));
                    }
                    this.state = DecoderState::Done;
                }
                DecoderState::AwaitingBytes => {
                    let Some(body) = this.body.as_mut() else {
                        this.state = DecoderState::Done;
                        continue;
                    };

                    match body.as_mut().poll_next(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(None) => {
                            tracing::debug!("streaming: body ended");
                            this.release();
                            this.state = DecoderState::Done;
                        }
                        Poll::Ready(Some(Err(e))) => {
                            tracing::warn!(error = %e, "streaming: body read failed");
                            this.release();
                            this.state = DecoderState::Errored;
                            return Poll::Ready(Some(Err(e)));
                        }
                        Poll::Ready(Some(Ok(bytes))) => {
                            let decoded = this.decoder.feed(&bytes);
                            let queue = VecDeque::from(decoded.responses);
                            if decoded.done {
                                tracing::debug!("streaming: [DONE] received");
                                this.release();
                                this.state = DecoderState::Draining(queue);
                            } else {
                                this.state = DecoderState::Emitting(queue);
                            }
                        }
                    }
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.state {
            DecoderState::Done | DecoderState::Errored => (0, Some(0)),
            DecoderState::Emitting(queue) => (queue.len(), None),
            DecoderState::Draining(queue) => (queue.len(), Some(queue.len())),
            DecoderState::AwaitingBytes => (0, None),
        }
    }
}

impl FusedStream for PartialResponseStream {
    fn is_terminated(&self) -> bool {
        matches!(self.state, DecoderState::Done | DecoderState::Errored)
    }
}

#[cfg(test)]
mod tests;
