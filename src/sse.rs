//! Server-Sent Events processing for streaming completions.
//!
//! This module turns the raw byte stream of an OpenAI-compatible `chat/completions`
//! response into a stream of text fragments.

use std::error;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_FRAGMENTS};
use crate::types::ChatCompletionChunk;
use crate::{Error, Result};

/// One decoded SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    /// A chunk carrying (possibly empty) text.
    Text(String),
    /// The `[DONE]` terminator.
    Done,
}

/// Process a stream of bytes into a stream of text fragments.
///
/// Empty fragments are skipped. The stream ends at `data: [DONE]` or at the end of the
/// body, whichever comes first. The first error ends the stream.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + Send + 'static,
    E: error::Error + Send + Sync + 'static,
{
    stream::unfold(
        (byte_stream, Vec::<u8>::new(), false),
        move |(mut stream, mut buffer, mut done)| async move {
            loop {
                if done {
                    return None;
                }

                // First check if we have a complete event in the buffer
                if let Some((event, consumed)) = extract_event(&buffer) {
                    buffer.drain(..consumed);
                    match event {
                        Ok(Some(Frame::Text(text))) if text.is_empty() => continue,
                        Ok(Some(Frame::Text(text))) => {
                            STREAM_FRAGMENTS.click();
                            return Some((Ok(text), (stream, buffer, done)));
                        }
                        Ok(Some(Frame::Done)) => return None,
                        Ok(None) => continue,
                        Err(err) => {
                            STREAM_ERRORS.click();
                            done = true;
                            return Some((Err(err), (stream, buffer, done)));
                        }
                    }
                }

                // Read more data
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        done = true;
                        let err =
                            Error::transport(format!("Error in HTTP stream: {e}"), Some(Box::new(e)));
                        return Some((Err(err), (stream, buffer, done)));
                    }
                    None => {
                        // End of body; a final event may lack its blank-line terminator.
                        done = true;
                        if buffer.iter().all(u8::is_ascii_whitespace) {
                            return None;
                        }
                        match decode_event(&buffer) {
                            Ok(Some(Frame::Text(text))) if !text.is_empty() => {
                                STREAM_FRAGMENTS.click();
                                return Some((Ok(text), (stream, Vec::new(), done)));
                            }
                            Ok(_) => return None,
                            Err(err) => {
                                STREAM_ERRORS.click();
                                return Some((Err(err), (stream, Vec::new(), done)));
                            }
                        }
                    }
                }
            }
        },
    )
}

/// Extract a complete SSE event from the front of `buffer`.
///
/// Returns the decoded event and the number of bytes it occupied, including the
/// delimiter. Events are delimited by a blank line (`\n\n` or `\r\n\r\n`).
fn extract_event(buffer: &[u8]) -> Option<(Result<Option<Frame>>, usize)> {
    let lf = find(buffer, b"\n\n").map(|at| (at, at + 2));
    let crlf = find(buffer, b"\r\n\r\n").map(|at| (at, at + 4));
    let (end, consumed) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    Some((decode_event(&buffer[..end]), consumed))
}

/// Decode the text of one event.
fn decode_event(raw: &[u8]) -> Result<Option<Frame>> {
    let text = std::str::from_utf8(raw).map_err(|e| {
        Error::decode(format!("Invalid UTF-8 in stream: {e}"), Some(Box::new(e)))
    })?;

    let data: Vec<&str> = text
        .lines()
        .filter(|line| !line.starts_with(':'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if data.is_empty() {
        return Ok(None);
    }
    let data = data.join("\n");
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(Some(Frame::Done));
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(data).map_err(|e| {
        Error::decode(
            format!("Failed to parse event JSON: {e}"),
            Some(Box::new(e)),
        )
    })?;
    if let Some(error) = chunk.error {
        return Err(Error::api(500, error.error_type, error.message));
    }
    Ok(Some(Frame::Text(chunk.text().to_string())))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
