//! Line framing for streamed HTTP bodies.
//!
//! Both streaming wire formats we consume are line oriented:
//! - OpenAI-compatible servers send Server-Sent Events (`data: {...}` lines,
//!   terminated by `data: [DONE]`)
//! - Ollama sends newline-delimited JSON objects
//!
//! [`split_lines`] turns an arbitrary chunked byte stream into complete lines,
//! independent of how the transport fragmented them.

use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::error_handler::AiLlmError;

/// Stream of generated text fragments in arrival order.
pub type TextStream = BoxStream<'static, Result<String, AiLlmError>>;

/// One decoded line of a streaming response.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamEvent {
    /// Carries no text (keep-alive, comment, role-only delta).
    Skip,
    /// A text fragment to emit.
    Delta(String),
    /// Explicit end-of-stream marker.
    Done,
}

/// Splits a byte stream into `\n`-terminated lines (without the terminator).
///
/// A trailing partial line is emitted once the input ends. Transport errors
/// are forwarded, after which the buffered remainder is flushed.
pub(crate) fn split_lines<S, B, E>(input: S) -> BoxStream<'static, Result<String, AiLlmError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<AiLlmError> + Send + 'static,
{
    let state = (input.boxed(), Vec::<u8>::new(), false);
    stream::unfold(state, |(mut inner, mut buf, mut done)| async move {
        loop {
            if let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let text = String::from_utf8_lossy(&line)
                    .trim_end_matches(['\r', '\n'])
                    .to_string();
                return Some((Ok(text), (inner, buf, done)));
            }
            if done {
                if buf.is_empty() {
                    return None;
                }
                let text = String::from_utf8_lossy(&buf).trim_end().to_string();
                buf.clear();
                return Some((Ok(text), (inner, buf, done)));
            }
            match inner.next().await {
                Some(Ok(bytes)) => buf.extend_from_slice(bytes.as_ref()),
                Some(Err(e)) => return Some((Err(e.into()), (inner, buf, true))),
                None => done = true,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn reassembles_lines_across_chunks() {
        let parts: Vec<Result<&'static [u8], AiLlmError>> = vec![
            Ok(b"data: one\r\n\nda".as_slice()),
            Ok(b"ta: two\n".as_slice()),
            Ok(b"tail".as_slice()),
        ];
        let lines: Vec<String> = split_lines(stream::iter(parts)).try_collect().await.unwrap();
        assert_eq!(lines, vec!["data: one", "", "data: two", "tail"]);
    }

    #[tokio::test]
    async fn empty_input_yields_nothing() {
        let parts: Vec<Result<&'static [u8], AiLlmError>> = vec![];
        let lines: Vec<String> = split_lines(stream::iter(parts)).try_collect().await.unwrap();
        assert!(lines.is_empty());
    }
}
