//! Streaming normalization
//!
//! [`drive`] owns the decode loop shared by every vendor: it reads lines,
//! races them against cancellation, forwards raw lines to an optional
//! observer and hands each line to a vendor [`LineDecoder`]. However the
//! loop ends, the accumulated state is finalized exactly once:
//!
//! 1. if any plaintext was seen, one [`StreamKind::AppendAssistantMessage`]
//!    increment carrying the full text and usage;
//! 2. always, one [`StreamKind::FinishData`] increment.
//!
//! A transport failure or cancellation is reported as an `Err` item after
//! the finalize increments.
//!
//! [`StreamKind::AppendAssistantMessage`]: crate::StreamKind::AppendAssistantMessage
//! [`StreamKind::FinishData`]: crate::StreamKind::FinishData

use crate::{ChatResult, ChatUsage, FinishReason, LLMError, Result, Vendor};
use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::AsyncRead;
use bytes::{Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, FramedRead};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Longest line [`lines_from_reader`] buffers before discarding it
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Lines of a response body, without terminators
pub type LineStream = Pin<Box<dyn Stream<Item = io::Result<String>> + Send>>;

/// Canonical increments of a streamed completion
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatResult>> + Send>>;

/// Observer for raw stream lines
///
/// Called with each non-blank line before it is interpreted. The call is
/// awaited in-line, so a slow observer slows the stream down instead of
/// reordering it.
#[async_trait]
pub trait StreamEventHandler: Send + Sync {
    /// Inspect one untouched line
    async fn on_raw_line(&self, line: &str);
}

/// Per-invocation stream options
#[derive(Clone, Default)]
pub struct StreamContext {
    cancel: CancellationToken,
    handler: Option<Arc<dyn StreamEventHandler>>,
    surface_vendor_extensions: bool,
}

impl StreamContext {
    /// Default context: no observer, extensions suppressed, never canceled
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the stream when this token is canceled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Register a raw-line observer
    pub fn with_handler(mut self, handler: Arc<dyn StreamEventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Yield vendor-specific informational events as extension increments
    pub fn with_vendor_extensions(mut self, enabled: bool) -> Self {
        self.surface_vendor_extensions = enabled;
        self
    }

    /// Cancellation token observed by the decode loop
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether extension increments are yielded
    pub fn surfaces_vendor_extensions(&self) -> bool {
        self.surface_vendor_extensions
    }
}

impl std::fmt::Debug for StreamContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamContext")
            .field("canceled", &self.cancel.is_cancelled())
            .field("handler", &self.handler.is_some())
            .field("surface_vendor_extensions", &self.surface_vendor_extensions)
            .finish()
    }
}

/// State built up across records, owned by one decode loop
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    id: Option<String>,
    text: Option<String>,
    usage: Option<ChatUsage>,
    finish_reason: Option<FinishReason>,
}

impl StreamAccumulator {
    /// Record the vendor correlation id
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Correlation id, once known
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Append a plaintext fragment
    pub fn push_text(&mut self, fragment: &str) {
        self.text.get_or_insert_with(String::new).push_str(fragment);
    }

    /// Text accumulated so far, if any fragment was pushed
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Record final usage
    pub fn set_usage(&mut self, usage: ChatUsage) {
        self.usage = Some(usage);
    }

    /// Record the finish reason
    pub fn set_finish_reason(&mut self, reason: FinishReason) {
        self.finish_reason = Some(reason);
    }

    fn stamp(&self, mut result: ChatResult, vendor: Vendor) -> ChatResult {
        if result.id.is_none() {
            result.id.clone_from(&self.id);
        }
        result.with_vendor(vendor)
    }

    /// Consume the accumulator into the terminal increments
    pub fn finalize(self, vendor: Vendor) -> Vec<ChatResult> {
        let mut out = Vec::with_capacity(2);
        if let Some(text) = self.text {
            out.push(
                ChatResult::append_assistant_message(text, self.usage)
                    .with_id(self.id.clone())
                    .with_vendor(vendor),
            );
        }
        out.push(
            ChatResult::finish_data(self.finish_reason.unwrap_or_default(), self.usage)
                .with_id(self.id)
                .with_vendor(vendor),
        );
        out
    }
}

/// Outcome of interpreting one line
#[derive(Debug)]
pub enum Step {
    /// Yield these increments (possibly none) and keep reading
    Continue(Vec<ChatResult>),
    /// Yield these increments, then finalize
    Finish(Vec<ChatResult>),
}

impl Step {
    /// Nothing to yield; keep reading
    pub fn skip() -> Self {
        Step::Continue(Vec::new())
    }
}

/// Vendor-specific interpretation of one stream line
///
/// Implementations must not fail: a line they cannot interpret is skipped
/// by returning [`Step::skip`].
pub trait LineDecoder: Send + 'static {
    /// Interpret one non-blank line
    fn decode_line(&mut self, line: &str, acc: &mut StreamAccumulator) -> Step;
}

/// Mints tool-call ids for vendors that do not send them
///
/// Each decode loop owns its own generator; ids embed the function name
/// and a random v4 suffix.
#[derive(Debug, Default)]
pub struct ToolCallIds;

impl ToolCallIds {
    /// A fresh id for a call to `function_name`
    #[allow(clippy::unused_self)]
    pub fn mint(&mut self, function_name: &str) -> String {
        format!("{function_name}_{}", uuid::Uuid::new_v4().simple())
    }
}

enum NextLine {
    Line(String),
    End,
    Interrupted(LLMError),
}

async fn next_line(lines: &mut LineStream, cancel: &CancellationToken) -> NextLine {
    tokio::select! {
        biased;
        () = cancel.cancelled() => NextLine::Interrupted(LLMError::Canceled),
        next = lines.next() => match next {
            Some(Ok(line)) => NextLine::Line(line),
            Some(Err(e)) => NextLine::Interrupted(LLMError::Transport(e.to_string())),
            None => NextLine::End,
        },
    }
}

/// Run a vendor decoder over a line stream
pub fn drive<D: LineDecoder>(
    mut lines: LineStream,
    ctx: StreamContext,
    vendor: Vendor,
    mut decoder: D,
) -> ChatStream {
    Box::pin(async_stream::stream! {
        let mut acc = StreamAccumulator::default();
        let mut interruption = None;
        let mut records = 0usize;

        loop {
            let line = match next_line(&mut lines, &ctx.cancel).await {
                NextLine::Line(line) => line,
                NextLine::End => break,
                NextLine::Interrupted(e) => {
                    interruption = Some(e);
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            if let Some(handler) = &ctx.handler {
                handler.on_raw_line(&line).await;
            }

            records += 1;
            let (results, finished) = match decoder.decode_line(&line, &mut acc) {
                Step::Continue(results) => (results, false),
                Step::Finish(results) => (results, true),
            };
            for result in results {
                yield Ok(acc.stamp(result, vendor));
            }
            if finished {
                break;
            }
        }

        debug!(
            vendor = %vendor,
            records,
            interrupted = interruption.is_some(),
            "Finalizing stream"
        );
        for result in acc.finalize(vendor) {
            yield Ok(result);
        }
        if let Some(e) = interruption {
            yield Err(e);
        }
    })
}

/// Newline framing over raw bytes
///
/// Lines are decoded lossily, so invalid UTF-8 reaches the vendor decoder
/// as replacement characters instead of failing the read. A line longer
/// than the limit is dropped up to its terminator and framed as `None`.
struct NdjsonCodec {
    inner: AnyDelimiterCodec,
}

impl NdjsonCodec {
    fn new(max_line_bytes: usize) -> Self {
        Self {
            inner: AnyDelimiterCodec::new_with_max_length(
                b"\n".to_vec(),
                Vec::new(),
                max_line_bytes,
            ),
        }
    }

    fn frame(
        decoded: std::result::Result<Option<Bytes>, AnyDelimiterCodecError>,
    ) -> io::Result<Option<Option<String>>> {
        match decoded {
            Ok(Some(raw)) => {
                let line = String::from_utf8_lossy(&raw);
                let line = line.strip_suffix('\r').unwrap_or(&line);
                Ok(Some(Some(line.to_string())))
            }
            Ok(None) => Ok(None),
            Err(AnyDelimiterCodecError::MaxChunkLengthExceeded) => {
                warn!("Discarding oversized stream line");
                Ok(Some(None))
            }
            Err(AnyDelimiterCodecError::Io(e)) => Err(e),
        }
    }
}

impl Decoder for NdjsonCodec {
    type Item = Option<String>;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        Self::frame(self.inner.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> io::Result<Option<Self::Item>> {
        Self::frame(self.inner.decode_eof(buf))
    }
}

/// Split an async reader into lines
pub fn lines_from_reader<R>(reader: R) -> LineStream
where
    R: AsyncRead + Send + 'static,
{
    lines_from_reader_with_limit(reader, MAX_LINE_BYTES)
}

/// Split an async reader into lines, discarding any line over `max_line_bytes`
pub fn lines_from_reader_with_limit<R>(reader: R, max_line_bytes: usize) -> LineStream
where
    R: AsyncRead + Send + 'static,
{
    Box::pin(
        FramedRead::new(reader, NdjsonCodec::new(max_line_bytes))
            .try_filter_map(|line| futures::future::ready(Ok(line))),
    )
}

/// Split a streaming HTTP response body into lines
pub fn lines_from_response(response: reqwest::Response) -> LineStream {
    let bytes = response.bytes_stream().map_err(|e| {
        trace!("Response body read failed: {e}");
        io::Error::other(e)
    });
    lines_from_reader(StreamReader::new(bytes))
}

/// Lines from an in-memory source (recorded streams, tests)
pub fn lines_from_iter<I>(lines: I) -> LineStream
where
    I: IntoIterator<Item = io::Result<String>>,
    I::IntoIter: Send + 'static,
{
    Box::pin(futures::stream::iter(lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamKind;
    use std::sync::Mutex;

    /// Echo decoder: every line is text, "END" finishes
    struct Echo;

    impl LineDecoder for Echo {
        fn decode_line(&mut self, line: &str, acc: &mut StreamAccumulator) -> Step {
            if line == "END" {
                acc.set_finish_reason(FinishReason::Stop);
                return Step::Finish(Vec::new());
            }
            acc.push_text(line);
            Step::Continue(vec![ChatResult::text_delta(line)])
        }
    }

    fn ok_lines(lines: &[&str]) -> LineStream {
        let owned: Vec<io::Result<String>> = lines.iter().map(|l| Ok((*l).to_string())).collect();
        lines_from_iter(owned)
    }

    async fn collect(stream: ChatStream) -> (Vec<ChatResult>, Option<LLMError>) {
        let mut results = Vec::new();
        let mut error = None;
        let mut stream = stream;
        while let Some(item) = stream.next().await {
            match item {
                Ok(r) => results.push(r),
                Err(e) => {
                    assert!(error.is_none(), "only one error may be yielded");
                    error = Some(e);
                }
            }
        }
        (results, error)
    }

    #[tokio::test]
    async fn test_empty_stream_yields_single_finish() {
        let (results, error) =
            collect(drive(ok_lines(&[]), StreamContext::new(), Vendor::Cohere, Echo)).await;
        assert!(error.is_none());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].stream_kind, StreamKind::FinishData);
        assert_eq!(results[0].finish_reason(), Some(FinishReason::Unknown));
        assert_eq!(results[0].vendor, Some(Vendor::Cohere));
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let (results, _) = collect(drive(
            ok_lines(&["", "  ", "a", "\t", "END", "ignored"]),
            StreamContext::new(),
            Vendor::Cohere,
            Echo,
        ))
        .await;
        let kinds: Vec<StreamKind> = results.iter().map(|r| r.stream_kind).collect();
        assert_eq!(
            kinds,
            vec![
                StreamKind::None,
                StreamKind::AppendAssistantMessage,
                StreamKind::FinishData
            ]
        );
        assert_eq!(results[1].text().as_deref(), Some("a"));
        assert_eq!(results[2].finish_reason(), Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_transport_error_finalizes_before_propagating() {
        let lines = lines_from_iter(vec![
            Ok("one".to_string()),
            Ok("two".to_string()),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer")),
            Ok("never".to_string()),
        ]);
        let (results, error) =
            collect(drive(lines, StreamContext::new(), Vendor::Cohere, Echo)).await;

        assert_eq!(results.len(), 4);
        assert_eq!(results[2].stream_kind, StreamKind::AppendAssistantMessage);
        assert_eq!(results[2].text().as_deref(), Some("onetwo"));
        assert!(results[3].is_finish());
        assert!(matches!(error, Some(LLMError::Transport(msg)) if msg.contains("reset by peer")));
    }

    #[tokio::test]
    async fn test_precanceled_token_reports_canceled() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = StreamContext::new().with_cancellation(token);
        let (results, error) = collect(drive(ok_lines(&["a", "b"]), ctx, Vendor::Cohere, Echo)).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].is_finish());
        assert!(matches!(error, Some(LLMError::Canceled)));
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_keeps_partial_text() {
        let token = CancellationToken::new();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<io::Result<String>>();
        let lines: LineStream =
            Box::pin(futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }));

        let mut stream = drive(
            lines,
            StreamContext::new().with_cancellation(token.clone()),
            Vendor::Cohere,
            Echo,
        );

        tx.send(Ok("partial".to_string())).unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.text().as_deref(), Some("partial"));

        token.cancel();
        let (rest, error) = collect(stream).await;
        assert_eq!(rest[0].stream_kind, StreamKind::AppendAssistantMessage);
        assert_eq!(rest[0].text().as_deref(), Some("partial"));
        assert!(rest[1].is_finish());
        assert!(matches!(error, Some(LLMError::Canceled)));
        drop(tx);
    }

    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl StreamEventHandler for Recorder {
        async fn on_raw_line(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    #[tokio::test]
    async fn test_observer_sees_non_blank_lines_in_order() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let ctx = StreamContext::new().with_handler(recorder.clone());
        let (results, _) = collect(drive(ok_lines(&["x", "", "y"]), ctx, Vendor::Cohere, Echo)).await;

        assert_eq!(*recorder.0.lock().unwrap(), vec!["x", "y"]);
        assert_eq!(results.last().unwrap().stream_kind, StreamKind::FinishData);
    }

    #[tokio::test]
    async fn test_lines_from_reader_splits_crlf() {
        let reader = std::io::Cursor::new(b"first\r\n\nsecond\nthird".to_vec());
        let lines: Vec<String> = lines_from_reader(reader).try_collect().await.unwrap();
        assert_eq!(lines, vec!["first", "", "second", "third"]);
    }

    #[test]
    fn test_tool_call_ids_are_unique() {
        let mut ids = ToolCallIds::default();
        let a = ids.mint("lookup");
        let b = ids.mint("lookup");
        assert_ne!(a, b);
        assert!(a.starts_with("lookup_"));
    }

    #[tokio::test]
    async fn test_lines_from_reader_survives_invalid_utf8() {
        let reader = std::io::Cursor::new(b"ok\nbad \xff byte\r\nafter".to_vec());
        let lines: Vec<String> = lines_from_reader(reader).try_collect().await.unwrap();
        assert_eq!(lines, vec!["ok", "bad \u{fffd} byte", "after"]);
    }

    #[tokio::test]
    async fn test_lines_from_reader_drops_oversized_line() {
        let reader = std::io::Cursor::new(b"short\nthis line is far too long\nnext\n".to_vec());
        let lines: Vec<String> = lines_from_reader_with_limit(reader, 8)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(lines, vec!["short", "next"]);
    }
}
