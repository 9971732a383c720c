//! Streaming completions: one producer task per stream
//!
//! The producer reads native events, feeds them through a
//! [`StreamReconstructor`], and hands each chunk to the consumer over a
//! bounded channel. Failures are reported once on a separate single-slot
//! channel. On exit the chunk channel closes first, then the error channel,
//! so a consumer always drains content before it observes the error.

use std::future::Future;
use std::pin::{Pin, pin};
use std::task::{Context, Poll};

use anyhow::Context as _;
use futures_util::{Stream, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::types::ChatCompletionChunk;

/// Translates one provider's native stream events into canonical chunks
pub trait StreamReconstructor: Send + 'static {
    /// Native event type produced by the provider's stream
    type Event: Send + 'static;

    /// Apply one native event, returning the chunks it produces in order
    fn process(&mut self, event: Self::Event) -> Result<Vec<ChatCompletionChunk>, LlmError>;

    /// Closing chunk carrying the finish reason and usage
    fn finish(self) -> ChatCompletionChunk;
}

/// Consumer side of a streaming completion
///
/// Yields every chunk in arrival order, then at most one error. Dropping the
/// stream stops the producer at its next suspension point.
#[derive(Debug)]
pub struct CompletionStream {
    chunks: mpsc::Receiver<ChatCompletionChunk>,
    error: Option<oneshot::Receiver<LlmError>>,
}

impl CompletionStream {
    /// Split into the content channel and the single-slot error channel
    pub fn into_parts(self) -> (mpsc::Receiver<ChatCompletionChunk>, Option<oneshot::Receiver<LlmError>>) {
        (self.chunks, self.error)
    }

    /// Drain the stream, returning every chunk or the first error
    pub async fn collect_chunks(mut self) -> Result<Vec<ChatCompletionChunk>, LlmError> {
        let mut chunks = Vec::new();
        while let Some(item) = self.next().await {
            chunks.push(item?);
        }
        Ok(chunks)
    }
}

impl Stream for CompletionStream {
    type Item = Result<ChatCompletionChunk, LlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.chunks.poll_recv(cx) {
            Poll::Ready(Some(chunk)) => return Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(None) => {}
            Poll::Pending => return Poll::Pending,
        }

        let Some(error) = this.error.as_mut() else {
            return Poll::Ready(None);
        };

        match Pin::new(error).poll(cx) {
            Poll::Ready(result) => {
                this.error = None;
                Poll::Ready(result.ok().map(Err))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// How the producer loop ended
enum Outcome {
    Finished,
    Cancelled,
    Failed(LlmError),
}

/// Spawn the producer task for one stream
///
/// `connect` performs the upstream call and resolves to the native event
/// stream; both it and the events are already classified into `LlmError`.
///
/// Must be called from within a Tokio runtime; otherwise returns
/// `LlmError::Internal` without connecting.
pub fn spawn_stream<R, F, S>(
    provider: &str,
    connect: F,
    reconstructor: R,
    cancel: CancellationToken,
) -> Result<CompletionStream, LlmError>
where
    R: StreamReconstructor,
    F: Future<Output = Result<S, LlmError>> + Send + 'static,
    S: Stream<Item = Result<R::Event, LlmError>> + Send + 'static,
{
    let runtime = Handle::try_current()
        .with_context(|| format!("[{provider}] streaming completions require a Tokio runtime"))
        .map_err(LlmError::Internal)?;

    let (chunk_tx, chunk_rx) = mpsc::channel(1);
    let (error_tx, error_rx) = oneshot::channel();
    let provider = provider.to_owned();

    runtime.spawn(async move {
        let outcome = produce(connect, reconstructor, &chunk_tx, &cancel).await;
        drop(chunk_tx);

        match outcome {
            Outcome::Finished => tracing::debug!(provider = %provider, "stream finished"),
            Outcome::Cancelled => tracing::debug!(provider = %provider, "stream cancelled"),
            Outcome::Failed(error) => {
                tracing::debug!(provider = %provider, error = %error, "stream failed");
                let _ = error_tx.send(error);
            }
        }
    });

    Ok(CompletionStream {
        chunks: chunk_rx,
        error: Some(error_rx),
    })
}

async fn produce<R, F, S>(
    connect: F,
    mut reconstructor: R,
    chunk_tx: &mpsc::Sender<ChatCompletionChunk>,
    cancel: &CancellationToken,
) -> Outcome
where
    R: StreamReconstructor,
    F: Future<Output = Result<S, LlmError>>,
    S: Stream<Item = Result<R::Event, LlmError>>,
{
    let events = tokio::select! {
        biased;
        () = cancel.cancelled() => return Outcome::Cancelled,
        connected = connect => match connected {
            Ok(events) => events,
            Err(error) => return Outcome::Failed(error),
        },
    };
    let mut events = pin!(events);

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Outcome::Cancelled,
            next = events.next() => next,
        };

        let Some(event) = next else { break };

        let chunks = match event.and_then(|event| reconstructor.process(event)) {
            Ok(chunks) => chunks,
            Err(error) => return Outcome::Failed(error),
        };

        for chunk in chunks {
            if !deliver(chunk_tx, chunk, cancel).await {
                return Outcome::Cancelled;
            }
        }
    }

    if deliver(chunk_tx, reconstructor.finish(), cancel).await {
        Outcome::Finished
    } else {
        Outcome::Cancelled
    }
}

/// Hand one chunk to the consumer; false when cancelled or the consumer left
async fn deliver(
    chunk_tx: &mpsc::Sender<ChatCompletionChunk>,
    chunk: ChatCompletionChunk,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = chunk_tx.send(chunk) => sent.is_ok(),
    }
}
