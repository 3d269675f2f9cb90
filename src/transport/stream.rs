//! Cancellable event stream over a chunked HTTP body.

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::sse::{Frame, FrameDecoder};
use crate::error::Error;

/// One item of a reply stream.
#[derive(Debug)]
pub enum StreamEvent {
    /// A decoded JSON frame.
    Message(Value),
    /// Reading failed; nothing follows.
    Error(Error),
    /// `[DONE]` or end of body; nothing follows.
    Complete,
}

/// Cancellation handle shared by the producer and every consumer of a
/// stream.
#[derive(Debug, Clone, Default)]
pub struct StreamController {
    token: CancellationToken,
}

impl StreamController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the stream. Idempotent; after this no further event is
    /// delivered and the response body is dropped.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Lazy sequence of [`StreamEvent`]s ending with `Complete` or `Error`,
/// or with nothing at all once cancelled.
///
/// The body is read by a producer task that owns it, so cancelling through
/// any clone of the controller releases the connection without waiting for
/// this stream to be polled.
pub struct ReplyStream {
    inner: Option<mpsc::Receiver<StreamEvent>>,
    producer: JoinHandle<()>,
    controller: StreamController,
}

impl ReplyStream {
    /// Decode frames from a raw byte stream. Must be called within a tokio
    /// runtime.
    pub fn from_byte_stream<S, E>(bytes: S, controller: StreamController) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<Error> + Send + 'static,
    {
        let events = async_stream::stream! {
            let mut decoder = FrameDecoder::new();
            let mut bytes = Box::pin(bytes);
            while let Some(next) = bytes.next().await {
                match next {
                    Ok(chunk) => {
                        for frame in decoder.feed(&chunk) {
                            match frame {
                                Frame::Data(value) => yield StreamEvent::Message(value),
                                Frame::Done => {
                                    yield StreamEvent::Complete;
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield StreamEvent::Error(e.into());
                        return;
                    }
                }
            }
            for frame in decoder.finish() {
                match frame {
                    Frame::Data(value) => yield StreamEvent::Message(value),
                    Frame::Done => break,
                }
            }
            yield StreamEvent::Complete;
        };

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let token = controller.token.clone();
        let producer = tokio::spawn(async move {
            let mut events = Box::pin(events);
            loop {
                let event = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    event = events.next() => event,
                };
                let Some(event) = event else { break };
                let terminal = !matches!(event, StreamEvent::Message(_));
                let sent = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    sent = tx.send(event) => sent,
                };
                if sent.is_err() || terminal {
                    break;
                }
            }
            if token.is_cancelled() {
                debug!("Reply stream cancelled");
            }
        });

        Self {
            inner: Some(rx),
            producer,
            controller,
        }
    }

    /// Decode frames from a streaming response body.
    pub fn from_response(response: reqwest::Response, controller: StreamController) -> Self {
        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::Stream(e.to_string())));
        Self::from_byte_stream(bytes, controller)
    }

    pub fn controller(&self) -> &StreamController {
        &self.controller
    }

    pub fn cancel(&self) {
        self.controller.cancel();
    }

    /// Drain the stream, returning every message and the terminal event.
    pub async fn collect_all(mut self) -> (Vec<Value>, Option<StreamEvent>) {
        let mut messages = Vec::new();
        while let Some(event) = self.next().await {
            match event {
                StreamEvent::Message(value) => messages.push(value),
                terminal => return (messages, Some(terminal)),
            }
        }
        (messages, None)
    }
}

const EVENT_BUFFER: usize = 16;

impl Stream for ReplyStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.controller.is_cancelled() {
            this.inner = None;
            return Poll::Ready(None);
        }
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if this.controller.is_cancelled() {
                    this.inner = None;
                    return Poll::Ready(None);
                }
                if !matches!(event, StreamEvent::Message(_)) {
                    this.inner = None;
                }
                Poll::Ready(Some(event))
            }
            Poll::Ready(None) => {
                this.inner = None;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for ReplyStream {
    fn drop(&mut self) {
        self.producer.abort();
    }
}

impl std::fmt::Debug for ReplyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyStream")
            .field("finished", &self.inner.is_none())
            .field("cancelled", &self.controller.is_cancelled())
            .finish()
    }
}

/// Result of starting a callback-driven stream.
#[derive(Debug)]
pub struct StreamStart {
    pub success: bool,
    /// Present when the stream started; cancel through it.
    pub controller: Option<StreamController>,
    /// Technical error text when the stream could not start.
    pub error: Option<String>,
    /// User-facing label.
    pub message: String,
    /// Consumer task, for callers that want to await delivery.
    pub task: Option<JoinHandle<()>>,
}

/// Drive `stream` on a spawned task, forwarding events to callbacks.
///
/// Exactly one of `on_error` and `on_complete` runs, unless the stream is
/// cancelled, in which case neither does.
pub fn spawn_consumer<M, E, C>(
    mut stream: ReplyStream,
    mut on_message: M,
    on_error: E,
    on_complete: C,
) -> JoinHandle<()>
where
    M: FnMut(Value) + Send + 'static,
    E: FnOnce(Error) + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    let controller = stream.controller().clone();
    tokio::spawn(async move {
        let mut on_error = Some(on_error);
        let mut on_complete = Some(on_complete);
        loop {
            let event = tokio::select! {
                biased;
                _ = controller.cancelled() => None,
                event = stream.next() => event,
            };
            let Some(event) = event else { break };
            if controller.is_cancelled() {
                break;
            }
            match event {
                StreamEvent::Message(value) => on_message(value),
                StreamEvent::Error(e) => {
                    if let Some(cb) = on_error.take() {
                        cb(e);
                    }
                    break;
                }
                StreamEvent::Complete => {
                    if let Some(cb) = on_complete.take() {
                        cb();
                    }
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, Error>> + Send + 'static {
        let owned: Vec<Result<Bytes, Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        futures::stream::iter(owned)
    }

    #[tokio::test]
    async fn test_messages_then_complete() {
        let stream = ReplyStream::from_byte_stream(
            chunks(&["data: {\"content\":\"a\"}\n", "data: {\"content\":\"b\"}\ndata: [DONE]\n"]),
            StreamController::new(),
        );
        let (messages, terminal) = stream.collect_all().await;
        assert_eq!(messages, vec![json!({"content": "a"}), json!({"content": "b"})]);
        assert!(matches!(terminal, Some(StreamEvent::Complete)));
    }

    #[tokio::test]
    async fn test_end_without_sentinel_completes() {
        let stream = ReplyStream::from_byte_stream(
            chunks(&["data: {\"x\":1}\n", "data: {\"x\":2}"]),
            StreamController::new(),
        );
        let (messages, terminal) = stream.collect_all().await;
        assert_eq!(messages.len(), 2);
        assert!(matches!(terminal, Some(StreamEvent::Complete)));
    }

    #[tokio::test]
    async fn test_read_error_ends_stream() {
        let items: Vec<Result<Bytes, Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"x\":1}\n")),
            Err(Error::Stream("connection reset".into())),
            Ok(Bytes::from_static(b"data: {\"x\":2}\n")),
        ];
        let mut stream =
            ReplyStream::from_byte_stream(futures::stream::iter(items), StreamController::new());

        assert!(matches!(stream.next().await, Some(StreamEvent::Message(_))));
        match stream.next().await {
            Some(StreamEvent::Error(e)) => assert!(e.to_string().contains("connection reset")),
            other => panic!("expected error, got {:?}", other),
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_after_first_frame_stops_everything() {
        let mut stream = ReplyStream::from_byte_stream(
            chunks(&["data: {\"k\":1}\ndata: {\"k\":2}\n", "data: [DONE]\n"]),
            StreamController::new(),
        );

        assert!(matches!(stream.next().await, Some(StreamEvent::Message(_))));
        stream.cancel();
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_bytes() {
        let controller = StreamController::new();
        let pending = futures::stream::pending::<Result<Bytes, Error>>();
        let mut stream = ReplyStream::from_byte_stream(pending, controller.clone());

        let canceller = controller.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            canceller.cancel();
        });
        assert!(stream.next().await.is_none());
    }

    /// Body that never yields and records when it is dropped.
    struct HeldBody {
        released: Arc<AtomicBool>,
    }

    impl Stream for HeldBody {
        type Item = Result<Bytes, Error>;

        fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
            Poll::Pending
        }
    }

    impl Drop for HeldBody {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    async fn wait_for(flag: &AtomicBool) -> bool {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !flag.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .is_ok()
    }

    #[tokio::test]
    async fn test_cancel_releases_body_without_poll() {
        let released = Arc::new(AtomicBool::new(false));
        let controller = StreamController::new();
        let mut stream = ReplyStream::from_byte_stream(
            HeldBody {
                released: released.clone(),
            },
            controller.clone(),
        );
        tokio::task::yield_now().await;
        assert!(!released.load(Ordering::SeqCst));

        let shared = controller.clone();
        shared.cancel();
        assert!(wait_for(&released).await, "body still held after cancel");

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_releases_body() {
        let released = Arc::new(AtomicBool::new(false));
        let stream = ReplyStream::from_byte_stream(
            HeldBody {
                released: released.clone(),
            },
            StreamController::new(),
        );
        tokio::task::yield_now().await;

        drop(stream);
        assert!(wait_for(&released).await);
    }

    #[tokio::test]
    async fn test_consumer_callbacks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let done = Arc::new(Mutex::new(false));
        let stream = ReplyStream::from_byte_stream(
            chunks(&["data: {\"n\":1}\ndata: {\"n\":2}\ndata: [DONE]\n"]),
            StreamController::new(),
        );

        let s = seen.clone();
        let d = done.clone();
        let task = spawn_consumer(
            stream,
            move |v| s.lock().unwrap().push(v),
            |e| panic!("unexpected error: {e}"),
            move || *d.lock().unwrap() = true,
        );
        task.await.unwrap();

        assert_eq!(seen.lock().unwrap().len(), 2);
        assert!(*done.lock().unwrap());
    }

    #[tokio::test]
    async fn test_consumer_cancelled_runs_no_terminal_callback() {
        let controller = StreamController::new();
        let stream = ReplyStream::from_byte_stream(
            futures::stream::pending::<Result<Bytes, Error>>(),
            controller.clone(),
        );
        let fired = Arc::new(Mutex::new(false));
        let (f1, f2) = (fired.clone(), fired.clone());
        let task = spawn_consumer(
            stream,
            |_| {},
            move |_| *f1.lock().unwrap() = true,
            move || *f2.lock().unwrap() = true,
        );

        controller.cancel();
        task.await.unwrap();
        assert!(!*fired.lock().unwrap());
    }

    #[tokio::test]
    async fn test_consumer_stops_after_cancel_mid_stream() {
        let (body_tx, body_rx) = futures::channel::mpsc::unbounded::<Result<Bytes, Error>>();
        let controller = StreamController::new();
        let stream = ReplyStream::from_byte_stream(body_rx, controller.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let terminal = Arc::new(Mutex::new(Vec::new()));
        let (first_tx, mut first_rx) = tokio::sync::mpsc::unbounded_channel();
        let task = {
            let seen = seen.clone();
            let (t1, t2) = (terminal.clone(), terminal.clone());
            spawn_consumer(
                stream,
                move |v| {
                    seen.lock().unwrap().push(v);
                    let _ = first_tx.send(());
                },
                move |e| t1.lock().unwrap().push(format!("error: {e}")),
                move || t2.lock().unwrap().push("complete".to_string()),
            )
        };

        body_tx
            .unbounded_send(Ok(Bytes::from_static(b"data: {\"k\":1}\n")))
            .unwrap();
        first_rx.recv().await.unwrap();

        controller.cancel();
        let _ = body_tx.unbounded_send(Ok(Bytes::from_static(
            b"data: {\"k\":2}\ndata: {\"k\":3}\ndata: [DONE]\n",
        )));
        let _ = body_tx.unbounded_send(Err(Error::Stream("late failure".into())));
        task.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![json!({"k": 1})]);
        assert!(terminal.lock().unwrap().is_empty());
    }
}
