//! Source implementations.
//!
//! Every source spawns exactly one task that feeds the first handoff channel
//! of a pipeline. Finite sources close their channel after the last element;
//! [`Stream::generate`] never does and relies on a downstream bound such as
//! [`Stream::limit`], on the reader going away, or on cancellation.

use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::pipeline::{PipelineContext, Stream, StreamConfig};

/// Builds sources that share one configuration and, optionally, an external
/// cancellation token.
///
/// ```rust
/// use sluice::prelude::*;
///
/// # #[tokio::main]
/// # async fn main() -> Result<()> {
/// let shutdown = tokio_util::sync::CancellationToken::new();
/// let stream = SourceBuilder::new(StreamConfig::default().label("ids"))
///     .cancel_with(&shutdown)
///     .iter(1..=3);
/// assert_eq!(stream.collect().await?, vec![1, 2, 3]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SourceBuilder {
    config: StreamConfig,
    parent: Option<CancellationToken>,
}

impl SourceBuilder {
    /// Create a builder with the given configuration
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            parent: None,
        }
    }

    /// Cancel the pipeline whenever `token` is cancelled.
    ///
    /// The pipeline gets a child token, so cancelling the pipeline itself
    /// (for example when a short-circuiting terminal stops early) leaves
    /// `token` untouched.
    pub fn cancel_with(mut self, token: &CancellationToken) -> Self {
        self.parent = Some(token.clone());
        self
    }

    fn context(self) -> PipelineContext {
        let token = match self.parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        PipelineContext::new(self.config, token)
    }

    /// Emit the elements of a vector in order, then close.
    pub fn from_vec<T: Send + 'static>(self, items: Vec<T>) -> Stream<T> {
        Stream::replay(self.context(), "from_vec", items)
    }

    /// Emit everything an iterator yields, then close.
    pub fn iter<I>(self, items: I) -> Stream<I::Item>
    where
        I: IntoIterator,
        I::IntoIter: Send + 'static,
        I::Item: Send + 'static,
    {
        emit_iter(self.context(), "iter", items.into_iter())
    }

    /// Emit `f()` forever.
    pub fn generate<T, F>(self, mut f: F) -> Stream<T>
    where
        T: Send + 'static,
        F: FnMut() -> T + Send + 'static,
    {
        Stream::source(self.context(), "generate", move |outlet| async move {
            while !outlet.token().is_cancelled() {
                if !outlet.emit(f()).await {
                    break;
                }
            }
            Ok(())
        })
    }

    /// Forward everything received on a caller-owned channel.
    pub fn from_receiver<T: Send + 'static>(self, mut rx: mpsc::Receiver<T>) -> Stream<T> {
        Stream::source(self.context(), "from_receiver", move |outlet| async move {
            let token = outlet.token().clone();
            loop {
                let item = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = outlet.closed() => break,
                    item = rx.recv() => item,
                };
                match item {
                    Some(item) => {
                        if !outlet.emit(item).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            Ok(())
        })
    }

    /// Forward everything an async stream yields.
    pub fn from_stream<S>(self, stream: S) -> Stream<S::Item>
    where
        S: futures_core::Stream + Send + 'static,
        S::Item: Send + 'static,
    {
        Stream::source(self.context(), "from_stream", move |outlet| async move {
            tokio::pin!(stream);
            let token = outlet.token().clone();
            loop {
                let item = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = outlet.closed() => break,
                    item = stream.next() => item,
                };
                match item {
                    Some(item) => {
                        if !outlet.emit(item).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            Ok(())
        })
    }
}

fn emit_iter<I>(ctx: PipelineContext, op: &str, items: I) -> Stream<I::Item>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    Stream::source(ctx, op, move |outlet| async move {
        for item in items {
            if !outlet.emit(item).await {
                break;
            }
        }
        Ok(())
    })
}

impl<T: Send + 'static> Stream<T> {
    /// Emit the elements of a vector in order, then close.
    pub fn from_vec(items: Vec<T>) -> Self {
        SourceBuilder::default().from_vec(items)
    }

    /// Emit everything an iterator yields, then close.
    pub fn iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        SourceBuilder::default().iter(items)
    }

    /// Emit `f()` forever; bound it downstream.
    pub fn generate<F>(f: F) -> Self
    where
        F: FnMut() -> T + Send + 'static,
    {
        SourceBuilder::default().generate(f)
    }

    /// Forward everything received on a caller-owned channel.
    pub fn from_receiver(rx: mpsc::Receiver<T>) -> Self {
        SourceBuilder::default().from_receiver(rx)
    }

    /// Forward everything an async stream yields.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: futures_core::Stream<Item = T> + Send + 'static,
    {
        SourceBuilder::default().from_stream(stream)
    }

    /// Emit all of `first`, then all of `second`.
    ///
    /// Each side is drained into memory before any of its elements are
    /// re-emitted, so neither may be infinite. The result keeps the
    /// configuration and cancellation token of `first`. A fault in either
    /// side is reported by the concatenated stream.
    pub fn concat(first: Stream<T>, second: Stream<T>) -> Self {
        let ctx = first.ctx.clone();
        Stream::source(ctx, "concat", move |outlet| async move {
            for side in [first, second] {
                let token = outlet.token().clone();
                let items = tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok(()),
                    _ = outlet.closed() => return Ok(()),
                    items = side.collect() => items?,
                };
                for item in items {
                    if !outlet.emit(item).await {
                        return Ok(());
                    }
                }
            }
            Ok(())
        })
    }

    /// Emit all of `self`, then all of `other`. See [`Stream::concat`].
    pub fn chain(self, other: Stream<T>) -> Self {
        Stream::concat(self, other)
    }

    /// Emit materialized elements under an existing pipeline context.
    pub(crate) fn replay(ctx: PipelineContext, op: &str, items: Vec<T>) -> Self {
        emit_iter(ctx, op, items.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_from_vec_preserves_order() {
        let items = Stream::from_vec(vec!["a", "b", "c"]).collect().await.unwrap();
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_source() {
        let items = Stream::<u8>::from_vec(vec![]).collect().await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_iter_range() {
        let items = Stream::iter(1..=4).collect().await.unwrap();
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_generate_bounded_by_limit() {
        let mut next = 0;
        let items = Stream::generate(move || {
            next += 1;
            next
        })
        .limit(5)
        .collect()
        .await
        .unwrap();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_generate_stops_when_dropped() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let stream = Stream::generate(move || counter.fetch_add(1, Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(stream);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let settled = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), settled);
        // Rendezvous: at most one value was produced ahead of a reader that never came.
        assert!(settled <= 2);
    }

    #[tokio::test]
    async fn test_concat_orders_sides() {
        let a = Stream::from_vec(vec![1, 2]);
        let b = Stream::from_vec(vec![3, 4]);
        let items = Stream::concat(a, b).collect().await.unwrap();
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_chain_reports_fault_of_a_side() {
        let a = Stream::from_vec(vec![1, 2]);
        let b = Stream::from_vec(vec![3]).map(|x: i32| -> i32 { panic!("bad element {}", x) });
        let result = a.chain(b).collect().await;
        match result {
            Err(Error::StageFault { stage, message }) => {
                assert_eq!(stage, "stream.map#1");
                assert_eq!(message, "bad element 3");
            }
            other => panic!("expected stage fault, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_from_receiver() {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for i in 0..3 {
                tx.send(i).await.unwrap();
            }
        });
        let items = Stream::from_receiver(rx).collect().await.unwrap();
        assert_eq!(items, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_from_receiver_limit_with_open_sender() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();

        let items = tokio::time::timeout(
            Duration::from_secs(2),
            Stream::from_receiver(rx).limit(2).collect(),
        )
        .await
        .expect("limit should end the pipeline while the sender is open")
        .unwrap();
        assert_eq!(items, vec![1, 2]);
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn test_from_receiver_released_when_dropped() {
        let (tx, rx) = mpsc::channel::<u8>(1);
        let stream = Stream::from_receiver(rx);
        drop(stream);

        // The source task drops its receiver once it sees downstream is gone.
        tokio::time::timeout(Duration::from_secs(2), tx.closed())
            .await
            .expect("source task should exit after the stream is dropped");
    }

    #[tokio::test]
    async fn test_from_stream_limit_with_pending_tail() {
        let open_ended = tokio_stream::iter(vec![1, 2]).chain(futures::stream::pending());
        let items = tokio::time::timeout(
            Duration::from_secs(2),
            Stream::from_stream(open_ended).limit(2).collect(),
        )
        .await
        .expect("limit should end the pipeline on a pending stream")
        .unwrap();
        assert_eq!(items, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_from_stream_released_when_dropped() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let guard = DropFlag(dropped.clone());
        let pending = futures::stream::pending::<u8>().map(move |x| {
            let _held = &guard;
            x
        });
        drop(Stream::from_stream(pending));

        tokio::time::timeout(Duration::from_secs(2), async {
            while dropped.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("source task should drop its stream after the handle is dropped");
    }

    struct DropFlag(Arc<AtomicUsize>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_concat_released_when_side_never_ends() {
        let (tx, rx) = mpsc::channel::<u8>(1);
        let stream = Stream::concat(Stream::from_receiver(rx), Stream::from_vec(vec![1]));
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(stream);

        tokio::time::timeout(Duration::from_secs(2), tx.closed())
            .await
            .expect("concat should let go of its sides once dropped");
    }

    #[tokio::test]
    async fn test_from_stream() {
        let items = Stream::from_stream(tokio_stream::iter(vec![5, 6]))
            .collect()
            .await
            .unwrap();
        assert_eq!(items, vec![5, 6]);
    }

    #[tokio::test]
    async fn test_builder_parent_token_cancels_pipeline() {
        let shutdown = CancellationToken::new();
        let stream = SourceBuilder::default()
            .cancel_with(&shutdown)
            .generate(|| 1u8);

        shutdown.cancel();
        assert!(matches!(stream.collect().await, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_builder_child_token_leaves_parent_alone() {
        let shutdown = CancellationToken::new();
        let first = SourceBuilder::default()
            .cancel_with(&shutdown)
            .generate(|| 1u8)
            .first()
            .await
            .unwrap();

        assert_eq!(first, Some(1));
        assert!(!shutdown.is_cancelled());
    }
}
