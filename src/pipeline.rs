//! Pipeline composition.
//!
//! A [`Stream`] is the handle to the last link of a chain of running tasks:
//! one task per source and per stage, linked by handoff channels. The handle
//! owns the receiving end of the final channel, the join handles of every task
//! upstream of it, the pipeline's cancellation token and its configuration.
//! It is consumed by value by every stage and terminal operator, so a chain
//! can only ever be read once.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{self, HandoffReceiver, HandoffSender};
use crate::error::{Error, Result};
use crate::util::panic_message;

/// Configuration shared by every task of a pipeline.
///
/// Built once when the source is created and never changed afterwards; every
/// stage derived from that source sees the same values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreamConfig {
    /// Number of elements buffered between two stages; 0 means rendezvous
    pub buffer_size: usize,
    /// Prefix for stage names in logs and fault reports
    pub label: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: 0,
            label: "stream".to_string(),
        }
    }
}

impl StreamConfig {
    /// Set the buffer size
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the label
    pub fn label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = label.into();
        self
    }
}

#[derive(Clone)]
pub(crate) struct PipelineContext {
    pub(crate) token: CancellationToken,
    pub(crate) config: Arc<StreamConfig>,
}

impl PipelineContext {
    pub(crate) fn new(config: StreamConfig, token: CancellationToken) -> Self {
        Self {
            token,
            config: Arc::new(config),
        }
    }

    fn stage_name(&self, op: &str, depth: usize) -> String {
        format!("{}.{}#{}", self.config.label, op, depth)
    }
}

struct StageTask {
    name: String,
    handle: JoinHandle<Result<()>>,
}

/// The join handles of every task feeding a stream.
#[derive(Default)]
pub(crate) struct TaskSet {
    tasks: Vec<StageTask>,
}

impl TaskSet {
    fn push(&mut self, name: String, handle: JoinHandle<Result<()>>) {
        self.tasks.push(StageTask { name, handle });
    }

    fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every task and report what went wrong, upstream first.
    ///
    /// Cancellation is how abandoned pipelines wind down, so it is not a fault.
    pub(crate) async fn join(&mut self) -> Result<()> {
        let tasks = std::mem::take(&mut self.tasks);
        let names: Vec<String> = tasks.iter().map(|t| t.name.clone()).collect();
        let results = futures::future::join_all(tasks.into_iter().map(|t| t.handle)).await;

        let mut errors = Vec::new();
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(Ok(())) | Ok(Err(Error::Cancelled)) => {}
                Ok(Err(e)) => {
                    tracing::warn!("stage '{}' failed: {}", name, e);
                    errors.push(e);
                }
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    tracing::warn!("stage '{}' panicked: {}", name, message);
                    errors.push(Error::stage_fault(name, message));
                }
                Err(e) => {
                    tracing::debug!("stage '{}' was aborted: {}", name, e);
                }
            }
        }

        match Error::aggregate(errors) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Receiving side of a stage, bound to the pipeline's cancellation token.
pub(crate) struct Inlet<T> {
    rx: HandoffReceiver<T>,
    token: CancellationToken,
}

impl<T> Inlet<T> {
    /// Next upstream element; `None` once upstream closed or the pipeline was cancelled.
    pub(crate) async fn pull(&mut self) -> Option<T> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            item = self.rx.recv() => item,
        }
    }
}

/// Sending side of a stage. Dropping it closes the stage's output.
pub(crate) struct Outlet<T> {
    tx: HandoffSender<T>,
    token: CancellationToken,
    stage: String,
    #[cfg(feature = "metrics")]
    emitted: metrics::Counter,
}

impl<T> Outlet<T> {
    /// Hand an element downstream. Returns false when the stage should stop:
    /// downstream is gone or the pipeline was cancelled.
    pub(crate) async fn emit(&self, item: T) -> bool {
        let delivered = tokio::select! {
            biased;
            _ = self.token.cancelled() => false,
            sent = self.tx.send(item) => sent.is_ok(),
        };

        #[cfg(feature = "metrics")]
        if delivered {
            self.emitted.increment(1);
        }

        if !delivered {
            tracing::trace!("stage '{}': downstream gone", self.stage);
        }
        delivered
    }

    /// Resolves once downstream is gone.
    pub(crate) async fn closed(&self) {
        self.tx.closed().await
    }

    pub(crate) fn stage(&self) -> &str {
        &self.stage
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// A lazily evaluated, single-pass sequence of `T`.
///
/// Sources ([`Stream::from_vec`], [`Stream::generate`], ...) and stages
/// ([`Stream::map`], [`Stream::filter`], ...) each start one task and return
/// immediately. Terminal operators ([`Stream::collect`], [`Stream::reduce`],
/// ...) drive the chain and return plain values.
///
/// Besides the inherent API the handle implements
/// [`futures_core::Stream`]; that view ends silently on faults, so prefer
/// [`Stream::next`] when stage panics must be observed.
pub struct Stream<T> {
    pub(crate) rx: HandoffReceiver<T>,
    pub(crate) tasks: TaskSet,
    pub(crate) ctx: PipelineContext,
    pub(crate) depth: usize,
    pub(crate) exhausted: bool,
}

impl<T: Send + 'static> Stream<T> {
    /// Start a source task with the given context.
    pub(crate) fn source<F, Fut>(ctx: PipelineContext, op: &str, body: F) -> Self
    where
        F: FnOnce(Outlet<T>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::launch(ctx, TaskSet::default(), 0, false, op, body)
    }

    /// Start a stage task reading from this stream.
    pub(crate) fn pipe<U, F, Fut>(self, op: &str, body: F) -> Stream<U>
    where
        U: Send + 'static,
        F: FnOnce(Inlet<T>, Outlet<U>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let Stream {
            rx,
            tasks,
            ctx,
            depth,
            exhausted,
        } = self;
        let inlet = Inlet {
            rx,
            token: ctx.token.clone(),
        };
        Stream::launch(ctx, tasks, depth + 1, exhausted, op, move |outlet| {
            body(inlet, outlet)
        })
    }

    fn launch<F, Fut>(
        ctx: PipelineContext,
        mut tasks: TaskSet,
        depth: usize,
        exhausted: bool,
        op: &str,
        body: F,
    ) -> Self
    where
        F: FnOnce(Outlet<T>) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, rx) = channel::channel(ctx.config.buffer_size);
        let name = ctx.stage_name(op, depth);
        let outlet = Outlet {
            tx,
            token: ctx.token.clone(),
            stage: name.clone(),
            #[cfg(feature = "metrics")]
            emitted: metrics::counter!("sluice_stage_elements_total", "stage" => name.clone()),
        };

        let work = body(outlet);
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            tracing::debug!("stage '{}' started", task_name);
            let result = work.await;
            tracing::debug!("stage '{}' finished", task_name);
            result
        });
        tasks.push(name, handle);

        Stream {
            rx,
            tasks,
            ctx,
            depth,
            exhausted,
        }
    }

    /// Pull the next element.
    ///
    /// Returns `Ok(None)` exactly once, at the end of the sequence, after
    /// every task feeding this stream has been joined; a stage that panicked
    /// or failed is reported instead. Pulling again afterwards fails with
    /// [`Error::AlreadyConsumed`]. If the pipeline is cancelled while waiting
    /// the result is [`Error::Cancelled`].
    pub async fn next(&mut self) -> Result<Option<T>> {
        if self.exhausted {
            return Err(Error::AlreadyConsumed);
        }

        let token = self.ctx.token.clone();
        let received = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            item = self.rx.recv() => Some(item),
        };

        match received {
            None => {
                tracing::debug!("pipeline '{}' cancelled", self.ctx.config.label);
                Err(Error::Cancelled)
            }
            Some(Some(item)) => Ok(Some(item)),
            Some(None) => {
                self.exhausted = true;
                self.tasks.join().await?;
                Ok(None)
            }
        }
    }

    /// Stop reading: cancel the pipeline, release upstream and join its tasks.
    pub(crate) async fn abandon(self) -> Result<()> {
        let Stream {
            rx, mut tasks, ctx, ..
        } = self;
        ctx.token.cancel();
        drop(rx);
        tasks.join().await
    }
}

impl<T> Stream<T> {
    /// Cancel every task of this pipeline.
    ///
    /// Blocked sends and receives return at once; a pending terminal
    /// operator fails with [`Error::Cancelled`].
    pub fn cancel(&self) {
        self.ctx.token.cancel();
    }

    /// Whether the pipeline has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.ctx.token.is_cancelled()
    }

    /// A handle that cancels this pipeline from elsewhere.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.token.clone()
    }

    /// The configuration this pipeline was built with.
    pub fn config(&self) -> &StreamConfig {
        &self.ctx.config
    }

    /// Whether the end of the sequence has already been reported.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("label", &self.ctx.config.label)
            .field("depth", &self.depth)
            .field("tasks", &self.tasks.len())
            .field("exhausted", &self.exhausted)
            .field("cancelled", &self.ctx.token.is_cancelled())
            .finish()
    }
}

impl<T> futures_core::Stream for Stream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        if this.exhausted || this.ctx.token.is_cancelled() {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(None) => {
                this.exhausted = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}
