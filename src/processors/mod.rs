//! Stage implementations.
//!
//! Every stage is a [`Processor`] run by its own task: the task pulls one
//! element from upstream, hands it to the processor and forwards whatever
//! comes back, in order, before pulling the next one.

use async_trait::async_trait;
use std::collections::HashSet;
use std::hash::Hash;

use crate::error::{Error, Result};
use crate::pipeline::Stream;
use crate::traits::Processor;

/// A processor that maps items using a function.
pub struct MapProcessor<F, T, U> {
    f: F,
    _phantom: std::marker::PhantomData<(T, U)>,
}

impl<F, T, U> MapProcessor<F, T, U> {
    /// Create a new map processor
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, U> Processor for MapProcessor<F, T, U>
where
    F: FnMut(T) -> U + Send + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    type Input = T;
    type Output = U;

    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        Ok(vec![(self.f)(item)])
    }
}

/// A processor that expands each item into any number of items.
pub struct FlatMapProcessor<F, T, I> {
    f: F,
    _phantom: std::marker::PhantomData<(T, fn() -> I)>,
}

impl<F, T, I> FlatMapProcessor<F, T, I> {
    /// Create a new flat-map processor
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, I> Processor for FlatMapProcessor<F, T, I>
where
    F: FnMut(T) -> I + Send + 'static,
    I: IntoIterator,
    I::Item: Send + 'static,
    T: Send + 'static,
{
    type Input = T;
    type Output = I::Item;

    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        Ok((self.f)(item).into_iter().collect())
    }
}

/// A processor that filters items using a predicate.
pub struct FilterProcessor<F, T> {
    predicate: F,
    _phantom: std::marker::PhantomData<T>,
}

impl<F, T> FilterProcessor<F, T> {
    /// Create a new filter processor
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> Processor for FilterProcessor<F, T>
where
    F: FnMut(&T) -> bool + Send + 'static,
    T: Send + 'static,
{
    type Input = T;
    type Output = T;

    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        if (self.predicate)(&item) {
            Ok(vec![item])
        } else {
            Ok(vec![])
        }
    }
}

/// A processor that observes items and passes them through unchanged.
pub struct PeekProcessor<F, T> {
    f: F,
    _phantom: std::marker::PhantomData<T>,
}

impl<F, T> PeekProcessor<F, T> {
    /// Create a new peek processor
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> Processor for PeekProcessor<F, T>
where
    F: FnMut(&T) + Send + 'static,
    T: Send + 'static,
{
    type Input = T;
    type Output = T;

    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        (self.f)(&item);
        Ok(vec![item])
    }
}

/// A processor that passes only the first item seen for every key.
///
/// Keys seen so far are kept for the life of the stage.
pub struct DistinctProcessor<F, T, K> {
    key: F,
    seen: HashSet<K>,
    _phantom: std::marker::PhantomData<T>,
}

impl<F, T, K> DistinctProcessor<F, T, K> {
    /// Create a new distinct processor
    pub fn new(key: F) -> Self {
        Self {
            key,
            seen: HashSet::new(),
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, K> Processor for DistinctProcessor<F, T, K>
where
    F: FnMut(&T) -> K + Send + 'static,
    T: Send + 'static,
    K: Eq + Hash + Send + 'static,
{
    type Input = T;
    type Output = T;

    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        if self.seen.insert((self.key)(&item)) {
            Ok(vec![item])
        } else {
            Ok(vec![])
        }
    }
}

/// A processor that takes only the first N items
pub struct TakeProcessor<T> {
    remaining: usize,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> TakeProcessor<T> {
    /// Create a new take processor
    pub fn new(count: usize) -> Self {
        Self {
            remaining: count,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Processor for TakeProcessor<T> {
    type Input = T;
    type Output = T;

    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        if self.remaining > 0 {
            self.remaining -= 1;
            Ok(vec![item])
        } else {
            Ok(vec![])
        }
    }

    fn is_done(&self) -> bool {
        self.remaining == 0
    }
}

/// A processor that skips the first N items
pub struct SkipProcessor<T> {
    remaining: usize,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> SkipProcessor<T> {
    /// Create a new skip processor
    pub fn new(count: usize) -> Self {
        Self {
            remaining: count,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Processor for SkipProcessor<T> {
    type Input = T;
    type Output = T;

    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
        if self.remaining > 0 {
            self.remaining -= 1;
            Ok(vec![])
        } else {
            Ok(vec![item])
        }
    }
}

/// Wrap a failure reported by a processor, leaving one that is already
/// classified untouched.
fn processor_error(error: Error) -> Error {
    match error {
        Error::Processor(_) | Error::Cancelled => error,
        other => Error::processor(other),
    }
}

impl<T: Send + 'static> Stream<T> {
    /// Run `processor` as a new stage.
    pub fn through<P>(self, processor: P) -> Stream<P::Output>
    where
        P: Processor<Input = T> + Send + 'static,
    {
        self.run_stage("through", processor)
    }

    fn run_stage<P>(self, op: &str, mut processor: P) -> Stream<P::Output>
    where
        P: Processor<Input = T> + Send + 'static,
    {
        self.pipe(op, move |mut inlet, outlet| async move {
            loop {
                if processor.is_done() {
                    tracing::trace!("stage '{}' needs no more input", outlet.stage());
                    return Ok(());
                }
                let Some(item) = inlet.pull().await else {
                    break;
                };
                let outputs = processor.process(item).await.map_err(processor_error)?;
                if outputs.is_empty() {
                    tracing::trace!("stage '{}' dropped an item", outlet.stage());
                }
                for output in outputs {
                    if !outlet.emit(output).await {
                        return Ok(());
                    }
                }
            }

            for output in processor.finish().await.map_err(processor_error)? {
                if !outlet.emit(output).await {
                    break;
                }
            }
            Ok(())
        })
    }

    /// Emit `f(x)` for every element.
    pub fn map<U, F>(self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        self.run_stage("map", MapProcessor::<F, T, U>::new(f))
    }

    /// Emit every element of `f(x)`, in order, for every element.
    pub fn flat_map<I, F>(self, f: F) -> Stream<I::Item>
    where
        I: IntoIterator + 'static,
        I::Item: Send + 'static,
        F: FnMut(T) -> I + Send + 'static,
    {
        self.run_stage("flat_map", FlatMapProcessor::<F, T, I>::new(f))
    }

    /// Emit only the elements for which `predicate` holds.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        self.run_stage("filter", FilterProcessor::<F, T>::new(predicate))
    }

    /// Call `f` on every element and pass it on unchanged.
    pub fn peek<F>(self, f: F) -> Self
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.run_stage("peek", PeekProcessor::<F, T>::new(f))
    }

    /// Emit the first element seen for every key, dropping later duplicates.
    pub fn distinct_by<K, F>(self, key: F) -> Self
    where
        K: Eq + Hash + Send + 'static,
        F: FnMut(&T) -> K + Send + 'static,
    {
        self.run_stage("distinct_by", DistinctProcessor::<F, T, K>::new(key))
    }

    /// Emit each distinct element once, in first-seen order.
    pub fn distinct(self) -> Self
    where
        T: Eq + Hash + Clone,
    {
        self.run_stage("distinct", DistinctProcessor::<_, T, T>::new(T::clone))
    }

    /// Emit at most the first `n` elements.
    ///
    /// After the n-th element the stage stops reading, which releases an
    /// unbounded upstream such as [`Stream::generate`].
    pub fn limit(self, n: usize) -> Self {
        self.run_stage("limit", TakeProcessor::<T>::new(n))
    }

    /// Drop the first `n` elements and emit the rest.
    pub fn skip(self, n: usize) -> Self {
        self.run_stage("skip", SkipProcessor::<T>::new(n))
    }
}
