//! Terminal operators.
//!
//! A terminal operator takes the [`Stream`] by value, drives the whole chain
//! and returns a plain value. Operators that only need part of the sequence
//! (`first`, the `*_match` family, `contains`) cancel the pipeline once the
//! answer is known, so even an infinite source winds down. Every operator
//! joins the pipeline's tasks before returning, and a stage fault wins over
//! whatever value was computed.
//!
//! Empty sequences: `min`, `max`, `avg`, `range`, `first` and `last` give
//! `None`; `sum` gives `0.0`; `count` gives `0`.

use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use std::ops::ControlFlow;

use crate::error::{Error, Result};
use crate::pipeline::Stream;
use crate::traits::{Numeric, Sink};
use crate::util::sink_from_fn;

impl<T: Send + 'static> Stream<T> {
    /// Feed elements to `f` until it breaks or the sequence ends.
    async fn drain_until<F>(mut self, mut f: F) -> Result<()>
    where
        F: FnMut(T) -> ControlFlow<()>,
    {
        while let Some(item) = self.next().await? {
            if f(item).is_break() {
                return self.abandon().await;
            }
        }
        Ok(())
    }

    /// Drain every element into a vector, in order.
    pub async fn collect(self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        self.drain_until(|item| {
            items.push(item);
            ControlFlow::Continue(())
        })
        .await?;
        Ok(items)
    }

    /// Same as [`Stream::collect`].
    pub async fn to_vec(self) -> Result<Vec<T>> {
        self.collect().await
    }

    /// Left fold with an accumulator of the element type.
    pub async fn reduce<F>(self, initial: T, f: F) -> Result<T>
    where
        F: FnMut(T, T) -> T,
    {
        self.fold(initial, f).await
    }

    /// Left fold with an accumulator of any type.
    pub async fn fold<A, F>(mut self, initial: A, mut f: F) -> Result<A>
    where
        F: FnMut(A, T) -> A,
    {
        let mut acc = initial;
        while let Some(item) = self.next().await? {
            acc = f(acc, item);
        }
        Ok(acc)
    }

    /// Group elements by key; each group keeps arrival order.
    pub async fn group_by<K, F>(self, mut key: F) -> Result<HashMap<K, Vec<T>>>
    where
        K: Eq + Hash,
        F: FnMut(&T) -> K,
    {
        let mut groups: HashMap<K, Vec<T>> = HashMap::new();
        self.drain_until(|item| {
            groups.entry(key(&item)).or_default().push(item);
            ControlFlow::Continue(())
        })
        .await?;
        Ok(groups)
    }

    /// Index elements by key; a later element replaces an earlier one with the same key.
    pub async fn to_map<K, F>(self, mut key: F) -> Result<HashMap<K, T>>
    where
        K: Eq + Hash,
        F: FnMut(&T) -> K,
    {
        let mut map = HashMap::new();
        self.drain_until(|item| {
            map.insert(key(&item), item);
            ControlFlow::Continue(())
        })
        .await?;
        Ok(map)
    }

    /// Materialize, stable-sort with `compare`, and continue as a new stream.
    pub async fn sort_by<F>(self, compare: F) -> Result<Stream<T>>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        self.rearrange("sort", |items| items.sort_by(compare)).await
    }

    /// Materialize, stable-sort by a key, and continue as a new stream.
    pub async fn sort_by_key<K, F>(self, key: F) -> Result<Stream<T>>
    where
        K: Ord,
        F: FnMut(&T) -> K,
    {
        self.rearrange("sort", |items| items.sort_by_key(key)).await
    }

    /// Materialize, stable-sort in natural order, and continue as a new stream.
    pub async fn sort(self) -> Result<Stream<T>>
    where
        T: Ord,
    {
        self.rearrange("sort", |items| items.sort()).await
    }

    /// Materialize, reverse, and continue as a new stream.
    pub async fn reverse(self) -> Result<Stream<T>> {
        self.rearrange("reverse", |items| items.reverse()).await
    }

    /// Continue with `n` elements picked uniformly at random without
    /// replacement, in random order. Asking for more than there are returns
    /// all of them.
    pub async fn random(self, n: usize) -> Result<Stream<T>> {
        self.rearrange("random", |items| pick(items, n, &mut rand::thread_rng()))
            .await
    }

    /// Like [`Stream::random`] with a caller-supplied generator.
    pub async fn random_with<R>(self, n: usize, rng: &mut R) -> Result<Stream<T>>
    where
        R: Rng + ?Sized,
    {
        self.rearrange("random", |items| pick(items, n, rng)).await
    }

    /// Continue with every element in random order.
    pub async fn shuffle(self) -> Result<Stream<T>> {
        self.random(usize::MAX).await
    }

    async fn rearrange<F>(self, op: &str, f: F) -> Result<Stream<T>>
    where
        F: FnOnce(&mut Vec<T>),
    {
        let ctx = self.ctx.clone();
        let mut items = self.collect().await?;
        f(&mut items);
        Ok(Stream::replay(ctx, op, items))
    }

    /// Sum of all elements.
    pub async fn sum(self) -> Result<f64>
    where
        T: Numeric,
    {
        self.sum_by(|x| x.to_f64()).await
    }

    /// Sum of `value(x)` over all elements.
    pub async fn sum_by<N, F>(self, mut value: F) -> Result<f64>
    where
        N: Numeric,
        F: FnMut(&T) -> N,
    {
        self.fold(0.0, |acc, x| acc + value(&x).to_f64()).await
    }

    /// Smallest element, `None` when empty.
    pub async fn min(self) -> Result<Option<f64>>
    where
        T: Numeric,
    {
        self.min_by(|x| x.to_f64()).await
    }

    /// Smallest `value(x)`, `None` when empty.
    pub async fn min_by<N, F>(self, value: F) -> Result<Option<f64>>
    where
        N: Numeric,
        F: FnMut(&T) -> N,
    {
        Ok(self.bounds_by(value).await?.map(|(lo, _)| lo))
    }

    /// Largest element, `None` when empty.
    pub async fn max(self) -> Result<Option<f64>>
    where
        T: Numeric,
    {
        self.max_by(|x| x.to_f64()).await
    }

    /// Largest `value(x)`, `None` when empty.
    pub async fn max_by<N, F>(self, value: F) -> Result<Option<f64>>
    where
        N: Numeric,
        F: FnMut(&T) -> N,
    {
        Ok(self.bounds_by(value).await?.map(|(_, hi)| hi))
    }

    /// Largest minus smallest element, `None` when empty.
    pub async fn range(self) -> Result<Option<f64>>
    where
        T: Numeric,
    {
        self.range_by(|x| x.to_f64()).await
    }

    /// Largest minus smallest `value(x)`, `None` when empty.
    pub async fn range_by<N, F>(self, value: F) -> Result<Option<f64>>
    where
        N: Numeric,
        F: FnMut(&T) -> N,
    {
        Ok(self.bounds_by(value).await?.map(|(lo, hi)| hi - lo))
    }

    /// Arithmetic mean of all elements, `None` when empty.
    pub async fn avg(self) -> Result<Option<f64>>
    where
        T: Numeric,
    {
        self.avg_by(|x| x.to_f64()).await
    }

    /// Arithmetic mean of `value(x)`, `None` when empty.
    pub async fn avg_by<N, F>(self, mut value: F) -> Result<Option<f64>>
    where
        N: Numeric,
        F: FnMut(&T) -> N,
    {
        let (sum, count) = self
            .fold((0.0, 0usize), |(sum, count), x| {
                (sum + value(&x).to_f64(), count + 1)
            })
            .await?;
        Ok((count > 0).then(|| sum / count as f64))
    }

    async fn bounds_by<N, F>(self, mut value: F) -> Result<Option<(f64, f64)>>
    where
        N: Numeric,
        F: FnMut(&T) -> N,
    {
        self.fold(None, |bounds: Option<(f64, f64)>, x| {
            let v = value(&x).to_f64();
            Some(match bounds {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            })
        })
        .await
    }

    /// The first element; upstream is released right after it.
    pub async fn first(mut self) -> Result<Option<T>> {
        let item = self.next().await?;
        if item.is_some() {
            self.abandon().await?;
        }
        Ok(item)
    }

    /// The last element. Reads the whole sequence.
    pub async fn last(self) -> Result<Option<T>> {
        let mut last = None;
        self.drain_until(|item| {
            last = Some(item);
            ControlFlow::Continue(())
        })
        .await?;
        Ok(last)
    }

    /// Split into groups of `size` in arrival order; the final group may be shorter.
    pub async fn chunk(self, size: usize) -> Result<Vec<Vec<T>>> {
        if size == 0 {
            return Err(Error::invalid_argument("chunk size must be greater than zero"));
        }

        let mut chunks = Vec::new();
        let mut current = Vec::with_capacity(size);
        self.drain_until(|item| {
            current.push(item);
            if current.len() == size {
                chunks.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
            }
            ControlFlow::Continue(())
        })
        .await?;

        if !current.is_empty() {
            chunks.push(current);
        }
        Ok(chunks)
    }

    /// Number of elements.
    pub async fn count(self) -> Result<usize> {
        self.fold(0, |n, _| n + 1).await
    }

    /// Whether every element satisfies `predicate`; stops at the first that does not.
    pub async fn all_match<F>(self, mut predicate: F) -> Result<bool>
    where
        F: FnMut(&T) -> bool,
    {
        Ok(!self.any_match(|x| !predicate(x)).await?)
    }

    /// Whether any element satisfies `predicate`; stops at the first that does.
    pub async fn any_match<F>(self, mut predicate: F) -> Result<bool>
    where
        F: FnMut(&T) -> bool,
    {
        let mut found = false;
        self.drain_until(|item| {
            if predicate(&item) {
                found = true;
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;
        Ok(found)
    }

    /// Whether no element satisfies `predicate`.
    pub async fn none_match<F>(self, predicate: F) -> Result<bool>
    where
        F: FnMut(&T) -> bool,
    {
        Ok(!self.any_match(predicate).await?)
    }

    /// Whether some element equals `value`.
    pub async fn contains(self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.any_match(|x| x == value).await
    }

    /// Call `f` with every element.
    pub async fn for_each<F>(self, mut f: F) -> Result<()>
    where
        F: FnMut(T) + Send,
    {
        self.sink(sink_from_fn(move |item: T| {
            f(item);
            futures::future::ready(Ok(()))
        }))
        .await
    }

    /// Write every element to `sink`, then finish it.
    ///
    /// A failing write stops the pipeline. Failures from `write` and `finish`
    /// are reported as [`Error::Sink`]; one that already is a sink error is
    /// passed on unchanged.
    pub async fn sink<S>(mut self, mut sink: S) -> Result<()>
    where
        S: Sink<Item = T> + Send,
    {
        while let Some(item) = self.next().await? {
            if let Err(e) = sink.write(item).await {
                tracing::warn!("sink for '{}' failed: {}", self.ctx.config.label, e);
                self.abandon().await?;
                return Err(sink_error(e));
            }
        }
        sink.finish().await.map_err(sink_error)
    }
}

fn sink_error(error: Error) -> Error {
    match error {
        Error::Sink(_) | Error::Cancelled => error,
        other => Error::sink(other),
    }
}

fn pick<T, R: Rng + ?Sized>(items: &mut Vec<T>, n: usize, rng: &mut R) {
    items.shuffle(rng);
    items.truncate(n);
}
