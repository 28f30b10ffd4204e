//! Core traits for stream pipelines.
//!
//! [`Processor`] is the unit of work a stage task runs, [`Sink`] receives the
//! elements a terminal drain hands out, and [`Numeric`] is the capability the
//! numeric aggregates need from an element or from a key accessor's result.

use crate::error::Result;
use async_trait::async_trait;

/// A processor transforms items for one stage of a pipeline.
///
/// Each call to [`Stream::through`](crate::Stream::through) spawns one task
/// that feeds upstream elements into `process` and hands every returned
/// output downstream, in order.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use sluice::error::Result;
/// use sluice::traits::Processor;
///
/// struct DoubleProcessor;
///
/// #[async_trait]
/// impl Processor for DoubleProcessor {
///     type Input = i32;
///     type Output = i32;
///
///     async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>> {
///         Ok(vec![item * 2])
///     }
/// }
/// ```
#[async_trait]
pub trait Processor {
    /// The type of items this processor accepts
    type Input: Send + 'static;
    /// The type of items this processor produces
    type Output: Send + 'static;

    /// Process an input item and produce zero or more output items.
    ///
    /// Returning an empty Vec means the item was consumed but produced no output.
    async fn process(&mut self, item: Self::Input) -> Result<Vec<Self::Output>>;

    /// Whether the processor will accept no further input.
    ///
    /// Checked before every pull from upstream. Once it returns true the stage
    /// drops its upstream link and closes its output.
    fn is_done(&self) -> bool {
        false
    }

    /// Called when upstream is exhausted, allowing final output generation.
    async fn finish(&mut self) -> Result<Vec<Self::Output>> {
        Ok(vec![])
    }
}

/// A sink accepts the elements drained by [`Stream::sink`](crate::Stream::sink).
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use sluice::error::Result;
/// use sluice::traits::Sink;
///
/// struct LogSink;
///
/// #[async_trait]
/// impl Sink for LogSink {
///     type Item = String;
///
///     async fn write(&mut self, item: Self::Item) -> Result<()> {
///         println!("Logged: {}", item);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Sink {
    /// The type of items this sink accepts
    type Item: Send + 'static;

    /// Accept a single item.
    async fn write(&mut self, item: Self::Item) -> Result<()>;

    /// Called when the stream is exhausted.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<S: Sink + Send + ?Sized> Sink for &mut S {
    type Item = S::Item;

    async fn write(&mut self, item: Self::Item) -> Result<()> {
        (**self).write(item).await
    }

    async fn finish(&mut self) -> Result<()> {
        (**self).finish().await
    }
}

/// A value that can take part in numeric aggregates.
///
/// Implemented for the primitive integer and float types. Record types opt in
/// either by implementing this trait or, more commonly, by handing the
/// `*_by` aggregates an accessor that returns one of their numeric fields.
///
/// Values are converted with `as f64`, so 64- and 128-bit integers above
/// 2^53 in magnitude are rounded to the nearest representable float. Sums,
/// bounds and averages over such values are approximate.
pub trait Numeric {
    fn to_f64(&self) -> f64;
}

macro_rules! impl_numeric {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Numeric for $ty {
                #[inline]
                fn to_f64(&self) -> f64 {
                    *self as f64
                }
            }
        )*
    };
}

impl_numeric!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl<N: Numeric + ?Sized> Numeric for &N {
    fn to_f64(&self) -> f64 {
        (**self).to_f64()
    }
}
