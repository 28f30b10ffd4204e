//! Utility functions and helper types.

use async_trait::async_trait;
use std::any::Any;
use std::future::Future;

use crate::error::Result;
use crate::traits::Sink;

/// Helper function to create a sink from a function
pub fn sink_from_fn<F, Fut, T>(f: F) -> FnSink<F, Fut, T>
where
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
    T: Send + 'static,
{
    FnSink {
        f,
        _phantom: std::marker::PhantomData,
    }
}

/// A sink created from a function
pub struct FnSink<F, Fut, T>
where
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
    T: Send + 'static,
{
    pub f: F,
    _phantom: std::marker::PhantomData<fn(T) -> Fut>,
}

#[async_trait]
impl<F, Fut, T> Sink for FnSink<F, Fut, T>
where
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send,
    T: Send + 'static,
{
    type Item = T;

    async fn write(&mut self, item: Self::Item) -> Result<()> {
        (self.f)(item).await
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
