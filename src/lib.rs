//! # Lazy, concurrently evaluated stream pipelines
//!
//! `sluice` builds pipelines out of a source, any number of intermediate
//! stages and one terminal operator. Every source and every stage runs as its
//! own task; neighbouring tasks hand elements over through a channel that, by
//! default, has no buffer at all, so a producer never runs more than one
//! element ahead of its reader.
//!
//! ## Core Concepts
//!
//! - **Source**: starts a pipeline ([`Stream::from_vec`], [`Stream::generate`], ...)
//! - **Stage**: transforms elements in flight ([`Stream::map`], [`Stream::filter`], ...)
//! - **Terminal**: drives the pipeline and returns a value ([`Stream::collect`], [`Stream::reduce`], ...)
//! - **Cancellation**: one token per pipeline stops every task at once
//!
//! Nothing runs until elements are pulled, and dropping a [`Stream`] or
//! cancelling it releases every task behind it.
//!
//! ## Example
//!
//! ```rust
//! use sluice::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let evens = Stream::iter(1..=10)
//!         .filter(|x| x % 2 == 0)
//!         .map(|x| x * x)
//!         .collect()
//!         .await?;
//!     assert_eq!(evens, vec![4, 16, 36, 64, 100]);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod error;
pub mod pipeline;
pub mod processors;
pub mod sinks;
pub mod sources;
pub mod traits;
pub mod util;

// Re-export commonly used items
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::pipeline::{Stream, StreamConfig};
    pub use crate::processors::*;
    pub use crate::sources::SourceBuilder;
    pub use crate::traits::{Numeric, Processor, Sink};
    pub use crate::util::sink_from_fn;
}

pub use error::{Error, Result};
pub use pipeline::{Stream, StreamConfig};
pub use sources::SourceBuilder;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
