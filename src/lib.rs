//! # Snapfold
//!
//! A race-free adapter that folds asynchronous sources into immutable
//! snapshots.
//!
//! ## Core Concepts
//!
//! - **Snapshot**: connection phase plus at most one of data or error
//! - **Fold engine**: lifecycle events folded into an evolving accumulator
//! - **Sources**: one-shot completions and multi-valued event streams
//! - **Binding**: mount/update/unmount lifecycle with exactly-once,
//!   race-free event delivery across source swaps
//!
//! ## Example
//!
//! ```ignore
//! use snapfold::{Deferred, OneShotSource, SnapshotFold, Source, SourceBinding};
//! use std::sync::Arc;
//!
//! let deferred: Deferred<String, String> = Deferred::new();
//! let binding = SourceBinding::new(SnapshotFold::new(), |snap| {
//!     println!("{:?}: {:?}", snap.phase(), snap.data());
//! });
//!
//! let source = Arc::new(deferred.clone()) as Arc<dyn OneShotSource<_, _>>;
//! binding.mount(Some(Source::one_shot(source)));
//!
//! // Renders (done, "hello") when the producer side completes.
//! deferred.resolve("hello".to_string());
//! ```

pub mod binding;
pub mod error;
pub mod fold;
pub mod sources;
pub mod types;

// Re-exports
pub use binding::{RenderFn, SourceBinding};
pub use error::SnapshotError;
pub use fold::{FoldEngine, FoldSpec, SnapshotFold};
pub use sources::{
    CancelHandle, CompletionFn, Deferred, EventHub, HubHandle, Observer, OneShotSource, Source,
    StreamSource,
};
pub use types::{ConnectionPhase, Snapshot};
