//! Source boundary: capability traits and the attachable source variants.
//!
//! Concrete producers live behind two small traits. A one-shot source can
//! only register a completion continuation (it has no cancellation
//! primitive); a stream source yields a cancellable handle. [`Source`] is
//! the closed set of attachable variants, compared by reference identity so
//! the binding can tell a swap from a re-presentation of the same producer.
//!
//! Two reference implementations ship with the crate:
//! - [`Deferred`]: a completable one-shot cell
//! - [`EventHub`]: a multi-subscriber broadcast stream

mod deferred;
mod hub;

pub use deferred::Deferred;
pub use hub::{EventHub, HubHandle};

use std::fmt;
use std::sync::Arc;

/// Continuation for a one-shot source: called with the value or the error,
/// at most once, possibly never.
pub type CompletionFn<T, E> = Box<dyn FnOnce(Result<T, E>) + Send>;

/// A producer that yields at most one value or one error, then terminates.
///
/// There is no way to unregister the continuation once handed over;
/// consumers defend against stale completions instead (see the binding's
/// generation check).
pub trait OneShotSource<T, E>: Send + Sync {
    /// Register the completion continuation.
    fn register(&self, on_complete: CompletionFn<T, E>);
}

/// Receiver half of a stream subscription.
pub trait Observer<T, E>: Send {
    /// A value event.
    fn on_data(&mut self, value: T);

    /// An error event. The stream stays open.
    fn on_error(&mut self, error: E);

    /// Normal completion. No further events follow.
    fn on_done(&mut self);
}

/// A producer that yields zero or more value/error events over time, then
/// optionally signals completion.
pub trait StreamSource<T, E>: Send + Sync {
    /// Open a subscription. Events flow to `observer` until the returned
    /// handle is cancelled or the stream completes.
    fn subscribe(&self, observer: Box<dyn Observer<T, E>>) -> Box<dyn CancelHandle>;
}

/// Handle to a live stream subscription.
pub trait CancelHandle: Send {
    /// Stop delivery. Idempotent; once this returns, no further events
    /// reach the observer.
    fn cancel(&mut self);
}

/// An attachable asynchronous source.
///
/// Clones share identity: two values denote the same subscription target iff
/// they point at the same producer allocation within the same variant.
pub enum Source<T, E> {
    /// One-shot completion.
    OneShot(Arc<dyn OneShotSource<T, E>>),
    /// Multi-valued event stream.
    Stream(Arc<dyn StreamSource<T, E>>),
}

impl<T, E> Source<T, E> {
    /// Wrap a one-shot producer.
    pub fn one_shot(source: Arc<dyn OneShotSource<T, E>>) -> Self {
        Source::OneShot(source)
    }

    /// Wrap a stream producer.
    pub fn stream(source: Arc<dyn StreamSource<T, E>>) -> Self {
        Source::Stream(source)
    }

    /// Reference identity: same allocation, same variant.
    pub fn same_identity(&self, other: &Self) -> bool {
        match (self, other) {
            (Source::OneShot(a), Source::OneShot(b)) => Arc::ptr_eq(a, b),
            (Source::Stream(a), Source::Stream(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T, E> Clone for Source<T, E> {
    fn clone(&self) -> Self {
        match self {
            Source::OneShot(source) => Source::OneShot(Arc::clone(source)),
            Source::Stream(source) => Source::Stream(Arc::clone(source)),
        }
    }
}

impl<T, E> fmt::Debug for Source<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::OneShot(source) => write!(f, "Source::OneShot({:p})", Arc::as_ptr(source)),
            Source::Stream(source) => write!(f, "Source::Stream({:p})", Arc::as_ptr(source)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_preserves_identity() {
        let deferred: Deferred<String, String> = Deferred::new();
        let source = Source::one_shot(Arc::new(deferred) as Arc<dyn OneShotSource<_, _>>);
        let clone = source.clone();
        assert!(source.same_identity(&clone));
    }

    #[test]
    fn test_distinct_producers_differ() {
        let a = Source::one_shot(
            Arc::new(Deferred::<String, String>::new()) as Arc<dyn OneShotSource<_, _>>
        );
        let b = Source::one_shot(
            Arc::new(Deferred::<String, String>::new()) as Arc<dyn OneShotSource<_, _>>
        );
        assert!(!a.same_identity(&b));
    }

    #[test]
    fn test_variants_never_identical() {
        let one_shot = Source::one_shot(
            Arc::new(Deferred::<String, String>::new()) as Arc<dyn OneShotSource<_, _>>
        );
        let stream =
            Source::stream(Arc::new(EventHub::<String, String>::new())
                as Arc<dyn StreamSource<_, _>>);
        assert!(!one_shot.same_identity(&stream));
    }
}
