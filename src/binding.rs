//! Lifecycle controller binding one asynchronous source to a fold engine.
//!
//! [`SourceBinding`] owns the accumulator (via [`FoldEngine`]), the identity
//! of the currently attached source, and the render callback. It guarantees
//! exactly-once, race-free folding of lifecycle events:
//!
//! - Swapping or removing a source retires the previous subscription's
//!   generation before anything else, so completions and stream events that
//!   were already in flight are discarded, never folded.
//! - One-shot sources have no cancellation primitive; the generation check
//!   alone retires them.
//! - Stream handles are cancelled on teardown, outside the state lock.
//! - The render callback fires after every transition that changes the
//!   accumulator, and only then.
//!
//! Folds are serialized under one lock: the fold and render for event N
//! complete before event N+1 is processed. The render callback runs under
//! that lock and therefore must not call back into the binding.

use crate::fold::{FoldEngine, FoldSpec};
use crate::sources::{CancelHandle, CompletionFn, Observer, OneShotSource, Source, StreamSource};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Render callback: pure function from accumulator to output.
pub type RenderFn<A, R> = Box<dyn FnMut(&A) -> R + Send>;

/// The currently attached source, plus per-instance bookkeeping.
enum ActiveSource<T, E> {
    /// Nothing attached.
    Idle,
    /// A one-shot source awaiting (or past) its completion.
    OneShot {
        source: Arc<dyn OneShotSource<T, E>>,
        done: bool,
    },
    /// A stream subscription. The handle slot is filled once `subscribe`
    /// returns; events delivered during `subscribe` fold normally.
    Stream {
        source: Arc<dyn StreamSource<T, E>>,
        handle: Option<Box<dyn CancelHandle>>,
        done: bool,
    },
}

impl<T, E> ActiveSource<T, E> {
    /// Whether `next` presents the same subscription target currently held.
    fn identity_matches(&self, next: &Option<Source<T, E>>) -> bool {
        match (self, next) {
            (ActiveSource::Idle, None) => true,
            (ActiveSource::OneShot { source, .. }, Some(Source::OneShot(next))) => {
                Arc::ptr_eq(source, next)
            }
            (ActiveSource::Stream { source, .. }, Some(Source::Stream(next))) => {
                Arc::ptr_eq(source, next)
            }
            _ => false,
        }
    }
}

/// Teardown bookkeeping: the handle to cancel (streams still open) and
/// whether the instance was live, i.e. attached and not yet done.
fn dismantle<T, E>(old: ActiveSource<T, E>) -> (Option<Box<dyn CancelHandle>>, bool) {
    match old {
        ActiveSource::Idle => (None, false),
        ActiveSource::OneShot { done, .. } => (None, !done),
        ActiveSource::Stream { handle, done, .. } => {
            if done {
                // Exhausted handle; not cancelled, never reused.
                (None, false)
            } else {
                (handle, true)
            }
        }
    }
}

/// State shared between the binding and the callbacks it hands to sources.
struct Inner<S: FoldSpec, R> {
    engine: FoldEngine<S>,
    /// Bumped on every teardown; callbacks carrying an older generation are
    /// discarded.
    generation: u64,
    active: ActiveSource<S::Data, S::Err>,
    render: RenderFn<S::Acc, R>,
    /// Last value handed to the render callback. The construction-time
    /// accumulator counts as already seen.
    last_rendered: S::Acc,
    output: Option<R>,
}

impl<S: FoldSpec, R> Inner<S, R> {
    /// Invoke the render callback iff the accumulator changed since the
    /// last render.
    fn maybe_render(&mut self) {
        if *self.engine.acc() == self.last_rendered {
            return;
        }
        let acc = self.engine.acc().clone();
        self.output = Some((self.render)(&acc));
        self.last_rendered = acc;
    }
}

/// Binds at most one asynchronous source to a fold engine and a render
/// callback.
///
/// Entry points mirror the owning component's lifecycle: [`mount`],
/// [`update`], [`unmount`]. Exactly one subscription adapter is live at any
/// time; presenting a source with a different identity tears the old one
/// down first. Dropping the binding unmounts it.
///
/// [`mount`]: SourceBinding::mount
/// [`update`]: SourceBinding::update
/// [`unmount`]: SourceBinding::unmount
pub struct SourceBinding<S: FoldSpec, R> {
    inner: Arc<Mutex<Inner<S, R>>>,
}

impl<S: FoldSpec, R> SourceBinding<S, R> {
    /// Create an unmounted binding. No render call is made; the initial
    /// accumulator counts as already seen by the consumer.
    pub fn new(spec: S, render: impl FnMut(&S::Acc) -> R + Send + 'static) -> Self {
        let engine = FoldEngine::new(spec);
        let last_rendered = engine.acc().clone();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                engine,
                generation: 0,
                active: ActiveSource::Idle,
                render: Box::new(render),
                last_rendered,
                output: None,
            })),
        }
    }

    /// Tear down any live adapter without attaching a replacement and
    /// without a render call.
    pub fn unmount(&self) {
        let old_handle = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            tracing::debug!(generation = inner.generation, "unmount");
            let old = std::mem::replace(&mut inner.active, ActiveSource::Idle);
            let (old_handle, live) = dismantle(old);
            if live {
                inner.engine.disconnect();
            } else {
                inner.engine.reset();
            }
            old_handle
        };

        if let Some(mut handle) = old_handle {
            handle.cancel();
        }
    }

    /// Clone of the current accumulator value.
    pub fn acc(&self) -> S::Acc {
        self.inner.lock().engine.acc().clone()
    }

    /// Output of the most recent render call, if any transition has
    /// rendered yet.
    pub fn output(&self) -> Option<R>
    where
        R: Clone,
    {
        self.inner.lock().output.clone()
    }
}

impl<S, R> SourceBinding<S, R>
where
    S: FoldSpec,
    R: Send + 'static,
{
    /// Attach the first source. Equivalent to an update from no source.
    pub fn mount(&self, source: Option<Source<S::Data, S::Err>>) {
        self.attach(source);
    }

    /// Present a (possibly) new source. The currently held source is the
    /// old side of the comparison: same identity is a no-op, a different
    /// identity tears the old subscription down before attaching.
    pub fn update(&self, source: Option<Source<S::Data, S::Err>>) {
        self.attach(source);
    }

    fn attach(&self, next: Option<Source<S::Data, S::Err>>) {
        let (old_handle, generation) = {
            let mut inner = self.inner.lock();
            if inner.active.identity_matches(&next) {
                return;
            }

            // Retire the previous subscription first: from here any of its
            // in-flight events fail the generation check.
            inner.generation += 1;
            let generation = inner.generation;
            tracing::debug!(generation, attaching = next.is_some(), "source changed");

            let old = std::mem::replace(&mut inner.active, ActiveSource::Idle);
            let (old_handle, live) = dismantle(old);
            if live {
                inner.engine.disconnect();
            } else {
                inner.engine.reset();
            }

            match &next {
                Some(Source::OneShot(source)) => {
                    inner.engine.reset();
                    inner.engine.connect();
                    inner.active = ActiveSource::OneShot {
                        source: Arc::clone(source),
                        done: false,
                    };
                }
                Some(Source::Stream(source)) => {
                    inner.engine.reset();
                    inner.engine.connect();
                    inner.active = ActiveSource::Stream {
                        source: Arc::clone(source),
                        handle: None,
                        done: false,
                    };
                }
                None => {}
            }

            inner.maybe_render();
            (old_handle, generation)
        };

        // The old handle is cancelled outside the lock; its generation is
        // already retired, so anything it delivers in the meantime is
        // discarded rather than folded.
        if let Some(mut handle) = old_handle {
            handle.cancel();
        }

        match next {
            Some(Source::OneShot(source)) => {
                let continuation = completion(Arc::downgrade(&self.inner), generation);
                source.register(continuation);
            }
            Some(Source::Stream(source)) => {
                let observer = Box::new(BindingObserver {
                    inner: Arc::downgrade(&self.inner),
                    generation,
                });
                let handle = source.subscribe(observer);
                self.store_handle(generation, handle);
            }
            None => {}
        }
    }

    /// Park the handle returned by `subscribe` in the active slot, unless
    /// the subscription was swapped away while `subscribe` ran.
    fn store_handle(&self, generation: u64, handle: Box<dyn CancelHandle>) {
        let stale = {
            let mut inner = self.inner.lock();
            if inner.generation == generation {
                match &mut inner.active {
                    ActiveSource::Stream { handle: slot, .. } => {
                        *slot = Some(handle);
                        None
                    }
                    _ => Some(handle),
                }
            } else {
                Some(handle)
            }
        };

        if let Some(mut handle) = stale {
            handle.cancel();
        }
    }
}

impl<S: FoldSpec, R> Drop for SourceBinding<S, R> {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Continuation handed to a one-shot source. Folds data-then-done
/// atomically, or discards itself when its generation has been retired.
fn completion<S, R>(inner: Weak<Mutex<Inner<S, R>>>, generation: u64) -> CompletionFn<S::Data, S::Err>
where
    S: FoldSpec,
    R: Send + 'static,
{
    Box::new(move |outcome| {
        let inner = match inner.upgrade() {
            Some(inner) => inner,
            None => return,
        };
        let mut inner = inner.lock();
        if inner.generation != generation {
            tracing::trace!(
                generation,
                current = inner.generation,
                "stale completion discarded"
            );
            return;
        }

        match outcome {
            Ok(value) => inner.engine.data(value),
            Err(error) => inner.engine.error(error),
        }
        inner.engine.done();
        if let ActiveSource::OneShot { done, .. } = &mut inner.active {
            *done = true;
        }
        inner.maybe_render();
    })
}

/// Observer handed to a stream source. Each event folds and renders under
/// the state lock; events carrying a retired generation are discarded.
struct BindingObserver<S: FoldSpec, R> {
    inner: Weak<Mutex<Inner<S, R>>>,
    generation: u64,
}

impl<S: FoldSpec, R> BindingObserver<S, R> {
    fn with_current(&self, fold: impl FnOnce(&mut Inner<S, R>)) {
        let inner = match self.inner.upgrade() {
            Some(inner) => inner,
            None => return,
        };
        let mut inner = inner.lock();
        if inner.generation != self.generation {
            tracing::trace!(
                generation = self.generation,
                current = inner.generation,
                "event after teardown discarded"
            );
            return;
        }
        fold(&mut inner);
        inner.maybe_render();
    }
}

impl<S, R> Observer<S::Data, S::Err> for BindingObserver<S, R>
where
    S: FoldSpec,
    R: Send + 'static,
{
    fn on_data(&mut self, value: S::Data) {
        self.with_current(|inner| inner.engine.data(value));
    }

    fn on_error(&mut self, error: S::Err) {
        self.with_current(|inner| inner.engine.error(error));
    }

    fn on_done(&mut self) {
        self.with_current(|inner| {
            inner.engine.done();
            if let ActiveSource::Stream { done, .. } = &mut inner.active {
                *done = true;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold::SnapshotFold;
    use crate::sources::{Deferred, EventHub};
    use crate::types::{ConnectionPhase, Snapshot};

    type Snap = Snapshot<String, String>;

    /// Binding that records every rendered snapshot.
    fn recording_binding() -> (
        SourceBinding<SnapshotFold<String, String>, usize>,
        Arc<Mutex<Vec<Snap>>>,
    ) {
        let renders: Arc<Mutex<Vec<Snap>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&renders);
        let binding = SourceBinding::new(SnapshotFold::new(), move |snap: &Snap| {
            let mut renders = sink.lock();
            renders.push(snap.clone());
            renders.len()
        });
        (binding, renders)
    }

    fn one_shot_source(deferred: &Deferred<String, String>) -> Source<String, String> {
        Source::one_shot(Arc::new(deferred.clone()) as Arc<dyn OneShotSource<_, _>>)
    }

    fn stream_source(hub: &EventHub<String, String>) -> Source<String, String> {
        Source::stream(Arc::new(hub.clone()) as Arc<dyn StreamSource<_, _>>)
    }

    #[test]
    fn test_one_shot_resolution() {
        let (binding, renders) = recording_binding();
        let deferred = Deferred::new();

        binding.mount(Some(one_shot_source(&deferred)));
        assert_eq!(binding.acc(), Snap::waiting());

        deferred.resolve("hello".to_string());
        assert_eq!(
            binding.acc(),
            Snap::with_data(ConnectionPhase::Done, "hello".to_string())
        );
        assert_eq!(
            *renders.lock(),
            vec![
                Snap::waiting(),
                Snap::with_data(ConnectionPhase::Done, "hello".to_string())
            ]
        );
    }

    #[test]
    fn test_mount_absent_does_not_render() {
        let (binding, renders) = recording_binding();
        binding.mount(None);
        assert_eq!(binding.acc(), Snap::nothing());
        assert!(renders.lock().is_empty());
        assert_eq!(binding.output(), None);
    }

    #[test]
    fn test_same_identity_update_is_noop() {
        let (binding, renders) = recording_binding();
        let deferred = Deferred::new();
        let source = one_shot_source(&deferred);

        binding.mount(Some(source.clone()));
        binding.update(Some(source));
        assert_eq!(renders.lock().len(), 1);

        deferred.resolve("v".to_string());
        assert_eq!(renders.lock().len(), 2);
    }

    #[test]
    fn test_unmount_does_not_render() {
        let (binding, renders) = recording_binding();
        let hub = EventHub::new();

        binding.mount(Some(stream_source(&hub)));
        hub.emit("1".to_string());
        assert_eq!(renders.lock().len(), 2);

        binding.unmount();
        assert_eq!(binding.acc(), Snap::nothing());
        assert_eq!(renders.lock().len(), 2);

        // Events after unmount are discarded.
        hub.emit("2".to_string());
        assert_eq!(binding.acc(), Snap::nothing());
        assert_eq!(renders.lock().len(), 2);
    }

    #[test]
    fn test_drop_cancels_subscription() {
        let hub: EventHub<String, String> = EventHub::new();
        {
            let (binding, _renders) = recording_binding();
            binding.mount(Some(stream_source(&hub)));
            assert_eq!(hub.subscriber_count(), 1);
        }
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_output_tracks_last_render() {
        let (binding, _renders) = recording_binding();
        let hub = EventHub::new();

        binding.mount(Some(stream_source(&hub)));
        assert_eq!(binding.output(), Some(1));

        hub.emit("1".to_string());
        hub.emit("2".to_string());
        assert_eq!(binding.output(), Some(3));
    }

    #[test]
    fn test_repeated_value_render_suppressed() {
        let (binding, renders) = recording_binding();
        let hub = EventHub::new();

        binding.mount(Some(stream_source(&hub)));
        hub.emit("1".to_string());
        hub.emit("1".to_string());

        // The second event folds to a structurally equal snapshot.
        assert_eq!(renders.lock().len(), 2);
        assert_eq!(
            binding.acc(),
            Snap::with_data(ConnectionPhase::Active, "1".to_string())
        );
    }
}
