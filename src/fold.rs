//! Generic lifecycle fold engine.
//!
//! [`FoldEngine`] turns the subscription lifecycle events into an evolving
//! accumulator value, with the fold functions supplied by a [`FoldSpec`].
//! [`SnapshotFold`] is the specialization producing [`Snapshot`] values;
//! consumers that need a different summary (tag collectors, counters)
//! implement their own spec over the same engine.

use crate::types::{ConnectionPhase, Snapshot};
use std::marker::PhantomData;

/// Fold functions for the subscription lifecycle events.
///
/// Each function consumes the accumulator and returns its replacement. The
/// engine guarantees call ordering per subscription instance: `on_connect`
/// once, `on_data`/`on_error` once per event, then at most one of `on_done`
/// (normal completion) or `on_disconnect` (torn down while still open).
pub trait FoldSpec: Send + 'static {
    /// Value events delivered by the source.
    type Data: Send + 'static;
    /// Error events delivered by the source.
    type Err: Send + 'static;
    /// The folded summary value.
    type Acc: Clone + PartialEq + Send + 'static;

    /// Value held before any source is attached.
    fn initial(&self) -> Self::Acc;

    /// A subscription begins.
    fn on_connect(&self, acc: Self::Acc) -> Self::Acc;

    /// A value event arrived.
    fn on_data(&self, acc: Self::Acc, value: Self::Data) -> Self::Acc;

    /// An error event arrived.
    fn on_error(&self, acc: Self::Acc, error: Self::Err) -> Self::Acc;

    /// The source completed normally. No further events follow.
    fn on_done(&self, acc: Self::Acc) -> Self::Acc;

    /// The subscription was torn down before completing.
    fn on_disconnect(&self, acc: Self::Acc) -> Self::Acc;
}

/// State machine holding one accumulator slot and applying a [`FoldSpec`].
pub struct FoldEngine<S: FoldSpec> {
    spec: S,
    acc: S::Acc,
}

impl<S: FoldSpec> FoldEngine<S> {
    /// Create an engine holding `initial()`.
    pub fn new(spec: S) -> Self {
        let acc = spec.initial();
        Self { spec, acc }
    }

    /// Current accumulator value.
    pub fn acc(&self) -> &S::Acc {
        &self.acc
    }

    /// Reset to `initial()` without firing any fold function.
    pub fn reset(&mut self) {
        self.acc = self.spec.initial();
    }

    /// Fold a connect event.
    pub fn connect(&mut self) {
        let acc = std::mem::replace(&mut self.acc, self.spec.initial());
        self.acc = self.spec.on_connect(acc);
    }

    /// Fold a value event.
    pub fn data(&mut self, value: S::Data) {
        let acc = std::mem::replace(&mut self.acc, self.spec.initial());
        self.acc = self.spec.on_data(acc, value);
    }

    /// Fold an error event.
    pub fn error(&mut self, error: S::Err) {
        let acc = std::mem::replace(&mut self.acc, self.spec.initial());
        self.acc = self.spec.on_error(acc, error);
    }

    /// Fold a normal completion.
    pub fn done(&mut self) {
        let acc = std::mem::replace(&mut self.acc, self.spec.initial());
        self.acc = self.spec.on_done(acc);
    }

    /// Fold an early teardown.
    pub fn disconnect(&mut self) {
        let acc = std::mem::replace(&mut self.acc, self.spec.initial());
        self.acc = self.spec.on_disconnect(acc);
    }
}

/// [`FoldSpec`] producing [`Snapshot`] summaries with the default
/// replace rules.
///
/// Data and error events replace the previous payload outright; `on_done`
/// keeps the payload and forces the phase to `Done`; `on_disconnect` is a
/// full reset. One-shot completions fold `on_data` and `on_done` back to
/// back, so their observable snapshots go straight from `Waiting` to `Done`
/// without surfacing `Active`.
pub struct SnapshotFold<T, E> {
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> SnapshotFold<T, E> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T, E> Default for SnapshotFold<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> FoldSpec for SnapshotFold<T, E>
where
    T: Clone + PartialEq + Send + 'static,
    E: Clone + PartialEq + Send + 'static,
{
    type Data = T;
    type Err = E;
    type Acc = Snapshot<T, E>;

    fn initial(&self) -> Self::Acc {
        Snapshot::nothing()
    }

    fn on_connect(&self, _acc: Self::Acc) -> Self::Acc {
        Snapshot::waiting()
    }

    fn on_data(&self, _acc: Self::Acc, value: T) -> Self::Acc {
        Snapshot::with_data(ConnectionPhase::Active, value)
    }

    fn on_error(&self, _acc: Self::Acc, error: E) -> Self::Acc {
        Snapshot::with_error(ConnectionPhase::Active, error)
    }

    fn on_done(&self, acc: Self::Acc) -> Self::Acc {
        acc.into_done()
    }

    fn on_disconnect(&self, _acc: Self::Acc) -> Self::Acc {
        Snapshot::nothing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Collector spec that appends a tag per event.
    struct TagFold;

    impl FoldSpec for TagFold {
        type Data = String;
        type Err = String;
        type Acc = Vec<String>;

        fn initial(&self) -> Vec<String> {
            Vec::new()
        }

        fn on_connect(&self, mut acc: Vec<String>) -> Vec<String> {
            acc.push("conn".to_string());
            acc
        }

        fn on_data(&self, mut acc: Vec<String>, value: String) -> Vec<String> {
            acc.push(format!("data:{}", value));
            acc
        }

        fn on_error(&self, mut acc: Vec<String>, error: String) -> Vec<String> {
            acc.push(format!("error:{}", error));
            acc
        }

        fn on_done(&self, mut acc: Vec<String>) -> Vec<String> {
            acc.push("done".to_string());
            acc
        }

        fn on_disconnect(&self, mut acc: Vec<String>) -> Vec<String> {
            acc.push("disc".to_string());
            acc
        }
    }

    #[test]
    fn test_collector_fold_ordering() {
        let mut engine = FoldEngine::new(TagFold);
        engine.connect();
        engine.data("1".to_string());
        engine.error("bad".to_string());
        engine.data("2".to_string());
        engine.done();

        assert_eq!(
            *engine.acc(),
            vec!["conn", "data:1", "error:bad", "data:2", "done"]
        );
    }

    #[test]
    fn test_collector_disconnect() {
        let mut engine = FoldEngine::new(TagFold);
        engine.connect();
        engine.data("1".to_string());
        engine.disconnect();

        assert_eq!(*engine.acc(), vec!["conn", "data:1", "disc"]);
    }

    #[test]
    fn test_reset_skips_fold_functions() {
        let mut engine = FoldEngine::new(TagFold);
        engine.connect();
        engine.reset();
        assert!(engine.acc().is_empty());
    }

    #[test]
    fn test_snapshot_stream_sequence() {
        let mut engine = FoldEngine::new(SnapshotFold::<String, String>::new());
        assert_eq!(*engine.acc(), Snapshot::nothing());

        engine.connect();
        assert_eq!(*engine.acc(), Snapshot::waiting());

        engine.data("1".to_string());
        assert_eq!(
            *engine.acc(),
            Snapshot::with_data(ConnectionPhase::Active, "1".to_string())
        );

        engine.data("2".to_string());
        assert_eq!(
            *engine.acc(),
            Snapshot::with_data(ConnectionPhase::Active, "2".to_string())
        );

        // Error replaces the buffered data, never merges.
        engine.error("bad".to_string());
        let snap = engine.acc();
        assert!(!snap.has_data());
        assert_eq!(snap.error(), Some(&"bad".to_string()));

        engine.data("4".to_string());
        engine.done();
        assert_eq!(
            *engine.acc(),
            Snapshot::with_data(ConnectionPhase::Done, "4".to_string())
        );
    }

    #[test]
    fn test_snapshot_one_shot_completion_pair() {
        // One-shot completions fold data then done atomically.
        let mut engine = FoldEngine::new(SnapshotFold::<String, String>::new());
        engine.connect();
        engine.data("hello".to_string());
        engine.done();
        assert_eq!(
            *engine.acc(),
            Snapshot::with_data(ConnectionPhase::Done, "hello".to_string())
        );
    }

    #[test]
    fn test_snapshot_disconnect_resets() {
        let mut engine = FoldEngine::new(SnapshotFold::<String, String>::new());
        engine.connect();
        engine.data("1".to_string());
        engine.disconnect();
        assert_eq!(*engine.acc(), Snapshot::nothing());
    }
}
