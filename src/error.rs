//! Error types for snapshot access.

use thiserror::Error;

/// Error raised when a snapshot cannot supply a data payload.
///
/// A stored source error is re-raised verbatim; it is never a fault of the
/// adapter itself. Callers can avoid both variants by checking the phase and
/// payload accessors first.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SnapshotError<E> {
    /// The snapshot holds an error emitted by the source.
    #[error("source error: {0}")]
    Source(E),

    /// The snapshot holds neither data nor error.
    #[error("snapshot holds neither data nor error")]
    NoData,
}
