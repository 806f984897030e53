//! Core value types: connection phase and snapshot.

use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};

/// Where a subscription is in its lifecycle.
///
/// A given subscription instance moves monotonically through a subset of
/// these phases. One-shot sources skip `Active` entirely: their completion
/// collapses straight from `Waiting` to `Done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// No source is attached.
    None,
    /// Subscribed, no event received yet.
    Waiting,
    /// At least one data or error event received; the source is still open.
    Active,
    /// The source completed. Terminal for that subscription instance.
    Done,
}

/// Immutable summary of a subscription: phase plus at most one of data or
/// error.
///
/// A fresh data or error event produces a wholly new snapshot carrying only
/// that payload; it never merges with the previous one. The single exception
/// is [`Snapshot::into_done`], which keeps the payload and only advances the
/// phase (a stream closing after its last event).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot<T, E> {
    phase: ConnectionPhase,
    data: Option<T>,
    error: Option<E>,
}

impl<T, E> Snapshot<T, E> {
    /// Snapshot with no source attached.
    pub fn nothing() -> Self {
        Self {
            phase: ConnectionPhase::None,
            data: None,
            error: None,
        }
    }

    /// Snapshot for a subscription that has not delivered an event yet.
    pub fn waiting() -> Self {
        Self {
            phase: ConnectionPhase::Waiting,
            data: None,
            error: None,
        }
    }

    /// Snapshot carrying a data payload.
    pub fn with_data(phase: ConnectionPhase, value: T) -> Self {
        Self {
            phase,
            data: Some(value),
            error: None,
        }
    }

    /// Snapshot carrying an error payload.
    pub fn with_error(phase: ConnectionPhase, error: E) -> Self {
        Self {
            phase,
            data: None,
            error: Some(error),
        }
    }

    /// Same payload, phase forced to [`ConnectionPhase::Done`].
    pub fn into_done(self) -> Self {
        Self {
            phase: ConnectionPhase::Done,
            ..self
        }
    }

    /// Current connection phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Data payload, if present.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Error payload, if present.
    pub fn error(&self) -> Option<&E> {
        self.error.as_ref()
    }

    /// Whether a data payload is present.
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    /// Whether an error payload is present.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// The data payload, or the reason there is none.
    ///
    /// Re-raises a stored source error as [`SnapshotError::Source`]; returns
    /// [`SnapshotError::NoData`] when the snapshot holds neither payload.
    pub fn require_data(&self) -> Result<&T, SnapshotError<E>>
    where
        E: Clone,
    {
        match (&self.data, &self.error) {
            (Some(value), _) => Ok(value),
            (None, Some(error)) => Err(SnapshotError::Source(error.clone())),
            (None, None) => Err(SnapshotError::NoData),
        }
    }
}

impl<T, E> Default for Snapshot<T, E> {
    fn default() -> Self {
        Self::nothing()
    }
}
