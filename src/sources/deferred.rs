//! Completable one-shot cell.

use super::{CompletionFn, OneShotSource};
use parking_lot::Mutex;
use std::sync::Arc;

/// A one-shot source completed by the producer side.
///
/// Clones share the cell. The first `complete` wins and fires every
/// continuation registered so far; continuations registered afterwards fire
/// immediately with a copy of the outcome. A cell that is never completed
/// simply leaves its consumers waiting, which is valid.
pub struct Deferred<T, E> {
    cell: Arc<Mutex<Cell<T, E>>>,
}

enum Cell<T, E> {
    Pending(Vec<CompletionFn<T, E>>),
    Resolved(Result<T, E>),
}

impl<T, E> Deferred<T, E> {
    /// Create an unresolved cell.
    pub fn new() -> Self {
        Self {
            cell: Arc::new(Mutex::new(Cell::Pending(Vec::new()))),
        }
    }

    /// Whether the cell has been resolved.
    pub fn is_resolved(&self) -> bool {
        matches!(&*self.cell.lock(), Cell::Resolved(_))
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Resolve the cell. Returns `false` if it was already resolved; the
    /// first outcome sticks.
    pub fn complete(&self, outcome: Result<T, E>) -> bool {
        let waiters = {
            let mut cell = self.cell.lock();
            match &mut *cell {
                Cell::Resolved(_) => return false,
                Cell::Pending(waiters) => {
                    let waiters = std::mem::take(waiters);
                    *cell = Cell::Resolved(outcome.clone());
                    waiters
                }
            }
        };

        // Continuations run outside the lock so they may re-enter the cell.
        for waiter in waiters {
            waiter(outcome.clone());
        }
        true
    }

    /// Resolve with a value.
    pub fn resolve(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Resolve with an error.
    pub fn reject(&self, error: E) -> bool {
        self.complete(Err(error))
    }
}

impl<T, E> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T, E> OneShotSource<T, E> for Deferred<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn register(&self, on_complete: CompletionFn<T, E>) {
        let resolved = {
            let mut cell = self.cell.lock();
            match &mut *cell {
                Cell::Pending(waiters) => {
                    waiters.push(on_complete);
                    None
                }
                Cell::Resolved(outcome) => Some((on_complete, outcome.clone())),
            }
        };

        if let Some((on_complete, outcome)) = resolved {
            on_complete(outcome);
        }
    }
}
