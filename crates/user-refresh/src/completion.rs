//! Completion callbacks over operation results
//!
//! Every operation returns its outcome as a `Result` (or a future of one).
//! These adapters are for callers that also want a notification callback:
//! the callback sees the outcome by reference exactly once, after it is fully
//! determined, and the result is handed back unchanged.

use std::future::Future;

use crate::error::{Error, Result};

/// Outcome view passed to a completion callback.
pub type Completion<'a, T> = std::result::Result<&'a T, &'a Error>;

/// Notify `callback` (if any) of an already computed result.
pub fn complete_now<T, F>(result: Result<T>, callback: Option<F>) -> Result<T>
where
    F: FnOnce(Completion<'_, T>),
{
    if let Some(callback) = callback {
        callback(result.as_ref());
    }
    result
}

/// Await `operation`, then notify `callback` (if any) of its result.
///
/// The callback never runs before the operation has finished, so a caller
/// can always build the callback before the work starts.
pub async fn complete<T, F, Fut>(operation: Fut, callback: Option<F>) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
    F: FnOnce(Completion<'_, T>),
{
    complete_now(operation.await, callback)
}
