//! Uniform execution of asynchronous operations.
//!
//! Every public operation of the connection layer funnels through
//! [`execute_operation`]. It gives callers two equivalent styles:
//!
//! - **direct**: no callback; the outcome is the returned `Result`.
//! - **callback**: a [`Callback`] receives `(error, result)` exactly once.
//!
//! Failures are logged once at error level in both styles.
//!
//! # Example
//!
//! ```ignore
//! use docgate_core::executor::{execute_operation, Callback};
//!
//! let callback: Callback<Vec<String>> = Box::new(|err, names| {
//!     if let Some(err) = err {
//!         eprintln!("listing failed: {err}");
//!     } else {
//!         println!("{names:?}");
//!     }
//! });
//!
//! execute_operation(client.list_collections(), Some(callback)).await?;
//! ```

use std::future::Future;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// A completion callback. Receives the error on failure (with a default
/// result) or `None` and the result on success.
pub type Callback<T> = Box<dyn FnOnce(Option<DocumentStoreError>, T) + Send + 'static>;

/// Runs `operation` once and settles it according to the caller's style.
///
/// With a callback, the callback is invoked exactly once and the function
/// settles with `Ok(T::default())`, since the callback is the only outcome
/// channel. Without a callback, the result is returned or the error is
/// returned as `Err`.
///
/// A failure is logged exactly once at error level regardless of style.
pub async fn execute_operation<T, Fut>(operation: Fut, callback: Option<Callback<T>>) -> DocumentStoreResult<T>
where
    T: Default,
    Fut: Future<Output = DocumentStoreResult<T>>,
{
    let outcome = operation.await;

    if let Err(err) = &outcome {
        tracing::error!(error = %err, "operation failed");
    }

    match callback {
        Some(callback) => {
            match outcome {
                Ok(result) => callback(None, result),
                Err(err) => callback(Some(err), T::default()),
            }
            Ok(T::default())
        }
        None => outcome,
    }
}
