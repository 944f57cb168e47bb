//! Fail-open utilities for stages whose failure must not fail a run
//!
//! Once a commit has reached the hosting service it is the durable outcome
//! of a run. Steps that happen after it are wrapped here so that a failure is
//! logged and the run carries on.
//!
//! DO NOT use fail-open for:
//! - Generation (no commit must follow a failed generation)
//! - Commit / push / repository creation (the run's outcome)
//! - The round 2 secret check

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation that should fail open
///
/// On failure the error is logged with `warn!` and `None` is returned.
///
/// # Usage
///
/// ```no_run
/// use ship_core::fail_open::fail_open;
/// use ship_core::Result;
///
/// async fn enable_pages() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let result = fail_open("enable_pages", || enable_pages()).await;
///     // result is None if enable_pages() failed, otherwise Some(())
/// }
/// ```
///
/// # Examples of appropriate use:
/// - Static-site enablement
/// - Evaluator notification
/// - Workspace discard
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed, continuing: {}", operation_name, e);
            None
        }
    }
}
