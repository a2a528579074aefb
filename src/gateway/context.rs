//! Per-call authentication context.
//!
//! The bearer token for an invocation lives in tokio task-local storage and is
//! installed around the invocation's future with [`with_token`]. Task-local
//! values are swapped in on every poll of the scoped future, so two calls
//! joined or spawned side by side each observe only their own token.
//!
//! Tasks spawned from inside a handler do not inherit the scope; pass the
//! token explicitly if a handler fans out.

use std::future::Future;

tokio::task_local! {
    static AUTH_TOKEN: Option<String>;
}

/// Run `body` with `token` as the current call's auth token.
pub async fn with_token<F>(token: Option<String>, body: F) -> F::Output
where
    F: Future,
{
    AUTH_TOKEN.scope(token, body).await
}

/// The auth token of the call currently executing, if one was supplied.
///
/// Outside any call scope this is `None`.
pub fn current_token() -> Option<String> {
    AUTH_TOKEN
        .try_with(|token| token.clone())
        .ok()
        .flatten()
}
