//! Request-scoped locale tag.
//!
//! The HTTP layer binds the caller's language once per request with
//! [`scope`]; projection rules read it back through [`current_or`] without
//! threading it through every repository call.

use std::future::Future;

tokio::task_local! {
    static LOCALE: String;
}

/// Run `fut` with `tag` as the active locale.
pub async fn scope<F: Future>(tag: impl Into<String>, fut: F) -> F::Output {
    LOCALE.scope(tag.into(), fut).await
}

/// The active locale, if one is bound to the current task.
pub fn current() -> Option<String> {
    LOCALE.try_with(|tag| tag.clone()).ok().filter(|tag| !tag.is_empty())
}

pub fn current_or(fallback: &str) -> String {
    current().unwrap_or_else(|| fallback.to_string())
}
