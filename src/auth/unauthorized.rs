//! Reaction to a 401 from the backend: drop the session, send the user to
//! the login route.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use super::Session;

/// Where the embedding application is and how to move it elsewhere.
///
/// A GUI shell would map this onto its router; the CLI prints a hint.
pub trait Navigator: Send + Sync {
    /// Current route, e.g. `/chat`.
    fn current_route(&self) -> String;

    /// Move to `route`.
    fn redirect(&self, route: &str);
}

/// Navigator that only remembers where it was sent.
#[derive(Debug)]
pub struct RouteState {
    route: RwLock<String>,
    redirects: AtomicUsize,
}

impl RouteState {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            route: RwLock::new(initial.into()),
            redirects: AtomicUsize::new(0),
        }
    }

    /// Number of redirects performed so far.
    pub fn redirect_count(&self) -> usize {
        self.redirects.load(Ordering::SeqCst)
    }

    pub fn set_route(&self, route: impl Into<String>) {
        if let Ok(mut current) = self.route.write() {
            *current = route.into();
        }
    }
}

impl Default for RouteState {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Navigator for RouteState {
    fn current_route(&self) -> String {
        self.route.read().map(|r| r.clone()).unwrap_or_default()
    }

    fn redirect(&self, route: &str) {
        self.set_route(route);
        self.redirects.fetch_add(1, Ordering::SeqCst);
    }
}

/// Clears the session and redirects to the login route at most once per
/// logged-in lifetime.
pub struct UnauthorizedHandler {
    session: Arc<Session>,
    navigator: Arc<dyn Navigator>,
    login_route: String,
    armed: AtomicBool,
}

impl UnauthorizedHandler {
    pub fn new(
        session: Arc<Session>,
        navigator: Arc<dyn Navigator>,
        login_route: impl Into<String>,
    ) -> Self {
        Self {
            session,
            navigator,
            login_route: login_route.into(),
            armed: AtomicBool::new(true),
        }
    }

    /// Handle an unauthorized response.
    ///
    /// Clearing is repeated on every call; only the first call after
    /// [`rearm`](Self::rearm) may redirect.
    pub async fn handle(&self) {
        if let Err(e) = self.session.clear().await {
            warn!(error = %e, "Failed to clear persisted session");
        }

        if !self.armed.swap(false, Ordering::AcqRel) {
            return;
        }

        if self.navigator.current_route() == self.login_route {
            return;
        }
        info!(route = %self.login_route, "Session rejected, redirecting to login");
        self.navigator.redirect(&self.login_route);
    }

    /// Allow the next unauthorized response to redirect again.
    pub fn rearm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }
}

impl std::fmt::Debug for UnauthorizedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnauthorizedHandler")
            .field("login_route", &self.login_route)
            .field("armed", &self.armed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handler(route: &str) -> (Arc<Session>, Arc<RouteState>, UnauthorizedHandler) {
        let session = Arc::new(Session::ephemeral());
        let nav = Arc::new(RouteState::new(route));
        let handler = UnauthorizedHandler::new(session.clone(), nav.clone(), "/auth/login");
        (session, nav, handler)
    }

    #[tokio::test]
    async fn test_clears_and_redirects_once() {
        let (session, nav, handler) = handler("/chat");
        session.establish("t", Some(json!({"id": 1}))).await.unwrap();

        handler.handle().await;
        handler.handle().await;

        assert!(session.token().await.is_none());
        assert_eq!(nav.redirect_count(), 1);
        assert_eq!(nav.current_route(), "/auth/login");
    }

    #[tokio::test]
    async fn test_no_redirect_from_login_route() {
        let (_session, nav, handler) = handler("/auth/login");
        handler.handle().await;
        assert_eq!(nav.redirect_count(), 0);
    }

    #[tokio::test]
    async fn test_rearm_allows_next_redirect() {
        let (_session, nav, handler) = handler("/chat");
        handler.handle().await;

        nav.set_route("/chat");
        handler.rearm();
        handler.handle().await;
        assert_eq!(nav.redirect_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_calls_redirect_once() {
        let (_session, nav, handler) = handler("/chat");
        let handler = Arc::new(handler);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let h = handler.clone();
                tokio::spawn(async move { h.handle().await })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(nav.redirect_count(), 1);
    }
}
