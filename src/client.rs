//! Main client entry point.

use std::sync::Arc;
use tracing::info;

use crate::api::{AuthApi, ChatApi, FileApi, SystemApi, UserApi};
use crate::auth::{Navigator, RouteState, Session, UnauthorizedHandler};
use crate::config::Config;
use crate::error::Result;
use crate::storage::{FileSessionStorage, SessionStorage};
use crate::transport::HttpClient;

/// Backend client.
///
/// Owns the shared session, the pipeline-aware HTTP client and the
/// configuration; endpoint groups borrow it.
///
/// ```rust,no_run
/// use chatdesk::{ChatdeskClient, models::Credentials};
///
/// # async fn example() -> chatdesk::Result<()> {
/// let client = ChatdeskClient::builder()
///     .base_url("http://localhost:8080/api")
///     .build()
///     .await?;
///
/// let result = client.auth().login(&Credentials::new("alice", "secret")).await;
/// println!("{}", result.message());
/// # Ok(())
/// # }
/// ```
pub struct ChatdeskClient {
    config: Config,
    session: Arc<Session>,
    http: Arc<HttpClient>,
    navigator: Arc<dyn Navigator>,
}

impl ChatdeskClient {
    pub fn builder() -> ChatdeskClientBuilder {
        ChatdeskClientBuilder::new()
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn user(&self) -> UserApi<'_> {
        UserApi::new(self)
    }

    pub fn chat(&self) -> ChatApi<'_> {
        ChatApi::new(self)
    }

    pub fn system(&self) -> SystemApi<'_> {
        SystemApi::new(self)
    }

    pub fn files(&self) -> FileApi<'_> {
        FileApi::new(self)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub(crate) fn unauthorized(&self) -> &UnauthorizedHandler {
        self.http.unauthorized_handler()
    }
}

impl std::fmt::Debug for ChatdeskClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatdeskClient")
            .field("base_url", &self.http.base_url())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ChatdeskClient`].
#[derive(Default)]
pub struct ChatdeskClientBuilder {
    config: Option<Config>,
    base_url: Option<String>,
    storage: Option<Arc<dyn SessionStorage>>,
    navigator: Option<Arc<dyn Navigator>>,
    reqwest_client: Option<reqwest::Client>,
}

impl ChatdeskClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration. Without one the builder uses
    /// [`Config::from_env`].
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Override `api.base_url`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Session storage backend. Defaults to a file at `session.storage_path`.
    pub fn storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Navigator used by the unauthorized handler. Defaults to a
    /// [`RouteState`] starting at `/`.
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Set a custom reqwest client for regular calls.
    pub fn reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.reqwest_client = Some(client);
        self
    }

    /// Build the client and hydrate the session from storage.
    pub async fn build(self) -> Result<ChatdeskClient> {
        let mut config = self.config.unwrap_or_else(Config::from_env);
        if let Some(url) = self.base_url {
            config.api.base_url = url;
        }

        let storage = self.storage.unwrap_or_else(|| {
            Arc::new(FileSessionStorage::new(config.session.storage_path.clone()))
        });
        let navigator: Arc<dyn Navigator> = self
            .navigator
            .unwrap_or_else(|| Arc::new(RouteState::default()));

        let session = Arc::new(Session::new(storage));
        let restored = session.init().await?;

        let unauthorized = Arc::new(UnauthorizedHandler::new(
            Arc::clone(&session),
            Arc::clone(&navigator),
            config.session.login_route.clone(),
        ));
        let http = match self.reqwest_client {
            Some(client) => {
                HttpClient::with_client(client, &config.api, Arc::clone(&session), unauthorized)?
            }
            None => HttpClient::new(&config.api, Arc::clone(&session), unauthorized)?,
        };

        info!(
            base_url = %http.base_url(),
            storage = session.storage_name(),
            restored,
            "ChatdeskClient initialized"
        );
        Ok(ChatdeskClient {
            config,
            session,
            http: Arc::new(http),
            navigator,
        })
    }
}
