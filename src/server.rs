//! HTTP surface.
//!
//! The router is split by concern: `account` (sign-up, login, profile and
//! settings), `chat` (questions to the AI tutor and the conversation
//! history) and `board` (chalkboard PNGs and health checks). Handlers share
//! an [`AppState`]; the session cookie is resolved by the [`Session`] and
//! [`CurrentUser`] extractors.
//!
//! Database and rendering work is synchronous and runs on tokio's blocking
//! pool so it never stalls the reactor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::Router;

use crate::auth;
use crate::config::AppConfig;
use crate::errors::ApiError;
use crate::render::{BoardRenderer, FontBook};
use crate::store::{Store, StoreError, User};
use crate::tutor::GeminiClient;

mod account;
mod board;
mod chat;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub board: Arc<BoardRenderer>,
    pub tutor: GeminiClient,
    /// Server-wide AI key; empty when users must bring their own.
    pub gemini_api_key: Arc<str>,
    pub session_ttl: Duration,
}

impl AppState {
    /// Opens the store, probes fonts and sets up the AI client.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store = Store::open(&config.db_path)?;
        let fonts = FontBook::probe(config.font_paths.as_slice(), &config.board.font_sizes());
        let tutor = GeminiClient::new(&config.gemini_base_url, config.gemini_timeout)?;

        if config.gemini_api_key.is_empty() {
            log::warn!("GEMINI_API_KEY not set, users need their own key");
        }

        Ok(Self {
            store,
            board: Arc::new(BoardRenderer::new(config.board.clone(), Arc::new(fonts))?),
            tutor,
            gemini_api_key: config.gemini_api_key.as_str().into(),
            session_ttl: config.session_ttl,
        })
    }

    /// The key to use for `user`: theirs if set, otherwise the server's.
    pub fn gemini_key_for(&self, user: &User) -> Option<String> {
        [user.gemini_key.as_str(), &*self.gemini_api_key]
            .into_iter()
            .find(|k| !k.is_empty())
            .map(str::to_string)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/cadastro", post(account::signup))
        .route("/api/login", post(account::login))
        .route("/api/logout", post(account::logout))
        .route("/api/eu", get(account::me))
        .route("/api/config", post(account::save_settings))
        .route("/api/perguntar", post(chat::ask))
        .route("/api/conversas", get(chat::list_conversations))
        .route(
            "/api/conversas/{id}",
            get(chat::conversation_messages).delete(chat::delete_conversation),
        )
        .route("/api/lousa", post(board::user_board))
        .route("/api/health", get(board::api_health))
        .route("/gerar-lousa", post(board::standalone_board))
        .route("/health", get(board::health))
        .with_state(state)
}

/// Serves `state` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!("Listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Runs `f` against the store on the blocking pool.
pub(crate) async fn db<T, F>(store: &Store, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Store) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| {
            log::error!("Database task failed: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}

/// The session cookie of a request and the user behind it, if any.
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
}

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(auth::token_from_cookie_header)
            .map(str::to_string);

        let Some(token) = token else {
            return Ok(Session { token: None, user: None });
        };

        let lookup = token.clone();
        let user = db(&state.store, move |store| match store.session_user(&lookup)? {
            Some(user_id) => store.user_by_id(&user_id),
            None => Ok(None),
        })
        .await?;

        Ok(Session { token: Some(token), user })
    }
}

/// A logged-in user. Rejects with 401 otherwise.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        session.user.map(CurrentUser).ok_or(ApiError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests;
