//! Server configuration.
//!
//! `AppConfig` has defaults via [`Default`], a fluent [`AppConfig::builder()`]
//! with validation, and [`AppConfig::from_env()`] for the binary.
//!
//! # Environment
//! - `PORT`: listen port (default `5000`).
//! - `DB_PATH`: SQLite file (default `professor_ia.db`).
//! - `GEMINI_API_KEY`: server-wide AI key, used when a user has none.
//! - `GEMINI_BASE_URL`: AI endpoint base (default Google's public endpoint).
//! - `SESSION_DAYS`: login lifetime in days (default `30`).
//! - `BOARD_FONTS`: `:`-separated font files tried in order for the board.
//!
//! ```rust
//! use tutorboard::config::AppConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = AppConfig::builder()
//!     .port(8080)
//!     .db_path("/tmp/professor.db")
//!     .gemini_api_key("k-123")
//!     .build()?;
//! assert_eq!(cfg.port, 8080);
//! # Ok(()) }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::render::fonts::DEFAULT_FONT_PATHS;
use crate::render::{BoardConfig, BoardConfigError};
use crate::tutor;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// Fallback AI key; empty means users must bring their own.
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_timeout: Duration,
    pub session_ttl: Duration,
    pub font_paths: Vec<PathBuf>,
    pub board: BoardConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            db_path: PathBuf::from("professor_ia.db"),
            gemini_api_key: String::new(),
            gemini_base_url: tutor::DEFAULT_BASE_URL.to_string(),
            gemini_timeout: tutor::DEFAULT_TIMEOUT,
            session_ttl: Duration::from_secs(30 * 24 * 60 * 60),
            font_paths: DEFAULT_FONT_PATHS.iter().map(PathBuf::from).collect(),
            board: BoardConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, AppConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Unset or empty keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut b = AppConfig::builder();

        if let Some(port) = get("PORT") {
            let port = port.parse().map_err(|_| AppConfigError::InvalidPort(port))?;
            b = b.port(port);
        }
        if let Some(path) = get("DB_PATH") {
            b = b.db_path(path);
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            b = b.gemini_api_key(key);
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            b = b.gemini_base_url(url);
        }
        if let Some(days) = get("SESSION_DAYS") {
            let days: u64 = days.parse().map_err(|_| AppConfigError::InvalidSessionDays(days))?;
            b = b.session_ttl(Duration::from_secs(days * 24 * 60 * 60));
        }
        if let Some(fonts) = get("BOARD_FONTS") {
            b = b.font_paths(fonts.split(':').filter(|p| !p.is_empty()).map(PathBuf::from).collect());
        }

        b.build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigBuilder {
    inner: AppConfig,
}

impl AppConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut AppConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn port(self, port: u16) -> Self { self.map(|c| c.port = port) }
    pub fn db_path<P: Into<PathBuf>>(self, path: P) -> Self { self.map(|c| c.db_path = path.into()) }
    pub fn gemini_api_key<S: Into<String>>(self, key: S) -> Self { self.map(|c| c.gemini_api_key = key.into()) }
    pub fn gemini_base_url<S: Into<String>>(self, url: S) -> Self { self.map(|c| c.gemini_base_url = url.into()) }
    pub fn gemini_timeout(self, timeout: Duration) -> Self { self.map(|c| c.gemini_timeout = timeout) }
    pub fn session_ttl(self, ttl: Duration) -> Self { self.map(|c| c.session_ttl = ttl) }
    pub fn font_paths(self, paths: Vec<PathBuf>) -> Self { self.map(|c| c.font_paths = paths) }
    pub fn board(self, board: BoardConfig) -> Self { self.map(|c| c.board = board) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut AppConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<AppConfig, AppConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

#[derive(Debug, Clone, PartialEq)]
pub enum AppConfigError {
    InvalidPort(String),
    InvalidSessionDays(String),
    ZeroSessionTtl,
    InvalidBaseUrl(String),
    ZeroTimeout,
    Board(BoardConfigError),
}

impl fmt::Display for AppConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppConfigError::InvalidPort(p) => write!(f, "PORT {p:?} is not a valid port number"),
            AppConfigError::InvalidSessionDays(d) => write!(f, "SESSION_DAYS {d:?} is not a whole number of days"),
            AppConfigError::ZeroSessionTtl => write!(f, "session lifetime must be positive"),
            AppConfigError::InvalidBaseUrl(u) => write!(f, "GEMINI_BASE_URL {u:?} is not an http(s) URL"),
            AppConfigError::ZeroTimeout => write!(f, "AI timeout must be positive"),
            AppConfigError::Board(e) => write!(f, "board: {e}"),
        }
    }
}
impl std::error::Error for AppConfigError {}

fn validate(c: &AppConfig) -> Result<(), AppConfigError> {
    if c.session_ttl.is_zero() {
        return Err(AppConfigError::ZeroSessionTtl);
    }
    if c.gemini_timeout.is_zero() {
        return Err(AppConfigError::ZeroTimeout);
    }
    match url::Url::parse(&c.gemini_base_url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        _ => return Err(AppConfigError::InvalidBaseUrl(c.gemini_base_url.clone())),
    }
    c.board.validate().map_err(AppConfigError::Board)?;
    Ok(())
}
