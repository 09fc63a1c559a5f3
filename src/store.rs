//! SQLite persistence.
//!
//! A single database file holds four tables: `usuarios` (accounts),
//! `conversas` (one row per tutoring conversation), `mensagens` (the
//! messages of a conversation) and `sessoes` (login sessions). The schema is
//! created on every new pooled connection, so opening a fresh file is enough
//! to get a working store.
//!
//! Access goes through an `r2d2` pool so request handlers on different
//! threads can use the store concurrently. All identifiers are random UUIDs
//! stored as text; timestamps are SQLite `datetime('now')` strings except for
//! session expiry, which is kept in unix seconds.
//!
//! ```no_run
//! use tutorboard::store::{NewUser, Store};
//!
//! let store = Store::open("professor.db").unwrap();
//! let user = store
//!     .create_user(&NewUser {
//!         name: "Ana",
//!         email: "ana@example.com",
//!         password_hash: "salt:hash",
//!         level: "4-5",
//!     })
//!     .unwrap();
//! let conv = store.create_conversation(&user.id, "Quanto é 10 ÷ 2?").unwrap();
//! assert!(store.conversation_for_user(&conv.id, &user.id).unwrap().is_some());
//! ```

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::OpenFlags;
use r2d2_sqlite::SqliteConnectionManager;

/// Conversations and messages.
pub mod conversations;
/// Login sessions.
pub mod sessions;
/// User accounts.
pub mod users;

pub use conversations::{Conversation, Message, MessageKind};
pub use users::{NewUser, User, UserSettings};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS usuarios (
        id TEXT PRIMARY KEY,
        nome TEXT NOT NULL,
        email TEXT UNIQUE NOT NULL,
        senha_hash TEXT NOT NULL,
        nivel TEXT DEFAULT '4-5',
        gemini_key TEXT DEFAULT '',
        nome_professor TEXT DEFAULT 'Professor Max',
        criado_em TEXT DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS conversas (
        id TEXT PRIMARY KEY,
        usuario_id TEXT NOT NULL,
        titulo TEXT NOT NULL,
        criada_em TEXT DEFAULT (datetime('now')),
        ultima_msg TEXT DEFAULT (datetime('now')),
        FOREIGN KEY (usuario_id) REFERENCES usuarios(id)
    );

    CREATE TABLE IF NOT EXISTS mensagens (
        id TEXT PRIMARY KEY,
        conversa_id TEXT NOT NULL,
        tipo TEXT NOT NULL,
        conteudo TEXT NOT NULL,
        tem_imagem INTEGER DEFAULT 0,
        criada_em TEXT DEFAULT (datetime('now')),
        FOREIGN KEY (conversa_id) REFERENCES conversas(id)
    );

    CREATE TABLE IF NOT EXISTS sessoes (
        token TEXT PRIMARY KEY,
        usuario_id TEXT NOT NULL,
        expira_em INTEGER NOT NULL,
        FOREIGN KEY (usuario_id) REFERENCES usuarios(id)
    );

    CREATE INDEX IF NOT EXISTS idx_conversas_usuario ON conversas(usuario_id, ultima_msg);
    CREATE INDEX IF NOT EXISTS idx_mensagens_conversa ON mensagens(conversa_id);
";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] r2d2_sqlite::rusqlite::Error),

    #[error("E-mail already registered")]
    EmailTaken,
}

/// Handle to the database. Cloning shares the pool.
#[derive(Clone)]
pub struct Store {
    pool: Pool<SqliteConnectionManager>,
}

impl Store {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::file(path.as_ref())
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
            .with_init(|c| {
                c.busy_timeout(Duration::from_millis(500))?;
                c.pragma_update(None, "journal_mode", "WAL")?;
                c.pragma_update(None, "foreign_keys", "ON")?;
                c.execute_batch(SCHEMA)?;
                Ok(())
            });

        let max_size = (num_cpus::get() * 2).clamp(4, 16) as u32;
        let pool = Pool::builder()
            .max_size(max_size)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;

        log::info!("Opened database {:?} (pool size {})", path.as_ref(), max_size);
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
