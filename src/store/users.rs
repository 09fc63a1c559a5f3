use r2d2_sqlite::rusqlite::{params, ErrorCode, OptionalExtension, Row};

use crate::store::{new_id, Store, StoreError};

/// A registered student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Trimmed and lowercased at sign-up.
    pub email: String,
    /// `salt:hex(sha256(salt + password))`
    pub password_hash: String,
    /// School year band: `1-3`, `4-5` or `6-9`.
    pub level: String,
    /// Personal AI key, empty when the server-wide key should be used.
    pub gemini_key: String,
    pub teacher_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub level: &'a str,
}

/// Fields a user can change from the settings screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSettings {
    pub level: String,
    pub gemini_key: String,
    pub teacher_name: String,
}

const USER_COLUMNS: &str = "id, nome, email, senha_hash, nivel, gemini_key, nome_professor, criado_em";

fn user_from_row(row: &Row<'_>) -> r2d2_sqlite::rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        level: row.get::<_, Option<String>>(4)?.unwrap_or_else(|| "4-5".into()),
        gemini_key: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        teacher_name: row.get::<_, Option<String>>(6)?.unwrap_or_else(|| "Professor Max".into()),
        created_at: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
    })
}

impl Store {
    /// Inserts a new user. Fails with [`StoreError::EmailTaken`] when the
    /// e-mail is already registered.
    pub fn create_user(&self, new: &NewUser<'_>) -> Result<User, StoreError> {
        if self.user_by_email(new.email)?.is_some() {
            return Err(StoreError::EmailTaken);
        }

        let id = new_id();
        let conn = self.conn()?;
        let res = conn.execute(
            "INSERT INTO usuarios (id, nome, email, senha_hash, nivel) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, new.name, new.email, new.password_hash, new.level],
        );
        match res {
            Ok(_) => {}
            // Lost a race with another sign-up for the same address
            Err(r2d2_sqlite::rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::EmailTaken);
            }
            Err(e) => return Err(e.into()),
        }

        log::info!("Created user {}", id);
        let sql = format!("SELECT {USER_COLUMNS} FROM usuarios WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], user_from_row)?)
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM usuarios WHERE email = ?1");
        Ok(conn.query_row(&sql, params![email], user_from_row).optional()?)
    }

    pub fn user_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM usuarios WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], user_from_row).optional()?)
    }

    /// Overwrites the user's settings. Returns `false` if the user is gone.
    pub fn update_settings(&self, id: &str, settings: &UserSettings) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE usuarios SET nivel = ?1, gemini_key = ?2, nome_professor = ?3 WHERE id = ?4",
            params![settings.level, settings.gemini_key, settings.teacher_name, id],
        )?;
        Ok(n > 0)
    }
}
