use std::time::Duration;

use r2d2_sqlite::rusqlite::{params, OptionalExtension};

use crate::store::{Store, StoreError};

impl Store {
    /// Stores `token` as a session of `user_id` valid for `ttl`. Expired
    /// sessions are swept on the way.
    pub fn create_session(&self, token: &str, user_id: &str, ttl: Duration) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let swept = conn.execute("DELETE FROM sessoes WHERE expira_em <= CAST(strftime('%s','now') AS INTEGER)", [])?;
        if swept > 0 {
            log::debug!("Swept {} expired sessions", swept);
        }

        conn.execute(
            "INSERT INTO sessoes (token, usuario_id, expira_em)
             VALUES (?1, ?2, CAST(strftime('%s','now') AS INTEGER) + ?3)",
            params![token, user_id, ttl.as_secs() as i64],
        )?;
        Ok(())
    }

    /// The user behind a live session token.
    pub fn session_user(&self, token: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT usuario_id FROM sessoes WHERE token = ?1 AND expira_em > CAST(strftime('%s','now') AS INTEGER)",
                params![token],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sessoes WHERE token = ?1", params![token])?;
        Ok(())
    }
}
