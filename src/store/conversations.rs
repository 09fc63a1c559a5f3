use r2d2_sqlite::rusqlite::{params, OptionalExtension, Row};

use crate::store::{new_id, Store, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: String,
    pub last_message_at: String,
}

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Student,
    Professor,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Student => "aluno",
            MessageKind::Professor => "professor",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "professor" => MessageKind::Professor,
            _ => MessageKind::Student,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub kind: MessageKind,
    /// Plain text for students, the serialized tutor reply for the professor.
    pub content: String,
    pub has_image: bool,
    pub created_at: String,
}

const CONVERSATION_COLUMNS: &str = "id, usuario_id, titulo, criada_em, ultima_msg";
const MESSAGE_COLUMNS: &str = "id, conversa_id, tipo, conteudo, tem_imagem, criada_em";

fn conversation_from_row(row: &Row<'_>) -> r2d2_sqlite::rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        last_message_at: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}

fn message_from_row(row: &Row<'_>) -> r2d2_sqlite::rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        kind: MessageKind::parse(&row.get::<_, String>(2)?),
        content: row.get(3)?,
        has_image: row.get::<_, Option<i64>>(4)?.unwrap_or(0) != 0,
        created_at: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
    })
}

impl Store {
    pub fn create_conversation(&self, user_id: &str, title: &str) -> Result<Conversation, StoreError> {
        let id = new_id();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversas (id, usuario_id, titulo) VALUES (?1, ?2, ?3)",
            params![id, user_id, title],
        )?;

        log::debug!("Created conversation {} for user {}", id, user_id);
        let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversas WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], conversation_from_row)?)
    }

    /// The `limit` most recently active conversations of a user.
    pub fn recent_conversations(&self, user_id: &str, limit: usize) -> Result<Vec<Conversation>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversas WHERE usuario_id = ?1
             ORDER BY ultima_msg DESC, rowid DESC LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, limit as i64], conversation_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The conversation `id`, only if it belongs to `user_id`.
    pub fn conversation_for_user(&self, id: &str, user_id: &str) -> Result<Option<Conversation>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversas WHERE id = ?1 AND usuario_id = ?2");
        Ok(conn.query_row(&sql, params![id, user_id], conversation_from_row).optional()?)
    }

    /// Marks the conversation as active now.
    pub fn touch_conversation(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("UPDATE conversas SET ultima_msg = datetime('now') WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Deletes a conversation owned by `user_id` together with its messages.
    /// Returns `false` when there was nothing of the user's to delete.
    pub fn delete_conversation(&self, id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let owned = tx
            .query_row(
                "SELECT 1 FROM conversas WHERE id = ?1 AND usuario_id = ?2",
                params![id, user_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !owned {
            return Ok(false);
        }

        tx.execute("DELETE FROM mensagens WHERE conversa_id = ?1", params![id])?;
        tx.execute("DELETE FROM conversas WHERE id = ?1", params![id])?;
        tx.commit()?;

        log::debug!("Deleted conversation {}", id);
        Ok(true)
    }

    pub fn add_message(
        &self,
        conversation_id: &str,
        kind: MessageKind,
        content: &str,
        has_image: bool,
    ) -> Result<Message, StoreError> {
        let id = new_id();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO mensagens (id, conversa_id, tipo, conteudo, tem_imagem) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, conversation_id, kind.as_str(), content, has_image as i64],
        )?;

        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM mensagens WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], message_from_row)?)
    }

    /// Messages of a conversation, oldest first.
    pub fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM mensagens WHERE conversa_id = ?1 ORDER BY criada_em ASC, rowid ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![conversation_id], message_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::*;

    #[test]
    fn messages_keep_insertion_order() {
        let (_dir, store) = temp_store();
        let u = user(&store, "m@example.com");
        let conv = store.create_conversation(&u.id, "Frações").unwrap();

        store.add_message(&conv.id, MessageKind::Student, "Quanto é 1/2 + 1/4?", false).unwrap();
        store.add_message(&conv.id, MessageKind::Professor, "{\"saudacao\":\"Oi\"}", false).unwrap();
        store.add_message(&conv.id, MessageKind::Student, "Foto da questão", true).unwrap();

        let msgs = store.messages(&conv.id).unwrap();
        let kinds: Vec<_> = msgs.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MessageKind::Student, MessageKind::Professor, MessageKind::Student]);
        assert!(!msgs[0].has_image);
        assert!(msgs[2].has_image);
        assert_eq!(msgs[1].content, "{\"saudacao\":\"Oi\"}");
    }

    #[test]
    fn recent_conversations_are_ordered_and_limited() {
        let (_dir, store) = temp_store();
        let u = user(&store, "r@example.com");

        let old = store.create_conversation(&u.id, "antiga").unwrap();
        let new = store.create_conversation(&u.id, "nova").unwrap();
        {
            let conn = store.conn().unwrap();
            conn.execute(
                "UPDATE conversas SET ultima_msg = '2000-01-01 00:00:00' WHERE id = ?1",
                params![old.id],
            )
            .unwrap();
        }

        let list = store.recent_conversations(&u.id, 30).unwrap();
        let titles: Vec<_> = list.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["nova", "antiga"]);

        store.touch_conversation(&old.id).unwrap();
        let conn = store.conn().unwrap();
        conn.execute(
            "UPDATE conversas SET ultima_msg = '2000-01-01 00:00:00' WHERE id = ?1",
            params![new.id],
        )
        .unwrap();
        let list = store.recent_conversations(&u.id, 1).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, old.id);
    }

    #[test]
    fn conversations_are_private() {
        let (_dir, store) = temp_store();
        let alice = user(&store, "alice@example.com");
        let bob = user(&store, "bob@example.com");

        let conv = store.create_conversation(&alice.id, "Divisão").unwrap();
        store.add_message(&conv.id, MessageKind::Student, "10 ÷ 2", false).unwrap();

        assert!(store.conversation_for_user(&conv.id, &alice.id).unwrap().is_some());
        assert!(store.conversation_for_user(&conv.id, &bob.id).unwrap().is_none());
        assert!(store.recent_conversations(&bob.id, 30).unwrap().is_empty());

        // Bob cannot delete it, and its messages survive the attempt
        assert!(!store.delete_conversation(&conv.id, &bob.id).unwrap());
        assert_eq!(store.messages(&conv.id).unwrap().len(), 1);

        assert!(store.delete_conversation(&conv.id, &alice.id).unwrap());
        assert!(store.conversation_for_user(&conv.id, &alice.id).unwrap().is_none());
        assert!(store.messages(&conv.id).unwrap().is_empty());
    }
}
