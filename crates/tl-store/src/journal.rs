use std::path::Path;

use rusqlite::{Connection, params};
use uuid::Uuid;

use tl_core::{Message, MessageLog};

use crate::error::{Result, StoreError};
use crate::schema;

/// SQLite-backed mirror of the chat log. Rows are only ever inserted.
pub struct Journal {
    conn: Connection,
}

impl Journal {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        tracing::debug!("opened message journal at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Persist one entry. The entry's sequence must be the next slot; a gap or
    /// a replay is refused so the journal stays a faithful copy of the log.
    pub fn append(&self, msg: &Message) -> Result<()> {
        let expected = self.count()?;
        if msg.sequence != expected {
            return Err(StoreError::InvalidData(format!(
                "out-of-order append: expected sequence {expected}, got {}",
                msg.sequence
            )));
        }
        self.conn.execute(
            "INSERT INTO messages (sequence, id, text, urgent, timestamp_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                msg.sequence as i64,
                msg.id.to_string(),
                msg.text,
                msg.urgent,
                msg.timestamp_ms as i64,
            ],
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Rebuild the in-memory log from every persisted row, in sequence order.
    pub fn load(&self) -> Result<MessageLog> {
        let mut stmt = self.conn.prepare(
            "SELECT sequence, id, text, urgent, timestamp_ms
             FROM messages ORDER BY sequence ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (sequence, id, text, urgent, timestamp_ms) = row?;
            let id = Uuid::parse_str(&id)
                .map_err(|e| StoreError::InvalidData(format!("bad message id {id}: {e}")))?;
            entries.push(Message {
                id,
                sequence: sequence as u64,
                text,
                urgent,
                timestamp_ms: timestamp_ms as u64,
            });
        }
        Ok(MessageLog::restore(entries)?)
    }
}
