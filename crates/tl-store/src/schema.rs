use rusqlite::Connection;

use crate::error::{Result, StoreError};

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            sequence     INTEGER PRIMARY KEY,
            id           TEXT NOT NULL UNIQUE,
            text         TEXT NOT NULL CHECK (length(text) > 0),
            urgent       INTEGER NOT NULL DEFAULT 0,
            timestamp_ms INTEGER NOT NULL
        );

        -- Append-only: the journal is an audit trail.
        CREATE TRIGGER IF NOT EXISTS messages_no_update
        BEFORE UPDATE ON messages
        BEGIN
            SELECT RAISE(ABORT, 'messages are append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS messages_no_delete
        BEFORE DELETE ON messages
        BEGIN
            SELECT RAISE(ABORT, 'messages are append-only');
        END;
        ",
    )?;

    let existing: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .ok();
    if let Some(v) = existing
        && v.parse::<i64>().unwrap_or(0) > SCHEMA_VERSION
    {
        return Err(StoreError::InvalidData(format!(
            "database schema v{v} is newer than supported v{SCHEMA_VERSION}"
        )));
    }

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    tracing::debug!("message journal schema v{SCHEMA_VERSION} ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
        let v: String = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(v, SCHEMA_VERSION.to_string());
    }

    #[test]
    fn test_newer_schema_refused() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute(
            "UPDATE metadata SET value = '99' WHERE key = 'schema_version'",
            [],
        )
        .unwrap();
        assert!(matches!(
            initialize(&conn),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_update_and_delete_blocked() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn.execute(
            "INSERT INTO messages (sequence, id, text, urgent, timestamp_ms) VALUES (0, 'x', 'hi', 0, 1)",
            [],
        )
        .unwrap();
        assert!(
            conn.execute("UPDATE messages SET text = 'bye'", [])
                .is_err()
        );
        assert!(conn.execute("DELETE FROM messages", []).is_err());
    }

    #[test]
    fn test_empty_text_blocked() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        assert!(
            conn.execute(
                "INSERT INTO messages (sequence, id, text, urgent, timestamp_ms) VALUES (0, 'x', '', 0, 1)",
                [],
            )
            .is_err()
        );
    }
}
