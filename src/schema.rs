use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::store::{open_connection, Error};

/// Tables the messaging server expects. Every statement is `IF NOT EXISTS`, so running them again
/// against an existing store leaves its data untouched.
const TABLES: [(&str, &str); 3] = [
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            username TEXT PRIMARY KEY,
            password TEXT NOT NULL,
            registration_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
    ),
    (
        // One row per login session, the id identifies the session.
        "login_history",
        "CREATE TABLE IF NOT EXISTS login_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            login_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            logout_time TIMESTAMP,
            FOREIGN KEY (username) REFERENCES users(username)
        )",
    ),
    (
        "file_tracking",
        "CREATE TABLE IF NOT EXISTS file_tracking (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL,
            filename TEXT NOT NULL,
            upload_time TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            game_channel TEXT NOT NULL,
            FOREIGN KEY (username) REFERENCES users(username)
        )",
    ),
];

/// Creates the tables if they are missing. Must succeed before the listener accepts anything.
pub fn init(path: &Path) -> Result<(), Error> {
    let mut conn = open_connection(path)?;
    create_tables(&mut conn)?;
    info!("Store initialized at {}", path.display());
    Ok(())
}

fn create_tables(conn: &mut Connection) -> Result<(), Error> {
    let tx = conn.transaction()?;
    for (name, sql) in TABLES {
        tracing::debug!("Ensuring table {} exists", name);
        tx.execute(sql, [])?;
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table_names(path: &Path) -> Vec<String> {
        let conn = Connection::open(path).unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        names
    }

    #[test]
    fn init_creates_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relay.db");

        init(&path).unwrap();

        assert_eq!(
            table_names(&path),
            vec!["file_tracking", "login_history", "users"]
        );
    }

    #[test]
    fn init_is_idempotent_and_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relay.db");

        init(&path).unwrap();
        Connection::open(&path)
            .unwrap()
            .execute(
                "INSERT INTO users (username, password) VALUES ('alice', 'pw')",
                [],
            )
            .unwrap();
        init(&path).unwrap();

        let count: i64 = Connection::open(&path)
            .unwrap()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn defaults_fill_timestamps_and_ids() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relay.db");
        init(&path).unwrap();

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO users (username, password) VALUES ('alice', 'pw')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO login_history (username) VALUES ('alice')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO login_history (username) VALUES ('alice')",
            [],
        )
        .unwrap();

        let (id, login_time): (i64, Option<String>) = conn
            .query_row(
                "SELECT id, login_time FROM login_history ORDER BY id DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(id, 2);
        assert!(login_time.is_some());
    }

    #[test]
    fn init_fails_on_unwritable_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("relay.db");

        assert!(init(&path).is_err());
    }
}
