use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Batch, Connection, Statement};
use thiserror::Error as ThisError;
use tracing::{debug, error};

use crate::row;

pub const DEFAULT_DB_PATH: &str = "stomp_server.db";

/// How long a connection waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("You can only execute one statement at a time.")]
    MultipleStatements,
}

/// What a command produced, ready to be sent back as one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A statement ran (or failed, see [`Store::execute_statement`]).
    Done,
    /// Rows returned by a query, each already rendered as a tuple.
    Rows(Vec<String>),
    /// A query the store rejected.
    Failed { command: String, message: String },
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Done => write!(f, "done"),
            Reply::Rows(rows) => write!(f, "SUCCESS |{}", rows.join("|")),
            Reply::Failed { command, message } => write!(f, "{} Error: {}", command, message),
        }
    }
}

/// Facade over the SQLite file. Cloning is cheap; no connection is held between calls, every
/// operation opens its own and drops it before returning. Concurrent writers are serialized by
/// SQLite's own locking.
#[derive(Clone, Debug)]
pub struct Store {
    path: Arc<PathBuf>,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Store {
        Store {
            path: Arc::new(path.into()),
        }
    }

    /// Runs a mutating command. Store errors are logged and swallowed: the caller always gets
    /// [`Reply::Done`] and cannot tell a failed mutation from a successful one.
    pub fn execute_statement(&self, sql: &str) -> Reply {
        if let Err(e) = self.try_execute_statement(sql) {
            error!("{} Error: {}", sql, e);
        }
        Reply::Done
    }

    /// Runs a row-producing command. A store error is returned as data in
    /// [`Reply::Failed`], never as a transport failure.
    pub fn execute_query(&self, sql: &str) -> Reply {
        match self.try_execute_query(sql) {
            Ok(rows) => {
                debug!("Query returned {} rows", rows.len());
                Reply::Rows(rows)
            }
            Err(e) => Reply::Failed {
                command: sql.to_string(),
                message: e.to_string(),
            },
        }
    }

    fn try_execute_statement(&self, sql: &str) -> Result<(), Error> {
        let conn = open_connection(&self.path)?;
        let Some(mut stmt) = prepare_single(&conn, sql)? else {
            return Ok(());
        };
        let mut rows = stmt.query([])?;
        // Step to completion; rows yielded by the statement are of no interest.
        while rows.next()?.is_some() {}
        Ok(())
    }

    fn try_execute_query(&self, sql: &str) -> Result<Vec<String>, Error> {
        let conn = open_connection(&self.path)?;
        let Some(mut stmt) = prepare_single(&conn, sql)? else {
            return Ok(Vec::new());
        };
        let column_count = stmt.column_count();
        let mut rows = stmt.query([])?;

        let mut rendered = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..column_count)
                .map(|i| row.get_ref(i))
                .collect::<Result<Vec<_>, _>>()?;
            rendered.push(row::render_row(&values));
        }
        Ok(rendered)
    }
}

/// Opens a connection with foreign key enforcement off, the SQLite default that the bundled
/// build overrides. Rows referencing unknown users are accepted.
pub(crate) fn open_connection(path: &Path) -> Result<Connection, Error> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", false)?;
    Ok(conn)
}

/// Prepares the only statement in `sql`. Text that is empty or just comments yields `None`;
/// anything besides whitespace, comments or `;` after the first statement is rejected.
fn prepare_single<'conn>(
    conn: &'conn Connection,
    sql: &str,
) -> Result<Option<Statement<'conn>>, Error> {
    let mut batch = Batch::new(conn, sql);
    let Some(stmt) = batch.next()? else {
        return Ok(None);
    };

    match batch.next() {
        Ok(None) => Ok(Some(stmt)),
        Ok(Some(_)) | Err(_) => Err(Error::MultipleStatements),
    }
}
