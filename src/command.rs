use std::fmt;

use crate::frame::Frame;
use crate::store::{Reply, Store};

/// Commands starting with this literal (case-sensitive) are treated as queries.
const QUERY_PREFIX: &str = "SELECT";

pub trait Executable {
    fn exec(self, store: Store) -> Reply;
}

/// A frame read as SQL text. The text itself is passed to the store verbatim; the only thing
/// looked at here is whether it is expected to produce rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Query(String),
    Statement(String),
}

impl Command {
    pub fn parse(text: String) -> Command {
        if text.starts_with(QUERY_PREFIX) {
            Command::Query(text)
        } else {
            Command::Statement(text)
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Command::Query(text) | Command::Statement(text) => text,
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self, Command::Query(_))
    }
}

impl From<Frame> for Command {
    fn from(frame: Frame) -> Self {
        Command::parse(frame.to_text())
    }
}

impl Executable for Command {
    fn exec(self, store: Store) -> Reply {
        match self {
            Command::Query(sql) => store.execute_query(&sql),
            Command::Statement(sql) => store.execute_statement(&sql),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}
