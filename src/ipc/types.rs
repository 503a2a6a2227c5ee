use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One request per stdin line: `{ "id", "method", "params" }`.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Whole-process state: the selected workspace directory and its open
/// database, if any.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
