use rusqlite::{Connection, OptionalExtension};

use super::error::HandlerErr;
use super::types::{AppState, Request};

pub fn db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(HandlerErr::bad_params(format!("missing {}", key))),
    }
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Fails with `not_found` unless `id` exists in `table`.
pub fn ensure_exists(conn: &Connection, table: &str, what: &str, id: &str) -> Result<(), HandlerErr> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    let found: Option<i64> = conn
        .query_row(&sql, [id], |r| r.get(0))
        .optional()
        .map_err(|e| HandlerErr::db("db_query_failed", e))?;
    match found {
        Some(_) => Ok(()),
        None => Err(HandlerErr::not_found(what, id)),
    }
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Runs a handler body and renders its outcome as a response line.
pub fn respond<F>(req: &Request, body: F) -> serde_json::Value
where
    F: FnOnce() -> Result<serde_json::Value, HandlerErr>,
{
    match body() {
        Ok(result) => super::error::ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}
