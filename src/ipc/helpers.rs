use crate::calc::CalcError;
use crate::db;
use crate::gradebook::GradeBook;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::types::{AppState, Request};
use crate::records::AnalysisMode;
use rusqlite::Connection;
use std::path::PathBuf;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_path(req: &Request, key: &str) -> Result<PathBuf, serde_json::Value> {
    let raw = required_str(req, key)?;
    if raw.trim().is_empty() {
        return Err(err(&req.id, "bad_params", format!("{} must not be empty", key), None));
    }
    Ok(PathBuf::from(raw))
}

pub fn required_u64(req: &Request, key: &str) -> Result<u64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("missing or non-integer {}", key),
                None,
            )
        })
}

pub fn optional_str<'a>(req: &'a Request, key: &str) -> Result<Option<&'a str>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_str().map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a string or null", key),
                None,
            )
        }),
    }
}

pub fn parse_mode(req: &Request) -> Result<AnalysisMode, serde_json::Value> {
    match optional_str(req, "mode")? {
        None => Ok(AnalysisMode::Weighted),
        Some(raw) => AnalysisMode::parse(raw).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "mode must be 'weighted' or 'timeSeries'",
                None,
            )
        }),
    }
}

pub fn db_conn<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn gradebook<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a GradeBook, serde_json::Value> {
    state
        .gradebook
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Applies `f` to the grade book and persists it when `f` succeeds. A failed
/// edit leaves both the in-memory and stored book untouched.
pub fn edit_gradebook<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&mut GradeBook) -> Result<serde_json::Value, CalcError>,
{
    let (Some(conn), Some(book)) = (state.db.as_ref(), state.gradebook.as_mut()) else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut draft = book.clone();
    let result = match f(&mut draft) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    if let Err(e) = db::save_gradebook(conn, &draft) {
        return err(&req.id, "db_update_failed", format!("{e:#}"), None);
    }
    *book = draft;
    ok(&req.id, result)
}
