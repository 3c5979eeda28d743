use crate::db;
use crate::gradebook::GradeBook;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::analysis::analyze_validated;
use crate::ipc::helpers::{db_conn, gradebook, parse_mode, required_path};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, AnalysisMode};
use crate::tabular;
use serde_json::json;

fn handle_tabular_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_path(req, "path") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mode = match parse_mode(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = db_conn(state, req) {
        return e;
    }

    let rows = match tabular::read_rows_from_path(&path) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "tabular_read_failed",
                "Error reading CSV.",
                Some(json!({ "cause": format!("{e:#}") })),
            )
        }
    };

    let validated = records::validate_rows(&rows, mode);
    let resp = analyze_validated(&req.id, rows.len(), &validated, mode);
    let succeeded = resp.get("ok").and_then(|v| v.as_bool()).unwrap_or(false);
    if !succeeded || mode != AnalysisMode::Weighted {
        return resp;
    }

    // Weighted imports replace the grade book, like re-populating the form.
    let book = GradeBook::from_records(&validated.records);
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = db::save_gradebook(conn, &book) {
        return err(&req.id, "db_update_failed", format!("{e:#}"), None);
    }
    log::info!(
        "imported {} records into {} subjects from {}",
        validated.records.len(),
        book.subjects.len(),
        path.to_string_lossy()
    );
    state.gradebook = Some(book);

    let mut resp = resp;
    resp["result"]["gradebook"] = json!(state.gradebook);
    resp
}

fn handle_tabular_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_path(req, "path") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let book = match gradebook(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let validated = records::validate_rows(&book.collect_rows(), AnalysisMode::Weighted);
    if validated.records.is_empty() {
        return err(
            &req.id,
            "no_valid_data",
            "No grades to export. Add some tasks first.",
            None,
        );
    }
    if let Err(e) = tabular::write_csv(&validated.records, &path) {
        return err(&req.id, "tabular_write_failed", format!("{e:#}"), None);
    }
    log::info!(
        "exported {} records to {}",
        validated.records.len(),
        path.to_string_lossy()
    );
    ok(
        &req.id,
        json!({
            "path": path.to_string_lossy(),
            "rowCount": validated.records.len(),
            "dropped": validated.dropped,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "tabular.import" => Some(handle_tabular_import(state, req)),
        "tabular.export" => Some(handle_tabular_export(state, req)),
        _ => None,
    }
}
