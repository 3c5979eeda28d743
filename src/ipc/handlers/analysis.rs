use crate::calc;
use crate::format;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{gradebook, parse_mode};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, AnalysisMode, RawRow, ValidationOutcome};
use serde_json::json;

/// Aggregates and formats an already validated row set of `row_count` rows.
pub fn analyze_validated(
    id: &str,
    row_count: usize,
    validated: &ValidationOutcome,
    mode: AnalysisMode,
) -> serde_json::Value {
    let summary = match calc::analyze(&validated.records, mode) {
        Ok(v) => v,
        Err(e) => {
            return calc_err(
                id,
                e.with_details(json!({
                    "rowCount": row_count,
                    "dropped": validated.dropped,
                })),
            )
        }
    };
    let presentation = format::present(&summary);
    ok(
        id,
        json!({
            "mode": mode,
            "rowCount": row_count,
            "dropped": validated.dropped,
            "summary": summary,
            "presentation": presentation,
        }),
    )
}

fn analyze_rows(id: &str, rows: &[RawRow], mode: AnalysisMode) -> serde_json::Value {
    let validated = records::validate_rows(rows, mode);
    analyze_validated(id, rows.len(), &validated, mode)
}

fn handle_analysis_run(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mode = match parse_mode(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let rows = match req.params.get("rows") {
        Some(raw) if !raw.is_null() => match records::rows_from_json(raw) {
            Ok(v) => v,
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        },
        _ => {
            if mode != AnalysisMode::Weighted {
                return err(
                    &req.id,
                    "bad_params",
                    "time-series analysis needs explicit rows",
                    None,
                );
            }
            match gradebook(state, req) {
                Ok(book) => book.collect_rows(),
                Err(e) => return e,
            }
        }
    };

    analyze_rows(&req.id, &rows, mode)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analysis.run" => Some(handle_analysis_run(state, req)),
        _ => None,
    }
}
