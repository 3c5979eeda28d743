use crate::db::{self, Theme};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_preferences_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match db::load_preferences(conn) {
        Ok(prefs) => ok(&req.id, json!(prefs)),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

fn handle_preferences_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let theme = match optional_str(req, "theme") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut prefs = match db::load_preferences(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    if let Some(raw) = theme {
        let Some(t) = Theme::parse(raw) else {
            return err(&req.id, "bad_params", "theme must be 'light' or 'dark'", None);
        };
        prefs.theme = t;
    }
    if let Err(e) = db::save_preferences(conn, &prefs) {
        return err(&req.id, "db_update_failed", format!("{e:#}"), None);
    }
    ok(&req.id, json!(prefs))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "preferences.get" => Some(handle_preferences_get(state, req)),
        "preferences.set" => Some(handle_preferences_set(state, req)),
        _ => None,
    }
}
