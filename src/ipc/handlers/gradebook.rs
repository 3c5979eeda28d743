use crate::gradebook::{TaskPatch, DEFAULT_SUBJECTS};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{edit_gradebook, gradebook, optional_str, required_str, required_u64};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_gradebook_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match gradebook(state, req) {
        Ok(book) => ok(&req.id, json!(book)),
        Err(e) => e,
    }
}

fn handle_subjects_defaults(_state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "subjects": DEFAULT_SUBJECTS }))
}

fn handle_subjects_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match optional_str(req, "name") {
        Ok(v) => v.map(str::to_string),
        Err(e) => return e,
    };
    edit_gradebook(state, req, |book| {
        let subject = book.add_subject(name.as_deref());
        Ok(json!({ "subject": subject }))
    })
}

fn handle_subjects_add_default(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    edit_gradebook(state, req, |book| {
        let subject = book.add_default_subject(&name)?;
        Ok(json!({ "subject": subject }))
    })
}

fn handle_subjects_rename(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_u64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    edit_gradebook(state, req, |book| {
        let subject = book.rename_subject(subject_id, &name)?;
        Ok(json!({ "subject": subject }))
    })
}

fn handle_subjects_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_u64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    edit_gradebook(state, req, |book| {
        book.remove_subject(subject_id)?;
        Ok(json!({ "ok": true }))
    })
}

fn handle_tasks_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_u64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    edit_gradebook(state, req, |book| {
        let task = book.add_task(subject_id)?;
        Ok(json!({ "task": task }))
    })
}

fn parse_task_patch(req: &Request) -> Result<TaskPatch, serde_json::Value> {
    let mut patch = TaskPatch::default();
    if let Some(name) = optional_str(req, "taskName")? {
        patch.task_name = Some(name.to_string());
    }
    for (key, slot) in [
        ("markGotten", &mut patch.mark_gotten),
        ("maxMark", &mut patch.max_mark),
        ("weight", &mut patch.weight),
    ] {
        match req.params.get(key) {
            None => {}
            // explicit null blanks the field, like clearing the input
            Some(v) if v.is_null() => *slot = Some(None),
            Some(v) => {
                let Some(n) = v.as_f64() else {
                    return Err(err(
                        &req.id,
                        "bad_params",
                        format!("{} must be a number", key),
                        None,
                    ));
                };
                if n < 0.0 {
                    return Err(err(
                        &req.id,
                        "bad_params",
                        format!("{} must not be negative", key),
                        None,
                    ));
                }
                *slot = Some(Some(n));
            }
        }
    }
    Ok(patch)
}

fn handle_tasks_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_u64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch = match parse_task_patch(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    edit_gradebook(state, req, |book| {
        let task = book.update_task(subject_id, &task_id, &patch)?;
        Ok(json!({ "task": task }))
    })
}

fn handle_tasks_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = match required_u64(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let task_id = match required_str(req, "taskId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    edit_gradebook(state, req, |book| {
        book.remove_task(subject_id, &task_id)?;
        Ok(json!({ "ok": true }))
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "gradebook.get" => Some(handle_gradebook_get(state, req)),
        "gradebook.subjects.defaults" => Some(handle_subjects_defaults(state, req)),
        "gradebook.subjects.add" => Some(handle_subjects_add(state, req)),
        "gradebook.subjects.addDefault" => Some(handle_subjects_add_default(state, req)),
        "gradebook.subjects.rename" => Some(handle_subjects_rename(state, req)),
        "gradebook.subjects.remove" => Some(handle_subjects_remove(state, req)),
        "gradebook.tasks.add" => Some(handle_tasks_add(state, req)),
        "gradebook.tasks.update" => Some(handle_tasks_update(state, req)),
        "gradebook.tasks.remove" => Some(handle_tasks_remove(state, req)),
        _ => None,
    }
}
