use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn temp_dir(prefix: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("{}-{}", prefix, nanos));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradecalcd");
    let mut child = Command::new(exe)
        .env_remove("GRADECALCD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradecalcd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn select_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &Path,
) -> serde_json::Value {
    request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    )
}

#[test]
fn fresh_workspace_is_seeded_with_preset_subjects() {
    let workspace = temp_dir("gradecalcd-seed");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let selected = select_workspace(&mut stdin, &mut reader, &workspace);
    let names: Vec<&str> = selected["gradebook"]["subjects"]
        .as_array()
        .expect("subjects")
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert_eq!(names.len(), 9);
    assert_eq!(names[0], "Maths (Core)");
    assert!(names.contains(&"English"));

    let defaults = request_ok(&mut stdin, &mut reader, "1", "gradebook.subjects.defaults", json!({}));
    assert_eq!(defaults["subjects"].as_array().map(|a| a.len()), Some(9));

    let dup = request(
        &mut stdin,
        &mut reader,
        "2",
        "gradebook.subjects.addDefault",
        json!({ "name": "English" }),
    );
    assert_eq!(dup["ok"], json!(false));
    assert_eq!(dup["error"]["code"], json!("duplicate_subject"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn task_edits_persist_and_feed_analysis() {
    let workspace = temp_dir("gradecalcd-tasks");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "gradebook.subjects.add",
        json!({ "name": "Latin" }),
    );
    let subject_id = added["subject"]["id"].as_u64().expect("subject id");
    assert_eq!(added["subject"]["name"], json!("Latin"));

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "gradebook.tasks.add",
        json!({ "subjectId": subject_id }),
    );
    assert_eq!(first["task"]["taskName"], json!("Task 1"));
    let task_id = first["task"]["id"].as_str().expect("task id").to_string();

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "gradebook.tasks.add",
        json!({ "subjectId": subject_id }),
    );
    assert_eq!(second["task"]["taskName"], json!("Task 2"));

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "gradebook.tasks.update",
        json!({
            "subjectId": subject_id,
            "taskId": task_id,
            "taskName": "Translation",
            "markGotten": 18,
            "maxMark": 20,
            "weight": 40
        }),
    );
    assert_eq!(updated["task"]["taskName"], json!("Translation"));
    assert_eq!(updated["task"]["markGotten"], json!(18.0));

    let negative = request(
        &mut stdin,
        &mut reader,
        "5",
        "gradebook.tasks.update",
        json!({ "subjectId": subject_id, "taskId": task_id, "weight": -1 }),
    );
    assert_eq!(negative["error"]["code"], json!("bad_params"));

    // the blank second task is dropped by validation
    let analysis = request_ok(&mut stdin, &mut reader, "6", "analysis.run", json!({}));
    assert_eq!(analysis["dropped"], json!(1));
    let avg = analysis["summary"]["overall"]["weightedAverage"]
        .as_f64()
        .expect("weighted average");
    assert!((avg - 90.0).abs() < 1e-9);

    drop(stdin);
    let _ = child.wait();

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let reopened = select_workspace(&mut stdin, &mut reader, &workspace);
    let latin = reopened["gradebook"]["subjects"]
        .as_array()
        .expect("subjects")
        .iter()
        .find(|s| s["id"].as_u64() == Some(subject_id))
        .cloned()
        .expect("latin survives restart");
    assert_eq!(latin["tasks"][0]["taskName"], json!("Translation"));
    assert_eq!(latin["tasks"].as_array().map(|a| a.len()), Some(2));

    let third = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "gradebook.tasks.add",
        json!({ "subjectId": subject_id }),
    );
    assert_eq!(third["task"]["taskName"], json!("Task 3"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn rename_and_remove_subjects() {
    let workspace = temp_dir("gradecalcd-subjects");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let renamed = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "gradebook.subjects.rename",
        json!({ "subjectId": 0, "name": "   " }),
    );
    assert_eq!(renamed["subject"]["name"], json!("Subject 0"));

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "gradebook.subjects.remove",
        json!({ "subjectId": 0 }),
    );
    let again = request(
        &mut stdin,
        &mut reader,
        "3",
        "gradebook.subjects.remove",
        json!({ "subjectId": 0 }),
    );
    assert_eq!(again["error"]["code"], json!("not_found"));

    let missing_task = request(
        &mut stdin,
        &mut reader,
        "4",
        "gradebook.tasks.remove",
        json!({ "subjectId": 1, "taskId": "nope" }),
    );
    assert_eq!(missing_task["error"]["code"], json!("not_found"));

    let book = request_ok(&mut stdin, &mut reader, "5", "gradebook.get", json!({}));
    assert_eq!(book["subjects"].as_array().map(|a| a.len()), Some(8));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn theme_preference_round_trips() {
    let workspace = temp_dir("gradecalcd-prefs");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let no_ws = request(&mut stdin, &mut reader, "0", "preferences.get", json!({}));
    assert_eq!(no_ws["error"]["code"], json!("no_workspace"));

    select_workspace(&mut stdin, &mut reader, &workspace);
    let prefs = request_ok(&mut stdin, &mut reader, "1", "preferences.get", json!({}));
    assert_eq!(prefs["theme"], json!("light"));

    let set = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "preferences.set",
        json!({ "theme": "dark" }),
    );
    assert_eq!(set["theme"], json!("dark"));

    let bad = request(
        &mut stdin,
        &mut reader,
        "3",
        "preferences.set",
        json!({ "theme": "sepia" }),
    );
    assert_eq!(bad["error"]["code"], json!("bad_params"));

    let prefs = request_ok(&mut stdin, &mut reader, "4", "preferences.get", json!({}));
    assert_eq!(prefs["theme"], json!("dark"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn null_in_task_update_clears_the_field() {
    let workspace = temp_dir("gradecalcd-clear");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let task = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "gradebook.tasks.add",
        json!({ "subjectId": 2 }),
    );
    let task_id = task["task"]["id"].as_str().expect("task id").to_string();
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "gradebook.tasks.update",
        json!({ "subjectId": 2, "taskId": task_id, "markGotten": 4.0, "maxMark": 5, "weight": 10 }),
    );
    let analysis = request_ok(&mut stdin, &mut reader, "3", "analysis.run", json!({}));
    assert_eq!(analysis["summary"]["recordCount"], json!(1));

    // omitted fields stay, null blanks
    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "gradebook.tasks.update",
        json!({ "subjectId": 2, "taskId": task_id, "markGotten": null }),
    );
    assert_eq!(cleared["task"]["markGotten"], json!(null));
    assert_eq!(cleared["task"]["maxMark"], json!(5.0));
    assert_eq!(cleared["task"]["weight"], json!(10.0));

    let res = request(&mut stdin, &mut reader, "5", "analysis.run", json!({}));
    assert_eq!(res["error"]["code"], json!("no_valid_data"));
    assert_eq!(res["error"]["details"]["dropped"], json!(1));

    drop(stdin);
    let _ = child.wait();

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let reopened = select_workspace(&mut stdin, &mut reader, &workspace);
    assert_eq!(
        reopened["gradebook"]["subjects"][2]["tasks"][0]["markGotten"],
        json!(null)
    );

    drop(stdin);
    let _ = child.wait();
}
