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
fn bundle_export_and_import_restore_the_gradebook() {
    let workspace = temp_dir("gradecalcd-backup-src");
    let bundle = workspace.join("backup.zip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let added = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "gradebook.subjects.add",
        json!({ "name": "Geography" }),
    );
    let subject_id = added["subject"]["id"].as_u64().expect("subject id");

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );
    assert_eq!(exported["bundleFormat"], json!("gradecalc-workspace-v1"));
    let sha = exported["dbSha256"].as_str().expect("sha").to_string();
    assert_eq!(sha.len(), 64);
    assert!(bundle.exists());

    // edits after the export are rolled back by the import
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "gradebook.subjects.remove",
        json!({ "subjectId": subject_id }),
    );

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    assert_eq!(imported["dbSha256"], json!(sha));
    let restored = imported["gradebook"]["subjects"]
        .as_array()
        .expect("subjects")
        .iter()
        .any(|s| s["name"] == json!("Geography"));
    assert!(restored);

    let book = request_ok(&mut stdin, &mut reader, "5", "gradebook.get", json!({}));
    assert_eq!(book["subjects"].as_array().map(|a| a.len()), Some(10));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn bundle_restores_into_another_workspace() {
    let source = temp_dir("gradecalcd-backup-a");
    let target = temp_dir("gradecalcd-backup-b");
    let bundle = source.join("move.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &source);
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "preferences.set",
        json!({ "theme": "dark" }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );

    select_workspace(&mut stdin, &mut reader, &target);
    let prefs = request_ok(&mut stdin, &mut reader, "3", "preferences.get", json!({}));
    assert_eq!(prefs["theme"], json!("light"));

    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "backup.import",
        json!({ "inPath": bundle.to_string_lossy() }),
    );
    let prefs = request_ok(&mut stdin, &mut reader, "5", "preferences.get", json!({}));
    assert_eq!(prefs["theme"], json!("dark"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn corrupt_bundle_is_rejected_and_workspace_still_usable() {
    let workspace = temp_dir("gradecalcd-backup-bad");
    let bogus = workspace.join("not-a-bundle.zip");
    std::fs::write(&bogus, b"definitely not a zip").expect("write bogus");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let no_ws = request(
        &mut stdin,
        &mut reader,
        "0",
        "backup.export",
        json!({ "outPath": bogus.to_string_lossy() }),
    );
    assert_eq!(no_ws["error"]["code"], json!("no_workspace"));

    select_workspace(&mut stdin, &mut reader, &workspace);
    let res = request(
        &mut stdin,
        &mut reader,
        "1",
        "backup.import",
        json!({ "inPath": bogus.to_string_lossy() }),
    );
    assert_eq!(res["error"]["code"], json!("backup_failed"));

    let book = request_ok(&mut stdin, &mut reader, "2", "gradebook.get", json!({}));
    assert_eq!(book["subjects"].as_array().map(|a| a.len()), Some(9));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn failed_reopen_still_reports_the_import_error() {
    let root = temp_dir("gradecalcd-backup-reopen");
    let workspace = root.join("ws");
    let bogus = root.join("bogus.zip");
    std::fs::write(&bogus, b"not a zip either").expect("write bogus");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    // a plain file where the workspace directory was cannot be reopened
    std::fs::remove_dir_all(&workspace).expect("remove workspace");
    std::fs::write(&workspace, b"").expect("block workspace path");

    let res = request(
        &mut stdin,
        &mut reader,
        "1",
        "backup.import",
        json!({ "inPath": bogus.to_string_lossy() }),
    );
    assert_eq!(res["error"]["code"], json!("db_open_failed"));
    let import_error = res["error"]["details"]["importError"]
        .as_str()
        .expect("import error kept");
    assert!(import_error.contains("zip"), "{}", import_error);

    drop(stdin);
    let _ = child.wait();
}
