use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_adsumd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn adsumd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn build_dataset(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &PathBuf,
) -> serde_json::Value {
    let _ = request_ok(
        stdin,
        reader,
        "b1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "b2",
        "users.create",
        json!({ "name": "Ana Torres", "username": "ana", "password": "secret", "role": "PROFESSOR" }),
    );
    let created = request_ok(
        stdin,
        reader,
        "b3",
        "classes.create",
        json!({ "name": "1-A", "room": "Aula 3", "professorId": "prof-1" }),
    );
    let class_id = created
        .get("classId")
        .and_then(|v| v.as_str())
        .expect("classId")
        .to_string();

    let mut student_ids = Vec::new();
    for (i, first) in ["Marta", "Pablo"].iter().enumerate() {
        let created = request_ok(
            stdin,
            reader,
            &format!("b4-{}", i),
            "students.create",
            json!({ "classId": class_id, "firstName": first, "lastName": "Ruiz" }),
        );
        student_ids.push(
            created
                .get("studentId")
                .and_then(|v| v.as_str())
                .expect("studentId")
                .to_string(),
        );
    }
    let _ = request_ok(
        stdin,
        reader,
        "b5",
        "attendance.save",
        json!({
            "classId": class_id,
            "date": "2024-09-02",
            "records": [
                { "studentId": student_ids[0], "status": "PRESENT" },
                { "studentId": student_ids[1], "status": "JUSTIFIED" }
            ]
        }),
    );

    request_ok(stdin, reader, "b6", "data.export", json!({}))
}

#[test]
fn restart_returns_a_deep_equal_document() {
    let workspace = temp_dir("adsum-roundtrip");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let before = build_dataset(&mut stdin, &mut reader, &workspace);
    drop(stdin);
    let _ = child.wait();

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let after = request_ok(&mut stdin, &mut reader, "2", "data.export", json!({}));
    assert_eq!(before, after, "persisted document must round-trip");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn corrupt_document_falls_back_to_bootstrap() {
    let workspace = temp_dir("adsum-corrupt");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = build_dataset(&mut stdin, &mut reader, &workspace);
    drop(stdin);
    let _ = child.wait();

    // Truncated JSON under the data key: load must treat it as "no data".
    {
        let conn = rusqlite::Connection::open(workspace.join("adsum.sqlite3"))
            .expect("open workspace db");
        conn.execute(
            "UPDATE documents SET value = ? WHERE key = ?",
            ("{\"users\": [", "adsum_data"),
        )
        .expect("corrupt document");
    }

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let exported = request_ok(&mut stdin, &mut reader, "2", "data.export", json!({}));
    let data = exported.get("data").expect("data");
    let users = data.get("users").and_then(|v| v.as_array()).expect("users");
    assert_eq!(users.len(), 1);
    assert_eq!(
        users[0].get("username").and_then(|v| v.as_str()),
        Some("director")
    );
    assert_eq!(
        data.get("classes").and_then(|v| v.as_array()).map(|v| v.len()),
        Some(0)
    );
    assert_eq!(
        data.get("attendance").and_then(|v| v.as_array()).map(|v| v.len()),
        Some(0)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
