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

fn request(
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

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
}

struct Fixture {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    workspace: PathBuf,
    class_id: String,
    student_ids: Vec<String>,
    next_id: u32,
}

impl Fixture {
    fn new(prefix: &str, student_count: usize) -> Self {
        let workspace = temp_dir(prefix);
        let (child, mut stdin, mut reader) = spawn_sidecar();
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            "setup-ws",
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        let created = request_ok(
            &mut stdin,
            &mut reader,
            "setup-class",
            "classes.create",
            json!({ "name": "1-A", "room": "Aula 3", "professorId": "prof-1" }),
        );
        let class_id = created
            .get("classId")
            .and_then(|v| v.as_str())
            .expect("classId")
            .to_string();

        let mut student_ids = Vec::new();
        for i in 0..student_count {
            let created = request_ok(
                &mut stdin,
                &mut reader,
                &format!("setup-student-{}", i),
                "students.create",
                json!({
                    "classId": class_id,
                    "firstName": format!("S{}", i),
                    "lastName": "Test"
                }),
            );
            student_ids.push(
                created
                    .get("studentId")
                    .and_then(|v| v.as_str())
                    .expect("studentId")
                    .to_string(),
            );
        }

        Self {
            child,
            stdin,
            reader,
            workspace,
            class_id,
            student_ids,
            next_id: 0,
        }
    }

    fn call(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = format!("r{}", self.next_id);
        request(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    fn call_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = format!("r{}", self.next_id);
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    fn attendance_log(&mut self) -> Vec<serde_json::Value> {
        let result = self.call_ok("data.export", json!({}));
        result
            .get("data")
            .and_then(|v| v.get("attendance"))
            .and_then(|v| v.as_array())
            .cloned()
            .expect("attendance array")
    }

    fn finish(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(self.workspace);
    }
}

#[test]
fn second_save_for_same_key_replaces_first() {
    let mut fx = Fixture::new("adsum-upsert", 2);
    let (a, b) = (fx.student_ids[0].clone(), fx.student_ids[1].clone());

    fx.call_ok(
        "attendance.save",
        json!({
            "classId": fx.class_id,
            "date": "2024-09-02",
            "records": [
                { "studentId": a, "status": "PRESENT" },
                { "studentId": b, "status": "PRESENT" }
            ]
        }),
    );
    fx.call_ok(
        "attendance.save",
        json!({
            "classId": fx.class_id,
            "date": "2024-09-02",
            "records": [
                { "studentId": a, "status": "PRESENT" },
                { "studentId": b, "status": "ABSENT" }
            ]
        }),
    );

    let log = fx.attendance_log();
    assert_eq!(log.len(), 1, "same key must never duplicate");
    let statuses: Vec<&str> = log[0]
        .get("records")
        .and_then(|v| v.as_array())
        .expect("records")
        .iter()
        .map(|r| r.get("status").and_then(|v| v.as_str()).expect("status"))
        .collect();
    assert_eq!(statuses, vec!["PRESENT", "ABSENT"], "second save wins");

    // A second day is a different key and appends.
    fx.call_ok(
        "attendance.save",
        json!({
            "classId": fx.class_id,
            "date": "2024-09-03",
            "records": [
                { "studentId": a, "status": "PRESENT" },
                { "studentId": b, "status": "PRESENT" }
            ]
        }),
    );
    assert_eq!(fx.attendance_log().len(), 2);

    fx.finish();
}

#[test]
fn deleting_a_missing_key_is_a_noop() {
    let mut fx = Fixture::new("adsum-delete-noop", 1);
    let a = fx.student_ids[0].clone();

    fx.call_ok(
        "attendance.save",
        json!({
            "classId": fx.class_id,
            "date": "2024-09-02",
            "records": [{ "studentId": a, "status": "PRESENT" }]
        }),
    );

    fx.call_ok(
        "attendance.delete",
        json!({ "classId": fx.class_id, "date": "2024-09-03" }),
    );
    assert_eq!(fx.attendance_log().len(), 1, "log length unchanged");

    fx.call_ok(
        "attendance.delete",
        json!({ "classId": fx.class_id, "date": "2024-09-02" }),
    );
    assert_eq!(fx.attendance_log().len(), 0);

    fx.finish();
}

#[test]
fn incomplete_save_is_rejected_and_writes_nothing() {
    let mut fx = Fixture::new("adsum-incomplete", 2);
    let a = fx.student_ids[0].clone();

    let class_id = fx.class_id.clone();
    let resp = fx.call(
        "attendance.save",
        json!({
            "classId": class_id,
            "date": "2024-09-02",
            "records": [{ "studentId": a, "status": "PRESENT" }]
        }),
    );
    assert_eq!(error_code(&resp), "incomplete_attendance");
    assert_eq!(fx.attendance_log().len(), 0, "rejected save must not write");

    fx.finish();
}

#[test]
fn unrostered_entry_is_rejected() {
    let mut fx = Fixture::new("adsum-stray", 1);
    let a = fx.student_ids[0].clone();

    let class_id = fx.class_id.clone();
    let resp = fx.call(
        "attendance.save",
        json!({
            "classId": class_id,
            "date": "2024-09-02",
            "records": [
                { "studentId": a, "status": "PRESENT" },
                { "studentId": "ghost", "status": "ABSENT" }
            ]
        }),
    );
    assert_eq!(error_code(&resp), "unknown_student");
    assert_eq!(fx.attendance_log().len(), 0);

    fx.finish();
}

#[test]
fn unknown_class_and_bad_date_are_rejected() {
    let mut fx = Fixture::new("adsum-save-guards", 1);
    let a = fx.student_ids[0].clone();

    let resp = fx.call(
        "attendance.save",
        json!({
            "classId": "missing",
            "date": "2024-09-02",
            "records": [{ "studentId": a, "status": "PRESENT" }]
        }),
    );
    assert_eq!(error_code(&resp), "not_found");

    let class_id = fx.class_id.clone();
    let resp = fx.call(
        "attendance.save",
        json!({
            "classId": class_id,
            "date": "2024-13-45",
            "records": [{ "studentId": a, "status": "PRESENT" }]
        }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    fx.finish();
}
