use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceEntry;
use crate::store::StoreError;
use chrono::NaiveDate;
use serde_json::json;

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, StoreError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| StoreError::new("bad_params", format!("missing {}", key)))
}

/// Dates travel as ISO calendar dates with no time component. Parsing and
/// re-formatting gives one canonical key per day.
fn parse_iso_date(raw: &str) -> Result<String, StoreError> {
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(date) => Ok(date.format("%Y-%m-%d").to_string()),
        Err(_) => Err(StoreError::new("bad_params", "date must be YYYY-MM-DD")),
    }
}

fn handle_attendance_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code, e.message, e.details),
    };
    let date = match get_required_str(&req.params, "date").and_then(|raw| parse_iso_date(&raw)) {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code, e.message, e.details),
    };
    let entries: Vec<AttendanceEntry> = match req.params.get("records") {
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
        },
        None => return err(&req.id, "bad_params", "missing records", None),
    };

    match store.save_attendance(&class_id, &date, entries) {
        Ok(record) => ok(
            &req.id,
            json!({
                "recordId": record.id,
                "classId": record.class_id,
                "date": record.date
            }),
        ),
        Err(e) => err(&req.id, e.code, e.message, e.details),
    }
}

fn handle_attendance_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code, e.message, e.details),
    };
    let date = match get_required_str(&req.params, "date").and_then(|raw| parse_iso_date(&raw)) {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code, e.message, e.details),
    };

    match store.delete_attendance(&class_id, &date) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, e.code, e.message, e.details),
    }
}

fn handle_attendance_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code, e.message, e.details),
    };
    let date = match get_required_str(&req.params, "date").and_then(|raw| parse_iso_date(&raw)) {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code, e.message, e.details),
    };

    let record = store
        .data()
        .attendance
        .iter()
        .find(|r| r.class_id == class_id && r.date == date);
    ok(&req.id, json!({ "record": record }))
}

fn handle_attendance_class_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code, e.message, e.details),
    };

    let stats = store.class_stats(&class_id);
    ok(
        &req.id,
        json!({
            "present": stats.present,
            "absent": stats.absent,
            "justified": stats.justified,
            "total": stats.total
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.save" => Some(handle_attendance_save(state, req)),
        "attendance.delete" => Some(handle_attendance_delete(state, req)),
        "attendance.get" => Some(handle_attendance_get(state, req)),
        "attendance.classStats" => Some(handle_attendance_class_stats(state, req)),
        _ => None,
    }
}
