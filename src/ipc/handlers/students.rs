use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::NewStudent;
use crate::store::StoreError;
use serde_json::json;

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, StoreError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| StoreError::new("bad_params", format!("missing {}", key)))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code, e.message, e.details),
    };
    let Some(class) = store.data().classes.iter().find(|c| c.id == class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };

    // Roster order. Ids without a student entry are skipped, not errors.
    let students: Vec<serde_json::Value> = class
        .student_ids
        .iter()
        .filter_map(|id| store.data().students.get(id))
        .map(|s| {
            json!({
                "id": s.id,
                "firstName": s.first_name,
                "lastName": s.last_name,
                "attendanceHistory": s.attendance_history,
                "risk": s.risk
            })
        })
        .collect();

    ok(&req.id, json!({ "students": students }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code, e.message, e.details),
    };
    let props: NewStudent = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };

    match store.add_student_to_class(&class_id, props) {
        Ok(student) => ok(&req.id, json!({ "studentId": student.id })),
        Err(e) => err(&req.id, e.code, e.message, e.details),
    }
}

fn handle_students_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let class_id = match get_required_str(&req.params, "classId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code, e.message, e.details),
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return err(&req.id, e.code, e.message, e.details),
    };

    match store.remove_student_from_class(&class_id, &student_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, e.code, e.message, e.details),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.remove" => Some(handle_students_remove(state, req)),
        _ => None,
    }
}
