use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewUser, UserPatch};
use serde_json::json;

fn handle_users_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match serde_json::to_value(&store.data().users) {
        Ok(users) => ok(&req.id, json!({ "users": users })),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let new_user: NewUser = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if new_user.username.trim().is_empty() {
        return err(&req.id, "bad_params", "username must not be empty", None);
    }

    match store.add_user(new_user) {
        Ok(user) => ok(&req.id, json!({ "userId": user.id, "username": user.username })),
        Err(e) => err(&req.id, e.code, e.message, e.details),
    }
}

fn handle_users_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing userId", None),
    };
    let patch: UserPatch = match req.params.get("patch") {
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
        },
        None => return err(&req.id, "bad_params", "missing patch", None),
    };

    match store.update_user(&user_id, patch) {
        Ok(Some(user)) => {
            // Editing your own profile refreshes the live session too.
            if let Err(e) = state.session.sync_profile(store.connection(), &user) {
                return err(&req.id, e.code, e.message, e.details);
            }
            ok(&req.id, json!({ "user": user }))
        }
        Ok(None) => ok(&req.id, json!({ "user": null })),
        Err(e) => err(&req.id, e.code, e.message, e.details),
    }
}

fn handle_users_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let user_id = match req.params.get("userId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing userId", None),
    };

    let acting = state.session.current_user().cloned();
    match store.delete_user(&user_id, acting.as_ref()) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, e.code, e.message, e.details),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.list" => Some(handle_users_list(state, req)),
        "users.create" => Some(handle_users_create(state, req)),
        "users.update" => Some(handle_users_update(state, req)),
        "users.delete" => Some(handle_users_delete(state, req)),
        _ => None,
    }
}
