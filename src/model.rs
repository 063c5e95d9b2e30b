use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Username of the user created by the bootstrap dataset. This account can
/// never be deleted; it is the login of last resort on a fresh install.
pub const BOOTSTRAP_DIRECTOR_USERNAME: &str = "director";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Director,
    Professor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Justified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub password: String,
    pub role: Role,
    pub avatar: String,
}

/// A class and its roster. Roster order is insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassGroup {
    pub id: String,
    pub name: String,
    pub room: String,
    pub professor_id: String,
    pub student_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceStats {
    pub present: u32,
    pub absent: u32,
    pub justified: u32,
    pub total: u32,
}

/// `attendance_history` and `risk` are derived from the attendance log and
/// only ever written by the store's recomputation; edit paths go through
/// patch structs that cannot name them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub attendance_history: AttendanceStats,
    pub risk: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
}

/// One class's attendance for one calendar day. At most one record exists
/// per (classId, date); saving over the key replaces the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub date: String,
    pub class_id: String,
    pub records: Vec<AttendanceEntry>,
}

/// The aggregate root: the whole persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    pub users: Vec<User>,
    pub classes: Vec<ClassGroup>,
    pub students: BTreeMap<String, Student>,
    pub attendance: Vec<AttendanceRecord>,
}

impl AppData {
    /// Dataset used when no document exists yet: one director, nothing else,
    /// so a fresh install always has a login.
    pub fn bootstrap() -> Self {
        Self {
            users: vec![User {
                id: "director-1".to_string(),
                username: BOOTSTRAP_DIRECTOR_USERNAME.to_string(),
                name: "Director".to_string(),
                password: "admin".to_string(),
                role: Role::Director,
                avatar: default_avatar("Director"),
            }],
            classes: Vec::new(),
            students: BTreeMap::new(),
            attendance: Vec::new(),
        }
    }
}

pub fn default_avatar(name: &str) -> String {
    format!("https://ui-avatars.com/api/?name={}&background=random", name)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
    pub room: String,
    pub professor_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// Fields an edit path may change on a class. The roster belongs to the
/// student operations and is deliberately absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPatch {
    pub name: Option<String>,
    pub room: Option<String>,
    pub professor_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub avatar: Option<String>,
}
