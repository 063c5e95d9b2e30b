use rusqlite::Connection;
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

use crate::db;
use crate::model::{
    default_avatar, AppData, AttendanceEntry, AttendanceRecord, AttendanceStats, ClassGroup,
    ClassPatch, NewClass, NewStudent, NewUser, Student, User, UserPatch,
    BOOTSTRAP_DIRECTOR_USERNAME,
};
use crate::stats;

/// Operation failure carried back into the IPC error envelope.
#[derive(Debug, Clone)]
pub struct StoreError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl StoreError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    fn persist(e: anyhow::Error) -> Self {
        Self::new("persist_failed", e.to_string())
    }
}

/// Canonical in-memory dataset plus its write-through storage. One store per
/// open workspace; readers only ever see the published snapshot.
pub struct DataStore {
    conn: Connection,
    data: AppData,
}

impl DataStore {
    /// Loads the persisted document, falling back to the bootstrap dataset
    /// when none exists or the stored payload does not parse.
    pub fn open(conn: Connection) -> Self {
        let data = match db::document_load(&conn, db::DATA_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<AppData>(&raw) {
                Ok(data) => data,
                Err(e) => {
                    eprintln!("adsumd: stored document is corrupt, starting fresh: {}", e);
                    AppData::bootstrap()
                }
            },
            Ok(None) => AppData::bootstrap(),
            Err(e) => {
                eprintln!("adsumd: failed to read stored document, starting fresh: {}", e);
                AppData::bootstrap()
            }
        };
        Self { conn, data }
    }

    pub fn data(&self) -> &AppData {
        &self.data
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Write-through: the new snapshot must be durable before it becomes the
    /// one readers observe. A failed write leaves the old snapshot in place.
    fn publish(&mut self, next: AppData) -> Result<(), StoreError> {
        let raw = serde_json::to_string(&next)
            .map_err(|e| StoreError::new("serialize_failed", e.to_string()))?;
        db::document_save(&self.conn, db::DATA_KEY, &raw).map_err(StoreError::persist)?;
        self.data = next;
        Ok(())
    }

    pub fn add_class(&mut self, new_class: NewClass) -> Result<ClassGroup, StoreError> {
        let class = ClassGroup {
            id: Uuid::new_v4().to_string(),
            name: new_class.name,
            room: new_class.room,
            professor_id: new_class.professor_id,
            student_ids: Vec::new(),
        };
        let mut next = self.data.clone();
        next.classes.push(class.clone());
        self.publish(next)?;
        Ok(class)
    }

    /// Removes the class only. Its students and attendance records survive
    /// as orphans; aggregation skips them.
    pub fn delete_class(&mut self, class_id: &str) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        next.classes.retain(|c| c.id != class_id);
        self.publish(next)
    }

    /// Merge-updates the named class; an unknown id leaves state unchanged.
    pub fn update_class(&mut self, class_id: &str, patch: ClassPatch) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        let Some(class) = next.classes.iter_mut().find(|c| c.id == class_id) else {
            return Ok(());
        };
        if let Some(name) = patch.name {
            class.name = name;
        }
        if let Some(room) = patch.room {
            class.room = room;
        }
        if let Some(professor_id) = patch.professor_id {
            class.professor_id = professor_id;
        }
        self.publish(next)
    }

    /// The student entry is created even when the class id is unknown; only
    /// the roster append is skipped. Unrostered students are never shown to
    /// professors.
    pub fn add_student_to_class(
        &mut self,
        class_id: &str,
        props: NewStudent,
    ) -> Result<Student, StoreError> {
        let student = Student {
            id: Uuid::new_v4().to_string(),
            first_name: props.first_name,
            last_name: props.last_name,
            attendance_history: AttendanceStats::default(),
            risk: false,
        };
        let mut next = self.data.clone();
        next.students.insert(student.id.clone(), student.clone());
        if let Some(class) = next.classes.iter_mut().find(|c| c.id == class_id) {
            class.student_ids.push(student.id.clone());
        }
        self.publish(next)?;
        Ok(student)
    }

    /// Deletes the student entry entirely and drops the id from the named
    /// class's roster only. Historical attendance entries stay behind.
    pub fn remove_student_from_class(
        &mut self,
        class_id: &str,
        student_id: &str,
    ) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        next.students.remove(student_id);
        if let Some(class) = next.classes.iter_mut().find(|c| c.id == class_id) {
            class.student_ids.retain(|id| id != student_id);
        }
        self.publish(next)
    }

    pub fn add_user(&mut self, new_user: NewUser) -> Result<User, StoreError> {
        if self.data.users.iter().any(|u| u.username == new_user.username) {
            return Err(StoreError::new(
                "username_taken",
                format!("username {} already exists", new_user.username),
            ));
        }
        let avatar = default_avatar(&new_user.name);
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: new_user.username,
            name: new_user.name,
            password: new_user.password,
            role: new_user.role,
            avatar,
        };
        let mut next = self.data.clone();
        next.users.push(user.clone());
        self.publish(next)?;
        Ok(user)
    }

    /// Merge-updates the named user and returns the result so a live session
    /// can be refreshed. An unknown id leaves state unchanged.
    pub fn update_user(
        &mut self,
        user_id: &str,
        patch: UserPatch,
    ) -> Result<Option<User>, StoreError> {
        if let Some(username) = &patch.username {
            if self
                .data
                .users
                .iter()
                .any(|u| u.username == *username && u.id != user_id)
            {
                return Err(StoreError::new(
                    "username_taken",
                    format!("username {} already exists", username),
                ));
            }
        }
        let mut next = self.data.clone();
        let Some(user) = next.users.iter_mut().find(|u| u.id == user_id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(password) = patch.password {
            user.password = password;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(avatar) = patch.avatar {
            user.avatar = avatar;
        }
        let updated = user.clone();
        self.publish(next)?;
        Ok(Some(updated))
    }

    /// Deleting the bootstrap director or the acting user is refused; an
    /// unknown id is a no-op.
    pub fn delete_user(&mut self, user_id: &str, acting: Option<&User>) -> Result<(), StoreError> {
        let Some(target) = self.data.users.iter().find(|u| u.id == user_id) else {
            return Ok(());
        };
        if target.username == BOOTSTRAP_DIRECTOR_USERNAME {
            return Err(StoreError::new(
                "protected_user",
                "the system director cannot be deleted",
            ));
        }
        if acting.map(|u| u.id == user_id).unwrap_or(false) {
            return Err(StoreError::new(
                "active_user",
                "the signed-in user cannot delete itself",
            ));
        }
        let mut next = self.data.clone();
        next.users.retain(|u| u.id != user_id);
        self.publish(next)
    }

    /// Upsert by (classId, date): any existing record for the key is
    /// replaced, never merged. Every student on the class's current roster
    /// must be covered and every entry must reference a rostered student;
    /// otherwise the save is rejected before anything is written.
    pub fn save_attendance(
        &mut self,
        class_id: &str,
        date: &str,
        entries: Vec<AttendanceEntry>,
    ) -> Result<AttendanceRecord, StoreError> {
        let Some(class) = self.data.classes.iter().find(|c| c.id == class_id) else {
            return Err(StoreError::new("not_found", "class not found"));
        };
        let covered: HashSet<&str> = entries.iter().map(|e| e.student_id.as_str()).collect();
        let missing: Vec<&String> = class
            .student_ids
            .iter()
            .filter(|id| !covered.contains(id.as_str()))
            .collect();
        if !missing.is_empty() {
            return Err(StoreError {
                code: "incomplete_attendance",
                message: "every student on the roster needs a status before saving".to_string(),
                details: Some(json!({ "missingStudentIds": missing })),
            });
        }
        if let Some(stray) = entries
            .iter()
            .find(|e| !class.student_ids.iter().any(|id| *id == e.student_id))
        {
            return Err(StoreError::new(
                "unknown_student",
                format!("student {} is not on this roster", stray.student_id),
            ));
        }

        let record = AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            date: date.to_string(),
            class_id: class_id.to_string(),
            records: entries,
        };
        let mut next = self.data.clone();
        next.attendance
            .retain(|r| !(r.class_id == class_id && r.date == date));
        next.attendance.push(record.clone());
        recompute_roster(&mut next, class_id);
        self.publish(next)?;
        Ok(record)
    }

    /// Removing an absent key is a no-op, not an error. The roster is
    /// recomputed either way, exactly as in save.
    pub fn delete_attendance(&mut self, class_id: &str, date: &str) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        next.attendance
            .retain(|r| !(r.class_id == class_id && r.date == date));
        recompute_roster(&mut next, class_id);
        self.publish(next)
    }

    pub fn class_stats(&self, class_id: &str) -> AttendanceStats {
        stats::class_stats(class_id, &self.data.attendance)
    }

    /// Discards both persisted blobs and reverts to the bootstrap snapshot.
    /// The caller is responsible for signing the session out.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        db::document_delete(&self.conn, db::DATA_KEY).map_err(StoreError::persist)?;
        db::document_delete(&self.conn, db::SESSION_KEY).map_err(StoreError::persist)?;
        self.data = AppData::bootstrap();
        Ok(())
    }
}

/// Refreshes stats and risk for every student currently on the class's
/// roster. Roster ids without a student entry are tolerated and skipped.
fn recompute_roster(data: &mut AppData, class_id: &str) {
    let roster = match data.classes.iter().find(|c| c.id == class_id) {
        Some(class) => class.student_ids.clone(),
        None => return,
    };
    for student_id in &roster {
        let history = stats::compute_stats(student_id, &data.attendance);
        if let Some(student) = data.students.get_mut(student_id) {
            student.attendance_history = history;
            student.risk = stats::is_at_risk(&history);
        }
    }
}
