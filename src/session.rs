use rusqlite::Connection;

use crate::db;
use crate::model::User;
use crate::store::{DataStore, StoreError};

/// Acting identity for the open workspace. The signed-in user is persisted
/// under its own document key so a daemon restart does not sign anyone out.
pub struct Session {
    current: Option<User>,
}

impl Session {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current.as_ref()
    }

    /// Restores the persisted session, if any. A blob that does not parse is
    /// ignored; the user just signs in again.
    pub fn restore(&mut self, conn: &Connection) {
        self.current = match db::document_load(conn, db::SESSION_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            _ => None,
        };
    }

    /// Plain-text credential comparison against the document's users.
    pub fn login(
        &mut self,
        store: &DataStore,
        username: &str,
        password: &str,
    ) -> Result<User, StoreError> {
        let Some(user) = store
            .data()
            .users
            .iter()
            .find(|u| u.username == username && u.password == password)
        else {
            return Err(StoreError::new(
                "invalid_credentials",
                "unknown username or wrong password",
            ));
        };
        let user = user.clone();
        self.save(store.connection(), &user)?;
        self.current = Some(user.clone());
        Ok(user)
    }

    pub fn logout(&mut self, conn: &Connection) -> Result<(), StoreError> {
        db::document_delete(conn, db::SESSION_KEY)
            .map_err(|e| StoreError::new("persist_failed", e.to_string()))?;
        self.current = None;
        Ok(())
    }

    /// Clears the in-memory identity without touching storage; used after a
    /// data reset has already discarded the session blob.
    pub fn force_logout(&mut self) {
        self.current = None;
    }

    /// Keeps a live session in step with edits to the acting user's own
    /// profile. Edits to anyone else are ignored here.
    pub fn sync_profile(&mut self, conn: &Connection, user: &User) -> Result<(), StoreError> {
        match &self.current {
            Some(current) if current.id == user.id => {}
            _ => return Ok(()),
        }
        self.save(conn, user)?;
        self.current = Some(user.clone());
        Ok(())
    }

    fn save(&self, conn: &Connection, user: &User) -> Result<(), StoreError> {
        let raw = serde_json::to_string(user)
            .map_err(|e| StoreError::new("serialize_failed", e.to_string()))?;
        db::document_save(conn, db::SESSION_KEY, &raw)
            .map_err(|e| StoreError::new("persist_failed", e.to_string()))?;
        Ok(())
    }
}
