use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Persisted session state
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Session {
    /// Identifier of the signed-in user, None when signed out
    pub user_id: Option<String>,
}

/// Manages the authenticated session and provides thread-safe access.
///
/// The session is an explicitly constructed object passed to collaborators
/// rather than process-wide ambient state. Authentication flows (sign-in UI)
/// live outside this crate; they call sign_in/sign_out here.
pub struct SessionManager {
    session_path: PathBuf,
    current_session: Arc<RwLock<Session>>,
}

impl SessionManager {
    /// Creates a new SessionManager and loads the session from disk
    ///
    /// If the session file doesn't exist, creates it signed out.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The session directory cannot be created
    /// - The session file cannot be read or written
    pub fn new() -> Result<Self, String> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| "Failed to get home directory".to_string())?;

        let session_path = home_dir.join(".mybloom").join("session.json");
        Self::new_with_path(session_path)
    }

    /// Creates a new SessionManager with a custom session path
    ///
    /// This is primarily used for testing but is also used internally by new().
    pub(crate) fn new_with_path(session_path: PathBuf) -> Result<Self, String> {
        if let Some(parent) = session_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create session directory: {}", e))?;
            }
        }

        let manager = Self {
            session_path: session_path.clone(),
            current_session: Arc::new(RwLock::new(Session::default())),
        };

        let session = if session_path.exists() {
            manager.load_from_file()?
        } else {
            let defaults = Session::default();
            manager.save_to_file(&defaults)?;
            defaults
        };

        *manager.current_session.write()
            .map_err(|e| format!("Failed to acquire write lock: {}", e))? = session;

        Ok(manager)
    }

    /// Returns the identifier of the signed-in user, if any
    pub fn current_user(&self) -> Option<String> {
        self.current_session.read()
            .expect("Failed to acquire read lock")
            .user_id
            .clone()
    }

    /// Records a signed-in user (persists to disk first, then updates memory)
    ///
    /// # Errors
    ///
    /// Returns an error if the user id is empty or the disk write fails.
    /// In-memory state remains unchanged on error.
    pub fn sign_in(&self, user_id: &str) -> Result<(), String> {
        if user_id.trim().is_empty() {
            return Err("User id cannot be empty".to_string());
        }

        let session = Session {
            user_id: Some(user_id.to_string()),
        };
        self.save_to_file(&session)?;

        *self.current_session.write()
            .map_err(|e| format!("Failed to acquire write lock: {}", e))? = session;

        Ok(())
    }

    /// Clears the session (persists to disk first, then updates memory)
    pub fn sign_out(&self) -> Result<(), String> {
        let session = Session::default();
        self.save_to_file(&session)?;

        *self.current_session.write()
            .map_err(|e| format!("Failed to acquire write lock: {}", e))? = session;

        Ok(())
    }

    /// Loads the session from disk
    ///
    /// If the file contains invalid JSON, logs an error and returns a
    /// signed-out session to ensure graceful degradation.
    fn load_from_file(&self) -> Result<Session, String> {
        let contents = std::fs::read_to_string(&self.session_path)
            .map_err(|e| format!("Failed to read session file: {}", e))?;

        match serde_json::from_str(&contents) {
            Ok(session) => Ok(session),
            Err(e) => {
                eprintln!("Session: Failed to parse session JSON: {}. Signing out.", e);
                Ok(Session::default())
            }
        }
    }

    /// Saves the session to disk atomically
    ///
    /// Uses a temporary file and atomic rename to prevent partial writes.
    fn save_to_file(&self, session: &Session) -> Result<(), String> {
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| format!("Failed to serialize session: {}", e))?;

        let temp_path = self.session_path.with_extension("json.tmp");
        std::fs::write(&temp_path, json)
            .map_err(|e| format!("Failed to write temporary session file: {}", e))?;

        std::fs::rename(&temp_path, &self.session_path)
            .map_err(|e| format!("Failed to rename session file: {}", e))?;

        Ok(())
    }
}
