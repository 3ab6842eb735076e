//! Session: the top-level entity a Session/Loop Coordinator owns.
//!
//! A Session owns one or more Waves and is mutated by the scheduler as
//! progress advances; it becomes terminal when all waves complete or an
//! unrecoverable failure occurs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

impl SessionStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A long-running orchestration session: a user intent driven through
/// planning, wave-based execution, verification and commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub project_path: String,
}

impl Session {
    pub fn new(title: impl Into<String>, project_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            created_at: now,
            last_activity_at: now,
            status: SessionStatus::Active,
            project_path: project_path.into(),
        }
    }

    pub fn with_id(id: impl Into<String>, title: impl Into<String>, project_path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            created_at: now,
            last_activity_at: now,
            status: SessionStatus::Active,
            project_path: project_path.into(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.touch();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_active() {
        let s = Session::new("add auth", "/repo");
        assert_eq!(s.status, SessionStatus::Active);
        assert!(!s.id.is_empty());
        assert!(!s.is_terminal());
    }

    #[test]
    fn set_status_updates_activity_and_terminality() {
        let mut s = Session::new("add auth", "/repo");
        let created = s.last_activity_at;
        std::thread::sleep(std::time::Duration::from_millis(2));
        s.set_status(SessionStatus::Completed);
        assert!(s.last_activity_at >= created);
        assert!(s.is_terminal());
    }

    #[test]
    fn status_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&SessionStatus::Paused).unwrap(), "\"paused\"");
    }
}
