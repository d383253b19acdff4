//! Project submission status.
//!
//! ```text
//! not-started -> in-progress -> submitted -> approved -> completed
//!                                   |   ^
//!                                   v   |
//!                                 rejected
//! ```
//!
//! Submission for review is mandatory: `in-progress` never jumps to
//! `completed`, and `rejected` must be resubmitted before it can complete.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    #[default]
    NotStarted,
    InProgress,
    Submitted,
    Approved,
    Rejected,
    Completed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Cannot move a project from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: ProjectStatus,
    pub to: ProjectStatus,
}

impl ProjectStatus {
    pub fn can_transition_to(self, to: ProjectStatus) -> bool {
        use ProjectStatus::*;
        matches!(
            (self, to),
            (NotStarted, InProgress)
                | (InProgress, Submitted)
                | (Submitted, Approved)
                | (Submitted, Rejected)
                | (Submitted, Completed)
                | (Approved, Completed)
                | (Rejected, Submitted)
        )
    }

    pub fn transition(self, to: ProjectStatus) -> Result<ProjectStatus, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ProjectStatus::Completed
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub project_id: Uuid,
    pub status: ProjectStatus,
    pub updated_at: DateTime<Utc>,
}

/// In-memory status per project. Unknown projects read as `not-started`.
#[derive(Default)]
pub struct ProjectTracker {
    projects: Mutex<HashMap<Uuid, ProjectRecord>>,
}

impl ProjectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, project_id: Uuid) -> ProjectRecord {
        let projects = self.projects.lock().unwrap_or_else(|p| p.into_inner());
        projects.get(&project_id).cloned().unwrap_or(ProjectRecord {
            project_id,
            status: ProjectStatus::NotStarted,
            updated_at: Utc::now(),
        })
    }

    pub fn transition(
        &self,
        project_id: Uuid,
        to: ProjectStatus,
    ) -> Result<ProjectRecord, TransitionError> {
        let mut projects = self.projects.lock().unwrap_or_else(|p| p.into_inner());
        let from = projects
            .get(&project_id)
            .map(|r| r.status)
            .unwrap_or_default();
        let status = from.transition(to)?;
        let record = ProjectRecord {
            project_id,
            status,
            updated_at: Utc::now(),
        };
        projects.insert(project_id, record.clone());
        if status.is_terminal() {
            info!("Project {project_id} completed");
        } else {
            info!("Project {project_id}: {from:?} -> {status:?}");
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProjectStatus::*;

    #[test]
    fn test_happy_path_through_approval() {
        let mut s = NotStarted;
        for next in [InProgress, Submitted, Approved, Completed] {
            s = s.transition(next).unwrap();
        }
        assert!(s.is_terminal());
    }

    #[test]
    fn test_submitted_may_complete_directly() {
        assert_eq!(Submitted.transition(Completed), Ok(Completed));
    }

    #[test]
    fn test_in_progress_cannot_skip_review() {
        assert_eq!(
            InProgress.transition(Completed),
            Err(TransitionError {
                from: InProgress,
                to: Completed
            })
        );
    }

    #[test]
    fn test_rejected_must_resubmit() {
        assert!(Rejected.transition(Completed).is_err());
        assert!(Rejected.transition(Approved).is_err());
        let resubmitted = Rejected.transition(Submitted).unwrap();
        assert_eq!(resubmitted.transition(Approved), Ok(Approved));
    }

    #[test]
    fn test_completed_is_final() {
        for to in [NotStarted, InProgress, Submitted, Approved, Rejected, Completed] {
            assert!(!Completed.can_transition_to(to));
        }
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&NotStarted).unwrap(), r#""not-started""#);
        let s: ProjectStatus = serde_json::from_str(r#""in-progress""#).unwrap();
        assert_eq!(s, InProgress);
    }

    #[test]
    fn test_tracker_records_transitions() {
        let tracker = ProjectTracker::new();
        let id = Uuid::new_v4();
        assert_eq!(tracker.get(id).status, NotStarted);
        tracker.transition(id, InProgress).unwrap();
        assert!(tracker.transition(id, Completed).is_err());
        assert_eq!(tracker.get(id).status, InProgress);
        tracker.transition(id, Submitted).unwrap();
        assert_eq!(tracker.transition(id, Completed).unwrap().status, Completed);
    }
}
