//! Posting lifecycle: `pending -> approved | rejected`, driven by admins.

use crate::board::auth::Principal;
use crate::board::domain::{Job, JobStatus};
use crate::board::error::BoardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub const fn target(self) -> JobStatus {
        match self {
            Decision::Approve => JobStatus::Approved,
            Decision::Reject => JobStatus::Rejected,
        }
    }
}

/// Only pending postings can be moderated.
pub fn moderate(current: JobStatus, decision: Decision) -> Result<JobStatus, BoardError> {
    match current {
        JobStatus::Pending => Ok(decision.target()),
        JobStatus::Approved | JobStatus::Rejected => Err(not_pending()),
    }
}

pub fn not_pending() -> BoardError {
    BoardError::validation("Job is not pending approval")
}

/// How much of a posting a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Hidden,
    Public,
    /// Owning employer or admin: full view including applications.
    Privileged,
}

pub fn access(job: &Job, principal: Option<&Principal>) -> Access {
    let privileged =
        principal.is_some_and(|principal| principal.is_admin() || principal.id == job.employer_id);

    if privileged {
        Access::Privileged
    } else if job.status == JobStatus::Approved {
        Access::Public
    } else {
        Access::Hidden
    }
}
