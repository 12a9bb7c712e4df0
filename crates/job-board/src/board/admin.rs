use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::Principal;
use super::domain::{ApplicationStatus, Job, JobId, JobStatus, JobView, Role, UserView};
use super::error::BoardError;
use super::jobs::{job_not_found, moderation, Decision};
use super::listing::{PageMeta, PageQuery, PageRequest, DEFAULT_USER_PAGE_SIZE, MAX_USER_PAGE_SIZE};
use super::notify::{Mailer, ModerationOutcome, Notification, Notifier};
use super::repository::{RepositoryError, Store};
use super::validation;

const RECENT_ACTIVITY_DAYS: i64 = 30;
const DEFAULT_REJECTION_REASON: &str = "No reason provided";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStats {
    pub total_users: usize,
    pub total_jobs: usize,
    pub total_applications: usize,
    pub pending_jobs: usize,
    pub users_by_role: BTreeMap<Role, usize>,
    pub jobs_by_status: BTreeMap<JobStatus, usize>,
    pub applications_by_status: BTreeMap<ApplicationStatus, usize>,
    pub recent_activity: RecentActivity,
}

/// Rows created inside the recent-activity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecentActivity {
    pub users: usize,
    pub jobs: usize,
    pub applications: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<UserView>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

/// Moderation queue, platform statistics and the user directory. Admins only.
pub struct AdminService<S, N> {
    store: Arc<S>,
    mailer: Arc<Mailer<N>>,
}

impl<S, N> AdminService<S, N>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, mailer: Arc<Mailer<N>>) -> Self {
        Self { store, mailer }
    }

    /// Pending postings newest first, each with its employer.
    pub async fn pending_jobs(&self, principal: &Principal) -> Result<Vec<JobView>, BoardError> {
        principal.require_admin()?;
        let pending = self.store.jobs_by_status(JobStatus::Pending).await?;
        let mut views = Vec::with_capacity(pending.len());
        for job in pending {
            let employer = self
                .store
                .user_by_id(job.employer_id)
                .await?
                .map(|user| user.view());
            views.push(JobView {
                job,
                application_count: None,
                applications: None,
                employer,
            });
        }
        Ok(views)
    }

    pub async fn approve(&self, principal: &Principal, id: JobId) -> Result<Job, BoardError> {
        self.moderate(principal, id, Decision::Approve, None).await
    }

    pub async fn reject(
        &self,
        principal: &Principal,
        id: JobId,
        request: RejectRequest,
    ) -> Result<Job, BoardError> {
        self.moderate(principal, id, Decision::Reject, request.reason)
            .await
    }

    pub async fn stats(&self, principal: &Principal) -> Result<BoardStats, BoardError> {
        principal.require_admin()?;
        let since = Utc::now() - Duration::days(RECENT_ACTIVITY_DAYS);

        let users = self.store.user_tally(since).await?;
        let jobs = self.store.job_tally(since).await?;
        let applications = self.store.application_tally(since).await?;

        Ok(BoardStats {
            total_users: users.total,
            total_jobs: jobs.total,
            total_applications: applications.total,
            pending_jobs: jobs.count(&JobStatus::Pending),
            recent_activity: RecentActivity {
                users: users.recent,
                jobs: jobs.recent,
                applications: applications.recent,
            },
            users_by_role: users.by_key,
            jobs_by_status: jobs.by_key,
            applications_by_status: applications.by_key,
        })
    }

    pub async fn users(&self, principal: &Principal, query: PageQuery) -> Result<UserPage, BoardError> {
        principal.require_admin()?;
        let page = PageRequest::new(
            query.page,
            query.limit,
            DEFAULT_USER_PAGE_SIZE,
            MAX_USER_PAGE_SIZE,
        );
        let (users, total) = self
            .store
            .users_page(page.offset(), page.limit as usize)
            .await?;

        Ok(UserPage {
            users: users.iter().map(|user| user.view()).collect(),
            meta: page.meta(total),
        })
    }

    /// The status check is repeated by the store's conditional write, so two admins
    /// deciding the same posting at once cannot both succeed.
    async fn moderate(
        &self,
        principal: &Principal,
        id: JobId,
        decision: Decision,
        reason: Option<String>,
    ) -> Result<Job, BoardError> {
        principal.require_admin()?;
        let current = self.store.job_by_id(id).await?.ok_or_else(job_not_found)?;
        let previous = current.status;
        let target = moderation::moderate(previous, decision)?;
        let job = self
            .store
            .transition_job(id, previous, target)
            .await
            .map_err(|err| match err {
                RepositoryError::Stale => moderation::not_pending(),
                RepositoryError::NotFound => job_not_found(),
                other => other.into(),
            })?;
        info!(
            job_id = %job.id,
            admin_id = %principal.id,
            from = previous.label(),
            to = job.status.label(),
            "job moderated"
        );

        let outcome = match decision {
            Decision::Approve => ModerationOutcome::Approved,
            Decision::Reject => ModerationOutcome::Rejected {
                reason: validation::optional(reason)
                    .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string()),
            },
        };
        if let Ok(Some(employer)) = self.store.user_by_id(job.employer_id).await {
            self.mailer.dispatch(
                &employer.email,
                Notification::JobModerated {
                    first_name: employer.first_name,
                    job_title: job.title.clone(),
                    outcome,
                },
            );
        }

        Ok(job)
    }
}
