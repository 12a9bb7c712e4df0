use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::auth::Principal;
use super::domain::{
    Application, ApplicationId, ApplicationStatus, ApplicationView, Job, JobId, JobStatus,
    NewApplication, Role,
};
use super::error::BoardError;
use super::jobs::job_not_found;
use super::notify::{Mailer, Notification, Notifier};
use super::repository::{RepositoryError, Store};
use super::validation;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySubmission {
    pub cover_letter: Option<String>,
    #[serde(alias = "resume")]
    pub resume_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
}

/// Job seeker submissions and employer review.
pub struct ApplicationService<S, N> {
    store: Arc<S>,
    mailer: Arc<Mailer<N>>,
}

impl<S, N> ApplicationService<S, N>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: Arc<S>, mailer: Arc<Mailer<N>>) -> Self {
        Self { store, mailer }
    }

    /// Nothing is written unless the job is approved and the caller has not applied before.
    /// The store re-checks both at insert time, so a posting withdrawn from moderation
    /// mid-request cannot collect an application.
    pub async fn submit(
        &self,
        principal: &Principal,
        job_id: JobId,
        submission: ApplySubmission,
    ) -> Result<Application, BoardError> {
        principal.require_role(Role::User, "Only job seekers can apply to jobs")?;
        let job = self.store.job_by_id(job_id).await?.ok_or_else(job_not_found)?;
        if job.status != JobStatus::Approved {
            return Err(not_open());
        }

        let (cover_letter, resume_url) = match (
            validation::optional(submission.cover_letter),
            validation::optional(submission.resume_url),
        ) {
            (Some(cover_letter), Some(resume_url)) => (cover_letter, resume_url),
            _ => {
                return Err(BoardError::validation(
                    "Cover letter and resume URL are required",
                ))
            }
        };
        validation::resume_url(&resume_url)?;

        let applicant = self
            .store
            .user_by_id(principal.id)
            .await?
            .ok_or_else(|| BoardError::not_found("User not found"))?;
        let employer = self.store.user_by_id(job.employer_id).await?;

        let application = self
            .store
            .insert_application(NewApplication {
                cover_letter,
                resume_url,
                user_id: applicant.id,
                job_id: job.id,
                created_at: Utc::now(),
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => {
                    BoardError::Conflict("You have already applied to this job".to_string())
                }
                RepositoryError::Stale => not_open(),
                RepositoryError::NotFound => job_not_found(),
                other => other.into(),
            })?;
        info!(
            application_id = %application.id,
            job_id = %job.id,
            user_id = %applicant.id,
            "application submitted"
        );

        self.mailer.dispatch(
            &applicant.email,
            Notification::ApplicationReceived {
                first_name: applicant.first_name.clone(),
                job_title: job.title.clone(),
                company: job.company.clone(),
            },
        );
        if let Some(employer) = employer {
            self.mailer.dispatch(
                &employer.email,
                Notification::NewApplicant {
                    first_name: employer.first_name,
                    job_title: job.title,
                    applicant_name: applicant.full_name(),
                },
            );
        }

        Ok(application)
    }

    /// The caller's own applications with each job embedded.
    pub async fn for_user(
        &self,
        principal: &Principal,
    ) -> Result<Vec<ApplicationView>, BoardError> {
        principal.require_role(Role::User, "Only job seekers can view their applications")?;
        let applications = self.store.applications_by_user(principal.id).await?;
        let mut views = Vec::with_capacity(applications.len());
        for application in applications {
            let job = self.store.job_by_id(application.job_id).await?;
            views.push(ApplicationView {
                application,
                job,
                user: None,
            });
        }
        Ok(views)
    }

    /// Applications to one job with each applicant embedded.
    pub async fn for_job(
        &self,
        principal: &Principal,
        job_id: JobId,
    ) -> Result<Vec<ApplicationView>, BoardError> {
        let job = self.store.job_by_id(job_id).await?.ok_or_else(job_not_found)?;
        ensure_reviewer(principal, &job, "view")?;

        let applications = self.store.applications_by_job(job.id).await?;
        let mut views = Vec::with_capacity(applications.len());
        for application in applications {
            views.push(self.with_applicant(application).await?);
        }
        Ok(views)
    }

    pub async fn get(
        &self,
        principal: &Principal,
        id: ApplicationId,
    ) -> Result<ApplicationView, BoardError> {
        let application = self.find(id).await?;

        if principal.role == Role::User {
            if application.user_id != principal.id {
                return Err(BoardError::forbidden(
                    "You can only view your own applications",
                ));
            }
            let job = self.store.job_by_id(application.job_id).await?;
            return Ok(ApplicationView {
                application,
                job,
                user: None,
            });
        }

        let job = self
            .store
            .job_by_id(application.job_id)
            .await?
            .ok_or_else(job_not_found)?;
        ensure_reviewer(principal, &job, "view")?;
        self.with_applicant(application).await
    }

    /// Any status may follow any other; only the vocabulary is checked.
    pub async fn update_status(
        &self,
        principal: &Principal,
        id: ApplicationId,
        update: StatusUpdate,
    ) -> Result<Application, BoardError> {
        let current = self.find(id).await?;
        let job = self
            .store
            .job_by_id(current.job_id)
            .await?
            .ok_or_else(job_not_found)?;
        ensure_reviewer(principal, &job, "update")?;

        let status = update
            .status
            .as_deref()
            .map(str::trim)
            .and_then(|raw| raw.parse::<ApplicationStatus>().ok())
            .ok_or_else(|| BoardError::validation("Invalid status"))?;

        let application = self
            .store
            .set_application_status(current.id, status)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => application_not_found(),
                other => other.into(),
            })?;
        info!(
            application_id = %application.id,
            from = current.status.label(),
            to = status.label(),
            "application status changed"
        );
        Ok(application)
    }

    async fn find(&self, id: ApplicationId) -> Result<Application, BoardError> {
        self.store
            .application_by_id(id)
            .await?
            .ok_or_else(application_not_found)
    }

    async fn with_applicant(
        &self,
        application: Application,
    ) -> Result<ApplicationView, BoardError> {
        let user = self
            .store
            .user_by_id(application.user_id)
            .await?
            .map(|user| user.view());
        Ok(ApplicationView {
            application,
            job: None,
            user,
        })
    }
}

fn not_open() -> BoardError {
    BoardError::validation("This job is not available for applications")
}

fn application_not_found() -> BoardError {
    BoardError::not_found("Application not found")
}

/// Owning employer or admin.
fn ensure_reviewer(principal: &Principal, job: &Job, verb: &str) -> Result<(), BoardError> {
    match principal.role {
        Role::Admin => Ok(()),
        Role::Employer if job.employer_id == principal.id => Ok(()),
        Role::Employer => Err(BoardError::forbidden(format!(
            "You can only {verb} applications for your own jobs"
        ))),
        Role::User => Err(BoardError::forbidden("Insufficient permissions")),
    }
}
