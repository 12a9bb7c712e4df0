use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::board::auth::Principal;
use crate::board::domain::{
    EmploymentType, ExperienceLevel, Job, JobId, JobStatus, JobView, NewJob, Role,
};
use crate::board::error::BoardError;
use crate::board::listing::{
    JobFilter, JobQuery, PageMeta, PageRequest, DEFAULT_JOB_PAGE_SIZE, MAX_JOB_PAGE_SIZE,
};
use crate::board::repository::{RepositoryError, Store};
use crate::board::validation;

use super::moderation::{self, Access};

/// Posting fields as submitted. On update, absent fields keep their stored value and an
/// explicit `null` salary bound clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub benefits: Option<String>,
    pub location: Option<String>,
    #[serde(default, deserialize_with = "explicit")]
    pub salary_min: Option<Option<u32>>,
    #[serde(default, deserialize_with = "explicit")]
    pub salary_max: Option<Option<u32>>,
    pub skills: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub employment_type: Option<EmploymentType>,
    pub experience_level: Option<ExperienceLevel>,
    pub remote: Option<bool>,
}

/// `Some(None)` for an explicit `null`; a missing key falls back to `None` via `default`.
fn explicit<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub jobs: Vec<JobView>,
    #[serde(flatten)]
    pub meta: PageMeta,
}

/// Employer-facing posting operations and the public catalogue.
pub struct JobService<S> {
    store: Arc<S>,
}

impl<S> JobService<S>
where
    S: Store + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Approved postings only, newest first.
    pub async fn list(&self, query: JobQuery) -> Result<JobPage, BoardError> {
        let page = PageRequest::new(
            query.page,
            query.limit,
            DEFAULT_JOB_PAGE_SIZE,
            MAX_JOB_PAGE_SIZE,
        );
        let filter = JobFilter::public(query.search.as_deref(), query.location.as_deref());
        let (jobs, total) = self
            .store
            .search_jobs(&filter, page.offset(), page.limit as usize)
            .await?;

        Ok(JobPage {
            jobs: self.counted(jobs).await?,
            meta: page.meta(total),
        })
    }

    pub async fn get(
        &self,
        id: JobId,
        principal: Option<&Principal>,
    ) -> Result<JobView, BoardError> {
        let job = self.find(id).await?;
        match moderation::access(&job, principal) {
            Access::Hidden => Err(job_not_found()),
            Access::Public => {
                let count = self.store.application_count(job.id).await?;
                Ok(JobView::counted(job, count))
            }
            Access::Privileged => {
                let applications = self.store.applications_by_job(job.id).await?;
                Ok(JobView {
                    job,
                    application_count: None,
                    applications: Some(applications),
                    employer: None,
                })
            }
        }
    }

    pub async fn create(&self, principal: &Principal, draft: JobDraft) -> Result<Job, BoardError> {
        principal.require_role(Role::Employer, "Only employers can create jobs")?;
        let employer = self
            .store
            .user_by_id(principal.id)
            .await?
            .ok_or_else(|| BoardError::not_found("User not found"))?;

        let title = validation::required(draft.title, "title")?;
        let description = validation::required(draft.description, "description")?;
        let requirements = validation::required(draft.requirements, "requirements")?;
        let location = validation::required(draft.location, "location")?;
        let skills = validation::skills(draft.skills)?;
        let salary_min = draft.salary_min.flatten();
        let salary_max = draft.salary_max.flatten();
        validation::salary_range(salary_min, salary_max)?;
        let company = validation::optional(employer.company)
            .ok_or_else(|| BoardError::validation("Company name is required for employers"))?;

        let job = self
            .store
            .insert_job(NewJob {
                title,
                description,
                requirements,
                benefits: validation::optional(draft.benefits),
                location,
                salary_min,
                salary_max,
                skills,
                employment_type: draft.employment_type.unwrap_or_default(),
                experience_level: draft.experience_level.unwrap_or_default(),
                remote: draft.remote.unwrap_or(false),
                company,
                employer_id: employer.id,
                created_at: Utc::now(),
            })
            .await?;
        info!(job_id = %job.id, employer_id = %job.employer_id, "job posted for review");
        Ok(job)
    }

    /// Applies a partial edit; the posting goes back to moderation. The write only lands
    /// if nothing else touched the posting since it was read.
    pub async fn update(
        &self,
        principal: &Principal,
        id: JobId,
        patch: JobDraft,
    ) -> Result<Job, BoardError> {
        let mut job = self.owned(principal, id, "update").await?;
        let seen = job.updated_at;

        if patch.title.is_some() {
            job.title = validation::required(patch.title, "title")?;
        }
        if patch.description.is_some() {
            job.description = validation::required(patch.description, "description")?;
        }
        if patch.requirements.is_some() {
            job.requirements = validation::required(patch.requirements, "requirements")?;
        }
        if patch.location.is_some() {
            job.location = validation::required(patch.location, "location")?;
        }
        if patch.skills.is_some() {
            job.skills = validation::skills(patch.skills)?;
        }
        if patch.benefits.is_some() {
            job.benefits = validation::optional(patch.benefits);
        }
        if let Some(salary_min) = patch.salary_min {
            job.salary_min = salary_min;
        }
        if let Some(salary_max) = patch.salary_max {
            job.salary_max = salary_max;
        }
        validation::salary_range(job.salary_min, job.salary_max)?;
        if let Some(employment_type) = patch.employment_type {
            job.employment_type = employment_type;
        }
        if let Some(experience_level) = patch.experience_level {
            job.experience_level = experience_level;
        }
        if let Some(remote) = patch.remote {
            job.remote = remote;
        }

        let previous = job.status;
        job.status = JobStatus::Pending;
        let job = self
            .store
            .replace_job(job, seen)
            .await
            .map_err(|err| match err {
                RepositoryError::Stale => BoardError::Conflict(
                    "Job was changed by another request; reload and try again".to_string(),
                ),
                RepositoryError::NotFound => job_not_found(),
                other => other.into(),
            })?;
        info!(
            job_id = %job.id,
            from = previous.label(),
            to = job.status.label(),
            "job edited and queued for review"
        );
        Ok(job)
    }

    pub async fn delete(&self, principal: &Principal, id: JobId) -> Result<(), BoardError> {
        let job = self.owned(principal, id, "delete").await?;
        self.store.delete_job(job.id).await.map_err(|err| match err {
            RepositoryError::NotFound => job_not_found(),
            other => other.into(),
        })?;
        info!(job_id = %job.id, "job deleted");
        Ok(())
    }

    /// Every posting of the calling employer, in any status.
    pub async fn mine(&self, principal: &Principal) -> Result<Vec<JobView>, BoardError> {
        principal.require_role(Role::Employer, "Only employers can view their jobs")?;
        let jobs = self.store.jobs_by_employer(principal.id).await?;
        self.counted(jobs).await
    }

    async fn find(&self, id: JobId) -> Result<Job, BoardError> {
        self.store.job_by_id(id).await?.ok_or_else(job_not_found)
    }

    async fn owned(&self, principal: &Principal, id: JobId, verb: &str) -> Result<Job, BoardError> {
        principal.require_role(Role::Employer, &format!("Only employers can {verb} jobs"))?;
        let job = self.find(id).await?;
        if job.employer_id != principal.id {
            return Err(BoardError::forbidden(format!(
                "You can only {verb} your own jobs"
            )));
        }
        Ok(job)
    }

    async fn counted(&self, jobs: Vec<Job>) -> Result<Vec<JobView>, BoardError> {
        let mut views = Vec::with_capacity(jobs.len());
        for job in jobs {
            let count = self.store.application_count(job.id).await?;
            views.push(JobView::counted(job, count));
        }
        Ok(views)
    }
}

pub(crate) fn job_not_found() -> BoardError {
    BoardError::not_found("Job not found")
}
