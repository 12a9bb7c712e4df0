use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Job, JobId, JobStatus, NewApplication, NewJob,
    NewUser, Role, User, UserId,
};
use super::listing::JobFilter;

/// Counts grouped by an enum column plus rows created since a cutoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally<K: Ord> {
    pub total: usize,
    pub by_key: BTreeMap<K, usize>,
    pub recent: usize,
}

impl<K: Ord> Default for Tally<K> {
    fn default() -> Self {
        Self {
            total: 0,
            by_key: BTreeMap::new(),
            recent: 0,
        }
    }
}

impl<K: Ord> Tally<K> {
    pub fn record(&mut self, key: K, created_at: DateTime<Utc>, since: DateTime<Utc>) {
        self.total += 1;
        *self.by_key.entry(key).or_insert(0) += 1;
        if created_at >= since {
            self.recent += 1;
        }
    }

    pub fn count(&self, key: &K) -> usize {
        self.by_key.get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the e-mail is already registered.
    async fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn update_user(&self, user: User) -> Result<(), RepositoryError>;
    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    /// Newest first, with the unpaged total.
    async fn users_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<User>, usize), RepositoryError>;
    async fn user_tally(&self, since: DateTime<Utc>) -> Result<Tally<Role>, RepositoryError>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn insert_job(&self, job: NewJob) -> Result<Job, RepositoryError>;
    /// Overwrites the posting only if its `updated_at` still equals `seen`.
    /// Fails with `Stale` when another write landed in between.
    async fn replace_job(&self, job: Job, seen: DateTime<Utc>) -> Result<Job, RepositoryError>;
    /// Moves the posting from `from` to `to` in one step.
    /// Fails with `Stale` when the stored status is no longer `from`.
    async fn transition_job(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Job, RepositoryError>;
    /// Removes the job together with its applications.
    async fn delete_job(&self, id: JobId) -> Result<(), RepositoryError>;
    async fn job_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;
    /// Newest first, with the unpaged total of matching rows.
    async fn search_jobs(
        &self,
        filter: &JobFilter,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Job>, usize), RepositoryError>;
    async fn jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError>;
    async fn jobs_by_employer(&self, employer_id: UserId) -> Result<Vec<Job>, RepositoryError>;
    async fn job_tally(&self, since: DateTime<Utc>) -> Result<Tally<JobStatus>, RepositoryError>;
}

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Fails with `Conflict` when the user already applied to the job and with
    /// `Stale` when the job is not approved at the moment of the insert.
    async fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError>;
    async fn set_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, RepositoryError>;
    async fn application_by_id(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError>;
    async fn applications_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Application>, RepositoryError>;
    async fn applications_by_job(&self, job_id: JobId)
        -> Result<Vec<Application>, RepositoryError>;
    async fn application_count(&self, job_id: JobId) -> Result<usize, RepositoryError>;
    async fn application_tally(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Tally<ApplicationStatus>, RepositoryError>;
}

/// Persistence backing the whole board.
#[async_trait]
pub trait Store: UserRepository + JobRepository + ApplicationRepository {
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record changed since it was read")]
    Stale,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Next `updated_at` for a row last written at `previous`, always at least a
/// microsecond later so compare-and-set never sees two writes as one.
pub fn touch(previous: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + Duration::microseconds(1);
    Utc::now().max(floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_counts_recent_rows_from_cutoff() {
        let now = Utc::now();
        let since = now - Duration::days(30);
        let mut tally = Tally::default();
        tally.record(Role::User, now, since);
        tally.record(Role::User, now - Duration::days(45), since);
        tally.record(Role::Employer, since, since);

        assert_eq!(tally.total, 3);
        assert_eq!(tally.recent, 2);
        assert_eq!(tally.count(&Role::User), 2);
        assert_eq!(tally.count(&Role::Admin), 0);
    }

    #[test]
    fn touch_always_moves_forward() {
        let future = Utc::now() + Duration::hours(1);
        assert!(touch(future) > future);
        let past = Utc::now() - Duration::hours(1);
        assert!(touch(past) > past + Duration::minutes(59));
    }
}
