use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Job, JobId, JobStatus, NewApplication, NewJob,
    NewUser, Role, User, UserId,
};
use super::listing::JobFilter;
use super::repository::{
    touch, ApplicationRepository, JobRepository, RepositoryError, Store, Tally, UserRepository,
};

/// Process-local store. Every write runs under one lock so uniqueness checks and inserts
/// are a single step, the same guarantee a unique index gives a relational backend.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    jobs: BTreeMap<JobId, Job>,
    applications: BTreeMap<ApplicationId, Application>,
    emails: HashMap<String, UserId>,
    applied: HashSet<(JobId, UserId)>,
    next_user: u64,
    next_job: u64,
    next_application: u64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

fn newest_first<T, F>(rows: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, u64),
{
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.tables()?;
        let key = email_key(&user.email);
        if tables.emails.contains_key(&key) {
            return Err(RepositoryError::Conflict);
        }

        tables.next_user += 1;
        let record = User {
            id: UserId(tables.next_user),
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            role: user.role,
            company: user.company,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        tables.emails.insert(key, record.id);
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_user(&self, mut user: User) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        let existing = tables
            .users
            .get(&user.id)
            .ok_or(RepositoryError::NotFound)?;
        user.updated_at = touch(existing.updated_at);
        if email_key(&existing.email) != email_key(&user.email) {
            let key = email_key(&user.email);
            if tables.emails.contains_key(&key) {
                return Err(RepositoryError::Conflict);
            }
            let previous = email_key(&existing.email);
            tables.emails.remove(&previous);
            tables.emails.insert(key, user.id);
        }
        tables.users.insert(user.id, user);
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .emails
            .get(&email_key(email))
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn users_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<User>, usize), RepositoryError> {
        let tables = self.tables()?;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        newest_first(&mut users, |user| (user.created_at, user.id.0));
        let total = users.len();
        let page = users.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn user_tally(&self, since: DateTime<Utc>) -> Result<Tally<Role>, RepositoryError> {
        let tables = self.tables()?;
        let mut tally = Tally::default();
        for user in tables.users.values() {
            tally.record(user.role, user.created_at, since);
        }
        Ok(tally)
    }
}

#[async_trait]
impl JobRepository for InMemoryStore {
    async fn insert_job(&self, job: NewJob) -> Result<Job, RepositoryError> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&job.employer_id) {
            return Err(RepositoryError::NotFound);
        }

        tables.next_job += 1;
        let record = Job {
            id: JobId(tables.next_job),
            title: job.title,
            description: job.description,
            requirements: job.requirements,
            benefits: job.benefits,
            location: job.location,
            salary_min: job.salary_min,
            salary_max: job.salary_max,
            skills: job.skills,
            employment_type: job.employment_type,
            experience_level: job.experience_level,
            remote: job.remote,
            status: JobStatus::Pending,
            company: job.company,
            employer_id: job.employer_id,
            created_at: job.created_at,
            updated_at: job.created_at,
        };
        tables.jobs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn replace_job(&self, mut job: Job, seen: DateTime<Utc>) -> Result<Job, RepositoryError> {
        let mut tables = self.tables()?;
        let slot = tables.jobs.get_mut(&job.id).ok_or(RepositoryError::NotFound)?;
        if slot.updated_at != seen {
            return Err(RepositoryError::Stale);
        }

        job.updated_at = touch(slot.updated_at);
        *slot = job.clone();
        Ok(job)
    }

    async fn transition_job(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Job, RepositoryError> {
        let mut tables = self.tables()?;
        let slot = tables.jobs.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if slot.status != from {
            return Err(RepositoryError::Stale);
        }

        slot.status = to;
        slot.updated_at = touch(slot.updated_at);
        Ok(slot.clone())
    }

    async fn delete_job(&self, id: JobId) -> Result<(), RepositoryError> {
        let mut tables = self.tables()?;
        if tables.jobs.remove(&id).is_none() {
            return Err(RepositoryError::NotFound);
        }

        let orphaned: Vec<Application> = tables
            .applications
            .values()
            .filter(|application| application.job_id == id)
            .cloned()
            .collect();
        for application in orphaned {
            tables.applications.remove(&application.id);
            tables.applied.remove(&(application.job_id, application.user_id));
        }
        Ok(())
    }

    async fn job_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        Ok(self.tables()?.jobs.get(&id).cloned())
    }

    async fn search_jobs(
        &self,
        filter: &JobFilter,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Job>, usize), RepositoryError> {
        let tables = self.tables()?;
        let mut matched: Vec<Job> = tables
            .jobs
            .values()
            .filter(|job| filter.matches(job))
            .cloned()
            .collect();
        newest_first(&mut matched, |job| (job.created_at, job.id.0));
        let total = matched.len();
        let page = matched.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError> {
        let tables = self.tables()?;
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        newest_first(&mut jobs, |job| (job.created_at, job.id.0));
        Ok(jobs)
    }

    async fn jobs_by_employer(&self, employer_id: UserId) -> Result<Vec<Job>, RepositoryError> {
        let tables = self.tables()?;
        let mut jobs: Vec<Job> = tables
            .jobs
            .values()
            .filter(|job| job.employer_id == employer_id)
            .cloned()
            .collect();
        newest_first(&mut jobs, |job| (job.created_at, job.id.0));
        Ok(jobs)
    }

    async fn job_tally(&self, since: DateTime<Utc>) -> Result<Tally<JobStatus>, RepositoryError> {
        let tables = self.tables()?;
        let mut tally = Tally::default();
        for job in tables.jobs.values() {
            tally.record(job.status, job.created_at, since);
        }
        Ok(tally)
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryStore {
    async fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.tables()?;
        let job_status = tables
            .jobs
            .get(&application.job_id)
            .map(|job| job.status)
            .ok_or(RepositoryError::NotFound)?;
        if !tables.users.contains_key(&application.user_id) {
            return Err(RepositoryError::NotFound);
        }
        if job_status != JobStatus::Approved {
            return Err(RepositoryError::Stale);
        }
        if !tables
            .applied
            .insert((application.job_id, application.user_id))
        {
            return Err(RepositoryError::Conflict);
        }

        tables.next_application += 1;
        let record = Application {
            id: ApplicationId(tables.next_application),
            cover_letter: application.cover_letter,
            resume_url: application.resume_url,
            status: ApplicationStatus::Pending,
            user_id: application.user_id,
            job_id: application.job_id,
            created_at: application.created_at,
            updated_at: application.created_at,
        };
        tables.applications.insert(record.id, record.clone());
        Ok(record)
    }

    async fn set_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.tables()?;
        let slot = tables
            .applications
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        slot.status = status;
        slot.updated_at = touch(slot.updated_at);
        Ok(slot.clone())
    }

    async fn application_by_id(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self.tables()?.applications.get(&id).cloned())
    }

    async fn applications_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        let mut rows: Vec<Application> = tables
            .applications
            .values()
            .filter(|application| application.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |application| {
            (application.created_at, application.id.0)
        });
        Ok(rows)
    }

    async fn applications_by_job(
        &self,
        job_id: JobId,
    ) -> Result<Vec<Application>, RepositoryError> {
        let tables = self.tables()?;
        let mut rows: Vec<Application> = tables
            .applications
            .values()
            .filter(|application| application.job_id == job_id)
            .cloned()
            .collect();
        newest_first(&mut rows, |application| {
            (application.created_at, application.id.0)
        });
        Ok(rows)
    }

    async fn application_count(&self, job_id: JobId) -> Result<usize, RepositoryError> {
        let tables = self.tables()?;
        Ok(tables
            .applications
            .values()
            .filter(|application| application.job_id == job_id)
            .count())
    }

    async fn application_tally(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Tally<ApplicationStatus>, RepositoryError> {
        let tables = self.tables()?;
        let mut tally = Tally::default();
        for application in tables.applications.values() {
            tally.record(application.status, application.created_at, since);
        }
        Ok(tally)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.tables().map(|_| ())
    }
}
