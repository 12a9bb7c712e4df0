//! SQLite-backed store. Uniqueness and cascades live in the schema, and every
//! conditional write is a single statement so concurrent requests serialize in
//! the database rather than in the service.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Job, JobId, JobStatus, NewApplication, NewJob,
    NewUser, Role, User, UserId,
};
use super::listing::JobFilter;
use super::repository::{
    ApplicationRepository, JobRepository, RepositoryError, Store, Tally, UserRepository,
};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, role, company, created_at, updated_at";
const JOB_COLUMNS: &str = "id, title, description, requirements, benefits, location, \
     salary_min, salary_max, skills, employment_type, experience_level, remote, status, \
     company, employer_id, created_at, updated_at";
const APPLICATION_COLUMNS: &str =
    "id, cover_letter, resume_url, status, user_id, job_id, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and applies pending migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(storage)?;
        Self::migrated(pool).await
    }

    /// Private database that lives as long as the store. A `:memory:` database is
    /// per connection, so the pool holds exactly one and never recycles it.
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(storage)?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(storage)?;
        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, RepositoryError> {
        MIGRATOR
            .run(&pool)
            .await
            .map_err(|err| RepositoryError::Unavailable(format!("migration failed: {err}")))?;
        tracing::debug!("database schema is current");
        Ok(Self { pool })
    }

    async fn job_exists(&self, id: JobId) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM jobs WHERE id = ?")
            .bind(key(id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(row.is_some())
    }

    /// Turns an empty conditional write into `NotFound` or `Stale`.
    async fn missed_job_write(&self, id: JobId) -> RepositoryError {
        match self.job_exists(id).await {
            Ok(true) => RepositoryError::Stale,
            Ok(false) => RepositoryError::NotFound,
            Err(err) => err,
        }
    }
}

fn storage(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepositoryError::NotFound,
        _ => RepositoryError::Unavailable(err.to_string()),
    }
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("column {column} holds an unreadable value: {detail}"))
}

fn key(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}

fn micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(storage)
}

fn id_column(row: &SqliteRow, name: &str) -> Result<u64, RepositoryError> {
    let raw: i64 = column(row, name)?;
    u64::try_from(raw).map_err(|err| corrupt(name, err))
}

fn time_column(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let raw: i64 = column(row, name)?;
    DateTime::from_timestamp_micros(raw).ok_or_else(|| corrupt(name, raw))
}

fn enum_column<T>(row: &SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = column(row, name)?;
    raw.parse().map_err(|err| corrupt(name, err))
}

fn salary_column(row: &SqliteRow, name: &str) -> Result<Option<u32>, RepositoryError> {
    let raw: Option<i64> = column(row, name)?;
    raw.map(|value| u32::try_from(value).map_err(|err| corrupt(name, err)))
        .transpose()
}

fn user_from_row(row: &SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: UserId(id_column(row, "id")?),
        email: column(row, "email")?,
        password_hash: column(row, "password_hash")?,
        first_name: column(row, "first_name")?,
        last_name: column(row, "last_name")?,
        role: enum_column::<Role>(row, "role")?,
        company: column(row, "company")?,
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn job_from_row(row: &SqliteRow) -> Result<Job, RepositoryError> {
    let skills: String = column(row, "skills")?;
    Ok(Job {
        id: JobId(id_column(row, "id")?),
        title: column(row, "title")?,
        description: column(row, "description")?,
        requirements: column(row, "requirements")?,
        benefits: column(row, "benefits")?,
        location: column(row, "location")?,
        salary_min: salary_column(row, "salary_min")?,
        salary_max: salary_column(row, "salary_max")?,
        skills: serde_json::from_str(&skills).map_err(|err| corrupt("skills", err))?,
        employment_type: enum_column(row, "employment_type")?,
        experience_level: enum_column(row, "experience_level")?,
        remote: column(row, "remote")?,
        status: enum_column(row, "status")?,
        company: column(row, "company")?,
        employer_id: UserId(id_column(row, "employer_id")?),
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn application_from_row(row: &SqliteRow) -> Result<Application, RepositoryError> {
    Ok(Application {
        id: ApplicationId(id_column(row, "id")?),
        cover_letter: column(row, "cover_letter")?,
        resume_url: column(row, "resume_url")?,
        status: enum_column(row, "status")?,
        user_id: UserId(id_column(row, "user_id")?),
        job_id: JobId(id_column(row, "job_id")?),
        created_at: time_column(row, "created_at")?,
        updated_at: time_column(row, "updated_at")?,
    })
}

fn rows<T>(
    rows: Vec<SqliteRow>,
    map: fn(&SqliteRow) -> Result<T, RepositoryError>,
) -> Result<Vec<T>, RepositoryError> {
    rows.iter().map(map).collect()
}

fn skills_json(skills: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(skills).map_err(|err| corrupt("skills", err))
}

fn push_job_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &JobFilter) {
    builder
        .push(" WHERE status = ")
        .push_bind(filter.status.label());
    if let Some(location) = filter.location() {
        builder
            .push(" AND instr(lower(location), ")
            .push_bind(location.to_string())
            .push(") > 0");
    }
    if let Some(term) = filter.search() {
        builder
            .push(" AND (instr(lower(title), ")
            .push_bind(term.to_string())
            .push(") > 0 OR instr(lower(description), ")
            .push_bind(term.to_string())
            .push(") > 0 OR instr(lower(company), ")
            .push_bind(term.to_string())
            .push(") > 0 OR EXISTS (SELECT 1 FROM json_each(jobs.skills) WHERE lower(json_each.value) = ")
            .push_bind(term.to_string())
            .push("))");
    }
}

async fn tally<K>(
    pool: &SqlitePool,
    sql: &str,
    since: DateTime<Utc>,
    key_column: &str,
) -> Result<Tally<K>, RepositoryError>
where
    K: Ord + FromStr,
    K::Err: std::fmt::Display,
{
    let grouped = sqlx::query(sql)
        .bind(micros(since))
        .fetch_all(pool)
        .await
        .map_err(storage)?;

    let mut tally = Tally::default();
    for row in &grouped {
        let group: K = enum_column(row, key_column)?;
        let total: i64 = column(row, "total")?;
        let recent: i64 = column(row, "recent")?;
        let total = usize::try_from(total).map_err(|err| corrupt("total", err))?;
        tally.total += total;
        tally.recent += usize::try_from(recent).map_err(|err| corrupt("recent", err))?;
        tally.by_key.insert(group, total);
    }
    Ok(tally)
}

fn count(value: i64) -> Result<usize, RepositoryError> {
    usize::try_from(value).map_err(|err| corrupt("count", err))
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, first_name, last_name, role, company, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(user.email.trim())
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.role.label())
            .bind(&user.company)
            .bind(micros(user.created_at))
            .bind(micros(user.created_at))
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        user_from_row(&row)
    }

    async fn update_user(&self, user: User) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET email = ?, password_hash = ?, first_name = ?, last_name = ?, \
             role = ?, company = ?, updated_at = MAX(?, updated_at + 1) WHERE id = ?",
        )
        .bind(user.email.trim())
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.role.label())
        .bind(&user.company)
        .bind(micros(Utc::now()))
        .bind(key(user.id.0))
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(key(id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        let row = sqlx::query(&sql)
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn users_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<User>, usize), RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let page = sqlx::query(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok((rows(page, user_from_row)?, count(total)?))
    }

    async fn user_tally(&self, since: DateTime<Utc>) -> Result<Tally<Role>, RepositoryError> {
        tally(
            &self.pool,
            "SELECT role, COUNT(*) AS total, COALESCE(SUM(created_at >= ?), 0) AS recent \
             FROM users GROUP BY role",
            since,
            "role",
        )
        .await
    }
}

#[async_trait]
impl JobRepository for SqliteStore {
    async fn insert_job(&self, job: NewJob) -> Result<Job, RepositoryError> {
        let sql = format!(
            "INSERT INTO jobs (title, description, requirements, benefits, location, salary_min, \
             salary_max, skills, employment_type, experience_level, remote, status, company, \
             employer_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&job.title)
            .bind(&job.description)
            .bind(&job.requirements)
            .bind(&job.benefits)
            .bind(&job.location)
            .bind(job.salary_min.map(i64::from))
            .bind(job.salary_max.map(i64::from))
            .bind(skills_json(&job.skills)?)
            .bind(job.employment_type.label())
            .bind(job.experience_level.label())
            .bind(job.remote)
            .bind(JobStatus::Pending.label())
            .bind(&job.company)
            .bind(key(job.employer_id.0))
            .bind(micros(job.created_at))
            .bind(micros(job.created_at))
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        job_from_row(&row)
    }

    async fn replace_job(&self, job: Job, seen: DateTime<Utc>) -> Result<Job, RepositoryError> {
        let sql = format!(
            "UPDATE jobs SET title = ?, description = ?, requirements = ?, benefits = ?, \
             location = ?, salary_min = ?, salary_max = ?, skills = ?, employment_type = ?, \
             experience_level = ?, remote = ?, status = ?, company = ?, \
             updated_at = MAX(?, updated_at + 1) \
             WHERE id = ? AND updated_at = ? RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&job.title)
            .bind(&job.description)
            .bind(&job.requirements)
            .bind(&job.benefits)
            .bind(&job.location)
            .bind(job.salary_min.map(i64::from))
            .bind(job.salary_max.map(i64::from))
            .bind(skills_json(&job.skills)?)
            .bind(job.employment_type.label())
            .bind(job.experience_level.label())
            .bind(job.remote)
            .bind(job.status.label())
            .bind(&job.company)
            .bind(micros(Utc::now()))
            .bind(key(job.id.0))
            .bind(micros(seen))
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => job_from_row(&row),
            None => Err(self.missed_job_write(job.id).await),
        }
    }

    async fn transition_job(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Job, RepositoryError> {
        let sql = format!(
            "UPDATE jobs SET status = ?, updated_at = MAX(?, updated_at + 1) \
             WHERE id = ? AND status = ? RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(to.label())
            .bind(micros(Utc::now()))
            .bind(key(id.0))
            .bind(from.label())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => job_from_row(&row),
            None => Err(self.missed_job_write(id).await),
        }
    }

    async fn delete_job(&self, id: JobId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(key(id.0))
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn job_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(key(id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn search_jobs(
        &self,
        filter: &JobFilter,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Job>, usize), RepositoryError> {
        let mut counted = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM jobs");
        push_job_filter(&mut counted, filter);
        let total: i64 = counted
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        let mut paged = QueryBuilder::<Sqlite>::new(format!("SELECT {JOB_COLUMNS} FROM jobs"));
        push_job_filter(&mut paged, filter);
        paged
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
        let page = paged
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        Ok((rows(page, job_from_row)?, count(total)?))
    }

    async fn jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = ? ORDER BY created_at DESC, id DESC"
        );
        let found = sqlx::query(&sql)
            .bind(status.label())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows(found, job_from_row)
    }

    async fn jobs_by_employer(&self, employer_id: UserId) -> Result<Vec<Job>, RepositoryError> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE employer_id = ? ORDER BY created_at DESC, id DESC"
        );
        let found = sqlx::query(&sql)
            .bind(key(employer_id.0))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows(found, job_from_row)
    }

    async fn job_tally(&self, since: DateTime<Utc>) -> Result<Tally<JobStatus>, RepositoryError> {
        tally(
            &self.pool,
            "SELECT status, COUNT(*) AS total, COALESCE(SUM(created_at >= ?), 0) AS recent \
             FROM jobs GROUP BY status",
            since,
            "status",
        )
        .await
    }
}

#[async_trait]
impl ApplicationRepository for SqliteStore {
    async fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError> {
        let sql = format!(
            "INSERT INTO applications (cover_letter, resume_url, status, user_id, job_id, \
             created_at, updated_at) \
             SELECT ?, ?, ?, ?, id, ?, ? FROM jobs WHERE id = ? AND status = ? \
             RETURNING {APPLICATION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&application.cover_letter)
            .bind(&application.resume_url)
            .bind(ApplicationStatus::Pending.label())
            .bind(key(application.user_id.0))
            .bind(micros(application.created_at))
            .bind(micros(application.created_at))
            .bind(key(application.job_id.0))
            .bind(JobStatus::Approved.label())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => application_from_row(&row),
            None => Err(self.missed_job_write(application.job_id).await),
        }
    }

    async fn set_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, RepositoryError> {
        let sql = format!(
            "UPDATE applications SET status = ?, updated_at = MAX(?, updated_at + 1) \
             WHERE id = ? RETURNING {APPLICATION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(status.label())
            .bind(micros(Utc::now()))
            .bind(key(id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .ok_or(RepositoryError::NotFound)?;
        application_from_row(&row)
    }

    async fn application_by_id(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(key(id.0))
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.as_ref().map(application_from_row).transpose()
    }

    async fn applications_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Application>, RepositoryError> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE user_id = ? \
             ORDER BY created_at DESC, id DESC"
        );
        let found = sqlx::query(&sql)
            .bind(key(user_id.0))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows(found, application_from_row)
    }

    async fn applications_by_job(
        &self,
        job_id: JobId,
    ) -> Result<Vec<Application>, RepositoryError> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE job_id = ? \
             ORDER BY created_at DESC, id DESC"
        );
        let found = sqlx::query(&sql)
            .bind(key(job_id.0))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        rows(found, application_from_row)
    }

    async fn application_count(&self, job_id: JobId) -> Result<usize, RepositoryError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE job_id = ?")
            .bind(key(job_id.0))
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        count(total)
    }

    async fn application_tally(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Tally<ApplicationStatus>, RepositoryError> {
        tally(
            &self.pool,
            "SELECT status, COUNT(*) AS total, COALESCE(SUM(created_at >= ?), 0) AS recent \
             FROM applications GROUP BY status",
            since,
            "status",
        )
        .await
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }
}
