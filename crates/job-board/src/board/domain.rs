use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier assigned by the store on registration.
    UserId
);
record_id!(
    /// Identifier assigned by the store when an employer posts a job.
    JobId
);
record_id!(
    /// Identifier assigned by the store when a job seeker applies.
    ApplicationId
);

/// Account role; fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Employer,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Employer => "employer",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Role::User),
            "employer" => Ok(Role::Employer),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Moderation state of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Approved,
    Rejected,
}

impl JobStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Approved => "approved",
            JobStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(JobStatus::Pending),
            "approved" => Ok(JobStatus::Approved),
            "rejected" => Ok(JobStatus::Rejected),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Review state of an application, shared vocabulary between employer and applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Interview,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "interview" => Ok(ApplicationStatus::Interview),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    #[default]
    FullTime,
    PartTime,
    Contract,
    Freelance,
}

impl EmploymentType {
    pub const fn label(self) -> &'static str {
        match self {
            EmploymentType::FullTime => "full-time",
            EmploymentType::PartTime => "part-time",
            EmploymentType::Contract => "contract",
            EmploymentType::Freelance => "freelance",
        }
    }
}

impl FromStr for EmploymentType {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "full-time" => Ok(EmploymentType::FullTime),
            "part-time" => Ok(EmploymentType::PartTime),
            "contract" => Ok(EmploymentType::Contract),
            "freelance" => Ok(EmploymentType::Freelance),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Entry,
    #[default]
    Mid,
    Senior,
    Lead,
}

impl ExperienceLevel {
    pub const fn label(self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "entry",
            ExperienceLevel::Mid => "mid",
            ExperienceLevel::Senior => "senior",
            ExperienceLevel::Lead => "lead",
        }
    }
}

impl FromStr for ExperienceLevel {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "entry" => Ok(ExperienceLevel::Entry),
            "mid" => Ok(ExperienceLevel::Mid),
            "senior" => Ok(ExperienceLevel::Senior),
            "lead" => Ok(ExperienceLevel::Lead),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Raised when a free-form string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

/// Stored account. The credential hash never leaves the service layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            company: self.company.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Account fields prior to id assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Public representation of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub company: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub benefits: Option<String>,
    pub location: String,
    pub salary_min: Option<u32>,
    pub salary_max: Option<u32>,
    pub skills: Vec<String>,
    #[serde(rename = "type")]
    pub employment_type: EmploymentType,
    pub experience_level: ExperienceLevel,
    pub remote: bool,
    pub status: JobStatus,
    pub company: String,
    pub employer_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Posting fields prior to id assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub benefits: Option<String>,
    pub location: String,
    pub salary_min: Option<u32>,
    pub salary_max: Option<u32>,
    pub skills: Vec<String>,
    pub employment_type: EmploymentType,
    pub experience_level: ExperienceLevel,
    pub remote: bool,
    pub company: String,
    pub employer_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub cover_letter: String,
    pub resume_url: String,
    pub status: ApplicationStatus,
    pub user_id: UserId,
    pub job_id: JobId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Application fields prior to id assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub cover_letter: String,
    pub resume_url: String,
    pub user_id: UserId,
    pub job_id: JobId,
    pub created_at: DateTime<Utc>,
}

/// A job with whatever related rows the caller is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applications: Option<Vec<Application>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employer: Option<UserView>,
}

impl JobView {
    pub fn counted(job: Job, application_count: usize) -> Self {
        Self {
            job,
            application_count: Some(application_count),
            applications: None,
            employer: None,
        }
    }
}

/// An application joined with its job (applicant view) or its applicant (employer view).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
}

impl ApplicationView {
    pub fn bare(application: Application) -> Self {
        Self {
            application,
            job: None,
            user: None,
        }
    }
}
