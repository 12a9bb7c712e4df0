use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::Barrier;

use crate::board::accounts::{AuthResponse, LoginRequest, RegisterRequest};
use crate::board::applications::ApplySubmission;
use crate::board::auth::{CredentialHasher, Principal};
use crate::board::domain::{
    Application, ApplicationId, ApplicationStatus, Job, JobId, JobStatus, NewApplication, NewJob,
    NewUser, Role, User, UserId,
};
use crate::board::jobs::JobDraft;
use crate::board::listing::JobFilter;
use crate::board::memory::InMemoryStore;
use crate::board::notify::{Notifier, NotifyError, OutboundEmail};
use crate::board::repository::{
    ApplicationRepository, JobRepository, RepositoryError, Store, Tally, UserRepository,
};
use crate::board::service::{BoardSettings, JobBoard};
use crate::config::{AdminBootstrap, NotificationConfig};

pub(super) const TEST_SECRET: &str = "test-secret";
pub(super) const PASSWORD: &str = "s3cret-pass";

pub(super) type TestBoard<S = InMemoryStore> = JobBoard<S, MemoryNotifier>;

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn sent_to(&self, address: &str) -> Vec<OutboundEmail> {
        self.sent()
            .into_iter()
            .filter(|email| email.to == address)
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn send(&self, _email: &OutboundEmail) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) fn settings() -> BoardSettings {
    BoardSettings {
        jwt_secret: TEST_SECRET.to_string(),
        token_ttl: Duration::days(7),
        hasher: CredentialHasher::with_cost(8, 1, 1).expect("valid argon2 params"),
        branding: NotificationConfig {
            from_email: "noreply@devjobs.test".to_string(),
            product_name: "DevJobs".to_string(),
        },
    }
}

pub(super) fn build_board() -> (Arc<TestBoard>, Arc<InMemoryStore>, Arc<MemoryNotifier>) {
    build_board_over(InMemoryStore::new())
}

pub(super) fn build_board_over<S: Store + 'static>(
    store: S,
) -> (Arc<TestBoard<S>>, Arc<S>, Arc<MemoryNotifier>) {
    let store = Arc::new(store);
    let notifier = Arc::new(MemoryNotifier::default());
    let board = Arc::new(JobBoard::new(store.clone(), notifier.clone(), settings()));
    (board, store, notifier)
}

pub(super) fn registration(email: &str, role: &str, company: Option<&str>) -> RegisterRequest {
    RegisterRequest {
        email: Some(email.to_string()),
        password: Some(PASSWORD.to_string()),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        role: Some(role.to_string()),
        company: company.map(str::to_string),
    }
}

pub(super) fn principal_of(response: &AuthResponse) -> Principal {
    Principal {
        id: response.user.id,
        role: response.user.role,
    }
}

pub(super) async fn seeker<S: Store + 'static>(board: &TestBoard<S>, email: &str) -> Principal {
    let response = board
        .accounts
        .register(registration(email, "user", None))
        .await
        .expect("seeker registers");
    principal_of(&response)
}

pub(super) async fn employer<S: Store + 'static>(board: &TestBoard<S>, email: &str) -> Principal {
    let response = board
        .accounts
        .register(registration(email, "employer", Some("Acme")))
        .await
        .expect("employer registers");
    principal_of(&response)
}

pub(super) async fn admin<S: Store + 'static>(board: &TestBoard<S>) -> Principal {
    board
        .accounts
        .ensure_admin(&AdminBootstrap {
            email: "admin@devjobs.test".to_string(),
            password: PASSWORD.to_string(),
            first_name: "Root".to_string(),
            last_name: "Admin".to_string(),
        })
        .await
        .expect("admin bootstrap");
    let response = board
        .accounts
        .login(LoginRequest {
            email: Some("admin@devjobs.test".to_string()),
            password: Some(PASSWORD.to_string()),
        })
        .await
        .expect("admin logs in");
    principal_of(&response)
}

pub(super) fn draft(title: &str) -> JobDraft {
    JobDraft {
        title: Some(title.to_string()),
        description: Some("Operate our delivery platform".to_string()),
        requirements: Some("Three years of on-call experience".to_string()),
        benefits: Some("Remote stipend".to_string()),
        location: Some("Berlin, DE".to_string()),
        salary_min: Some(Some(60_000)),
        salary_max: Some(Some(90_000)),
        skills: Some(vec!["Terraform".to_string(), "Linux".to_string()]),
        employment_type: None,
        experience_level: None,
        remote: Some(true),
    }
}

pub(super) async fn approved_job<S: Store + 'static>(
    board: &TestBoard<S>,
    employer: &Principal,
    admin: &Principal,
    title: &str,
) -> Job {
    let job = board
        .jobs
        .create(employer, draft(title))
        .await
        .expect("job created");
    board
        .admin
        .approve(admin, job.id)
        .await
        .expect("job approved")
}

pub(super) fn submission() -> ApplySubmission {
    ApplySubmission {
        cover_letter: Some("I keep pagers quiet.".to_string()),
        resume_url: Some("https://cv.example/ada.pdf".to_string()),
    }
}

pub(super) fn request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(payload) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&payload).expect("json body")))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// In-memory store whose next `armed` job reads all wait for each other before returning,
/// so concurrent requests are guaranteed to act on the same snapshot.
pub(super) struct GatedStore {
    inner: InMemoryStore,
    parties: usize,
    gate: Barrier,
    armed: AtomicUsize,
}

impl GatedStore {
    pub(super) fn new(parties: usize) -> Self {
        Self {
            inner: InMemoryStore::new(),
            parties,
            gate: Barrier::new(parties),
            armed: AtomicUsize::new(0),
        }
    }

    /// Gates the next job reads, one per party. Setup reads before this are untouched.
    pub(super) fn arm(&self) {
        self.armed.store(self.parties, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserRepository for GatedStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        self.inner.insert_user(user).await
    }

    async fn update_user(&self, user: User) -> Result<(), RepositoryError> {
        self.inner.update_user(user).await
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        self.inner.user_by_id(id).await
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.inner.user_by_email(email).await
    }

    async fn users_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<User>, usize), RepositoryError> {
        self.inner.users_page(offset, limit).await
    }

    async fn user_tally(&self, since: DateTime<Utc>) -> Result<Tally<Role>, RepositoryError> {
        self.inner.user_tally(since).await
    }
}

#[async_trait]
impl JobRepository for GatedStore {
    async fn insert_job(&self, job: NewJob) -> Result<Job, RepositoryError> {
        self.inner.insert_job(job).await
    }

    async fn replace_job(&self, job: Job, seen: DateTime<Utc>) -> Result<Job, RepositoryError> {
        self.inner.replace_job(job, seen).await
    }

    async fn transition_job(
        &self,
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Job, RepositoryError> {
        self.inner.transition_job(id, from, to).await
    }

    async fn delete_job(&self, id: JobId) -> Result<(), RepositoryError> {
        self.inner.delete_job(id).await
    }

    async fn job_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        let snapshot = self.inner.job_by_id(id).await;
        let gated = self
            .armed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if gated {
            self.gate.wait().await;
        }
        snapshot
    }

    async fn search_jobs(
        &self,
        filter: &JobFilter,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<Job>, usize), RepositoryError> {
        self.inner.search_jobs(filter, offset, limit).await
    }

    async fn jobs_by_status(&self, status: JobStatus) -> Result<Vec<Job>, RepositoryError> {
        self.inner.jobs_by_status(status).await
    }

    async fn jobs_by_employer(&self, employer_id: UserId) -> Result<Vec<Job>, RepositoryError> {
        self.inner.jobs_by_employer(employer_id).await
    }

    async fn job_tally(&self, since: DateTime<Utc>) -> Result<Tally<JobStatus>, RepositoryError> {
        self.inner.job_tally(since).await
    }
}

#[async_trait]
impl ApplicationRepository for GatedStore {
    async fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError> {
        self.inner.insert_application(application).await
    }

    async fn set_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, RepositoryError> {
        self.inner.set_application_status(id, status).await
    }

    async fn application_by_id(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.inner.application_by_id(id).await
    }

    async fn applications_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications_by_user(user_id).await
    }

    async fn applications_by_job(
        &self,
        job_id: JobId,
    ) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications_by_job(job_id).await
    }

    async fn application_count(&self, job_id: JobId) -> Result<usize, RepositoryError> {
        self.inner.application_count(job_id).await
    }

    async fn application_tally(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Tally<ApplicationStatus>, RepositoryError> {
        self.inner.application_tally(since).await
    }
}

#[async_trait]
impl Store for GatedStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.inner.ping().await
    }
}
