use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::error;

use super::accounts::{LoginRequest, ProfileUpdate, RegisterRequest};
use super::admin::RejectRequest;
use super::applications::{ApplySubmission, StatusUpdate};
use super::auth::Principal;
use super::domain::{ApplicationId, JobId};
use super::error::BoardError;
use super::jobs::JobDraft;
use super::listing::{JobQuery, PageQuery};
use super::notify::Notifier;
use super::repository::Store;
use super::service::JobBoard;

type Board<S, N> = State<Arc<JobBoard<S, N>>>;

/// Router exposing the board REST API under `/api`.
pub fn board_router<S, N>(board: Arc<JobBoard<S, N>>) -> Router
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/health", get(health_handler::<S, N>))
        .route("/api/auth/register", post(register_handler::<S, N>))
        .route("/api/auth/login", post(login_handler::<S, N>))
        .route(
            "/api/auth/profile",
            get(profile_handler::<S, N>).put(update_profile_handler::<S, N>),
        )
        .route(
            "/api/jobs",
            get(list_jobs_handler::<S, N>).post(create_job_handler::<S, N>),
        )
        .route("/api/jobs/mine", get(my_jobs_handler::<S, N>))
        .route(
            "/api/jobs/:job_id",
            get(get_job_handler::<S, N>)
                .put(update_job_handler::<S, N>)
                .delete(delete_job_handler::<S, N>),
        )
        .route("/api/jobs/:job_id/apply", post(apply_handler::<S, N>))
        .route(
            "/api/applications/user",
            get(user_applications_handler::<S, N>),
        )
        .route(
            "/api/applications/job/:job_id",
            get(job_applications_handler::<S, N>),
        )
        .route(
            "/api/applications/:application_id",
            get(get_application_handler::<S, N>),
        )
        .route(
            "/api/applications/:application_id/status",
            put(application_status_handler::<S, N>),
        )
        .route("/api/admin/jobs/pending", get(pending_jobs_handler::<S, N>))
        .route(
            "/api/admin/jobs/:job_id/approve",
            post(approve_job_handler::<S, N>),
        )
        .route(
            "/api/admin/jobs/:job_id/reject",
            post(reject_job_handler::<S, N>),
        )
        .route("/api/admin/stats", get(stats_handler::<S, N>))
        .route("/api/admin/users", get(users_handler::<S, N>))
        .fallback(not_found_handler)
        .with_state(board)
}

#[axum::async_trait]
impl<S, N> FromRequestParts<Arc<JobBoard<S, N>>> for Principal
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    type Rejection = BoardError;

    async fn from_request_parts(
        parts: &mut Parts,
        board: &Arc<JobBoard<S, N>>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| BoardError::unauthenticated("Authorization token is required"))?;
        board
            .authenticate(token)
            .map_err(|err| BoardError::unauthenticated(err.to_string()))
    }
}

/// Caller identity when a valid token is present; anonymous otherwise.
pub struct MaybePrincipal(pub Option<Principal>);

#[axum::async_trait]
impl<S, N> FromRequestParts<Arc<JobBoard<S, N>>> for MaybePrincipal
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        board: &Arc<JobBoard<S, N>>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybePrincipal(
            bearer_token(parts).and_then(|token| board.authenticate(token).ok()),
        ))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, BoardError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| BoardError::validation(rejection.body_text()))
}

fn optional_body<T>(payload: &[u8]) -> Result<T, BoardError>
where
    T: DeserializeOwned + Default,
{
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(payload).map_err(|err| {
        BoardError::validation(format!(
            "Failed to parse the request body as JSON: {err}"
        ))
    })
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, BoardError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| BoardError::validation(rejection.body_text()))
}

fn path_id(id: Result<Path<u64>, PathRejection>) -> Result<u64, BoardError> {
    id.map(|Path(value)| value)
        .map_err(|_| BoardError::not_found("Endpoint not found"))
}

async fn not_found_handler() -> BoardError {
    BoardError::not_found("Endpoint not found")
}

pub(crate) async fn health_handler<S, N>(State(board): Board<S, N>) -> Response
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let timestamp = Utc::now().to_rfc3339();
    match board.health().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected",
                "timestamp": timestamp,
            })),
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "unhealthy",
                    "timestamp": timestamp,
                })),
            )
                .into_response()
        }
    }
}

pub(crate) async fn register_handler<S, N>(
    State(board): Board<S, N>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let response = board.accounts.register(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

pub(crate) async fn login_handler<S, N>(
    State(board): Board<S, N>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let response = board.accounts.login(body(payload)?).await?;
    Ok(Json(response).into_response())
}

pub(crate) async fn profile_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let user = board.accounts.profile(&principal).await?;
    Ok(Json(json!({ "user": user })).into_response())
}

pub(crate) async fn update_profile_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let user = board
        .accounts
        .update_profile(&principal, body(payload)?)
        .await?;
    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": user,
    }))
    .into_response())
}

pub(crate) async fn list_jobs_handler<S, N>(
    State(board): Board<S, N>,
    params: Result<Query<JobQuery>, QueryRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let page = board.jobs.list(query(params)?).await?;
    Ok(Json(page).into_response())
}

pub(crate) async fn my_jobs_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let jobs = board.jobs.mine(&principal).await?;
    Ok(Json(jobs).into_response())
}

pub(crate) async fn get_job_handler<S, N>(
    State(board): Board<S, N>,
    MaybePrincipal(principal): MaybePrincipal,
    job_id: Result<Path<u64>, PathRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let job = board
        .jobs
        .get(JobId(path_id(job_id)?), principal.as_ref())
        .await?;
    Ok(Json(job).into_response())
}

pub(crate) async fn create_job_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
    payload: Result<Json<JobDraft>, JsonRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let job = board.jobs.create(&principal, body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Job created successfully and is pending approval",
            "job": job,
        })),
    )
        .into_response())
}

pub(crate) async fn update_job_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
    job_id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<JobDraft>, JsonRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let id = JobId(path_id(job_id)?);
    let job = board.jobs.update(&principal, id, body(payload)?).await?;
    Ok(Json(json!({
        "message": "Job updated successfully",
        "job": job,
    }))
    .into_response())
}

pub(crate) async fn delete_job_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
    job_id: Result<Path<u64>, PathRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    board
        .jobs
        .delete(&principal, JobId(path_id(job_id)?))
        .await?;
    Ok(Json(json!({ "message": "Job deleted successfully" })).into_response())
}

pub(crate) async fn apply_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
    job_id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<ApplySubmission>, JsonRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let id = JobId(path_id(job_id)?);
    let application = board
        .applications
        .submit(&principal, id, body(payload)?)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Application submitted successfully",
            "application": application,
        })),
    )
        .into_response())
}

pub(crate) async fn user_applications_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let applications = board.applications.for_user(&principal).await?;
    Ok(Json(applications).into_response())
}

pub(crate) async fn job_applications_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
    job_id: Result<Path<u64>, PathRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let applications = board
        .applications
        .for_job(&principal, JobId(path_id(job_id)?))
        .await?;
    Ok(Json(applications).into_response())
}

pub(crate) async fn get_application_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
    application_id: Result<Path<u64>, PathRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let application = board
        .applications
        .get(&principal, ApplicationId(path_id(application_id)?))
        .await?;
    Ok(Json(application).into_response())
}

pub(crate) async fn application_status_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
    application_id: Result<Path<u64>, PathRejection>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let id = ApplicationId(path_id(application_id)?);
    let application = board
        .applications
        .update_status(&principal, id, body(payload)?)
        .await?;
    Ok(Json(json!({
        "message": "Application status updated successfully",
        "application": application,
    }))
    .into_response())
}

pub(crate) async fn pending_jobs_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let jobs = board.admin.pending_jobs(&principal).await?;
    Ok(Json(jobs).into_response())
}

pub(crate) async fn approve_job_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
    job_id: Result<Path<u64>, PathRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let job = board
        .admin
        .approve(&principal, JobId(path_id(job_id)?))
        .await?;
    Ok(Json(json!({
        "message": "Job approved successfully",
        "job": job,
    }))
    .into_response())
}

/// An empty body means no reason was given; anything else must be a valid JSON object.
pub(crate) async fn reject_job_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
    job_id: Result<Path<u64>, PathRejection>,
    payload: Bytes,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let id = JobId(path_id(job_id)?);
    let request = optional_body::<RejectRequest>(&payload)?;
    let job = board.admin.reject(&principal, id, request).await?;
    Ok(Json(json!({
        "message": "Job rejected successfully",
        "job": job,
    }))
    .into_response())
}

pub(crate) async fn stats_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let stats = board.admin.stats(&principal).await?;
    Ok(Json(stats).into_response())
}

pub(crate) async fn users_handler<S, N>(
    State(board): Board<S, N>,
    principal: Principal,
    params: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Response, BoardError>
where
    S: Store + 'static,
    N: Notifier + 'static,
{
    let page = board.admin.users(&principal, query(params)?).await?;
    Ok(Json(page).into_response())
}
