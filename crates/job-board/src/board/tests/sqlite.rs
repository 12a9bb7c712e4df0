use axum::http::StatusCode;

use super::common::*;
use crate::board::domain::JobStatus;
use crate::board::listing::JobQuery;
use crate::board::sql::SqliteStore;

async fn sqlite_board() -> (
    std::sync::Arc<TestBoard<SqliteStore>>,
    std::sync::Arc<SqliteStore>,
    std::sync::Arc<MemoryNotifier>,
) {
    build_board_over(SqliteStore::in_memory().await.expect("sqlite opens"))
}

#[tokio::test]
async fn board_workflow_runs_on_sqlite() {
    let (board, _, notifier) = sqlite_board().await;
    let boss = employer(&board, "boss@acme.test").await;
    let ada = seeker(&board, "ada@example.com").await;
    let root = admin(&board).await;

    let job = approved_job(&board, &boss, &root, "SRE").await;
    assert_eq!(job.status, JobStatus::Approved);
    let page = board.jobs.list(JobQuery::default()).await.unwrap();
    assert_eq!(page.meta.total, 1);

    let application = board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .expect("application stored");
    let err = board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::CONFLICT);
    assert_eq!(err.to_string(), "You have already applied to this job");

    let received = board.applications.for_job(&boss, job.id).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].application.id, application.id);
    assert!(notifier
        .sent_to("boss@acme.test")
        .iter()
        .any(|email| email.subject == "New Application: SRE"));

    let stats = board.admin.stats(&root).await.unwrap();
    assert_eq!(stats.total_users, 3);
    assert_eq!(stats.total_applications, 1);
}

#[tokio::test]
async fn sqlite_keeps_emails_unique_and_profiles_current() {
    let (board, _, _) = sqlite_board().await;
    let ada = seeker(&board, "ada@example.com").await;

    let err = board
        .accounts
        .register(registration("ADA@example.com", "user", None))
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::CONFLICT);
    assert_eq!(err.to_string(), "User already exists");

    let before = board.accounts.profile(&ada).await.unwrap();
    let after = board
        .accounts
        .update_profile(
            &ada,
            crate::board::accounts::ProfileUpdate {
                first_name: Some("Augusta".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(after.first_name, "Augusta");
    assert!(after.updated_at > before.updated_at);
}

#[tokio::test]
async fn sqlite_edit_and_delete_follow_the_same_rules() {
    let (board, _, _) = sqlite_board().await;
    let boss = employer(&board, "boss@acme.test").await;
    let ada = seeker(&board, "ada@example.com").await;
    let root = admin(&board).await;
    let job = approved_job(&board, &boss, &root, "SRE").await;
    board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .unwrap();

    let edited = board
        .jobs
        .update(
            &boss,
            job.id,
            crate::board::jobs::JobDraft {
                salary_max: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.status, JobStatus::Pending);
    assert_eq!(edited.salary_max, None);
    assert_eq!(edited.salary_min, Some(60_000));

    board.jobs.delete(&boss, job.id).await.unwrap();
    assert!(board.applications.for_user(&ada).await.unwrap().is_empty());
}
