use axum::http::StatusCode;

use super::common::*;
use crate::board::domain::{EmploymentType, ExperienceLevel, JobStatus};
use crate::board::jobs::JobDraft;
use crate::board::listing::JobQuery;
use crate::board::repository::{ApplicationRepository, JobRepository};

#[tokio::test]
async fn inverted_salary_range_is_rejected_before_storage() {
    let (board, store, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;

    let mut posting = draft("Platform Engineer");
    posting.salary_min = Some(Some(80_000));
    posting.salary_max = Some(Some(60_000));

    let err = board.jobs.create(&boss, posting).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        err.to_string(),
        "Maximum salary must be greater than minimum salary"
    );
    assert!(store.jobs_by_employer(boss.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn only_employers_post_jobs() {
    let (board, _, _) = build_board();
    let ada = seeker(&board, "ada@example.com").await;

    let err = board.jobs.create(&ada, draft("SRE")).await.unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
    assert_eq!(err.to_string(), "Only employers can create jobs");
}

#[tokio::test]
async fn new_jobs_are_pending_with_defaults_and_company() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;

    let job = board.jobs.create(&boss, draft("SRE")).await.expect("created");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.company, "Acme");
    assert_eq!(job.employer_id, boss.id);
    assert_eq!(job.employment_type, EmploymentType::FullTime);
    assert_eq!(job.experience_level, ExperienceLevel::Mid);
}

#[tokio::test]
async fn required_job_fields_are_checked_in_order() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;

    let err = board
        .jobs
        .create(
            &boss,
            JobDraft {
                title: Some("SRE".to_string()),
                ..JobDraft::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "description is required");

    let mut posting = draft("SRE");
    posting.skills = Some(Vec::new());
    assert_eq!(
        board.jobs.create(&boss, posting).await.unwrap_err().to_string(),
        "At least one skill is required"
    );
}

#[tokio::test]
async fn moderation_controls_public_visibility() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let root = admin(&board).await;

    let kept = board.jobs.create(&boss, draft("Kept")).await.unwrap();
    let dropped = board.jobs.create(&boss, draft("Dropped")).await.unwrap();
    assert_eq!(board.jobs.list(JobQuery::default()).await.unwrap().meta.total, 0);

    board.admin.approve(&root, kept.id).await.unwrap();
    board
        .admin
        .reject(&root, dropped.id, Default::default())
        .await
        .unwrap();

    let page = board.jobs.list(JobQuery::default()).await.unwrap();
    assert_eq!(page.meta.total, 1);
    assert_eq!(page.jobs[0].job.id, kept.id);
    assert_eq!(page.jobs[0].application_count, Some(0));

    assert!(board.jobs.get(kept.id, None).await.is_ok());
    assert_eq!(
        board.jobs.get(dropped.id, None).await.unwrap_err().status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn search_filters_and_paginates() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let root = admin(&board).await;

    for index in 0..3 {
        let mut posting = draft(&format!("Kubernetes Operator {index}"));
        posting.skills = Some(vec!["Go".to_string()]);
        let job = board.jobs.create(&boss, posting).await.unwrap();
        board.admin.approve(&root, job.id).await.unwrap();
    }
    let mut tagged = draft("Platform Engineer");
    tagged.skills = Some(vec!["kubernetes".to_string()]);
    let tagged = board.jobs.create(&boss, tagged).await.unwrap();
    board.admin.approve(&root, tagged.id).await.unwrap();
    approved_job(&board, &boss, &root, "Frontend Developer").await;

    let page = board
        .jobs
        .list(JobQuery {
            page: Some(1),
            limit: Some(2),
            search: Some("kubernetes".to_string()),
            location: None,
        })
        .await
        .unwrap();
    assert_eq!(page.meta.total, 4);
    assert_eq!(page.meta.total_pages, 2);
    assert_eq!(page.jobs.len(), 2);
    assert!(page.meta.has_next);
    assert!(!page.meta.has_prev);
    assert_eq!(page.jobs[0].job.id, tagged.id);

    let second = board
        .jobs
        .list(JobQuery {
            page: Some(2),
            limit: Some(2),
            search: Some("kubernetes".to_string()),
            location: None,
        })
        .await
        .unwrap();
    assert_eq!(second.jobs.len(), 2);
    assert!(second
        .jobs
        .iter()
        .all(|view| view.job.title.starts_with("Kubernetes")));

    let nowhere = board
        .jobs
        .list(JobQuery {
            location: Some("lisbon".to_string()),
            ..JobQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(nowhere.meta.total, 0);
}

#[tokio::test]
async fn owners_and_admins_see_applications_on_unapproved_jobs() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let rival = employer(&board, "rival@initech.test").await;
    let root = admin(&board).await;

    let job = board.jobs.create(&boss, draft("SRE")).await.unwrap();

    assert_eq!(
        board.jobs.get(job.id, Some(&rival)).await.unwrap_err().status(),
        StatusCode::NOT_FOUND
    );
    let owner_view = board.jobs.get(job.id, Some(&boss)).await.unwrap();
    assert_eq!(owner_view.applications, Some(Vec::new()));
    assert_eq!(owner_view.application_count, None);
    assert!(board.jobs.get(job.id, Some(&root)).await.is_ok());
}

#[tokio::test]
async fn edits_return_jobs_to_moderation() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let root = admin(&board).await;
    let job = approved_job(&board, &boss, &root, "SRE").await;

    let updated = board
        .jobs
        .update(
            &boss,
            job.id,
            JobDraft {
                title: Some("Senior SRE".to_string()),
                experience_level: Some(ExperienceLevel::Senior),
                ..JobDraft::default()
            },
        )
        .await
        .expect("owner edits");

    assert_eq!(updated.status, JobStatus::Pending);
    assert_eq!(updated.title, "Senior SRE");
    assert_eq!(updated.location, job.location);
    assert_eq!(board.jobs.list(JobQuery::default()).await.unwrap().meta.total, 0);
}

#[tokio::test]
async fn edits_revalidate_the_merged_salary_range() {
    let (board, store, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let job = board.jobs.create(&boss, draft("SRE")).await.unwrap();

    let err = board
        .jobs
        .update(
            &boss,
            job.id,
            JobDraft {
                salary_max: Some(Some(50_000)),
                ..JobDraft::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        store.job_by_id(job.id).await.unwrap().unwrap().salary_max,
        Some(90_000)
    );
}

#[tokio::test]
async fn only_the_owner_may_edit_or_delete() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let rival = employer(&board, "rival@initech.test").await;
    let job = board.jobs.create(&boss, draft("SRE")).await.unwrap();

    let err = board
        .jobs
        .update(&rival, job.id, JobDraft::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "You can only update your own jobs");

    let err = board.jobs.delete(&rival, job.id).await.unwrap_err();
    assert_eq!(err.to_string(), "You can only delete your own jobs");
}

#[tokio::test]
async fn deleting_a_job_removes_its_applications() {
    let (board, store, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let ada = seeker(&board, "ada@example.com").await;
    let root = admin(&board).await;
    let job = approved_job(&board, &boss, &root, "SRE").await;
    let application = board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .unwrap();

    board.jobs.delete(&boss, job.id).await.expect("owner deletes");

    assert!(store.job_by_id(job.id).await.unwrap().is_none());
    assert!(store.application_by_id(application.id).await.unwrap().is_none());
    assert_eq!(
        board.jobs.get(job.id, Some(&boss)).await.unwrap_err().to_string(),
        "Job not found"
    );
}

#[tokio::test]
async fn employer_dashboard_lists_every_status() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let root = admin(&board).await;

    approved_job(&board, &boss, &root, "Live").await;
    let rejected = board.jobs.create(&boss, draft("Rejected")).await.unwrap();
    board
        .admin
        .reject(&root, rejected.id, Default::default())
        .await
        .unwrap();
    board.jobs.create(&boss, draft("Queued")).await.unwrap();

    let mine = board.jobs.mine(&boss).await.unwrap();
    let statuses: Vec<JobStatus> = mine.iter().map(|view| view.job.status).collect();
    assert_eq!(
        statuses,
        vec![JobStatus::Pending, JobStatus::Rejected, JobStatus::Approved]
    );

    let ada = seeker(&board, "ada@example.com").await;
    assert_eq!(
        board.jobs.mine(&ada).await.unwrap_err().status(),
        StatusCode::FORBIDDEN
    );
}
