use axum::http::StatusCode;

use super::common::*;
use crate::board::applications::{ApplySubmission, StatusUpdate};
use crate::board::domain::ApplicationStatus;
use crate::board::repository::ApplicationRepository;

#[tokio::test]
async fn applying_to_an_unapproved_job_creates_nothing() {
    let (board, store, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let ada = seeker(&board, "ada@example.com").await;
    let job = board.jobs.create(&boss, draft("SRE")).await.unwrap();

    let err = board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(err.to_string(), "This job is not available for applications");
    assert_eq!(store.application_count(job.id).await.unwrap(), 0);
}

#[tokio::test]
async fn second_application_conflicts() {
    let (board, store, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let ada = seeker(&board, "ada@example.com").await;
    let root = admin(&board).await;
    let job = approved_job(&board, &boss, &root, "SRE").await;

    let first = board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .expect("first application");
    assert_eq!(first.status, ApplicationStatus::Pending);

    let err = board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::CONFLICT);
    assert_eq!(err.to_string(), "You have already applied to this job");
    assert_eq!(store.application_count(job.id).await.unwrap(), 1);
}

#[tokio::test]
async fn only_job_seekers_apply_with_complete_submissions() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let ada = seeker(&board, "ada@example.com").await;
    let root = admin(&board).await;
    let job = approved_job(&board, &boss, &root, "SRE").await;

    let err = board
        .applications
        .submit(&boss, job.id, submission())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Only job seekers can apply to jobs");

    let err = board
        .applications
        .submit(
            &ada,
            job.id,
            ApplySubmission {
                cover_letter: Some("  ".to_string()),
                ..submission()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Cover letter and resume URL are required");

    let err = board
        .applications
        .submit(&ada, crate::board::domain::JobId(999), submission())
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submission_notifies_applicant_and_employer() {
    let (board, _, notifier) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let ada = seeker(&board, "ada@example.com").await;
    let root = admin(&board).await;
    approved_job(&board, &boss, &root, "SRE").await;
    let job = approved_job(&board, &boss, &root, "Platform Engineer").await;

    board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .unwrap();

    let applicant_mail = notifier.sent_to("ada@example.com");
    assert_eq!(
        applicant_mail.last().unwrap().subject,
        "Application Submitted: Platform Engineer at Acme"
    );
    let employer_mail = notifier.sent_to("boss@acme.test");
    let last = employer_mail.last().unwrap();
    assert_eq!(last.subject, "New Application: Platform Engineer");
    assert!(last.body.contains("Ada Lovelace"));
}

#[tokio::test]
async fn owning_employer_moves_status_freely() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let ada = seeker(&board, "ada@example.com").await;
    let root = admin(&board).await;
    let job = approved_job(&board, &boss, &root, "SRE").await;
    let application = board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .unwrap();

    for status in ["interview", "rejected", "pending", "approved"] {
        let updated = board
            .applications
            .update_status(
                &boss,
                application.id,
                StatusUpdate {
                    status: Some(status.to_string()),
                },
            )
            .await
            .expect("status update");
        assert_eq!(updated.status.label(), status);
    }

    let by_admin = board
        .applications
        .update_status(
            &root,
            application.id,
            StatusUpdate {
                status: Some("interview".to_string()),
            },
        )
        .await
        .expect("admin update");
    assert_eq!(by_admin.status, ApplicationStatus::Interview);
}

#[tokio::test]
async fn status_updates_are_gated() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let rival = employer(&board, "rival@initech.test").await;
    let ada = seeker(&board, "ada@example.com").await;
    let root = admin(&board).await;
    let job = approved_job(&board, &boss, &root, "SRE").await;
    let application = board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .unwrap();
    let hired = StatusUpdate {
        status: Some("approved".to_string()),
    };

    let err = board
        .applications
        .update_status(&rival, application.id, hired.clone())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "You can only update applications for your own jobs"
    );

    let err = board
        .applications
        .update_status(&ada, application.id, hired)
        .await
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);

    let err = board
        .applications
        .update_status(
            &boss,
            application.id,
            StatusUpdate {
                status: Some("hired".to_string()),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid status");
}

#[tokio::test]
async fn listings_embed_the_other_side() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let ada = seeker(&board, "ada@example.com").await;
    let root = admin(&board).await;
    let job = approved_job(&board, &boss, &root, "SRE").await;
    let application = board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .unwrap();

    let mine = board.applications.for_user(&ada).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].job.as_ref().map(|job| job.id), Some(job.id));
    assert!(mine[0].user.is_none());

    let received = board.applications.for_job(&boss, job.id).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(
        received[0].user.as_ref().map(|user| user.email.as_str()),
        Some("ada@example.com")
    );

    let single = board.applications.get(&ada, application.id).await.unwrap();
    assert!(single.job.is_some());
    let single = board.applications.get(&boss, application.id).await.unwrap();
    assert!(single.user.is_some());
}

#[tokio::test]
async fn applications_stay_private() {
    let (board, _, _) = build_board();
    let boss = employer(&board, "boss@acme.test").await;
    let rival = employer(&board, "rival@initech.test").await;
    let ada = seeker(&board, "ada@example.com").await;
    let grace = seeker(&board, "grace@example.com").await;
    let root = admin(&board).await;
    let job = approved_job(&board, &boss, &root, "SRE").await;
    let application = board
        .applications
        .submit(&ada, job.id, submission())
        .await
        .unwrap();

    assert_eq!(
        board
            .applications
            .get(&grace, application.id)
            .await
            .unwrap_err()
            .to_string(),
        "You can only view your own applications"
    );
    assert_eq!(
        board
            .applications
            .for_job(&rival, job.id)
            .await
            .unwrap_err()
            .to_string(),
        "You can only view applications for your own jobs"
    );
    assert_eq!(
        board
            .applications
            .for_job(&grace, job.id)
            .await
            .unwrap_err()
            .to_string(),
        "Insufficient permissions"
    );
    assert_eq!(
        board.applications.for_user(&boss).await.unwrap_err().status(),
        StatusCode::FORBIDDEN
    );
    assert!(board.applications.get(&root, application.id).await.is_ok());
}
