use crate::infra::OutboxNotifier;
use chrono::Duration;
use clap::Args;
use job_board::board::auth::CredentialHasher;
use job_board::board::{
    ApplySubmission, AuthResponse, BoardError, BoardSettings, EmploymentType, ExperienceLevel,
    InMemoryStore, JobBoard, JobDraft, JobQuery, LoginRequest, Principal, RegisterRequest,
    RejectRequest, StatusUpdate,
};
use job_board::config::{AdminBootstrap, NotificationConfig};
use job_board::error::AppError;
use std::sync::Arc;

const DEMO_PASSWORD: &str = "demo-password";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reject the posting instead of approving it, ending the walkthrough early.
    #[arg(long)]
    pub(crate) reject: bool,
    /// Print the e-mails the board would have sent.
    #[arg(long)]
    pub(crate) show_mail: bool,
}

type DemoBoard = JobBoard<InMemoryStore, OutboxNotifier>;

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let notifier = Arc::new(OutboxNotifier::default());
    let board = JobBoard::new(
        Arc::new(InMemoryStore::new()),
        notifier.clone(),
        demo_settings()?,
    );

    println!("Job board demo");
    let registered = board
        .accounts
        .register(RegisterRequest {
            email: Some("hiring@acme.example".to_string()),
            password: Some(DEMO_PASSWORD.to_string()),
            first_name: Some("Grace".to_string()),
            last_name: Some("Hopper".to_string()),
            role: Some("employer".to_string()),
            company: Some("Acme Robotics".to_string()),
        })
        .await?;
    let employer = sign_in(&board, registered)?;
    let registered = board
        .accounts
        .register(RegisterRequest {
            email: Some("ada@example.com".to_string()),
            password: Some(DEMO_PASSWORD.to_string()),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            role: Some("user".to_string()),
            company: None,
        })
        .await?;
    let seeker = sign_in(&board, registered)?;
    board
        .accounts
        .ensure_admin(&AdminBootstrap {
            email: "admin@jobboard.example".to_string(),
            password: DEMO_PASSWORD.to_string(),
            first_name: "Admin".to_string(),
            last_name: "User".to_string(),
        })
        .await?;
    let signed_in = board
        .accounts
        .login(LoginRequest {
            email: Some("admin@jobboard.example".to_string()),
            password: Some(DEMO_PASSWORD.to_string()),
        })
        .await?;
    let admin = sign_in(&board, signed_in)?;
    println!("- registered employer, job seeker and administrator");

    let job = board
        .jobs
        .create(
            &employer,
            JobDraft {
                title: Some("Site Reliability Engineer".to_string()),
                description: Some("Keep the fleet healthy and the pagers quiet".to_string()),
                requirements: Some("On-call experience with Linux services".to_string()),
                benefits: Some("Remote friendly".to_string()),
                location: Some("Berlin, DE".to_string()),
                salary_min: Some(Some(70_000)),
                salary_max: Some(Some(95_000)),
                skills: Some(vec!["Rust".to_string(), "Kubernetes".to_string()]),
                employment_type: Some(EmploymentType::FullTime),
                experience_level: Some(ExperienceLevel::Senior),
                remote: Some(true),
            },
        )
        .await?;
    println!(
        "- posted job #{} \"{}\" ({})",
        job.id,
        job.title,
        job.status.label()
    );
    println!(
        "  public listing before moderation: {} job(s)",
        board.jobs.list(JobQuery::default()).await?.meta.total
    );

    if args.reject {
        let job = board
            .admin
            .reject(
                &admin,
                job.id,
                RejectRequest {
                    reason: Some("Please add a salary breakdown".to_string()),
                },
            )
            .await?;
        println!("- administrator rejected job #{} ({})", job.id, job.status.label());
        print_outbox(&notifier, args.show_mail);
        return Ok(());
    }

    let job = board.admin.approve(&admin, job.id).await?;
    println!("- administrator approved job #{} ({})", job.id, job.status.label());
    println!(
        "  public listing after moderation: {} job(s)",
        board.jobs.list(JobQuery::default()).await?.meta.total
    );

    let application = board
        .applications
        .submit(
            &seeker,
            job.id,
            ApplySubmission {
                cover_letter: Some("I have run production Rust services for years.".to_string()),
                resume_url: Some("https://cv.example/ada.pdf".to_string()),
            },
        )
        .await?;
    println!(
        "- job seeker applied (application #{}, {})",
        application.id,
        application.status.label()
    );

    let duplicate = board
        .applications
        .submit(
            &seeker,
            job.id,
            ApplySubmission {
                cover_letter: Some("Applying twice".to_string()),
                resume_url: Some("https://cv.example/ada.pdf".to_string()),
            },
        )
        .await;
    match duplicate {
        Ok(_) => println!("  duplicate application unexpectedly accepted"),
        Err(err) => println!("  duplicate application refused: {err}"),
    }

    let application = board
        .applications
        .update_status(
            &employer,
            application.id,
            StatusUpdate {
                status: Some("interview".to_string()),
            },
        )
        .await?;
    println!(
        "- employer moved application #{} to {}",
        application.id,
        application.status.label()
    );

    let stats = board.admin.stats(&admin).await?;
    println!(
        "\nBoard totals: {} users | {} jobs | {} applications | {} pending moderation",
        stats.total_users, stats.total_jobs, stats.total_applications, stats.pending_jobs
    );

    print_outbox(&notifier, args.show_mail);
    Ok(())
}

fn demo_settings() -> Result<BoardSettings, BoardError> {
    Ok(BoardSettings {
        jwt_secret: "demo-secret".to_string(),
        token_ttl: Duration::hours(1),
        hasher: CredentialHasher::with_cost(8, 1, 1)?,
        branding: NotificationConfig {
            from_email: "noreply@jobboard.example".to_string(),
            product_name: "Job Board".to_string(),
        },
    })
}

fn sign_in(board: &DemoBoard, response: AuthResponse) -> Result<Principal, BoardError> {
    board
        .authenticate(&response.token)
        .map_err(|err| BoardError::unauthenticated(err.to_string()))
}

fn print_outbox(notifier: &OutboxNotifier, show_bodies: bool) {
    let outbox = notifier.drain();
    println!("\nNotifications queued: {}", outbox.len());
    for email in outbox {
        println!("  - to {}: {}", email.to, email.subject);
        if show_bodies {
            for line in email.body.lines() {
                println!("      {line}");
            }
        }
    }
}
