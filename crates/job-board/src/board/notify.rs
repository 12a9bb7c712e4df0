//! Outbound e-mail: templates plus a delivery seam that never blocks a state change.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::NotificationConfig;

/// Rendered message handed to a delivery backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationOutcome {
    Approved,
    Rejected { reason: String },
}

/// Events that produce an e-mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Welcome {
        first_name: String,
    },
    ApplicationReceived {
        first_name: String,
        job_title: String,
        company: String,
    },
    NewApplicant {
        first_name: String,
        job_title: String,
        applicant_name: String,
    },
    JobModerated {
        first_name: String,
        job_title: String,
        outcome: ModerationOutcome,
    },
}

impl Notification {
    pub fn template(&self) -> &'static str {
        match self {
            Notification::Welcome { .. } => "welcome",
            Notification::ApplicationReceived { .. } => "application_received",
            Notification::NewApplicant { .. } => "new_applicant",
            Notification::JobModerated {
                outcome: ModerationOutcome::Approved,
                ..
            } => "job_approved",
            Notification::JobModerated { .. } => "job_rejected",
        }
    }

    pub fn render(&self, to: &str, branding: &NotificationConfig) -> OutboundEmail {
        let product = &branding.product_name;
        let (subject, greeting, lines) = match self {
            Notification::Welcome { first_name } => (
                format!("Welcome to {product}!"),
                first_name,
                vec![
                    format!("Thank you for joining {product}!"),
                    "Browse the latest openings and complete your profile to stand out."
                        .to_string(),
                ],
            ),
            Notification::ApplicationReceived {
                first_name,
                job_title,
                company,
            } => (
                format!("Application Submitted: {job_title} at {company}"),
                first_name,
                vec![
                    format!("Your application for {job_title} at {company} has been received."),
                    "The employer will review it and update its status.".to_string(),
                ],
            ),
            Notification::NewApplicant {
                first_name,
                job_title,
                applicant_name,
            } => (
                format!("New Application: {job_title}"),
                first_name,
                vec![format!(
                    "{applicant_name} has applied to your posting {job_title}."
                )],
            ),
            Notification::JobModerated {
                first_name,
                job_title,
                outcome: ModerationOutcome::Approved,
            } => (
                format!("Job Approved: {job_title}"),
                first_name,
                vec![format!(
                    "Your posting {job_title} has been approved and is now live."
                )],
            ),
            Notification::JobModerated {
                first_name,
                job_title,
                outcome: ModerationOutcome::Rejected { reason },
            } => (
                format!("Job Posting Update: {job_title}"),
                first_name,
                vec![
                    format!("Your posting {job_title} was not approved."),
                    format!("Reason: {reason}"),
                ],
            ),
        };

        let mut body = format!("Hi {greeting},\n\n");
        for line in lines {
            body.push_str(&line);
            body.push('\n');
        }
        body.push_str(&format!("\nThe {product} Team\n"));

        OutboundEmail {
            to: to.to_string(),
            from: branding.from_email.clone(),
            subject,
            body,
        }
    }
}

/// Delivery backend.
pub trait Notifier: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Writes each message to the log instead of a mail provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        info!(to = %email.to, from = %email.from, subject = %email.subject, "email dispatched");
        Ok(())
    }
}

/// Renders notifications with the configured branding and swallows delivery failures.
pub struct Mailer<N> {
    notifier: Arc<N>,
    branding: NotificationConfig,
}

impl<N: Notifier> Mailer<N> {
    pub fn new(notifier: Arc<N>, branding: NotificationConfig) -> Self {
        Self { notifier, branding }
    }

    pub fn dispatch(&self, to: &str, notification: Notification) {
        let email = notification.render(to, &self.branding);
        if let Err(err) = self.notifier.send(&email) {
            warn!(
                template = notification.template(),
                to,
                error = %err,
                "notification delivery failed"
            );
        }
    }
}
