//! Job postings, moderation, applications and the accounts that drive them.

pub mod accounts;
pub mod admin;
pub mod applications;
pub mod auth;
pub mod domain;
pub mod error;
pub mod jobs;
pub mod listing;
pub mod memory;
pub mod notify;
pub mod repository;
pub mod router;
pub mod service;
pub mod sql;
mod validation;

#[cfg(test)]
mod tests;

pub use accounts::{AccountService, AuthResponse, LoginRequest, ProfileUpdate, RegisterRequest};
pub use admin::{AdminService, BoardStats, RejectRequest, UserPage};
pub use applications::{ApplicationService, ApplySubmission, StatusUpdate};
pub use auth::{Principal, TokenIssuer};
pub use domain::*;
pub use error::BoardError;
pub use jobs::{JobDraft, JobPage, JobService};
pub use listing::{JobQuery, PageMeta, PageQuery};
pub use memory::InMemoryStore;
pub use notify::{LogNotifier, Notification, Notifier, NotifyError, OutboundEmail};
pub use repository::{RepositoryError, Store};
pub use router::board_router;
pub use service::{BoardSettings, JobBoard};
pub use sql::SqliteStore;
