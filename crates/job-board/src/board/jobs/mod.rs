pub mod moderation;
mod service;

pub use moderation::{Access, Decision};
pub use service::{JobDraft, JobPage, JobService};

pub(crate) use service::job_not_found;
