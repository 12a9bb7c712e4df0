//! Filtering and pagination for public job search and admin listings.

use serde::{Deserialize, Serialize};

use super::domain::{Job, JobStatus};

pub const DEFAULT_JOB_PAGE_SIZE: u32 = 10;
pub const MAX_JOB_PAGE_SIZE: u32 = 50;
pub const DEFAULT_USER_PAGE_SIZE: u32 = 20;
pub const MAX_USER_PAGE_SIZE: u32 = 100;

/// Query string accepted by `GET /api/jobs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub location: Option<String>,
}

/// Query string accepted by paginated admin listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Predicate applied by the store when searching postings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFilter {
    pub status: JobStatus,
    search: Option<String>,
    location: Option<String>,
}

impl JobFilter {
    /// Public listings only ever expose approved postings.
    pub fn public(search: Option<&str>, location: Option<&str>) -> Self {
        Self {
            status: JobStatus::Approved,
            search: normalize(search),
            location: normalize(location),
        }
    }

    /// Lowercased, trimmed search term.
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Lowercased, trimmed location fragment.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn matches(&self, job: &Job) -> bool {
        if job.status != self.status {
            return false;
        }

        if let Some(location) = &self.location {
            if !job.location.to_lowercase().contains(location) {
                return false;
            }
        }

        match &self.search {
            Some(term) => {
                job.title.to_lowercase().contains(term)
                    || job.description.to_lowercase().contains(term)
                    || job.company.to_lowercase().contains(term)
                    || job.skills.iter().any(|skill| skill.to_lowercase() == *term)
            }
            None => true,
        }
    }
}

fn normalize(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase)
}

/// One-based page window with a clamped size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    pub fn meta(&self, total: usize) -> PageMeta {
        let limit = self.limit as usize;
        let total_pages = total.div_ceil(limit);
        PageMeta {
            total,
            page: self.page,
            total_pages,
            has_next: (self.page as usize) < total_pages,
            has_prev: self.page > 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: usize,
    pub page: u32,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}
