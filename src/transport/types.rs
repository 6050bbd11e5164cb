//! Wire shapes returned by the server.
//!
//! The direct REST API and the extension API describe the same records, but
//! the extension API reports enumerations as numeric codes where REST uses
//! string tokens. The `Raw*` enums accept either form and leave the mapping
//! to the canonical model to `model::status`.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::{Identity, Repository, RepositoryRef, Reviewer, UserRef, Vote};

/// `{ "count": n, "value": [...] }` envelope used by every list endpoint.
/// A missing `value` is treated as an empty list.
#[derive(Debug, Deserialize)]
pub struct ValueList<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// Identity of the signed-in user as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CurrentIdentity {
    pub id: String,
    pub display_name: String,
    pub unique_name: String,
}

fn container() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub id: String,
    /// Provider-qualified id, e.g. `Microsoft.TeamFoundation.Identity;S-1-9-...`.
    #[serde(default)]
    pub descriptor: Option<String>,
    #[serde(default)]
    pub custom_display_name: Option<String>,
    #[serde(default)]
    pub provider_display_name: Option<String>,
    /// Membership lookups only return containers, so a record that leaves
    /// this out is taken to be a group.
    #[serde(default = "container")]
    pub is_container: bool,
}

impl From<IdentityRecord> for Identity {
    fn from(record: IdentityRecord) -> Self {
        let display_name = record
            .custom_display_name
            .clone()
            .or_else(|| record.provider_display_name.clone())
            .unwrap_or_else(|| record.id.clone());
        Identity {
            id: record.id,
            display_name,
            unique_name: record.provider_display_name,
            is_group: record.is_container,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRefRecord {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub unique_name: Option<String>,
}

impl From<IdentityRefRecord> for UserRef {
    fn from(record: IdentityRefRecord) -> Self {
        UserRef {
            display_name: record.display_name.unwrap_or_else(|| record.id.clone()),
            id: record.id,
            unique_name: record.unique_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewerRecord {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub vote: i32,
}

impl From<ReviewerRecord> for Reviewer {
    fn from(record: ReviewerRecord) -> Self {
        Reviewer {
            vote: Vote::from_code(record.vote),
            identity: UserRef {
                display_name: record.display_name.unwrap_or_else(|| record.id.clone()),
                id: record.id,
                unique_name: record.unique_name,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRecord {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRefRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub project: Option<ProjectRecord>,
}

impl From<RepositoryRefRecord> for RepositoryRef {
    fn from(record: RepositoryRefRecord) -> Self {
        RepositoryRef {
            id: record.id,
            name: record.name,
            url: record.url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryLinks {
    #[serde(default)]
    pub web: Option<Link>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub project: Option<ProjectRecord>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default, rename = "_links")]
    pub links: Option<RepositoryLinks>,
}

impl From<RepositoryRecord> for Repository {
    fn from(record: RepositoryRecord) -> Self {
        Repository {
            id: record.id,
            name: record.name,
            project: record.project.map(|p| p.name).unwrap_or_default(),
            url: record.url,
            default_branch: record.default_branch,
            web_url: record.links.and_then(|l| l.web).map(|w| w.href),
        }
    }
}

/// Merge status token (REST) or `PullRequestAsyncStatus` code (extension).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawMergeStatus {
    Code(i32),
    Token(String),
}

/// Status state token (REST) or `GitStatusState` code (extension).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawState {
    Code(i32),
    Token(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStatusContext {
    pub name: String,
    #[serde(default)]
    pub genre: Option<String>,
}

/// One build/check status entry. Pending statuses carry no state at all
/// on the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStatus {
    pub context: RawStatusContext,
    #[serde(default)]
    pub state: Option<RawState>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Comment thread status token (REST) or `CommentThreadStatus` code (extension).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ThreadStatus {
    Code(i32),
    Token(String),
}

impl ThreadStatus {
    /// The REST token for this status, translating extension codes.
    pub fn as_token(&self) -> Option<&str> {
        match self {
            ThreadStatus::Token(token) => Some(token.as_str()),
            ThreadStatus::Code(code) => match code {
                1 => Some("active"),
                2 => Some("fixed"),
                3 => Some("wontFix"),
                4 => Some("closed"),
                5 => Some("byDesign"),
                6 => Some("pending"),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentThread {
    #[serde(default)]
    pub status: Option<ThreadStatus>,
}

/// A pull request as returned by either the list or the detail endpoint.
///
/// The list projection omits several fields the detail endpoint fills in,
/// so everything beyond the keys is optional here and merged later.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestRecord {
    pub pull_request_id: u64,
    pub repository: RepositoryRefRecord,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_by: Option<IdentityRefRecord>,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_ref_name: Option<String>,
    #[serde(default)]
    pub target_ref_name: Option<String>,
    #[serde(default)]
    pub is_draft: Option<bool>,
    #[serde(default)]
    pub merge_status: Option<RawMergeStatus>,
    #[serde(default)]
    pub reviewers: Option<Vec<ReviewerRecord>>,
    #[serde(default)]
    pub auto_complete_set_by: Option<IdentityRefRecord>,
}

impl PullRequestRecord {
    /// Lay `detail` over `self`; fields present in `detail` win.
    pub fn overlay(self, detail: PullRequestRecord) -> PullRequestRecord {
        PullRequestRecord {
            pull_request_id: detail.pull_request_id,
            repository: RepositoryRefRecord {
                id: detail.repository.id,
                name: detail.repository.name.or(self.repository.name),
                url: detail.repository.url.or(self.repository.url),
                project: detail.repository.project.or(self.repository.project),
            },
            title: detail.title.or(self.title),
            created_by: detail.created_by.or(self.created_by),
            creation_date: detail.creation_date.or(self.creation_date),
            source_ref_name: detail.source_ref_name.or(self.source_ref_name),
            target_ref_name: detail.target_ref_name.or(self.target_ref_name),
            is_draft: detail.is_draft.or(self.is_draft),
            merge_status: detail.merge_status.or(self.merge_status),
            reviewers: detail.reviewers.or(self.reviewers),
            auto_complete_set_by: detail.auto_complete_set_by.or(self.auto_complete_set_by),
        }
    }
}
