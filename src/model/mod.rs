pub mod status;

pub use status::{collapse_statuses, normalize_merge_status};

use chrono::{DateTime, Utc};

/// Which projects a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only the configured default project.
    DefaultProject,
    /// Every project in the collection.
    AllProjects,
}

impl Scope {
    pub fn from_all_projects(all_projects: bool) -> Self {
        if all_projects {
            Scope::AllProjects
        } else {
            Scope::DefaultProject
        }
    }
}

/// A user or group record from the server's identity system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub unique_name: Option<String>,
    /// Groups are containers; plain users are not.
    pub is_group: bool,
}

/// The signed-in user and the groups they belong to.
///
/// `member_of` holds direct memberships first, then the memberships of
/// those groups, in discovery order. Identities reachable through more
/// than one group appear more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub unique_name: String,
    pub member_of: Vec<Identity>,
}

impl User {
    /// The user's own id followed by every group id they belong to.
    pub fn identity_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.member_of.iter().map(|i| i.id.as_str()))
    }
}

/// Lightweight reference to a user or group, as embedded in pull requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: String,
    pub display_name: String,
    pub unique_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub project: String,
    pub url: String,
    pub default_branch: Option<String>,
    /// Browser link, when the server includes `_links`.
    pub web_url: Option<String>,
}

/// A reviewer's vote. Ordering follows the numeric code the server uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Vote {
    Rejected,
    WaitingForAuthor,
    NoResponse,
    ApprovedWithSuggestions,
    Approved,
}

impl Vote {
    /// Map the server's vote code. Unknown codes count as no response.
    pub fn from_code(code: i32) -> Self {
        match code {
            10 => Vote::Approved,
            5 => Vote::ApprovedWithSuggestions,
            -5 => Vote::WaitingForAuthor,
            -10 => Vote::Rejected,
            _ => Vote::NoResponse,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Vote::Approved => "Approved",
            Vote::ApprovedWithSuggestions => "Approved With Suggestions",
            Vote::NoResponse => "No Response",
            Vote::WaitingForAuthor => "Waiting for Author",
            Vote::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for Vote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reviewer {
    pub identity: UserRef,
    pub vote: Vote,
}

/// Canonical mergeability of a pull request, identical for both transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    Queued,
    Succeeded,
    Conflicts,
    Failed,
}

/// Canonical state of a build/check status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusState {
    Pending,
    Succeeded,
    Failed,
    Error,
}

impl std::fmt::Display for StatusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusState::Pending => write!(f, "Pending"),
            StatusState::Succeeded => write!(f, "Succeeded"),
            StatusState::Failed => write!(f, "Failed"),
            StatusState::Error => write!(f, "Error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusContext {
    pub name: String,
    pub genre: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub context: StatusContext,
    pub state: StatusState,
    pub description: Option<String>,
}

/// Repository a pull request belongs to, by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub id: String,
    pub name: Option<String>,
    pub url: Option<String>,
}

/// A fully enriched active pull request.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequest {
    pub id: u64,
    pub repository: RepositoryRef,
    pub created_by: UserRef,
    pub created: DateTime<Utc>,
    pub source_branch: String,
    pub target_branch: String,
    pub title: String,
    pub is_draft: bool,
    pub has_merge_conflicts: bool,
    /// `None` until the server has evaluated mergeability.
    pub merge_status: Option<MergeStatus>,
    pub reviewers: Vec<Reviewer>,
    /// Comment threads still marked active.
    pub unresolved_comments: usize,
    /// At most one entry per status context name.
    pub statuses: Vec<Status>,
    pub auto_complete: bool,
}

/// Strip the `refs/heads/` prefix the server puts on branch names.
pub fn short_branch_name(ref_name: &str) -> &str {
    ref_name.strip_prefix("refs/heads/").unwrap_or(ref_name)
}
