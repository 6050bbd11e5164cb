use chrono::{DateTime, Utc};

use crate::model::Vote;

/// Visual category of a tag; decides its colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Draft,
    Pending,
    Approved,
    Failed,
    Rejected,
    AutoComplete,
}

/// A short label shown next to a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub description: String,
    pub kind: TagKind,
}

/// Reviewers who cast the same vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteGroup {
    pub vote: Vote,
    pub count: usize,
    /// "Approved: Alice, Bob"
    pub tooltip: String,
}

/// A pull request as shown on the dashboard.
#[derive(Debug, Clone)]
pub struct PullRequestView {
    pub id: u64,
    pub title: String,
    pub repository: String,
    pub author: String,
    pub created: DateTime<Utc>,
    pub source_branch: String,
    pub target_branch: String,
    pub url: Option<String>,
    pub tags: Vec<Tag>,
    pub votes: Vec<VoteGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    CreatedByMe,
    AssignedToMe,
    Other,
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Section::CreatedByMe => write!(f, "Created by me"),
            Section::AssignedToMe => write!(f, "Assigned to me"),
            Section::Other => write!(f, "Other active"),
        }
    }
}

/// The whole dashboard, ready for output.
#[derive(Debug)]
pub struct Dashboard {
    /// Display name of the signed-in user
    pub user: String,
    /// Number of groups (with repeats) the user was resolved into
    pub group_count: usize,
    /// Sections in display order, each sorted oldest first
    pub sections: Vec<(Section, Vec<PullRequestView>)>,
}

impl Dashboard {
    pub fn total(&self) -> usize {
        self.sections.iter().map(|(_, items)| items.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_ordering() {
        assert!(Section::CreatedByMe < Section::AssignedToMe);
        assert!(Section::AssignedToMe < Section::Other);
    }

    #[test]
    fn test_section_display() {
        assert_eq!(Section::CreatedByMe.to_string(), "Created by me");
        assert_eq!(Section::Other.to_string(), "Other active");
    }

    #[test]
    fn test_empty_dashboard_total() {
        let dashboard = Dashboard {
            user: "Jamie".to_string(),
            group_count: 0,
            sections: vec![(Section::CreatedByMe, vec![]), (Section::Other, vec![])],
        };
        assert_eq!(dashboard.total(), 0);
    }
}
