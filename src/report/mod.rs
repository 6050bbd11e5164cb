pub mod types;

pub use types::{Dashboard, PullRequestView, Section, Tag, TagKind, VoteGroup};

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use colored::Colorize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::model::{short_branch_name, PullRequest, Repository, StatusState, User, Vote};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),
}

/// Build the dashboard for `user`.
///
/// Pull requests are sorted oldest first and split into those the user
/// created, those where the user or one of their groups is a reviewer, and
/// everything else. With `only_mine` the last section is left out.
pub fn build(
    user: &User,
    mut pull_requests: Vec<PullRequest>,
    repositories: &[Repository],
    only_mine: bool,
) -> Dashboard {
    pull_requests.sort_by_key(|pr| pr.created);
    let my_ids: HashSet<&str> = user.identity_ids().collect();

    let mut sections: BTreeMap<Section, Vec<PullRequestView>> = BTreeMap::new();
    sections.insert(Section::CreatedByMe, Vec::new());
    sections.insert(Section::AssignedToMe, Vec::new());
    if !only_mine {
        sections.insert(Section::Other, Vec::new());
    }

    for pr in &pull_requests {
        let section = section_for(pr, &user.id, &my_ids);
        if let Some(items) = sections.get_mut(&section) {
            items.push(view(pr, repositories));
        }
    }

    Dashboard {
        user: user.display_name.clone(),
        group_count: user.member_of.len(),
        sections: sections.into_iter().collect(),
    }
}

fn section_for(pr: &PullRequest, user_id: &str, my_ids: &HashSet<&str>) -> Section {
    if pr.created_by.id == user_id {
        Section::CreatedByMe
    } else if pr
        .reviewers
        .iter()
        .any(|r| my_ids.contains(r.identity.id.as_str()))
    {
        Section::AssignedToMe
    } else {
        Section::Other
    }
}

fn view(pr: &PullRequest, repositories: &[Repository]) -> PullRequestView {
    let repository = repositories.iter().find(|r| r.id == pr.repository.id);
    PullRequestView {
        id: pr.id,
        title: pr.title.clone(),
        repository: repository
            .map(|r| format!("{}/{}", r.project, r.name))
            .or_else(|| pr.repository.name.clone())
            .unwrap_or_else(|| pr.repository.id.clone()),
        author: pr.created_by.display_name.clone(),
        created: pr.created,
        source_branch: short_branch_name(&pr.source_branch).to_string(),
        target_branch: short_branch_name(&pr.target_branch).to_string(),
        url: repository
            .and_then(|r| r.web_url.as_ref())
            .map(|web| format!("{web}/pullrequest/{}", pr.id)),
        tags: tags(pr),
        votes: vote_groups(pr),
    }
}

/// Tags for draft, conflicts, unresolved comments, each status context
/// and auto-complete, in that order.
pub fn tags(pr: &PullRequest) -> Vec<Tag> {
    let mut tags = Vec::new();
    if pr.is_draft {
        tags.push(Tag {
            name: "Draft".to_string(),
            description: "Pull request is in a draft state".to_string(),
            kind: TagKind::Draft,
        });
    }
    if pr.has_merge_conflicts {
        tags.push(Tag {
            name: "Conflicts".to_string(),
            description: "Conflicts exist between the source and target branch".to_string(),
            kind: TagKind::Failed,
        });
    }
    if pr.unresolved_comments > 0 {
        tags.push(Tag {
            name: format!("{} Unresolved Comments", pr.unresolved_comments),
            description: "There are unresolved comments".to_string(),
            kind: TagKind::Failed,
        });
    }
    for status in &pr.statuses {
        let kind = match status.state {
            StatusState::Error => TagKind::Rejected,
            StatusState::Failed => TagKind::Failed,
            StatusState::Succeeded => TagKind::Approved,
            StatusState::Pending => TagKind::Pending,
        };
        tags.push(Tag {
            name: status.context.name.clone(),
            description: format!(
                "{} - {}",
                status.description.as_deref().unwrap_or(&status.context.name),
                status.state
            ),
            kind,
        });
    }
    if pr.auto_complete {
        tags.push(Tag {
            name: "Auto-Complete".to_string(),
            description: "Pull Request is set to auto-complete once all policies have passed"
                .to_string(),
            kind: TagKind::AutoComplete,
        });
    }
    tags
}

/// Group reviewers by vote, approvals first.
pub fn vote_groups(pr: &PullRequest) -> Vec<VoteGroup> {
    let mut groups: BTreeMap<Vote, Vec<&str>> = BTreeMap::new();
    for reviewer in &pr.reviewers {
        groups
            .entry(reviewer.vote)
            .or_default()
            .push(reviewer.identity.display_name.as_str());
    }
    groups
        .into_iter()
        .rev()
        .map(|(vote, names)| VoteGroup {
            vote,
            count: names.len(),
            tooltip: format!("{}: {}", vote, names.join(", ")),
        })
        .collect()
}

/// Print to the terminal, or write markdown to `output_path` when given.
#[instrument(skip(dashboard), fields(total = dashboard.total()))]
pub fn output(dashboard: &Dashboard, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing dashboard to terminal");
            print_terminal_report(dashboard);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing dashboard to file");
            write_markdown_report(dashboard, path)
        }
    }
}

fn print_terminal_report(dashboard: &Dashboard) {
    println!();
    println!(
        "Active pull requests for {} ({} groups)",
        dashboard.user.bold(),
        dashboard.group_count
    );
    println!();

    for (section, items) in &dashboard.sections {
        println!("═══ {} ({}) ═══", section, items.len());
        if items.is_empty() {
            println!("  Nothing here.");
        }
        for item in items {
            println!(
                "  #{} {} [{}] {} → {}",
                item.id,
                item.title.bold(),
                item.repository,
                item.source_branch,
                item.target_branch
            );
            println!(
                "     by {} on {}",
                item.author,
                item.created.format("%Y-%m-%d %H:%M")
            );
            if !item.votes.is_empty() {
                let votes: Vec<String> = item.votes.iter().map(|v| colorize_vote(v).to_string()).collect();
                println!("     {}", votes.join("  "));
            }
            if !item.tags.is_empty() {
                let tags: Vec<String> = item.tags.iter().map(|t| colorize_tag(t).to_string()).collect();
                println!("     {}", tags.join(" "));
            }
            if let Some(url) = &item.url {
                println!("     {}", url.dimmed());
            }
        }
        println!();
    }
}

fn write_markdown_report(dashboard: &Dashboard, path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    md.push_str(&format!("# Active pull requests for {}\n\n", dashboard.user));

    for (section, items) in &dashboard.sections {
        md.push_str(&format!("## {} ({})\n\n", section, items.len()));
        if items.is_empty() {
            md.push_str("Nothing here.\n\n");
            continue;
        }
        for item in items {
            let title = match &item.url {
                Some(url) => format!("[#{} {}]({})", item.id, item.title, url),
                None => format!("#{} {}", item.id, item.title),
            };
            md.push_str(&format!(
                "- **{}** in `{}` (`{}` → `{}`) by {}, {}\n",
                title,
                item.repository,
                item.source_branch,
                item.target_branch,
                item.author,
                item.created.format("%Y-%m-%d")
            ));
            for vote in &item.votes {
                md.push_str(&format!("  - {} ({})\n", vote.tooltip, vote.count));
            }
            if !item.tags.is_empty() {
                let tags: Vec<String> = item.tags.iter().map(|t| format!("`{}`", t.name)).collect();
                md.push_str(&format!("  - Tags: {}\n", tags.join(" ")));
            }
        }
        md.push('\n');
    }

    std::fs::write(path, md)?;
    Ok(())
}

fn colorize_tag(tag: &Tag) -> colored::ColoredString {
    let label = format!("[{}]", tag.name);
    match tag.kind {
        TagKind::Failed => label.red(),
        TagKind::Rejected => label.red().bold(),
        TagKind::Approved => label.green(),
        TagKind::Pending => label.yellow(),
        TagKind::Draft => label.dimmed(),
        TagKind::AutoComplete => label.cyan(),
    }
}

fn colorize_vote(group: &VoteGroup) -> colored::ColoredString {
    let label = format!("{} ×{}", group.vote, group.count);
    match group.vote {
        Vote::Approved | Vote::ApprovedWithSuggestions => label.green(),
        Vote::WaitingForAuthor => label.yellow(),
        Vote::Rejected => label.red(),
        Vote::NoResponse => label.normal(),
    }
}
